//! 测试调度的决策部分：属性表达式、依赖条件、测试解析与分片。
//!
//! 这些组件都是同步、无共享状态的纯计算。

pub mod deps;
pub mod expr;
mod glob;
pub mod resolver;
pub mod selection;
pub mod shard;

pub use deps::{d, Condition, ConditionError, Deps, Unsatisfied};
pub use expr::{Expr, ExprError};
pub use resolver::{resolve, validate_registrations, TestRegistration};
pub use selection::Selector;
pub use shard::{compute, compute_with};

impl From<ExprError> for testdispatch_core::DispatchError {
    fn from(err: ExprError) -> Self {
        testdispatch_core::DispatchError::InvalidSelection(err.to_string())
    }
}
