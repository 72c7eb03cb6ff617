//! 依赖条件
//!
//! 一组针对 [`DeviceDescriptor`] 的具名谓词。声明阶段构造，之后不再修改；
//! 在注册时用 [`Deps::validate`] 检查声明是否合法，在具体设备上用
//! [`Deps::satisfied`] 判断是否满足。

use std::fmt;
use std::sync::Arc;

use testdispatch_core::DeviceDescriptor;
use thiserror::Error;
use tracing::debug;

pub mod conditions;

pub use conditions::*;

/// 设备上求值的谓词，`Err` 携带不满足的原因
pub type Predicate = Arc<dyn Fn(&DeviceDescriptor) -> Result<(), String> + Send + Sync>;

/// 条件在构造阶段就发现的声明错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionError {
    #[error("{kind}: 名称列表为空")]
    EmptyList { kind: &'static str },

    #[error("{kind}: 非法名称 {name:?}")]
    InvalidName { kind: &'static str, name: String },

    #[error("min_memory_mb: 内存下限必须大于0")]
    ZeroMemory,

    #[error("{0}")]
    Other(String),
}

/// 依赖未满足，列出全部原因
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("依赖条件未满足: {}", .reasons.join("; "))]
pub struct Unsatisfied {
    pub reasons: Vec<String>,
}

/// 单个依赖条件：要么是可求值的谓词，要么是构造失败的标记
#[derive(Clone)]
pub enum Condition {
    Predicate {
        description: String,
        check: Predicate,
    },
    Invalid(ConditionError),
}

impl Condition {
    pub fn predicate<S, F>(description: S, check: F) -> Self
    where
        S: Into<String>,
        F: Fn(&DeviceDescriptor) -> Result<(), String> + Send + Sync + 'static,
    {
        Condition::Predicate {
            description: description.into(),
            check: Arc::new(check),
        }
    }

    pub fn invalid(err: ConditionError) -> Self {
        Condition::Invalid(err)
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Condition::Predicate { .. })
    }

    fn evaluate(&self, device: &DeviceDescriptor) -> Result<(), String> {
        match self {
            Condition::Predicate { check, .. } => check(device),
            Condition::Invalid(err) => Err(format!("依赖条件声明无效: {err}")),
        }
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Predicate { description, .. } => {
                f.debug_tuple("Predicate").field(description).finish()
            }
            Condition::Invalid(err) => f.debug_tuple("Invalid").field(err).finish(),
        }
    }
}

/// 有序的依赖条件集合，全部满足才算满足
#[derive(Debug, Clone, Default)]
pub struct Deps {
    conditions: Vec<Condition>,
}

/// 声明依赖集合的简写
pub fn d<I: IntoIterator<Item = Condition>>(conditions: I) -> Deps {
    Deps::new(conditions)
}

impl Deps {
    pub fn new<I: IntoIterator<Item = Condition>>(conditions: I) -> Self {
        Self {
            conditions: conditions.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// 对每个条件求值并收集所有失败原因，不在第一个失败处停止
    pub fn satisfied(&self, device: &DeviceDescriptor) -> Result<(), Unsatisfied> {
        let reasons: Vec<String> = self
            .conditions
            .iter()
            .filter_map(|cond| cond.evaluate(device).err())
            .collect();

        if reasons.is_empty() {
            Ok(())
        } else {
            debug!(
                "设备 {} 不满足 {} 个依赖条件: {:?}",
                device.model,
                reasons.len(),
                reasons
            );
            Err(Unsatisfied { reasons })
        }
    }

    /// 返回第一个构造失败的条件，与设备状态无关
    pub fn validate(&self) -> Result<(), ConditionError> {
        match self.conditions.iter().find_map(|cond| match cond {
            Condition::Invalid(err) => Some(err),
            Condition::Predicate { .. } => None,
        }) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    /// 两个集合的合取：结果要求两边的条件全部满足
    pub fn merge(&self, other: &Deps) -> Deps {
        Deps {
            conditions: self
                .conditions
                .iter()
                .chain(other.conditions.iter())
                .cloned()
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn always_ok() -> Condition {
        Condition::predicate("always ok", |_| Ok(()))
    }

    fn always_fail(reason: &'static str) -> Condition {
        Condition::predicate("always fail", move |_| Err(reason.to_string()))
    }

    #[test]
    fn test_empty_deps_satisfied() {
        let deps = Deps::default();
        assert!(deps.is_empty());
        assert!(deps.satisfied(&DeviceDescriptor::default()).is_ok());
        assert!(deps.validate().is_ok());
    }

    #[test]
    fn test_reasons_of_failing_conditions() {
        let deps = d([always_ok(), always_fail("r")]);
        let err = deps.satisfied(&DeviceDescriptor::default()).unwrap_err();
        assert_eq!(err.reasons, vec!["r".to_string()]);
    }

    #[test]
    fn test_all_reasons_collected_in_order() {
        let deps = d([always_fail("a"), always_ok(), always_fail("b")]);
        let err = deps.satisfied(&DeviceDescriptor::default()).unwrap_err();
        assert_eq!(err.reasons, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(err.to_string(), "依赖条件未满足: a; b");
    }

    #[test]
    fn test_invalid_condition_counts_as_failure() {
        let deps = d([always_ok(), Condition::invalid(ConditionError::ZeroMemory)]);
        let err = deps.satisfied(&DeviceDescriptor::default()).unwrap_err();
        assert_eq!(err.reasons.len(), 1);
        assert!(err.reasons[0].contains("依赖条件声明无效"));
    }

    #[test]
    fn test_validate_returns_first_construction_error() {
        let deps = d([
            always_fail("not a construction error"),
            Condition::invalid(ConditionError::Other("first".into())),
            Condition::invalid(ConditionError::Other("second".into())),
        ]);
        assert_eq!(
            deps.validate(),
            Err(ConditionError::Other("first".to_string()))
        );
    }

    #[test]
    fn test_merge_is_conjunction() {
        let fixture = d([always_ok()]);
        let test = d([always_fail("test-level")]);
        let merged = fixture.merge(&test);
        assert_eq!(merged.conditions().len(), 2);
        let err = merged.satisfied(&DeviceDescriptor::default()).unwrap_err();
        assert_eq!(err.reasons, vec!["test-level".to_string()]);

        let both_ok = fixture.merge(&d([always_ok()]));
        assert!(both_ok.satisfied(&DeviceDescriptor::default()).is_ok());
    }
}
