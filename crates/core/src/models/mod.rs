//! # 数据模型
//!
//! 调度核心在各组件之间传递的数据结构。
//!
//! ## 核心模型
//!
//! ### ResolvedEntity - 已解析的测试实体
//! 测试解析阶段的产物，可能已经带有跳过原因。分片计算只看它的名称和是否被跳过。
//!
//! ### DeviceDescriptor - 设备描述
//! 外部设备探测子系统生成的软硬件快照，依赖条件针对它求值。
//!
//! ### Shard - 分片结果
//! 某个分片索引下需要运行（`included`）和不归本分片运行（`excluded`）的实体。

pub mod device;
pub mod entity;
pub mod shard;

pub use device::DeviceDescriptor;
pub use entity::ResolvedEntity;
pub use shard::{Shard, ShardMethod};
