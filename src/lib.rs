//! 分布式设备测试调度核心
//!
//! - [`dispatcher`]：属性表达式、依赖条件、测试解析与分片；
//! - [`worker`]：bundle进程的启动、握手与回收；
//! - [`core`]：共享的错误类型、配置、日志和数据模型。

pub use testdispatch_core as core;
pub use testdispatch_dispatcher as dispatcher;
pub use testdispatch_worker as worker;

pub use testdispatch_core::{
    DeviceDescriptor, DispatchConfig, DispatchError, DispatchResult, ResolvedEntity, Shard,
};

use testdispatch_dispatcher::{resolve, shard, Selector, TestRegistration};
use tracing::info;

/// 按配置完成一次调用中本分片的规划：选择测试、判定依赖、计算分片
pub fn plan_shard(
    config: &DispatchConfig,
    tests: &[TestRegistration],
    device: &DeviceDescriptor,
) -> DispatchResult<Shard> {
    config.validate()?;

    let selector = Selector::new(&config.selection.patterns)?;
    let resolved = resolve(tests, &selector, device)?;
    let planned = shard::compute_with(
        config.shard.method,
        &resolved,
        config.shard.index,
        config.shard.total,
    );

    info!(
        "分片 {}/{} 规划完成: 运行 {} 个，跳过上报 {} 个，排除 {} 个",
        config.shard.index,
        config.shard.total,
        planned.runnable().count(),
        planned.included.len() - planned.runnable().count(),
        planned.excluded.len()
    );

    Ok(planned)
}
