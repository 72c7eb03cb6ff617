use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;
use crate::{DispatchError, DispatchResult};

/// 初始化日志系统
///
/// `RUST_LOG` 存在时优先于配置中的级别。重复初始化返回错误而不是panic。
pub fn init_logging(config: &LoggingConfig) -> DispatchResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry().with(env_filter);

    let result = match config.format.as_str() {
        "json" => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        "pretty" => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
        "text" => registry.with(tracing_subscriber::fmt::layer()).try_init(),
        other => {
            return Err(DispatchError::configuration(format!(
                "不支持的日志格式: {other}"
            )));
        }
    };

    result.map_err(|e| DispatchError::configuration(format!("初始化日志系统失败: {e}")))
}
