use std::path::Path;
use std::time::Duration;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::models::ShardMethod;
use crate::{DispatchError, DispatchResult};

const ENV_PREFIX: &str = "TESTDISPATCH";

/// 调度核心配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default)]
    pub selection: SelectionConfig,
    #[serde(default)]
    pub shard: ShardConfig,
    #[serde(default)]
    pub bundle: BundleConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 测试选择配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// 测试名通配符，或单个以括号包裹的属性表达式
    #[serde(default)]
    pub patterns: Vec<String>,
}

/// 分片配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardConfig {
    pub index: usize,
    pub total: usize,
    #[serde(default)]
    pub method: ShardMethod,
}

impl Default for ShardConfig {
    fn default() -> Self {
        Self {
            index: 0,
            total: 1,
            method: ShardMethod::Alpha,
        }
    }
}

/// bundle进程配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleConfig {
    pub executable: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// 让bundle进入RPC服务模式的参数
    pub rpc_flag: String,
    pub handshake_timeout_ms: u64,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            executable: "local_test_runner".to_string(),
            args: Vec::new(),
            rpc_flag: "-rpc".to_string(),
            handshake_timeout_ms: 30_000,
        }
    }
}

impl BundleConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// `json`、`pretty` 或 `text`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl DispatchConfig {
    /// 按 默认值 -> TOML文件 -> `TESTDISPATCH__*` 环境变量 的顺序加载配置
    pub fn load(config_path: Option<&str>) -> DispatchResult<Self> {
        let defaults = Self::default();
        let mut builder = ConfigBuilder::builder()
            .set_default("shard.index", defaults.shard.index as u64)
            .and_then(|b| b.set_default("shard.total", defaults.shard.total as u64))
            .and_then(|b| b.set_default("shard.method", "alpha"))
            .and_then(|b| b.set_default("bundle.executable", defaults.bundle.executable))
            .and_then(|b| b.set_default("bundle.rpc_flag", defaults.bundle.rpc_flag))
            .and_then(|b| {
                b.set_default(
                    "bundle.handshake_timeout_ms",
                    defaults.bundle.handshake_timeout_ms,
                )
            })
            .and_then(|b| b.set_default("logging.level", defaults.logging.level))
            .and_then(|b| b.set_default("logging.format", defaults.logging.format))
            .map_err(|e| DispatchError::configuration(format!("设置默认配置失败: {e}")))?;

        if let Some(path) = config_path {
            if !Path::new(path).exists() {
                return Err(DispatchError::configuration(format!(
                    "配置文件不存在: {path}"
                )));
            }
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("selection.patterns")
                .with_list_parse_key("bundle.args")
                .try_parsing(true),
        );

        let config: DispatchConfig = builder
            .build()
            .map_err(|e| DispatchError::configuration(format!("构建配置失败: {e}")))?
            .try_deserialize()
            .map_err(|e| DispatchError::configuration(format!("解析配置失败: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// 从TOML字符串解析配置，不读取环境变量
    pub fn from_toml_str(content: &str) -> DispatchResult<Self> {
        let config: DispatchConfig = toml::from_str(content)
            .map_err(|e| DispatchError::configuration(format!("TOML解析错误: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// 分片器本身不校验参数，这里是唯一的检查点
    pub fn validate(&self) -> DispatchResult<()> {
        if self.shard.total == 0 {
            return Err(DispatchError::configuration("shard.total 必须大于0"));
        }
        if self.shard.index >= self.shard.total {
            return Err(DispatchError::configuration(format!(
                "shard.index {} 超出范围 [0, {})",
                self.shard.index, self.shard.total
            )));
        }
        if self.bundle.executable.trim().is_empty() {
            return Err(DispatchError::configuration("bundle.executable 不能为空"));
        }
        if !matches!(self.logging.format.as_str(), "json" | "pretty" | "text") {
            return Err(DispatchError::configuration(format!(
                "不支持的日志格式: {}",
                self.logging.format
            )));
        }
        Ok(())
    }
}
