use thiserror::Error;

/// 调度核心错误类型定义
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("无效的测试选择: {0}")]
    InvalidSelection(String),

    #[error("测试 {test} 的依赖声明无效: {message}")]
    InvalidDependency { test: String, message: String },

    #[error("启动bundle进程失败: {0}")]
    Spawn(String),

    #[error("RPC传输错误: {0}")]
    Transport(String),

    #[error("bundle握手失败: {0}")]
    Handshake(String),

    #[error("远程调用 {method} 失败: {message}")]
    Remote { method: String, message: String },

    #[error("RPC通道已关闭")]
    ChannelClosed,

    #[error("关闭RPC通道失败: {0}")]
    ChannelClose(String),

    #[error("关闭bundle标准输入失败: {0}")]
    StdinClose(String),

    #[error("等待bundle进程退出失败: {0}")]
    ProcessWait(String),

    #[error("操作已取消")]
    Cancelled,

    #[error("操作超时: {0}")]
    Timeout(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("配置错误: {0}")]
    Configuration(String),
}

impl DispatchError {
    pub fn invalid_dependency<T: Into<String>, M: Into<String>>(test: T, message: M) -> Self {
        Self::InvalidDependency {
            test: test.into(),
            message: message.into(),
        }
    }

    pub fn transport<S: Into<String>>(msg: S) -> Self {
        Self::Transport(msg.into())
    }

    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
}

impl From<serde_json::Error> for DispatchError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// 统一的Result类型
pub type DispatchResult<T> = std::result::Result<T, DispatchError>;
