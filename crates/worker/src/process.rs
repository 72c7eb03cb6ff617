use std::process::Stdio;

use async_trait::async_trait;
use testdispatch_core::{BundleConfig, DispatchError, DispatchResult};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, Command};
use tracing::info;

pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// 进程退出信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    pub code: Option<i32>,
}

impl ProcessExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// 已启动的bundle进程
///
/// 标准流只能各取一次；`wait` 阻塞直到进程退出。
#[async_trait]
pub trait BundleProcess: Send {
    fn take_stdin(&mut self) -> Option<BoxedWriter>;
    fn take_stdout(&mut self) -> Option<BoxedReader>;
    fn take_stderr(&mut self) -> Option<BoxedReader>;
    async fn wait(&mut self) -> DispatchResult<ProcessExit>;
}

/// 以RPC服务模式启动bundle
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    async fn spawn(&self) -> DispatchResult<Box<dyn BundleProcess>>;
}

/// 基于 `tokio::process::Command` 的启动器
#[derive(Debug, Clone)]
pub struct CommandLauncher {
    executable: String,
    args: Vec<String>,
    rpc_flag: String,
}

impl CommandLauncher {
    pub fn new<S: Into<String>>(executable: S) -> Self {
        Self {
            executable: executable.into(),
            args: Vec::new(),
            rpc_flag: "-rpc".to_string(),
        }
    }

    pub fn from_config(config: &BundleConfig) -> Self {
        Self {
            executable: config.executable.clone(),
            args: config.args.clone(),
            rpc_flag: config.rpc_flag.clone(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_rpc_flag<S: Into<String>>(mut self, flag: S) -> Self {
        self.rpc_flag = flag.into();
        self
    }
}

#[async_trait]
impl ProcessLauncher for CommandLauncher {
    async fn spawn(&self) -> DispatchResult<Box<dyn BundleProcess>> {
        let mut cmd = Command::new(&self.executable);
        cmd.args(&self.args);
        if !self.rpc_flag.is_empty() {
            cmd.arg(&self.rpc_flag);
        }
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        // 会话未经 close 就被丢弃时不留下孤儿进程
        cmd.kill_on_drop(true);

        let child = cmd
            .spawn()
            .map_err(|e| DispatchError::Spawn(format!("{}: {e}", self.executable)))?;

        info!(
            "已启动bundle进程: executable={}, pid={:?}",
            self.executable,
            child.id()
        );

        Ok(Box::new(ChildProcess { child }))
    }
}

/// 对 `tokio::process::Child` 的封装
pub struct ChildProcess {
    child: Child,
}

#[async_trait]
impl BundleProcess for ChildProcess {
    fn take_stdin(&mut self) -> Option<BoxedWriter> {
        self.child
            .stdin
            .take()
            .map(|stdin| Box::new(stdin) as BoxedWriter)
    }

    fn take_stdout(&mut self) -> Option<BoxedReader> {
        self.child
            .stdout
            .take()
            .map(|stdout| Box::new(stdout) as BoxedReader)
    }

    fn take_stderr(&mut self) -> Option<BoxedReader> {
        self.child
            .stderr
            .take()
            .map(|stderr| Box::new(stderr) as BoxedReader)
    }

    async fn wait(&mut self) -> DispatchResult<ProcessExit> {
        let status = self
            .child
            .wait()
            .await
            .map_err(|e| DispatchError::ProcessWait(e.to_string()))?;
        Ok(ProcessExit {
            code: status.code(),
        })
    }
}
