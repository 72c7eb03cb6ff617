use std::sync::Arc;
use std::time::Duration;

use testdispatch_core::{BundleConfig, DispatchError, DispatchResult};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::diagnostics::{spawn_stderr_forwarder, DiagnosticSink, TracingSink};
use crate::process::{BundleProcess, CommandLauncher, ProcessExit, ProcessLauncher};
use crate::protocol::{HandshakeRequest, HandshakeResponse, HANDSHAKE_METHOD};
use crate::rpc::{RpcConn, SharedWriter};

const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// bundle连接管理器
///
/// 负责启动bundle、建立RPC通道并完成握手。任何失败路径上都会回收已启动的进程。
pub struct BundleClient {
    launcher: Arc<dyn ProcessLauncher>,
    sink: Arc<dyn DiagnosticSink>,
    handshake_timeout: Duration,
}

impl BundleClient {
    pub fn new(launcher: Arc<dyn ProcessLauncher>) -> Self {
        Self {
            launcher,
            sink: Arc::new(TracingSink),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    pub fn from_config(config: &BundleConfig) -> Self {
        Self::new(Arc::new(CommandLauncher::from_config(config)))
            .with_handshake_timeout(config.handshake_timeout())
    }

    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// 启动bundle并完成握手
    ///
    /// 启动失败直接返回；通道建立或握手失败（包括取消和超时）时先关闭标准输入、
    /// 再等待进程退出，然后返回原始错误。
    pub async fn dial(
        &self,
        cancel: &CancellationToken,
        request: &HandshakeRequest,
    ) -> DispatchResult<BundleSession> {
        let mut process = self.launcher.spawn().await?;
        let stdin: SharedWriter = Arc::new(Mutex::new(process.take_stdin()));

        match self
            .establish(process.as_mut(), &stdin, cancel, request)
            .await
        {
            Ok((conn, handshake)) => {
                info!(
                    "bundle握手完成: bundle={}, protocol_version={}",
                    handshake.bundle_name, handshake.protocol_version
                );
                Ok(BundleSession {
                    process,
                    stdin,
                    conn,
                    handshake,
                })
            }
            Err(err) => {
                warn!("bundle连接失败，回收进程: {}", err);
                if let Err(e) = close_stdin(&stdin).await {
                    debug!("回收时关闭标准输入失败: {}", e);
                }
                match process.wait().await {
                    Ok(exit) if exit.success() => debug!("bundle进程已退出"),
                    Ok(exit) => warn!("回收时bundle进程异常退出: code={:?}", exit.code),
                    Err(e) => debug!("回收时等待进程退出失败: {}", e),
                }
                Err(err)
            }
        }
    }

    async fn establish(
        &self,
        process: &mut dyn BundleProcess,
        stdin: &SharedWriter,
        cancel: &CancellationToken,
        request: &HandshakeRequest,
    ) -> DispatchResult<(RpcConn, HandshakeResponse)> {
        if stdin.lock().await.is_none() {
            return Err(DispatchError::transport("无法获取bundle标准输入"));
        }
        let stdout = process
            .take_stdout()
            .ok_or_else(|| DispatchError::transport("无法获取bundle标准输出"))?;

        match process.take_stderr() {
            Some(stderr) => spawn_stderr_forwarder(stderr, Arc::clone(&self.sink)),
            None => warn!("无法获取bundle标准错误，诊断输出将丢失"),
        }

        let conn = RpcConn::new(stdout, Arc::clone(stdin));
        let handshake = self.handshake(&conn, cancel, request).await?;
        Ok((conn, handshake))
    }

    async fn handshake(
        &self,
        conn: &RpcConn,
        cancel: &CancellationToken,
        request: &HandshakeRequest,
    ) -> DispatchResult<HandshakeResponse> {
        let call = tokio::time::timeout(
            self.handshake_timeout,
            conn.call::<_, HandshakeResponse>(HANDSHAKE_METHOD, request),
        );

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(DispatchError::Cancelled),
            result = call => match result {
                Ok(Ok(response)) => response,
                Ok(Err(DispatchError::Remote { message, .. })) => {
                    return Err(DispatchError::Handshake(message));
                }
                Ok(Err(err)) => return Err(err),
                Err(_) => {
                    return Err(DispatchError::Timeout(format!(
                        "握手在 {:?} 内未完成",
                        self.handshake_timeout
                    )));
                }
            },
        };

        if let Some(message) = response.error {
            return Err(DispatchError::Handshake(message));
        }
        if response.protocol_version != request.protocol_version {
            return Err(DispatchError::Handshake(format!(
                "协议版本不匹配: 本端 {}，bundle {}",
                request.protocol_version, response.protocol_version
            )));
        }
        Ok(response)
    }
}

/// 一个已握手的bundle连接，由创建者独占
///
/// 不支持并发使用：调用方需要保证 `close` 与通过 `conn` 发起的调用不会同时进行。
pub struct BundleSession {
    process: Box<dyn BundleProcess>,
    stdin: SharedWriter,
    conn: RpcConn,
    handshake: HandshakeResponse,
}

impl BundleSession {
    pub fn conn(&self) -> &RpcConn {
        &self.conn
    }

    pub fn handshake(&self) -> &HandshakeResponse {
        &self.handshake
    }

    /// 依次关闭RPC通道、关闭标准输入、等待进程退出
    ///
    /// 三步都会执行，只返回第一个错误；进程非零退出或被信号终止也算作错误。
    /// 等待进程退出没有超时，需要期限的调用方应在外层自行限制。
    pub async fn close(mut self) -> DispatchResult<()> {
        let mut first_err: Option<DispatchError> = None;

        if let Err(e) = self.conn.close().await {
            warn!("关闭RPC通道失败: {}", e);
            first_err.get_or_insert(e);
        }

        if let Err(e) = close_stdin(&self.stdin).await {
            warn!("关闭bundle标准输入失败: {}", e);
            first_err.get_or_insert(e);
        }

        match self.process.wait().await.and_then(ensure_clean_exit) {
            Ok(()) => debug!("bundle进程正常退出"),
            Err(e) => {
                warn!("bundle进程退出失败: {}", e);
                first_err.get_or_insert(e);
            }
        }

        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// 非零退出码或被信号终止（没有退出码）都视为异常退出
fn ensure_clean_exit(exit: ProcessExit) -> DispatchResult<()> {
    if exit.success() {
        Ok(())
    } else {
        Err(DispatchError::ProcessWait(format!(
            "bundle进程异常退出: code={:?}",
            exit.code
        )))
    }
}

async fn close_stdin(stdin: &SharedWriter) -> DispatchResult<()> {
    let writer = stdin.lock().await.take();
    match writer {
        Some(mut writer) => writer
            .shutdown()
            .await
            .map_err(|e| DispatchError::StdinClose(e.to_string())),
        None => Err(DispatchError::StdinClose("标准输入已经关闭".to_string())),
    }
}
