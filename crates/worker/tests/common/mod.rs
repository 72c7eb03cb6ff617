//! 测试用的bundle替身：用内存管道模拟进程的标准流

use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use async_trait::async_trait;
use serde_json::json;
use testdispatch_core::{DispatchError, DispatchResult};
use testdispatch_worker::process::{BoxedReader, BoxedWriter, BundleProcess, ProcessExit, ProcessLauncher};
use testdispatch_worker::protocol::{RpcRequest, RpcResponse, CLOSE_METHOD, HANDSHAKE_METHOD};
use testdispatch_worker::DiagnosticSink;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, DuplexStream};
use tokio::task::JoinHandle;

/// 替身bundle对握手请求的反应
#[derive(Debug, Clone)]
pub enum Behavior {
    Accept,
    Reject(String),
    Garbage,
    Silent,
    WrongVersion,
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub close_notices: AtomicUsize,
    pub stdin_eof: AtomicBool,
    pub wait_calls: AtomicUsize,
    pub exited: AtomicBool,
    pub fail_writes: Arc<AtomicBool>,
    pub fail_wait: AtomicBool,
    pub shutdown_attempts: Arc<AtomicUsize>,
}

/// 可以在运行中切换为失败模式的写端
pub struct FlakyWriter {
    inner: DuplexStream,
    fail: Arc<AtomicBool>,
    shutdowns: Arc<AtomicUsize>,
}

impl FlakyWriter {
    fn injected() -> io::Error {
        io::Error::new(io::ErrorKind::BrokenPipe, "injected write failure")
    }
}

impl AsyncWrite for FlakyWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if self.fail.load(Ordering::SeqCst) {
            return Poll::Ready(Err(Self::injected()));
        }
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        if self.fail.load(Ordering::SeqCst) {
            return Poll::Ready(Err(Self::injected()));
        }
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Poll::Ready(Err(Self::injected()));
        }
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

pub struct FakeProcess {
    stdin: Option<BoxedWriter>,
    stdout: Option<BoxedReader>,
    stderr: Option<BoxedReader>,
    server: Option<JoinHandle<()>>,
    state: Arc<FakeState>,
}

impl FakeProcess {
    pub fn start(behavior: Behavior) -> (Self, Arc<FakeState>) {
        let state = Arc::new(FakeState::default());
        let (client_stdin, server_in) = tokio::io::duplex(4096);
        let (server_out, client_stdout) = tokio::io::duplex(4096);
        let (server_err, client_stderr) = tokio::io::duplex(4096);

        let server = tokio::spawn(serve(
            behavior,
            server_in,
            server_out,
            server_err,
            Arc::clone(&state),
        ));

        let stdin = FlakyWriter {
            inner: client_stdin,
            fail: Arc::clone(&state.fail_writes),
            shutdowns: Arc::clone(&state.shutdown_attempts),
        };

        let process = Self {
            stdin: Some(Box::new(stdin)),
            stdout: Some(Box::new(client_stdout)),
            stderr: Some(Box::new(client_stderr)),
            server: Some(server),
            state: Arc::clone(&state),
        };
        (process, state)
    }

    pub fn without_stdout(mut self) -> Self {
        self.stdout = None;
        self
    }
}

async fn serve(
    behavior: Behavior,
    server_in: DuplexStream,
    mut server_out: DuplexStream,
    mut server_err: DuplexStream,
    state: Arc<FakeState>,
) {
    let _ = server_err.write_all(b"fake bundle ready\n").await;

    let mut lines = BufReader::new(server_in).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let Ok(request) = serde_json::from_str::<RpcRequest>(&line) else {
            continue;
        };
        if request.method == CLOSE_METHOD {
            state.close_notices.fetch_add(1, Ordering::SeqCst);
            continue;
        }

        let id = request.id;
        let reply = if request.method == HANDSHAKE_METHOD {
            let result = match &behavior {
                Behavior::Accept => json!({"protocol_version": 1, "bundle_name": "fake"}),
                Behavior::Reject(message) => json!({"protocol_version": 1, "error": message}),
                Behavior::WrongVersion => json!({"protocol_version": 99}),
                Behavior::Garbage => {
                    let _ = server_out.write_all(b"this is not json\n").await;
                    continue;
                }
                Behavior::Silent => continue,
            };
            RpcResponse {
                id,
                result: Some(result),
                error: None,
            }
        } else if request.method == "garbage" {
            let _ = server_out.write_all(b"this is not json\n").await;
            continue;
        } else if request.method == "slow" {
            tokio::time::sleep(std::time::Duration::from_millis(300)).await;
            RpcResponse {
                id,
                result: Some(request.params),
                error: None,
            }
        } else if request.method == "fail" {
            RpcResponse {
                id,
                result: None,
                error: Some("boom".to_string()),
            }
        } else {
            RpcResponse {
                id,
                result: Some(request.params),
                error: None,
            }
        };

        let mut payload = serde_json::to_vec(&reply).unwrap();
        payload.push(b'\n');
        if server_out.write_all(&payload).await.is_err() {
            break;
        }
    }

    state.stdin_eof.store(true, Ordering::SeqCst);
}

#[async_trait]
impl BundleProcess for FakeProcess {
    fn take_stdin(&mut self) -> Option<BoxedWriter> {
        self.stdin.take()
    }

    fn take_stdout(&mut self) -> Option<BoxedReader> {
        self.stdout.take()
    }

    fn take_stderr(&mut self) -> Option<BoxedReader> {
        self.stderr.take()
    }

    async fn wait(&mut self) -> DispatchResult<ProcessExit> {
        self.state.wait_calls.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_wait.load(Ordering::SeqCst) {
            return Err(DispatchError::ProcessWait("injected wait failure".to_string()));
        }
        if let Some(server) = self.server.take() {
            let _ = server.await;
        }
        self.state.exited.store(true, Ordering::SeqCst);
        Ok(ProcessExit { code: Some(0) })
    }
}

/// 只能启动一次的启动器
pub struct FakeLauncher {
    process: Mutex<Option<FakeProcess>>,
}

impl FakeLauncher {
    pub fn new(process: FakeProcess) -> Arc<Self> {
        Arc::new(Self {
            process: Mutex::new(Some(process)),
        })
    }
}

#[async_trait]
impl ProcessLauncher for FakeLauncher {
    async fn spawn(&self) -> DispatchResult<Box<dyn BundleProcess>> {
        let process = self.process.lock().unwrap().take();
        match process {
            Some(process) => Ok(Box::new(process)),
            None => Err(DispatchError::Spawn("fake bundle already spawned".to_string())),
        }
    }
}

/// 收集bundle标准错误输出
#[derive(Default)]
pub struct CollectingSink {
    pub lines: Mutex<Vec<String>>,
}

impl DiagnosticSink for CollectingSink {
    fn write_line(&self, line: &str) {
        self.lines.lock().unwrap().push(line.to_string());
    }
}

impl CollectingSink {
    /// 转发任务不与会话同步，这里轮询等待
    pub async fn wait_for(&self, expected: &str) -> bool {
        for _ in 0..100 {
            if self.lines.lock().unwrap().iter().any(|l| l == expected) {
                return true;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        false
    }
}
