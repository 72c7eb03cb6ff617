use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use crate::process::BoxedReader;

/// bundle标准错误输出的去处
pub trait DiagnosticSink: Send + Sync {
    fn write_line(&self, line: &str);
}

/// 默认实现：按行转发到 `bundle_stderr` 日志目标
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn write_line(&self, line: &str) {
        info!(target: "bundle_stderr", "{}", line);
    }
}

/// 启动后台任务转发bundle的标准错误
///
/// 任务在标准错误读到EOF（即进程退出）时结束。不保留句柄，也不与会话关闭同步，
/// 会话关闭后仍在途的最后几行输出可能丢失。
pub(crate) fn spawn_stderr_forwarder(stderr: BoxedReader, sink: Arc<dyn DiagnosticSink>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => sink.write_line(&line),
                Ok(None) => break,
                Err(e) => {
                    debug!("读取bundle标准错误失败: {}", e);
                    break;
                }
            }
        }
    });
}
