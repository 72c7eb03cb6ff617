use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use testdispatch_core::{DispatchError, DispatchResult};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::debug;

use crate::process::{BoxedReader, BoxedWriter};
use crate::protocol::{RpcRequest, RpcResponse, CLOSE_METHOD};

/// bundle标准输入，由通道和会话共同持有；取走即视为关闭
pub(crate) type SharedWriter = Arc<Mutex<Option<BoxedWriter>>>;

/// 复用在bundle标准输入输出上的RPC通道
///
/// 调用按顺序串行执行：同一时刻只有一个请求在等待响应。
pub struct RpcConn {
    reader: Mutex<BufReader<BoxedReader>>,
    writer: SharedWriter,
    next_id: AtomicU64,
    closed: AtomicBool,
    // 请求已发出但对应响应尚未读完；调用出错或被中途丢弃后保持置位
    desynced: AtomicBool,
}

impl RpcConn {
    pub(crate) fn new(stdout: BoxedReader, writer: SharedWriter) -> Self {
        Self {
            reader: Mutex::new(BufReader::new(stdout)),
            writer,
            next_id: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            desynced: AtomicBool::new(false),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// 发起一次调用并等待对应的响应
    ///
    /// 传输层出错或调用在等待响应时被丢弃后，输出流中可能残留旧响应，
    /// 之后的调用都直接返回 `ChannelClosed`。
    pub async fn call<P, R>(&self, method: &str, params: &P) -> DispatchResult<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let mut reader = self.reader.lock().await;
        if self.is_closed() || self.desynced.load(Ordering::Acquire) {
            return Err(DispatchError::ChannelClosed);
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest {
            id,
            method: method.to_string(),
            params: serde_json::to_value(params)?,
        };

        self.desynced.store(true, Ordering::Release);
        self.write_frame(&request)
            .await
            .map_err(|e| DispatchError::transport(format!("发送 {method} 请求失败: {e}")))?;

        let mut line = String::new();
        let read = reader
            .read_line(&mut line)
            .await
            .map_err(|e| DispatchError::transport(format!("读取 {method} 响应失败: {e}")))?;
        if read == 0 {
            return Err(DispatchError::transport(format!(
                "等待 {method} 响应时bundle关闭了输出流"
            )));
        }

        let response: RpcResponse = serde_json::from_str(line.trim_end()).map_err(|e| {
            DispatchError::transport(format!("无法解析 {method} 响应: {e}"))
        })?;
        if response.id != id {
            return Err(DispatchError::transport(format!(
                "响应id不匹配: 期望 {id}，收到 {}",
                response.id
            )));
        }

        self.desynced.store(false, Ordering::Release);
        debug!("RPC调用完成: method={}, id={}", method, id);

        if let Some(message) = response.error {
            return Err(DispatchError::Remote {
                method: method.to_string(),
                message,
            });
        }
        Ok(serde_json::from_value(
            response.result.unwrap_or(serde_json::Value::Null),
        )?)
    }

    /// 通知bundle通道即将关闭；之后的调用都会返回 `ChannelClosed`
    pub async fn close(&self) -> DispatchResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(DispatchError::ChannelClose("通道已经关闭".to_string()));
        }

        let notice = RpcRequest {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method: CLOSE_METHOD.to_string(),
            params: serde_json::Value::Null,
        };
        self.write_frame(&notice)
            .await
            .map_err(|e| DispatchError::ChannelClose(e.to_string()))
    }

    async fn write_frame(&self, frame: &RpcRequest) -> io::Result<()> {
        let mut payload = serde_json::to_vec(frame).map_err(io::Error::other)?;
        payload.push(b'\n');

        let mut guard = self.writer.lock().await;
        let writer = guard
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "bundle标准输入已关闭"))?;
        writer.write_all(&payload).await?;
        writer.flush().await
    }
}
