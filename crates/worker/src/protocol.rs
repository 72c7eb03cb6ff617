//! 与bundle之间的消息格式
//!
//! 每个帧是一行JSON。请求带递增的 `id`，响应回显同一个 `id`，
//! 并且 `result` 与 `error` 二者至多出现一个。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: u32 = 1;

pub const HANDSHAKE_METHOD: &str = "handshake";
pub const CLOSE_METHOD: &str = "close";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 建立通道后发送的第一条消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandshakeRequest {
    pub protocol_version: u32,
    /// 传给bundle的运行时变量
    #[serde(default)]
    pub vars: BTreeMap<String, String>,
}

impl Default for HandshakeRequest {
    fn default() -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            vars: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandshakeResponse {
    pub protocol_version: u32,
    #[serde(default)]
    pub bundle_name: String,
    /// bundle初始化失败时的原因
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
