//! bundle连接管理
//!
//! 以RPC服务模式启动bundle进程，在其标准输入输出上建立通道并完成握手，
//! 由外部的调度循环通过 [`BundleSession::conn`] 下发每个测试的运行请求。

pub mod bundle;
pub mod diagnostics;
pub mod process;
pub mod protocol;
pub mod rpc;

pub use bundle::{BundleClient, BundleSession};
pub use diagnostics::{DiagnosticSink, TracingSink};
pub use process::{
    BoxedReader, BoxedWriter, BundleProcess, ChildProcess, CommandLauncher, ProcessExit,
    ProcessLauncher,
};
pub use protocol::{HandshakeRequest, HandshakeResponse, PROTOCOL_VERSION};
pub use rpc::RpcConn;
