pub mod config;
pub mod errors;
pub mod logging;
pub mod models;

pub use config::{BundleConfig, DispatchConfig, LoggingConfig, SelectionConfig, ShardConfig};
pub use errors::*;
pub use logging::init_logging;
pub use models::{DeviceDescriptor, ResolvedEntity, Shard, ShardMethod};
