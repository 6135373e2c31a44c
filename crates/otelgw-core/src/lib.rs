pub mod arn;
pub mod config;
pub mod error;
pub mod types;

pub use arn::Arn;
pub use config::{ClusterData, ContextFile, DnsZoneRef, StackSettings};
pub use error::{ConfigError, ConfigResult};
pub use types::*;
