//! Error types for cluster context loading and validation.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Required input is missing or malformed. Nothing is emitted when one of
/// these is returned.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read context file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse context file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("unsupported context file format: {0} (expected .toml or .json)")]
    UnsupportedFormat(String),

    #[error("missing required context key: {0}")]
    MissingKey(String),

    #[error("no availability zones to deploy into: `cluster-data.subnets` is empty")]
    NoZones,

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: String, reason: String },

    #[error("invalid ARN: {0}")]
    InvalidArn(String),
}

impl ConfigError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
