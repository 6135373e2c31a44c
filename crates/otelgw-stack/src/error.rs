//! Synthesis error types.

use otelgw_core::ConfigError;
use thiserror::Error;

/// Result type alias for synthesis operations.
pub type SynthResult<T> = Result<T, SynthError>;

/// Errors that abort a synthesis run. Nothing is emitted on error.
#[derive(Debug, Error)]
pub enum SynthError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// A declared value is outside what the platform accepts.
    #[error("policy violation in {component}: {reason}")]
    PolicyViolation {
        component: &'static str,
        reason: String,
    },
}

impl SynthError {
    pub(crate) fn policy(component: &'static str, reason: impl Into<String>) -> Self {
        SynthError::PolicyViolation {
            component,
            reason: reason.into(),
        }
    }
}
