//! Error types for the connection pool

use std::time::Duration;
use thiserror::Error;

/// Boxed error returned by connection factories and health probes.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Invalid configuration for `{field}`: {message}")]
    Configuration { field: &'static str, message: String },

    #[error("Connection creation failed after {attempts} attempt(s): {last_error}")]
    Creation { attempts: u32, last_error: String },

    #[error("Connection validation failed: {reason}")]
    Validation { reason: String },

    #[error("Pool exhausted - all {max_connections} connections are in use")]
    Exhausted { max_connections: usize },

    #[error("No connection became available within {0:?}")]
    Timeout(Duration),

    #[error("Background worker `{name}` could not be started: {reason}")]
    Worker { name: String, reason: String },

    #[error("Metrics export failed: {0}")]
    Metrics(String),
}

impl PoolError {
    pub(crate) fn config(field: &'static str, message: impl Into<String>) -> Self {
        PoolError::Configuration {
            field,
            message: message.into(),
        }
    }

    /// Whether this error was caused by running out of capacity rather than a failure.
    pub fn is_exhaustion(&self) -> bool {
        matches!(self, PoolError::Exhausted { .. } | PoolError::Timeout(_))
    }
}

#[cfg(feature = "metrics")]
impl From<prometheus::Error> for PoolError {
    fn from(err: prometheus::Error) -> Self {
        PoolError::Metrics(err.to_string())
    }
}

pub type PoolResult<T> = Result<T, PoolError>;
