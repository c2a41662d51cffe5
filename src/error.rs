//! Cache Error Types
//!
//! Operations across the crate return [`anyhow::Result`]. Failures that callers
//! may want to branch on are raised as [`CacheError`] and wrapped, so they can
//! be recovered with `err.downcast_ref::<CacheError>()`.

use std::time::Duration;
use thiserror::Error;

/// Typed failures raised by cache backends and the factory
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Backend kind is unknown, or its cargo feature is disabled
    #[error("unsupported cache backend: {0}")]
    UnsupportedBackend(String),

    /// Configuration value is missing or malformed
    #[error("invalid cache configuration: {0}")]
    InvalidConfig(String),

    /// Backend was closed and can no longer serve mutations
    #[error("cache backend '{0}' is closed")]
    Closed(&'static str),

    /// Counter arithmetic left the `i64` range
    #[error("counter overflow for key '{0}'")]
    Overflow(String),

    /// Network leg exceeded its configured timeout
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        /// Name of the timed-out operation
        operation: &'static str,
        /// Configured bound that was exceeded
        timeout: Duration,
    },
}
