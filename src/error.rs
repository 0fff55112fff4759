//! Error types for time-limited containers.
//!
//! Only construction and TTL updates can fail. Every other container
//! operation is infallible.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when configuring a time-limited container.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExpiryError {
    /// The time-to-live must be a positive duration
    #[error("expiry must be a positive duration, got {0:?}")]
    InvalidExpiry(Duration),

    /// The time-to-live reaches past the end of the monotonic clock
    #[error("expiry {0:?} is too long to schedule")]
    ExpiryTooLong(Duration),

    /// Timer-driven eviction was requested outside a Tokio runtime
    #[error("timer-driven expiry requires a running Tokio runtime")]
    NoRuntime,
}

/// Result type for container configuration.
pub type Result<T> = std::result::Result<T, ExpiryError>;
