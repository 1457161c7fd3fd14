//! Error types for PULSE.
//!
//! All errors use `thiserror` for ergonomic error handling and proper error chains.
//! Only lifecycle and configuration misuse surfaces here; transient transport
//! failures and malformed messages are absorbed by the pipeline and reported as
//! state transitions and counters instead.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for PULSE operations.
pub type Result<T> = std::result::Result<T, PulseError>;

/// Main error type for PULSE.
#[derive(Error, Debug)]
pub enum PulseError {
    // Configuration errors
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Invalid capacity for channel {channel}: capacity must be at least 1")]
    InvalidCapacity { channel: String },

    #[error("Invalid telemetry endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    // Lifecycle errors
    #[error("Sample for channel {found} cannot be seeded into channel {expected}")]
    ChannelMismatch { expected: String, found: String },

    // Transport errors
    #[error("Failed to connect to {endpoint}: {reason}")]
    ConnectFailed { endpoint: String, reason: String },

    #[error("Connection lost: {reason}")]
    ConnectionLost { reason: String },

    // Wire errors
    #[error("Malformed telemetry message: {reason}")]
    MalformedMessage { reason: String },

    // File system errors
    #[error("I/O error at {path:?}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PulseError {
    /// Create an Internal error from any error type.
    pub fn internal(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Internal(err.to_string())
    }

    /// Shorthand for a malformed-message error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedMessage { reason: reason.into() }
    }
}
