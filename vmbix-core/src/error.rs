//! Error types for VmBix.
//!
//! All errors use `thiserror`. Handlers never let these escape past the
//! dispatcher; only startup errors (configuration, first connect) are fatal.

use thiserror::Error;

/// Result type alias for VmBix operations.
pub type Result<T> = std::result::Result<T, VmbixError>;

/// Main error type for VmBix.
#[derive(Error, Debug)]
pub enum VmbixError {
    // Configuration errors
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // Remote endpoint errors
    #[error("Failed to connect to {endpoint}: {reason}")]
    ConnectFailed { endpoint: String, reason: String },

    #[error("Remote call {operation} failed: {reason}")]
    Remote { operation: String, reason: String },

    #[error("Unsupported service URL: {url}")]
    UnsupportedEndpoint { url: String },

    // Wire protocol errors
    #[error("Protocol error: {reason}")]
    Protocol { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VmbixError {
    /// Shorthand for a failed collaborator call.
    pub fn remote(operation: impl Into<String>, reason: impl ToString) -> Self {
        Self::Remote { operation: operation.into(), reason: reason.to_string() }
    }
}
