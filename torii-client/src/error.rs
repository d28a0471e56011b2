//! Error types for the client runtime.

use crate::platform::Platform;
use thiserror::Error;

/// Result type for client operations.
pub type ToriiResult<T> = Result<T, ToriiError>;

/// Errors that can occur in client operations.
///
/// A missing model is not an error: single-key lookups return `Ok(None)`.
#[derive(Debug, Error)]
pub enum ToriiError {
    /// The remote rejected the connection parameters. The client is unusable.
    #[error("connect failed: {0}")]
    Connect(String),

    /// A query or subscription call was rejected by the remote service.
    #[error("remote call failed: {0}")]
    RemoteCall(String),

    /// The selected backend lacks this capability.
    #[error("{operation} is not supported on the {platform} backend")]
    UnsupportedPlatform {
        platform: Platform,
        operation: &'static str,
    },

    /// Programming error: use after disconnect, empty model list, double start.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// A caller-supplied value cannot cross the boundary (e.g. interior NUL).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The remote handed back data that could not be converted.
    #[error("decode error: {0}")]
    Decode(String),

    /// JSON encoding error on the browser wire.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ToriiError {
    pub(crate) fn unsupported(platform: Platform, operation: &'static str) -> Self {
        Self::UnsupportedPlatform {
            platform,
            operation,
        }
    }

    pub(crate) fn disconnected() -> Self {
        Self::InvariantViolation("client used after disconnect".into())
    }

    /// Whether the caller may retry the same call.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RemoteCall(_))
    }

    /// Whether the error stems from the backend lacking a capability.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::UnsupportedPlatform { .. })
    }
}
