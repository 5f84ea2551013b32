//! Error types for the engine.

use pagesync_protocol::ProtocolError;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur while fetching or mutating a collection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Transport could not reach the server.
    #[error("network error: {0}")]
    Network(String),

    /// Server answered with a non-success status.
    #[error("{message}")]
    ServerRejection {
        /// HTTP status, if the transport reported one.
        status: Option<u16>,
        /// Server message, or a per-operation fallback.
        message: String,
    },

    /// Payload rejected before it was sent.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Another mutation on the same target is still pending.
    #[error("busy: a mutation on {key} is already pending")]
    Busy {
        /// Target key of the pending mutation.
        key: String,
    },

    /// Invalid state transition.
    #[error("invalid state transition from {from} to {to}")]
    InvalidTransition {
        /// Current state.
        from: String,
        /// Attempted target state.
        to: String,
    },

    /// Response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// Configuration could not be loaded.
    #[error("config error: {0}")]
    Config(String),
}

impl EngineError {
    /// Creates a server rejection.
    pub fn rejected(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::ServerRejection {
            status,
            message: message.into(),
        }
    }

    /// Returns true if re-issuing the same intent may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Network(_) => true,
            EngineError::ServerRejection { status, .. } => {
                status.map_or(true, |code| code >= 500 || code == 408 || code == 429)
            }
            _ => false,
        }
    }

    /// Message suitable for a transient notification or an error banner.
    pub fn user_message(&self) -> String {
        match self {
            EngineError::ServerRejection { message, .. } => message.clone(),
            EngineError::Network(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<ProtocolError> for EngineError {
    fn from(err: ProtocolError) -> Self {
        EngineError::Decode(err.to_string())
    }
}

/// Snapshot-facing copy of a fetch error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    /// Message to display.
    pub message: String,
    /// Whether a retry affordance makes sense.
    pub retryable: bool,
}

impl From<&EngineError> for ErrorInfo {
    fn from(err: &EngineError) -> Self {
        Self {
            message: err.user_message(),
            retryable: err.is_retryable(),
        }
    }
}
