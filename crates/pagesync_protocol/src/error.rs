//! Error types for protocol encoding and decoding.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while encoding requests or decoding responses.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Response body was not the expected JSON shape.
    #[error("decode error: {0}")]
    Decode(String),

    /// Request body could not be serialized.
    #[error("encode error: {0}")]
    Encode(String),

    /// A required field was missing or had the wrong type.
    #[error("invalid field '{field}': {reason}")]
    InvalidField {
        /// Field name.
        field: &'static str,
        /// What was wrong with it.
        reason: String,
    },
}

impl ProtocolError {
    /// Creates an invalid field error.
    pub fn invalid_field(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ProtocolError::invalid_field("_id", "expected string");
        assert_eq!(err.to_string(), "invalid field '_id': expected string");
    }

    #[test]
    fn from_serde_error() {
        let err: ProtocolError = serde_json::from_slice::<u32>(b"nope").unwrap_err().into();
        assert!(matches!(err, ProtocolError::Decode(_)));
    }
}
