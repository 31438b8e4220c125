//! Protocol error types.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while building, encoding or decoding protocol messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Message exceeds maximum allowed size.
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: u32, max: u32 },

    /// JSON encoding or decoding failed.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Connection closed before the full message was received.
    #[error("incomplete message: expected {expected} bytes, got {received}")]
    IncompleteMessage { expected: usize, received: usize },

    #[error("empty message")]
    EmptyMessage,

    /// A request violates an envelope invariant (empty object id, operation...).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A response has neither or both of `result` and `error`.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// A parameter value could not be turned into a wire value.
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParam { name: String, reason: String },
}

impl ProtocolError {
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest(reason.into())
    }

    pub fn malformed_response(reason: impl Into<String>) -> Self {
        Self::MalformedResponse(reason.into())
    }

    pub fn invalid_param(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParam {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
