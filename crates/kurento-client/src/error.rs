//! Client error types.
//!
//! A failed call is either a [`TransportError`] (the request or its response
//! never made it, or made it mangled) or a [`RemoteError`] (the server
//! answered with an error object). Callers decide on retries; the gateway
//! never retries on its own.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use kurento_protocol::{ErrorInfo, ProtocolError, RequestId};
use thiserror::Error;

/// Result type for gateway calls.
pub type RpcResult<T> = Result<T, InvokeError>;

/// Connection-level failures.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The connection closed before a response arrived.
    #[error("connection closed")]
    Closed,

    /// No response within the deadline.
    #[error("timed out after {after:?} waiting for {operation}")]
    Timeout { operation: String, after: Duration },

    #[error("failed to connect: {0}")]
    Connect(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Framing or encoding failure.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The response could not be interpreted.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The connection handed back a response for another request.
    #[error("response id mismatch: expected {expected}, got {received}")]
    IdMismatch {
        expected: RequestId,
        received: RequestId,
    },

    #[error("request id {0} is already in flight")]
    DuplicateRequestId(RequestId),
}

impl TransportError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedResponse(reason.into())
    }
}

/// An error object returned by the media server.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("media server error {info}")]
pub struct RemoteError {
    info: ErrorInfo,
}

impl RemoteError {
    pub fn code(&self) -> i64 {
        self.info.code()
    }

    pub fn message(&self) -> &str {
        self.info.message()
    }

    pub fn data(&self) -> Option<&str> {
        self.info.data()
    }

    pub fn info(&self) -> &ErrorInfo {
        &self.info
    }
}

impl From<ErrorInfo> for RemoteError {
    fn from(info: ErrorInfo) -> Self {
        Self { info }
    }
}

/// Error returned by every gateway call.
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Rejected locally before anything was sent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl InvokeError {
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }

    pub fn as_remote(&self) -> Option<&RemoteError> {
        match self {
            Self::Remote(err) => Some(err),
            _ => None,
        }
    }

    pub fn as_transport(&self) -> Option<&TransportError> {
        match self {
            Self::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ProtocolError> for InvokeError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::InvalidRequest(reason) => Self::InvalidRequest(reason),
            err @ ProtocolError::InvalidParam { .. } => Self::InvalidRequest(err.to_string()),
            other => Self::Transport(TransportError::Protocol(other)),
        }
    }
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid server address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("invalid log level '{0}'")]
    InvalidLevel(String),
}

impl ConfigError {
    pub fn invalid_address(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAddress {
            address: address.into(),
            reason: reason.into(),
        }
    }
}
