//! Client error types.

use thiserror::Error;
use wirecall_protocol::MessageType;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] wirecall_protocol::ProtocolError),

    #[error("not connected")]
    NotConnected,

    #[error("connection closed")]
    ConnectionClosed,

    #[error("connect timeout")]
    ConnectTimeout,

    #[error("request timeout")]
    Timeout,

    #[error("unexpected frame: {0:?}")]
    UnexpectedFrame(MessageType),

    #[error("no call attempts configured")]
    NoAttempts,
}

impl ClientError {
    /// Returns whether a fresh connection could succeed where this attempt
    /// failed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::Io(_)
                | ClientError::ConnectTimeout
                | ClientError::Timeout
                | ClientError::ConnectionClosed
        )
    }
}
