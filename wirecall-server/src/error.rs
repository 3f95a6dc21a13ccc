//! Server error types.

use thiserror::Error;

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] wirecall_protocol::ProtocolError),

    #[error("service already registered: {0}")]
    DuplicateService(String),

    #[error("cannot register services while the server is running")]
    AlreadyRunning,

    #[error("connection writer closed")]
    WriterClosed,

    #[error("server shutting down")]
    ShuttingDown,
}
