//! Server error types.

use crate::config::ConfigError;
use docwire_protocol::{ErrorCode, ProtocolError, WireError};
use thiserror::Error;

/// Server errors.
///
/// These never reach a client as a reply; command and request failures are
/// carried by [`WireError`].
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("channel already has an active connection")]
    ConnectionAlreadyActive,

    #[error("command {0} is already registered")]
    DuplicateCommand(String),

    #[error("server shutting down")]
    ShuttingDown,
}

impl ServerError {
    /// Converts to protocol error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            ServerError::Protocol(e) => e.to_wire_error().code,
            ServerError::Config(_) => ErrorCode::InvalidOptions,
            ServerError::DuplicateCommand(_) => ErrorCode::IllegalOperation,
            ServerError::Io(_)
            | ServerError::Metrics(_)
            | ServerError::ConnectionAlreadyActive
            | ServerError::ShuttingDown => ErrorCode::InternalError,
        }
    }

    /// Returns whether the connection that raised this error must be closed.
    pub fn is_fatal(&self) -> bool {
        match self {
            ServerError::Protocol(e) => e.is_fatal(),
            _ => true,
        }
    }
}

impl From<ServerError> for WireError {
    fn from(err: ServerError) -> Self {
        WireError::new(err.error_code(), err.to_string())
    }
}
