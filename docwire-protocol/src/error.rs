//! Protocol error types and error codes.

use crate::opcode::OpCode;
use docwire_bson::{DecodeError, EncodeError, FieldError};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised while framing or parsing messages.
///
/// Some errors leave the byte stream in an unknown state and must close the
/// connection; see [`ProtocolError::is_fatal`]. The rest fail a single frame.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid message length: {0}")]
    InvalidMessageLength(i32),

    #[error("unknown opcode: {0}")]
    UnknownOpCode(i32),

    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("malformed {op} body: {reason}")]
    MalformedBody { op: OpCode, reason: String },

    #[error("invalid namespace: {0:?}")]
    InvalidNamespace(String),

    #[error("document error: {0}")]
    Document(#[from] DecodeError),

    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Returns whether the connection must be closed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ProtocolError::InvalidMessageLength(_)
                | ProtocolError::UnknownOpCode(_)
                | ProtocolError::Io(_)
        )
    }

    /// The error reported to the client when a frame fails to parse.
    pub fn to_wire_error(&self) -> WireError {
        match self {
            ProtocolError::InvalidNamespace(_) => {
                WireError::new(ErrorCode::InvalidNamespace, self.to_string())
            }
            ProtocolError::Document(_) | ProtocolError::MalformedBody { .. } => {
                WireError::new(ErrorCode::FailedToParse, self.to_string())
            }
            _ => WireError::new(ErrorCode::InternalError, self.to_string()),
        }
    }
}

/// Numeric error codes sent in the `code` field of error replies.
///
/// The values are part of the protocol and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    InternalError,
    BadValue,
    NoSuchKey,
    UnknownError,
    FailedToParse,
    Unauthorized,
    TypeMismatch,
    IllegalOperation,
    NamespaceNotFound,
    CursorNotFound,
    CommandNotFound,
    InvalidOptions,
    InvalidNamespace,
    NodeNotFound,
    OperationFailed,
    CannotSatisfyWriteConcern,
    CommandNotSupported,
    NotMaster,
    NotMasterNoSlaveOk,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 19] = [
        ErrorCode::InternalError,
        ErrorCode::BadValue,
        ErrorCode::NoSuchKey,
        ErrorCode::UnknownError,
        ErrorCode::FailedToParse,
        ErrorCode::Unauthorized,
        ErrorCode::TypeMismatch,
        ErrorCode::IllegalOperation,
        ErrorCode::NamespaceNotFound,
        ErrorCode::CursorNotFound,
        ErrorCode::CommandNotFound,
        ErrorCode::InvalidOptions,
        ErrorCode::InvalidNamespace,
        ErrorCode::NodeNotFound,
        ErrorCode::OperationFailed,
        ErrorCode::CannotSatisfyWriteConcern,
        ErrorCode::CommandNotSupported,
        ErrorCode::NotMaster,
        ErrorCode::NotMasterNoSlaveOk,
    ];

    /// The numeric code written on the wire.
    pub fn code(self) -> i32 {
        match self {
            ErrorCode::InternalError => 1,
            ErrorCode::BadValue => 2,
            ErrorCode::NoSuchKey => 4,
            ErrorCode::UnknownError => 8,
            ErrorCode::FailedToParse => 9,
            ErrorCode::Unauthorized => 13,
            ErrorCode::TypeMismatch => 14,
            ErrorCode::IllegalOperation => 20,
            ErrorCode::NamespaceNotFound => 26,
            ErrorCode::CursorNotFound => 43,
            ErrorCode::CommandNotFound => 59,
            ErrorCode::InvalidOptions => 72,
            ErrorCode::InvalidNamespace => 73,
            ErrorCode::NodeNotFound => 74,
            ErrorCode::OperationFailed => 96,
            ErrorCode::CannotSatisfyWriteConcern => 100,
            ErrorCode::CommandNotSupported => 115,
            ErrorCode::NotMaster => 10107,
            ErrorCode::NotMasterNoSlaveOk => 13435,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }

    /// Symbolic name, as used in logs and metric labels.
    pub fn name(self) -> &'static str {
        match self {
            ErrorCode::InternalError => "InternalError",
            ErrorCode::BadValue => "BadValue",
            ErrorCode::NoSuchKey => "NoSuchKey",
            ErrorCode::UnknownError => "UnknownError",
            ErrorCode::FailedToParse => "FailedToParse",
            ErrorCode::Unauthorized => "Unauthorized",
            ErrorCode::TypeMismatch => "TypeMismatch",
            ErrorCode::IllegalOperation => "IllegalOperation",
            ErrorCode::NamespaceNotFound => "NamespaceNotFound",
            ErrorCode::CursorNotFound => "CursorNotFound",
            ErrorCode::CommandNotFound => "CommandNotFound",
            ErrorCode::InvalidOptions => "InvalidOptions",
            ErrorCode::InvalidNamespace => "InvalidNamespace",
            ErrorCode::NodeNotFound => "NodeNotFound",
            ErrorCode::OperationFailed => "OperationFailed",
            ErrorCode::CannotSatisfyWriteConcern => "CannotSatisfyWriteConcern",
            ErrorCode::CommandNotSupported => "CommandNotSupported",
            ErrorCode::NotMaster => "NotMaster",
            ErrorCode::NotMasterNoSlaveOk => "NotMasterNoSlaveOk",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A failure that is reported to the client as an error document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct WireError {
    pub code: ErrorCode,
    pub message: String,
}

impl WireError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn bad_value(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadValue, message)
    }

    pub fn failed_to_parse(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::FailedToParse, message)
    }

    pub fn command_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CommandNotFound, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn namespace_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NamespaceNotFound, message)
    }

    pub fn command_not_supported(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CommandNotSupported, message)
    }
}

impl From<FieldError> for WireError {
    fn from(err: FieldError) -> Self {
        let code = match err {
            FieldError::NoSuchKey(_) => ErrorCode::NoSuchKey,
            FieldError::TypeMismatch { .. } => ErrorCode::TypeMismatch,
            FieldError::BadValue(_) => ErrorCode::BadValue,
        };
        WireError::new(code, err.to_string())
    }
}
