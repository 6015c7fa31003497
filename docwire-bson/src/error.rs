//! Codec error types.

use crate::element::ElementType;
use thiserror::Error;

/// Format errors raised while decoding a binary document.
///
/// Every variant is fatal to the document being decoded. Offsets are relative
/// to the start of the region handed to the decoder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("truncated input: document declares {needed} bytes but only {available} are available")]
    TruncatedInput { needed: usize, available: usize },

    #[error("length mismatch: document declares {declared} bytes but parsing consumed {consumed}")]
    LengthMismatch { declared: usize, consumed: usize },

    #[error("invalid length {length} at offset {offset}")]
    InvalidLength { offset: usize, length: i64 },

    #[error("invalid element type tag {tag:#04x} at offset {offset}")]
    InvalidTypeTag { offset: usize, tag: u8 },

    #[error("invalid UTF-8 in string at offset {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("unterminated cstring at offset {offset}")]
    UnterminatedCString { offset: usize },

    #[error("invalid value at offset {offset}: {reason}")]
    InvalidValue { offset: usize, reason: String },

    #[error("document nesting exceeds {max} levels")]
    NestingTooDeep { max: usize },
}

/// Errors raised while encoding a document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("document too large: {size} bytes (max {max})")]
    DocumentTooLarge { size: usize, max: usize },

    #[error("{what} contains an interior NUL byte: {value:?}")]
    InteriorNul { what: &'static str, value: String },
}

/// Errors raised by value accessors and numeric coercions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("value of type {0} is not numeric")]
    NotNumeric(ElementType),

    #[error("cannot convert {value} to {target} without losing information")]
    LossyCoercion { value: String, target: &'static str },

    #[error("invalid object id: {0}")]
    InvalidObjectId(String),
}

/// Schema errors raised while reading typed fields out of a document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("{0}")]
    NoSuchKey(String),

    #[error("Expected {expected} type for field {key}. Found {found}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: ElementType,
    },

    #[error("{0}")]
    BadValue(String),
}

impl FieldError {
    /// Returns the offending field name, if the error concerns a single field.
    pub fn key(&self) -> Option<&str> {
        match self {
            FieldError::NoSuchKey(key) => Some(key),
            FieldError::TypeMismatch { key, .. } => Some(key),
            FieldError::BadValue(_) => None,
        }
    }
}
