//! # docwire-bson
//!
//! Binary document codec for docwire.
//!
//! This crate provides:
//! - A closed value model with a total order across every element type
//! - Ordered documents and a consuming builder
//! - A strict length-accounting decoder with copy, borrow and hybrid
//!   allocation strategies
//! - The matching encoder
//! - A weak string interning pool with pluggable policies
//! - Typed field readers used to unmarshal command arguments

pub mod decoder;
pub mod document;
pub mod element;
pub mod encoder;
pub mod error;
pub mod pool;
pub mod reader;
pub mod string;
pub mod value;

pub use decoder::{AllocationStrategy, DocumentDecoder};
pub use document::{Array, Document, DocumentBuilder};
pub use element::ElementType;
pub use encoder::{encode_document, encode_document_into};
pub use error::{DecodeError, EncodeError, FieldError, ValueError};
pub use pool::{AlwaysPolicy, NeverPolicy, OnlyLikelyPolicy, PoolPolicy, PoolPolicyKind, StringPool};
pub use string::BsonString;
pub use value::{Binary, CodeWithScope, DateTime, DbPointer, ObjectId, Regex, Timestamp, Value};

/// Maximum encoded size of a single document (16 MiB).
pub const MAX_DOCUMENT_SIZE: usize = 16 * 1024 * 1024;

/// Smallest possible encoded document: length prefix plus terminator.
pub const MIN_DOCUMENT_SIZE: usize = 5;

/// Maximum nesting depth accepted by the decoder.
pub const MAX_NESTING_DEPTH: usize = 100;
