//! # docwire-protocol
//!
//! Legacy document-database wire protocol.
//!
//! This crate provides:
//! - The 16-byte message header and length-prefixed framing
//! - The closed set of request opcodes and the reply opcode
//! - Typed request variants parsed from frame bodies, and the reply message
//! - Numeric error codes and the `WireError` carried by error replies

pub mod codec;
pub mod error;
pub mod frame;
pub mod message;
pub mod opcode;

pub use codec::{Decoder, Encoder};
pub use error::{ErrorCode, ProtocolError, WireError};
pub use frame::{Frame, MessageHeader, HEADER_SIZE};
pub use message::{
    DeleteMessage, GetMoreMessage, InsertMessage, KillCursorsMessage, Namespace, QueryMessage,
    QueryOptions, ReplyFlags, ReplyMessage, RequestMessage, UpdateMessage,
};
pub use opcode::OpCode;

/// Default port for the protocol.
pub const DEFAULT_PORT: u16 = 27017;

/// Maximum total size of one message, header included.
pub const MAX_MESSAGE_SIZE: usize = 48_000_000;

/// Collection name that marks a query as a command.
pub const COMMAND_COLLECTION: &str = "$cmd";

/// Database against which admin-only commands must be run.
pub const ADMIN_DATABASE: &str = "admin";
