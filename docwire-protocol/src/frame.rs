//! Message framing.
//!
//! Every message starts with a 16-byte little-endian header:
//!
//! ```text
//! +----------------+------------+-------------+---------+
//! | message_length | request_id | response_to | op_code |
//! |    4 bytes     |  4 bytes   |   4 bytes   | 4 bytes |
//! +----------------+------------+-------------+---------+
//! | body: message_length - 16 bytes                     |
//! +-----------------------------------------------------+
//! ```
//!
//! `message_length` includes the header itself.

use crate::error::ProtocolError;
use crate::opcode::OpCode;
use crate::MAX_MESSAGE_SIZE;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Size of the fixed message header in bytes.
pub const HEADER_SIZE: usize = 16;

/// The fixed header preceding every message body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    /// Total message size, header included.
    pub message_length: i32,
    pub request_id: i32,
    /// Request id this message answers, or 0 for requests.
    pub response_to: i32,
    pub op_code: OpCode,
}

/// A framed message: its header and the undecoded body.
#[derive(Debug, Clone)]
pub struct Frame {
    pub header: MessageHeader,
    pub body: Bytes,
}

impl Frame {
    /// Creates a frame; the length is derived from the body.
    pub fn new(request_id: i32, response_to: i32, op_code: OpCode, body: Bytes) -> Self {
        Self {
            header: MessageHeader {
                message_length: (HEADER_SIZE + body.len()) as i32,
                request_id,
                response_to,
                op_code,
            },
            body,
        }
    }

    pub fn op_code(&self) -> OpCode {
        self.header.op_code
    }

    pub fn request_id(&self) -> i32 {
        self.header.request_id
    }

    /// Encodes the frame into bytes.
    pub fn encode(&self) -> Result<BytesMut, ProtocolError> {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + self.body.len());
        self.encode_into(&mut buf)?;
        Ok(buf)
    }

    pub fn encode_into(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        let total = HEADER_SIZE + self.body.len();
        if total > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::MessageTooLarge {
                size: total,
                max: MAX_MESSAGE_SIZE,
            });
        }
        buf.reserve(total);
        buf.put_i32_le(total as i32);
        buf.put_i32_le(self.header.request_id);
        buf.put_i32_le(self.header.response_to);
        buf.put_i32_le(self.header.op_code as i32);
        buf.put_slice(&self.body);
        Ok(())
    }

    /// Decodes a frame from the front of `buf`.
    ///
    /// Returns `Ok(Some(frame))` if a complete frame was decoded,
    /// `Ok(None)` if more data is needed, or `Err` on protocol errors.
    /// The body is split off the buffer, so the buffer may be reused while the
    /// frame (or anything borrowing from it) is alive.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<Self>, ProtocolError> {
        if buf.len() < 4 {
            return Ok(None);
        }

        // Peek at the length without consuming
        let length = i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        if length < HEADER_SIZE as i32 || length as usize > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::InvalidMessageLength(length));
        }
        let length = length as usize;

        if buf.len() < HEADER_SIZE {
            return Ok(None);
        }
        let raw_op = i32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]);
        let op_code = OpCode::try_from(raw_op).map_err(ProtocolError::UnknownOpCode)?;

        if buf.len() < length {
            buf.reserve(length - buf.len());
            return Ok(None);
        }

        let mut frame = buf.split_to(length).freeze();
        let message_length = frame.get_i32_le();
        let request_id = frame.get_i32_le();
        let response_to = frame.get_i32_le();
        frame.advance(4);

        Ok(Some(Self {
            header: MessageHeader {
                message_length,
                request_id,
                response_to,
                op_code,
            },
            body: frame,
        }))
    }
}
