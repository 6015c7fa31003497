//! Streaming frame decoder and message encoder.

use crate::error::ProtocolError;
use crate::frame::Frame;
use crate::message::{ReplyMessage, RequestMessage};
use bytes::{Bytes, BytesMut};

/// Encodes requests and replies into complete messages.
pub struct Encoder;

impl Encoder {
    /// Encodes a request with the given request id.
    pub fn encode_request(
        request: &RequestMessage,
        request_id: i32,
    ) -> Result<BytesMut, ProtocolError> {
        request.encode(request_id)
    }

    /// Encodes a reply answering `response_to`.
    pub fn encode_reply(
        reply: &ReplyMessage,
        request_id: i32,
        response_to: i32,
    ) -> Result<BytesMut, ProtocolError> {
        reply.encode(request_id, response_to)
    }
}

/// Accumulates bytes from a stream and splits them into frames.
pub struct Decoder {
    buffer: BytesMut,
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
        }
    }

    /// Appends data to the internal buffer.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    pub fn extend_bytes(&mut self, data: Bytes) {
        self.buffer.extend_from_slice(&data);
    }

    /// Attempts to decode the next frame from the buffer.
    ///
    /// A fatal error leaves the buffer untouched; the caller is expected to
    /// drop the connection.
    pub fn decode_frame(&mut self) -> Result<Option<Frame>, ProtocolError> {
        Frame::decode(&mut self.buffer)
    }

    /// Number of buffered bytes not yet consumed by a frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}
