//! Typed request and reply messages.
//!
//! Request bodies (all little-endian):
//!
//! ```text
//! update       i32 0 | cstring ns | i32 flags | doc selector | doc update
//! insert       i32 flags | cstring ns | doc+
//! query        i32 flags | cstring ns | i32 skip | i32 return | doc query | [doc projection]
//! get_more     i32 0 | cstring ns | i32 return | i64 cursor_id
//! delete       i32 0 | cstring ns | i32 flags | doc selector
//! kill_cursors i32 0 | i32 count | i64 cursor_id*
//! reply        i32 flags | i64 cursor_id | i32 starting_from | i32 count | doc*
//! ```

use crate::error::ProtocolError;
use crate::frame::{Frame, HEADER_SIZE};
use crate::opcode::OpCode;
use crate::{COMMAND_COLLECTION, MAX_MESSAGE_SIZE};
use bytes::{BufMut, Bytes, BytesMut};
use docwire_bson::{encode_document_into, AllocationStrategy, Document, DocumentDecoder};
use std::fmt;

/// A `database.collection` pair, split at the first dot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    pub database: String,
    pub collection: String,
}

impl Namespace {
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }

    /// The command namespace of `database`.
    pub fn command(database: impl Into<String>) -> Self {
        Self::new(database, COMMAND_COLLECTION)
    }

    pub fn parse(full: &str) -> Result<Self, ProtocolError> {
        match full.split_once('.') {
            Some((db, coll)) if !db.is_empty() && !coll.is_empty() => Ok(Self::new(db, coll)),
            _ => Err(ProtocolError::InvalidNamespace(full.to_string())),
        }
    }

    pub fn is_command(&self) -> bool {
        self.collection == COMMAND_COLLECTION
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

/// Query flags bitfield.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOptions(u32);

impl QueryOptions {
    pub const TAILABLE_CURSOR: u32 = 1 << 1;
    pub const SLAVE_OK: u32 = 1 << 2;
    pub const OPLOG_REPLAY: u32 = 1 << 3;
    pub const NO_CURSOR_TIMEOUT: u32 = 1 << 4;
    pub const AWAIT_DATA: u32 = 1 << 5;
    pub const EXHAUST: u32 = 1 << 6;
    pub const PARTIAL: u32 = 1 << 7;

    pub fn new() -> Self {
        Self(0)
    }

    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn with_slave_ok(mut self) -> Self {
        self.0 |= Self::SLAVE_OK;
        self
    }

    pub fn with_tailable(mut self) -> Self {
        self.0 |= Self::TAILABLE_CURSOR;
        self
    }

    pub fn is_tailable(&self) -> bool {
        self.0 & Self::TAILABLE_CURSOR != 0
    }

    pub fn is_slave_ok(&self) -> bool {
        self.0 & Self::SLAVE_OK != 0
    }

    pub fn is_oplog_replay(&self) -> bool {
        self.0 & Self::OPLOG_REPLAY != 0
    }

    pub fn is_no_cursor_timeout(&self) -> bool {
        self.0 & Self::NO_CURSOR_TIMEOUT != 0
    }

    pub fn is_await_data(&self) -> bool {
        self.0 & Self::AWAIT_DATA != 0
    }

    pub fn is_exhaust(&self) -> bool {
        self.0 & Self::EXHAUST != 0
    }

    pub fn is_partial(&self) -> bool {
        self.0 & Self::PARTIAL != 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryMessage {
    pub namespace: Namespace,
    pub options: QueryOptions,
    pub number_to_skip: i32,
    pub number_to_return: i32,
    pub query: Document,
    pub projection: Option<Document>,
}

impl QueryMessage {
    /// A command query: `database.$cmd`, returning one document.
    pub fn command(database: impl Into<String>, command: Document) -> Self {
        Self {
            namespace: Namespace::command(database),
            options: QueryOptions::new(),
            number_to_skip: 0,
            number_to_return: -1,
            query: command,
            projection: None,
        }
    }

    pub fn is_command(&self) -> bool {
        self.namespace.is_command()
    }

    /// Maximum number of documents to return; 0 means no limit.
    pub fn limit(&self) -> u32 {
        self.number_to_return.unsigned_abs()
    }

    /// Whether the cursor closes after the first batch. A negative count or a
    /// count of one asks for a single batch.
    pub fn autoclose(&self) -> bool {
        self.number_to_return < 0 || self.number_to_return == 1
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertMessage {
    pub namespace: Namespace,
    pub continue_on_error: bool,
    pub documents: Vec<Document>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateMessage {
    pub namespace: Namespace,
    pub upsert: bool,
    pub multi_update: bool,
    pub selector: Document,
    pub update: Document,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteMessage {
    pub namespace: Namespace,
    pub single_remove: bool,
    pub selector: Document,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GetMoreMessage {
    pub namespace: Namespace,
    pub number_to_return: i32,
    pub cursor_id: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KillCursorsMessage {
    pub cursor_ids: Vec<i64>,
}

const INSERT_CONTINUE_ON_ERROR: u32 = 1;
const UPDATE_UPSERT: u32 = 1;
const UPDATE_MULTI: u32 = 1 << 1;
const DELETE_SINGLE_REMOVE: u32 = 1;

/// A decoded client request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestMessage {
    Query(QueryMessage),
    Insert(InsertMessage),
    Update(UpdateMessage),
    Delete(DeleteMessage),
    GetMore(GetMoreMessage),
    KillCursors(KillCursorsMessage),
}

impl RequestMessage {
    pub fn op_code(&self) -> OpCode {
        match self {
            RequestMessage::Query(_) => OpCode::Query,
            RequestMessage::Insert(_) => OpCode::Insert,
            RequestMessage::Update(_) => OpCode::Update,
            RequestMessage::Delete(_) => OpCode::Delete,
            RequestMessage::GetMore(_) => OpCode::GetMore,
            RequestMessage::KillCursors(_) => OpCode::KillCursors,
        }
    }

    pub fn namespace(&self) -> Option<&Namespace> {
        match self {
            RequestMessage::Query(m) => Some(&m.namespace),
            RequestMessage::Insert(m) => Some(&m.namespace),
            RequestMessage::Update(m) => Some(&m.namespace),
            RequestMessage::Delete(m) => Some(&m.namespace),
            RequestMessage::GetMore(m) => Some(&m.namespace),
            RequestMessage::KillCursors(_) => None,
        }
    }

    /// Parses the body of a request frame.
    pub fn parse(
        frame: &Frame,
        decoder: &DocumentDecoder,
        strategy: AllocationStrategy,
    ) -> Result<Self, ProtocolError> {
        let op = frame.op_code();
        let mut body = BodyReader::new(op, &frame.body, decoder, strategy);
        let message = match op {
            OpCode::Query => {
                let options = QueryOptions::from_bits(body.u32()?);
                let namespace = body.namespace()?;
                let number_to_skip = body.i32()?;
                let number_to_return = body.i32()?;
                let query = body.document()?;
                let projection = if body.is_empty() {
                    None
                } else {
                    Some(body.document()?)
                };
                RequestMessage::Query(QueryMessage {
                    namespace,
                    options,
                    number_to_skip,
                    number_to_return,
                    query,
                    projection,
                })
            }
            OpCode::Insert => {
                let flags = body.u32()?;
                let namespace = body.namespace()?;
                let mut documents = Vec::new();
                while !body.is_empty() {
                    documents.push(body.document()?);
                }
                if documents.is_empty() {
                    return Err(body.malformed("no documents to insert"));
                }
                RequestMessage::Insert(InsertMessage {
                    namespace,
                    continue_on_error: flags & INSERT_CONTINUE_ON_ERROR != 0,
                    documents,
                })
            }
            OpCode::Update => {
                body.reserved()?;
                let namespace = body.namespace()?;
                let flags = body.u32()?;
                let selector = body.document()?;
                let update = body.document()?;
                RequestMessage::Update(UpdateMessage {
                    namespace,
                    upsert: flags & UPDATE_UPSERT != 0,
                    multi_update: flags & UPDATE_MULTI != 0,
                    selector,
                    update,
                })
            }
            OpCode::Delete => {
                body.reserved()?;
                let namespace = body.namespace()?;
                let flags = body.u32()?;
                let selector = body.document()?;
                RequestMessage::Delete(DeleteMessage {
                    namespace,
                    single_remove: flags & DELETE_SINGLE_REMOVE != 0,
                    selector,
                })
            }
            OpCode::GetMore => {
                body.reserved()?;
                let namespace = body.namespace()?;
                let number_to_return = body.i32()?;
                let cursor_id = body.i64()?;
                RequestMessage::GetMore(GetMoreMessage {
                    namespace,
                    number_to_return,
                    cursor_id,
                })
            }
            OpCode::KillCursors => {
                body.reserved()?;
                let count = body.i32()?;
                if count < 0 {
                    return Err(body.malformed(format!("negative cursor count {}", count)));
                }
                let mut cursor_ids = Vec::with_capacity((count as usize).min(1024));
                for _ in 0..count {
                    cursor_ids.push(body.i64()?);
                }
                RequestMessage::KillCursors(KillCursorsMessage { cursor_ids })
            }
            // A client-sent reply is well framed, so it fails only this frame
            // and the connection stays open. Being fire-and-forget, the
            // failure is recorded rather than answered.
            OpCode::Reply => return Err(body.malformed("replies are not requests")),
        };
        body.finish()?;
        Ok(message)
    }

    /// Encodes the request as a complete message.
    pub fn encode(&self, request_id: i32) -> Result<BytesMut, ProtocolError> {
        encode_message(request_id, 0, self.op_code(), |buf| {
            match self {
                RequestMessage::Query(m) => {
                    buf.put_u32_le(m.options.bits());
                    put_cstring(buf, &m.namespace.to_string());
                    buf.put_i32_le(m.number_to_skip);
                    buf.put_i32_le(m.number_to_return);
                    encode_document_into(&m.query, buf)?;
                    if let Some(projection) = &m.projection {
                        encode_document_into(projection, buf)?;
                    }
                }
                RequestMessage::Insert(m) => {
                    let flags = if m.continue_on_error {
                        INSERT_CONTINUE_ON_ERROR
                    } else {
                        0
                    };
                    buf.put_u32_le(flags);
                    put_cstring(buf, &m.namespace.to_string());
                    for doc in &m.documents {
                        encode_document_into(doc, buf)?;
                    }
                }
                RequestMessage::Update(m) => {
                    buf.put_i32_le(0);
                    put_cstring(buf, &m.namespace.to_string());
                    let mut flags = 0;
                    if m.upsert {
                        flags |= UPDATE_UPSERT;
                    }
                    if m.multi_update {
                        flags |= UPDATE_MULTI;
                    }
                    buf.put_u32_le(flags);
                    encode_document_into(&m.selector, buf)?;
                    encode_document_into(&m.update, buf)?;
                }
                RequestMessage::Delete(m) => {
                    buf.put_i32_le(0);
                    put_cstring(buf, &m.namespace.to_string());
                    let flags = if m.single_remove {
                        DELETE_SINGLE_REMOVE
                    } else {
                        0
                    };
                    buf.put_u32_le(flags);
                    encode_document_into(&m.selector, buf)?;
                }
                RequestMessage::GetMore(m) => {
                    buf.put_i32_le(0);
                    put_cstring(buf, &m.namespace.to_string());
                    buf.put_i32_le(m.number_to_return);
                    buf.put_i64_le(m.cursor_id);
                }
                RequestMessage::KillCursors(m) => {
                    buf.put_i32_le(0);
                    buf.put_i32_le(m.cursor_ids.len() as i32);
                    for id in &m.cursor_ids {
                        buf.put_i64_le(*id);
                    }
                }
            }
            Ok(())
        })
    }
}

/// Reply flags bitfield.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplyFlags(u32);

impl ReplyFlags {
    pub const CURSOR_NOT_FOUND: u32 = 1;
    pub const QUERY_FAILURE: u32 = 1 << 1;
    pub const AWAIT_CAPABLE: u32 = 1 << 3;

    pub fn new() -> Self {
        Self(0)
    }

    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn with_cursor_not_found(mut self) -> Self {
        self.0 |= Self::CURSOR_NOT_FOUND;
        self
    }

    pub fn with_query_failure(mut self) -> Self {
        self.0 |= Self::QUERY_FAILURE;
        self
    }

    pub fn with_await_capable(mut self) -> Self {
        self.0 |= Self::AWAIT_CAPABLE;
        self
    }

    pub fn is_cursor_not_found(&self) -> bool {
        self.0 & Self::CURSOR_NOT_FOUND != 0
    }

    pub fn is_query_failure(&self) -> bool {
        self.0 & Self::QUERY_FAILURE != 0
    }

    pub fn is_await_capable(&self) -> bool {
        self.0 & Self::AWAIT_CAPABLE != 0
    }
}

/// The server's answer to a query or get-more.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyMessage {
    pub flags: ReplyFlags,
    pub cursor_id: i64,
    pub starting_from: i32,
    pub documents: Vec<Document>,
}

impl ReplyMessage {
    /// A reply carrying one document and no cursor.
    pub fn single(document: Document) -> Self {
        Self {
            flags: ReplyFlags::new(),
            cursor_id: 0,
            starting_from: 0,
            documents: vec![document],
        }
    }

    /// A query-failure reply carrying an error document.
    pub fn failure(error: Document) -> Self {
        Self {
            flags: ReplyFlags::new().with_query_failure(),
            ..Self::single(error)
        }
    }

    pub fn with_cursor(mut self, cursor_id: i64, starting_from: i32) -> Self {
        self.cursor_id = cursor_id;
        self.starting_from = starting_from;
        self
    }

    pub fn with_flags(mut self, flags: ReplyFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Encodes the reply as a complete message answering `response_to`.
    pub fn encode(&self, request_id: i32, response_to: i32) -> Result<BytesMut, ProtocolError> {
        encode_message(request_id, response_to, OpCode::Reply, |buf| {
            buf.put_u32_le(self.flags.bits());
            buf.put_i64_le(self.cursor_id);
            buf.put_i32_le(self.starting_from);
            buf.put_i32_le(self.documents.len() as i32);
            for doc in &self.documents {
                encode_document_into(doc, buf)?;
            }
            Ok(())
        })
    }

    /// Parses the body of a reply frame.
    pub fn parse(
        frame: &Frame,
        decoder: &DocumentDecoder,
        strategy: AllocationStrategy,
    ) -> Result<Self, ProtocolError> {
        let mut body = BodyReader::new(OpCode::Reply, &frame.body, decoder, strategy);
        let flags = ReplyFlags::from_bits(body.u32()?);
        let cursor_id = body.i64()?;
        let starting_from = body.i32()?;
        let count = body.i32()?;
        if count < 0 {
            return Err(body.malformed(format!("negative document count {}", count)));
        }
        let mut documents = Vec::new();
        for _ in 0..count {
            documents.push(body.document()?);
        }
        body.finish()?;
        Ok(Self {
            flags,
            cursor_id,
            starting_from,
            documents,
        })
    }
}

/// Writes a header, lets `body` fill the rest, then patches the length.
fn encode_message(
    request_id: i32,
    response_to: i32,
    op_code: OpCode,
    body: impl FnOnce(&mut BytesMut) -> Result<(), ProtocolError>,
) -> Result<BytesMut, ProtocolError> {
    let mut buf = BytesMut::with_capacity(256);
    buf.put_i32_le(0);
    buf.put_i32_le(request_id);
    buf.put_i32_le(response_to);
    buf.put_i32_le(op_code as i32);
    body(&mut buf)?;

    let total = buf.len();
    if total > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: total,
            max: MAX_MESSAGE_SIZE,
        });
    }
    debug_assert!(total >= HEADER_SIZE);
    buf[..4].copy_from_slice(&(total as i32).to_le_bytes());
    Ok(buf)
}

fn put_cstring(buf: &mut BytesMut, s: &str) {
    buf.put_slice(s.as_bytes());
    buf.put_u8(0);
}

/// Sequential reader over a frame body.
struct BodyReader<'a> {
    op: OpCode,
    body: &'a Bytes,
    pos: usize,
    decoder: &'a DocumentDecoder,
    strategy: AllocationStrategy,
}

impl<'a> BodyReader<'a> {
    fn new(
        op: OpCode,
        body: &'a Bytes,
        decoder: &'a DocumentDecoder,
        strategy: AllocationStrategy,
    ) -> Self {
        Self {
            op,
            body,
            pos: 0,
            decoder,
            strategy,
        }
    }

    fn malformed(&self, reason: impl Into<String>) -> ProtocolError {
        ProtocolError::MalformedBody {
            op: self.op,
            reason: reason.into(),
        }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.body.len()
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        if self.pos + N > self.body.len() {
            return Err(self.malformed(format!("truncated at offset {}", self.pos)));
        }
        let mut out = [0u8; N];
        out.copy_from_slice(&self.body[self.pos..self.pos + N]);
        self.pos += N;
        Ok(out)
    }

    fn i32(&mut self) -> Result<i32, ProtocolError> {
        Ok(i32::from_le_bytes(self.take()?))
    }

    fn u32(&mut self) -> Result<u32, ProtocolError> {
        Ok(u32::from_le_bytes(self.take()?))
    }

    fn i64(&mut self) -> Result<i64, ProtocolError> {
        Ok(i64::from_le_bytes(self.take()?))
    }

    /// Skips a reserved zero field; its value is not checked.
    fn reserved(&mut self) -> Result<(), ProtocolError> {
        self.i32().map(|_| ())
    }

    fn namespace(&mut self) -> Result<Namespace, ProtocolError> {
        let rest = &self.body[self.pos..];
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| self.malformed("unterminated namespace"))?;
        let full = std::str::from_utf8(&rest[..nul])
            .map_err(|_| self.malformed("namespace is not valid UTF-8"))?;
        let namespace = Namespace::parse(full)?;
        self.pos += nul + 1;
        Ok(namespace)
    }

    fn document(&mut self) -> Result<Document, ProtocolError> {
        let region = self.body.slice(self.pos..);
        let (doc, consumed) = self.decoder.decode_prefix(&region, self.strategy)?;
        self.pos += consumed;
        Ok(doc)
    }

    fn finish(&self) -> Result<(), ProtocolError> {
        if self.pos != self.body.len() {
            return Err(self.malformed(format!(
                "{} trailing bytes",
                self.body.len() - self.pos
            )));
        }
        Ok(())
    }
}
