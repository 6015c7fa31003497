//! Binary document encoder.
//!
//! The exact inverse of the decoder. Length prefixes are reserved, the body is
//! written, and the prefix is patched once the size is known.

use crate::document::{Array, Document};
use crate::error::EncodeError;
use crate::string::BsonString;
use crate::value::Value;
use crate::MAX_DOCUMENT_SIZE;
use bytes::{BufMut, BytesMut};

/// Encodes a document into a fresh buffer.
pub fn encode_document(doc: &Document) -> Result<BytesMut, EncodeError> {
    let mut buf = BytesMut::with_capacity(64);
    encode_document_into(doc, &mut buf)?;
    Ok(buf)
}

/// Appends the encoding of `doc` to `buf` and returns the number of bytes
/// written. On error `buf` is left as it was.
pub fn encode_document_into(doc: &Document, buf: &mut BytesMut) -> Result<usize, EncodeError> {
    let start = buf.len();
    let result = write_document(doc, buf).and_then(|size| {
        if size > MAX_DOCUMENT_SIZE {
            Err(EncodeError::DocumentTooLarge {
                size,
                max: MAX_DOCUMENT_SIZE,
            })
        } else {
            Ok(size)
        }
    });
    if result.is_err() {
        buf.truncate(start);
    }
    result
}

fn reserve_length(buf: &mut BytesMut) -> usize {
    let at = buf.len();
    buf.put_i32_le(0);
    at
}

fn patch_length(buf: &mut BytesMut, at: usize) -> usize {
    let size = buf.len() - at;
    buf[at..at + 4].copy_from_slice(&(size as i32).to_le_bytes());
    size
}

fn write_document(doc: &Document, buf: &mut BytesMut) -> Result<usize, EncodeError> {
    let at = reserve_length(buf);
    for (key, value) in doc.iter() {
        write_element(key, value, buf)?;
    }
    buf.put_u8(0);
    Ok(patch_length(buf, at))
}

fn write_array(array: &Array, buf: &mut BytesMut) -> Result<usize, EncodeError> {
    let at = reserve_length(buf);
    for (index, value) in array.iter().enumerate() {
        buf.put_u8(value.element_type() as u8);
        buf.put_slice(index.to_string().as_bytes());
        buf.put_u8(0);
        write_value(value, buf)?;
    }
    buf.put_u8(0);
    Ok(patch_length(buf, at))
}

fn write_element(key: &str, value: &Value, buf: &mut BytesMut) -> Result<(), EncodeError> {
    buf.put_u8(value.element_type() as u8);
    write_cstring("key", key, buf)?;
    write_value(value, buf)
}

fn write_cstring(what: &'static str, s: &str, buf: &mut BytesMut) -> Result<(), EncodeError> {
    if s.as_bytes().contains(&0) {
        return Err(EncodeError::InteriorNul {
            what,
            value: s.to_string(),
        });
    }
    buf.put_slice(s.as_bytes());
    buf.put_u8(0);
    Ok(())
}

fn write_string(s: &BsonString, buf: &mut BytesMut) {
    buf.put_i32_le(s.len() as i32 + 1);
    buf.put_slice(s.as_bytes());
    buf.put_u8(0);
}

fn write_value(value: &Value, buf: &mut BytesMut) -> Result<(), EncodeError> {
    match value {
        Value::Double(v) => buf.put_f64_le(*v),
        Value::String(s) | Value::JavaScript(s) | Value::Symbol(s) => write_string(s, buf),
        Value::Document(doc) => {
            write_document(doc, buf)?;
        }
        Value::Array(array) => {
            write_array(array, buf)?;
        }
        Value::Binary(bin) => {
            buf.put_i32_le(bin.bytes.len() as i32);
            buf.put_u8(bin.subtype);
            buf.put_slice(&bin.bytes);
        }
        Value::ObjectId(oid) => buf.put_slice(&oid.0),
        Value::Boolean(b) => buf.put_u8(u8::from(*b)),
        Value::DateTime(dt) => buf.put_i64_le(dt.timestamp_millis()),
        Value::Regex(re) => {
            write_cstring("regex pattern", &re.pattern, buf)?;
            write_cstring("regex options", &re.options, buf)?;
        }
        Value::DbPointer(ptr) => {
            write_string(&ptr.namespace, buf);
            buf.put_slice(&ptr.id.0);
        }
        Value::JavaScriptWithScope(cws) => {
            let at = reserve_length(buf);
            write_string(&cws.code, buf);
            write_document(&cws.scope, buf)?;
            patch_length(buf, at);
        }
        Value::Int32(v) => buf.put_i32_le(*v),
        Value::Timestamp(ts) => buf.put_u64_le(ts.raw()),
        Value::Int64(v) => buf.put_i64_le(*v),
        Value::Undefined | Value::Null | Value::MinKey | Value::MaxKey => {}
    }
    Ok(())
}
