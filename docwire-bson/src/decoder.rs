//! Binary document decoder.
//!
//! A document is `i32 length | element* | 0x00`, where each element is
//! `u8 tag | cstring key | payload`. The declared length is enforced strictly:
//! the terminator must land exactly on the last declared byte, and any read
//! that would cross the declared end fails with [`DecodeError::LengthMismatch`].
//!
//! The decoder position is a plain value owned by each `decode` call, so one
//! [`DocumentDecoder`] can serve any number of concurrent callers.

use crate::document::{Array, Document, DocumentBuilder};
use crate::element::ElementType;
use crate::error::DecodeError;
use crate::pool::{StringPool, LIKELY_KEY_MAX_LEN};
use crate::string::BsonString;
use crate::value::{Binary, CodeWithScope, DateTime, DbPointer, ObjectId, Regex, Timestamp, Value};
use crate::{MAX_NESTING_DEPTH, MIN_DOCUMENT_SIZE};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Smallest code-with-scope payload: total length, empty string, empty scope.
const MIN_CODE_WITH_SCOPE_SIZE: i32 = 4 + 5 + 5;

/// How decoded payloads relate to the source region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStrategy {
    /// Copy every key and payload into owned memory. The region may be
    /// dropped or reused as soon as decoding returns.
    #[default]
    #[serde(alias = "heap")]
    Copy,
    /// Keep keys, strings and binary payloads as views into the region.
    #[serde(alias = "offheap")]
    Borrow,
    /// Copy keys (through the string pool), keep values as views.
    #[serde(alias = "offheap_values")]
    BorrowValues,
}

impl AllocationStrategy {
    fn borrows_keys(self) -> bool {
        matches!(self, AllocationStrategy::Borrow)
    }

    fn borrows_values(self) -> bool {
        matches!(
            self,
            AllocationStrategy::Borrow | AllocationStrategy::BorrowValues
        )
    }
}

impl FromStr for AllocationStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "copy" | "heap" => Ok(AllocationStrategy::Copy),
            "borrow" | "offheap" => Ok(AllocationStrategy::Borrow),
            "borrow_values" | "offheap_values" => Ok(AllocationStrategy::BorrowValues),
            other => Err(format!("unknown allocation strategy: {}", other)),
        }
    }
}

impl fmt::Display for AllocationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AllocationStrategy::Copy => "copy",
            AllocationStrategy::Borrow => "borrow",
            AllocationStrategy::BorrowValues => "borrow_values",
        })
    }
}

/// Decodes documents, interning strings through a shared pool.
#[derive(Debug, Clone)]
pub struct DocumentDecoder {
    pool: Arc<StringPool>,
}

impl DocumentDecoder {
    pub fn new(pool: Arc<StringPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<StringPool> {
        &self.pool
    }

    /// Decodes the document at the start of `region`.
    ///
    /// Bytes past the declared length are not examined.
    pub fn decode(
        &self,
        region: &Bytes,
        strategy: AllocationStrategy,
    ) -> Result<Document, DecodeError> {
        self.decode_prefix(region, strategy).map(|(doc, _)| doc)
    }

    /// Decodes the document at the start of `region` and returns it along
    /// with the number of bytes it occupied.
    pub fn decode_prefix(
        &self,
        region: &Bytes,
        strategy: AllocationStrategy,
    ) -> Result<(Document, usize), DecodeError> {
        if region.len() < 4 {
            return Err(DecodeError::TruncatedInput {
                needed: 4,
                available: region.len(),
            });
        }
        let length = i32::from_le_bytes([region[0], region[1], region[2], region[3]]);
        if length < MIN_DOCUMENT_SIZE as i32 {
            return Err(DecodeError::InvalidLength {
                offset: 0,
                length: length as i64,
            });
        }
        let length = length as usize;
        if length > region.len() {
            return Err(DecodeError::TruncatedInput {
                needed: length,
                available: region.len(),
            });
        }

        let mut cursor = Cursor {
            pool: &self.pool,
            strategy,
            region,
            pos: 4,
            start: 0,
            end: length,
        };
        let doc = cursor.document_body(0)?;
        Ok((doc, length))
    }
}

impl Default for DocumentDecoder {
    fn default() -> Self {
        Self::new(Arc::new(StringPool::default()))
    }
}

/// Read position plus the bounds of the innermost enclosing document.
struct Cursor<'a> {
    pool: &'a StringPool,
    strategy: AllocationStrategy,
    region: &'a Bytes,
    pos: usize,
    start: usize,
    end: usize,
}

type Result<T, E = DecodeError> = std::result::Result<T, E>;

impl<'a> Cursor<'a> {
    fn overrun(&self, upto: usize) -> DecodeError {
        DecodeError::LengthMismatch {
            declared: self.end - self.start,
            consumed: upto - self.start,
        }
    }

    fn need(&self, n: usize) -> Result<()> {
        if self.pos + n > self.end {
            return Err(self.overrun(self.pos + n));
        }
        Ok(())
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        self.need(N)?;
        let mut buf = [0u8; N];
        buf.copy_from_slice(&self.region[self.pos..self.pos + N]);
        self.pos += N;
        Ok(buf)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take::<1>()?[0])
    }

    fn i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.take()?))
    }

    fn i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.take()?))
    }

    fn slice(&mut self, n: usize) -> Result<Bytes> {
        self.need(n)?;
        let bytes = self.region.slice(self.pos..self.pos + n);
        self.pos += n;
        Ok(bytes)
    }

    /// Narrows the bounds to `[offset, offset + length)`, returning the
    /// previous bounds.
    fn enter(&mut self, offset: usize, length: usize) -> Result<(usize, usize)> {
        if offset + length > self.end {
            return Err(self.overrun(offset + length));
        }
        let saved = (self.start, self.end);
        self.start = offset;
        self.end = offset + length;
        Ok(saved)
    }

    fn leave(&mut self, saved: (usize, usize)) {
        self.start = saved.0;
        self.end = saved.1;
    }

    /// Reads the next tag, or `None` at a correctly placed terminator.
    fn next_tag(&mut self) -> Result<Option<ElementType>> {
        let offset = self.pos;
        let tag = self.u8()?;
        if tag == 0 {
            if self.pos != self.end {
                return Err(DecodeError::LengthMismatch {
                    declared: self.end - self.start,
                    consumed: self.pos - self.start,
                });
            }
            return Ok(None);
        }
        ElementType::try_from(tag)
            .map(Some)
            .map_err(|tag| DecodeError::InvalidTypeTag { offset, tag })
    }

    fn document_body(&mut self, depth: usize) -> Result<Document> {
        let mut builder = DocumentBuilder::new();
        while let Some(ty) = self.next_tag()? {
            let key = self.key()?;
            let value = self.value(ty, depth)?;
            builder.insert(key, value);
        }
        Ok(builder.build())
    }

    fn array_body(&mut self, depth: usize) -> Result<Array> {
        let mut values = Vec::new();
        while let Some(ty) = self.next_tag()? {
            // Ordinal keys are not checked.
            self.cstring()?;
            values.push(self.value(ty, depth)?);
        }
        Ok(Array::from(values))
    }

    /// Decodes a length-prefixed nested document with `body`.
    fn nested<T>(
        &mut self,
        depth: usize,
        body: impl FnOnce(&mut Self, usize) -> Result<T>,
    ) -> Result<T> {
        let depth = depth + 1;
        if depth > MAX_NESTING_DEPTH {
            return Err(DecodeError::NestingTooDeep {
                max: MAX_NESTING_DEPTH,
            });
        }
        let offset = self.pos;
        let length = self.i32()?;
        if length < MIN_DOCUMENT_SIZE as i32 {
            return Err(DecodeError::InvalidLength {
                offset,
                length: length as i64,
            });
        }
        let saved = self.enter(offset, length as usize)?;
        let out = body(self, depth)?;
        self.leave(saved);
        Ok(out)
    }

    fn cstring(&mut self) -> Result<(usize, Bytes)> {
        let offset = self.pos;
        let nul = self.region[offset..self.end]
            .iter()
            .position(|&b| b == 0)
            .ok_or(DecodeError::UnterminatedCString { offset })?;
        let bytes = self.region.slice(offset..offset + nul);
        self.pos = offset + nul + 1;
        Ok((offset, bytes))
    }

    /// Reads `i32 length | bytes | 0x00` and returns the bytes without the NUL.
    fn string_bytes(&mut self) -> Result<(usize, Bytes)> {
        let offset = self.pos;
        let length = self.i32()?;
        if length < 1 {
            return Err(DecodeError::InvalidLength {
                offset,
                length: length as i64,
            });
        }
        let body_offset = self.pos;
        let mut bytes = self.slice(length as usize)?;
        let terminator = bytes.split_off(bytes.len() - 1);
        if terminator[0] != 0 {
            return Err(DecodeError::InvalidValue {
                offset: self.pos - 1,
                reason: "string is not NUL-terminated".to_string(),
            });
        }
        Ok((body_offset, bytes))
    }

    fn materialize(
        &self,
        offset: usize,
        bytes: Bytes,
        likely_cacheable: bool,
        borrow: bool,
    ) -> Result<BsonString> {
        if borrow {
            return BsonString::from_utf8_view(bytes)
                .map_err(|_| DecodeError::InvalidUtf8 { offset });
        }
        let s = std::str::from_utf8(&bytes).map_err(|_| DecodeError::InvalidUtf8 { offset })?;
        Ok(BsonString::from(self.pool.fetch(likely_cacheable, s)))
    }

    fn key(&mut self) -> Result<BsonString> {
        let (offset, bytes) = self.cstring()?;
        let likely = bytes.len() <= LIKELY_KEY_MAX_LEN;
        self.materialize(offset, bytes, likely, self.strategy.borrows_keys())
    }

    fn string(&mut self) -> Result<BsonString> {
        let (offset, bytes) = self.string_bytes()?;
        self.materialize(offset, bytes, false, self.strategy.borrows_values())
    }

    fn cstring_value(&mut self, likely_cacheable: bool) -> Result<BsonString> {
        let (offset, bytes) = self.cstring()?;
        self.materialize(offset, bytes, likely_cacheable, self.strategy.borrows_values())
    }

    fn object_id(&mut self) -> Result<ObjectId> {
        Ok(ObjectId(self.take()?))
    }

    fn value(&mut self, ty: ElementType, depth: usize) -> Result<Value> {
        let value = match ty {
            ElementType::Double => Value::Double(f64::from_le_bytes(self.take()?)),
            ElementType::String => Value::String(self.string()?),
            ElementType::Document => Value::Document(self.nested(depth, Self::document_body)?),
            ElementType::Array => Value::Array(self.nested(depth, Self::array_body)?),
            ElementType::Binary => {
                let offset = self.pos;
                let length = self.i32()?;
                if length < 0 {
                    return Err(DecodeError::InvalidLength {
                        offset,
                        length: length as i64,
                    });
                }
                let subtype = self.u8()?;
                let payload = self.slice(length as usize)?;
                let bytes = if self.strategy.borrows_values() {
                    payload
                } else {
                    Bytes::copy_from_slice(&payload)
                };
                Value::Binary(Binary { subtype, bytes })
            }
            ElementType::Undefined => Value::Undefined,
            ElementType::ObjectId => Value::ObjectId(self.object_id()?),
            ElementType::Boolean => {
                let offset = self.pos;
                match self.u8()? {
                    0 => Value::Boolean(false),
                    1 => Value::Boolean(true),
                    other => {
                        return Err(DecodeError::InvalidValue {
                            offset,
                            reason: format!("boolean byte must be 0 or 1, got {}", other),
                        })
                    }
                }
            }
            ElementType::DateTime => Value::DateTime(DateTime::from_millis(self.i64()?)),
            ElementType::Null => Value::Null,
            ElementType::Regex => {
                let pattern = self.cstring_value(false)?;
                let options = self.cstring_value(true)?;
                Value::Regex(Regex { pattern, options })
            }
            ElementType::DbPointer => {
                let namespace = self.string()?;
                let id = self.object_id()?;
                Value::DbPointer(DbPointer { namespace, id })
            }
            ElementType::JavaScript => Value::JavaScript(self.string()?),
            ElementType::Symbol => Value::Symbol(self.string()?),
            ElementType::JavaScriptWithScope => {
                let offset = self.pos;
                let total = self.i32()?;
                if total < MIN_CODE_WITH_SCOPE_SIZE {
                    return Err(DecodeError::InvalidLength {
                        offset,
                        length: total as i64,
                    });
                }
                let saved = self.enter(offset, total as usize)?;
                let code = self.string()?;
                let scope = self.nested(depth, Self::document_body)?;
                if self.pos != self.end {
                    return Err(DecodeError::LengthMismatch {
                        declared: self.end - self.start,
                        consumed: self.pos - self.start,
                    });
                }
                self.leave(saved);
                Value::JavaScriptWithScope(CodeWithScope { code, scope })
            }
            ElementType::Int32 => Value::Int32(self.i32()?),
            ElementType::Timestamp => {
                Value::Timestamp(Timestamp::from_raw(u64::from_le_bytes(self.take()?)))
            }
            ElementType::Int64 => Value::Int64(self.i64()?),
            ElementType::MinKey => Value::MinKey,
            ElementType::MaxKey => Value::MaxKey,
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::encode_document;
    use crate::pool::PoolPolicyKind;
    use proptest::prelude::*;

    const STRATEGIES: [AllocationStrategy; 3] = [
        AllocationStrategy::Copy,
        AllocationStrategy::Borrow,
        AllocationStrategy::BorrowValues,
    ];

    fn encode(doc: &Document) -> Bytes {
        encode_document(doc).unwrap().freeze()
    }

    fn with_length(mut raw: Vec<u8>) -> Bytes {
        let len = (raw.len() as i32).to_le_bytes();
        raw[..4].copy_from_slice(&len);
        Bytes::from(raw)
    }

    fn sample_doc() -> Document {
        let inner = DocumentBuilder::new().append("x", 1.5).build();
        DocumentBuilder::new()
            .append("name", "alice")
            .append("age", 42)
            .append("big", 1i64 << 40)
            .append("inner", inner)
            .append(
                "tags",
                Array::from(vec![Value::from("a"), Value::from("b")]),
            )
            .append("bin", Binary::new(0, vec![1u8, 2, 3]))
            .append("re", Regex::new("^a.*", "i"))
            .append("ts", Timestamp::new(100, 3))
            .append("nothing", Value::Null)
            .build()
    }

    #[test]
    fn test_decode_handwritten_bytes() {
        // {"a": 1} as int32
        let raw = with_length(vec![0, 0, 0, 0, 0x10, b'a', 0, 1, 0, 0, 0, 0]);
        let doc = DocumentDecoder::default()
            .decode(&raw, AllocationStrategy::Copy)
            .unwrap();
        assert_eq!(doc.get("a"), Some(&Value::Int32(1)));
        assert_eq!(doc.len(), 1);
    }

    #[test]
    fn test_reencode_reproduces_input_bytes() {
        // {"b": 1, "a": 2} as int32, keys deliberately out of sorted order
        let raw = with_length(vec![
            0, 0, 0, 0, 0x10, b'b', 0, 1, 0, 0, 0, 0x10, b'a', 0, 2, 0, 0, 0, 0,
        ]);
        let decoder = DocumentDecoder::default();
        for strategy in STRATEGIES {
            let doc = decoder.decode(&raw, strategy).unwrap();
            assert_eq!(doc.keys().collect::<Vec<_>>(), vec!["b", "a"], "{strategy}");
            assert_eq!(encode(&doc), raw, "{strategy}");
        }
    }

    #[test]
    fn test_roundtrip_all_strategies() {
        let doc = sample_doc();
        let bytes = encode(&doc);
        let decoder = DocumentDecoder::default();
        for strategy in STRATEGIES {
            let decoded = decoder.decode(&bytes, strategy).unwrap();
            assert_eq!(decoded, doc, "{strategy}");
            let keys: Vec<_> = decoded.keys().collect();
            assert_eq!(
                keys,
                vec!["name", "age", "big", "inner", "tags", "bin", "re", "ts", "nothing"]
            );
        }
    }

    #[test]
    fn test_strategies_control_views() {
        let doc = sample_doc();
        let bytes = encode(&doc);
        let decoder = DocumentDecoder::default();

        let copied = decoder.decode(&bytes, AllocationStrategy::Copy).unwrap();
        let (key, value) = copied.iter().next().unwrap();
        assert!(!key.is_view());
        assert!(matches!(value, Value::String(s) if !s.is_view()));

        let borrowed = decoder.decode(&bytes, AllocationStrategy::Borrow).unwrap();
        let (key, value) = borrowed.iter().next().unwrap();
        assert!(key.is_view());
        assert!(matches!(value, Value::String(s) if s.is_view()));

        let hybrid = decoder
            .decode(&bytes, AllocationStrategy::BorrowValues)
            .unwrap();
        let (key, value) = hybrid.iter().next().unwrap();
        assert!(!key.is_view());
        assert!(matches!(value, Value::String(s) if s.is_view()));
    }

    #[test]
    fn test_borrowed_document_outlives_dropped_handle() {
        let bytes = encode(&sample_doc());
        let doc = DocumentDecoder::default()
            .decode(&bytes, AllocationStrategy::Borrow)
            .unwrap();
        drop(bytes);
        assert_eq!(doc.get("name").and_then(Value::as_str), Some("alice"));
    }

    #[test]
    fn test_copy_strategy_interns_keys() {
        let decoder = DocumentDecoder::new(Arc::new(StringPool::with_kind(PoolPolicyKind::Always)));
        let bytes = encode(&sample_doc());
        let a = decoder.decode(&bytes, AllocationStrategy::Copy).unwrap();
        let b = decoder.decode(&bytes, AllocationStrategy::Copy).unwrap();
        let (ka, _) = a.iter().next().unwrap();
        let (kb, _) = b.iter().next().unwrap();
        assert!(ka.ptr_eq(kb));
    }

    #[test]
    fn test_truncated_input() {
        let bytes = encode(&sample_doc());
        let short = bytes.slice(..bytes.len() - 3);
        let err = DocumentDecoder::default()
            .decode(&short, AllocationStrategy::Copy)
            .unwrap_err();
        assert_eq!(
            err,
            DecodeError::TruncatedInput {
                needed: bytes.len(),
                available: bytes.len() - 3
            }
        );

        let err = DocumentDecoder::default()
            .decode(&Bytes::from_static(&[1, 0]), AllocationStrategy::Copy)
            .unwrap_err();
        assert!(matches!(err, DecodeError::TruncatedInput { needed: 4, .. }));
    }

    #[test]
    fn test_invalid_length_prefix() {
        let raw = Bytes::from_static(&[4, 0, 0, 0, 0]);
        let err = DocumentDecoder::default()
            .decode(&raw, AllocationStrategy::Copy)
            .unwrap_err();
        assert_eq!(err, DecodeError::InvalidLength { offset: 0, length: 4 });
    }

    #[test]
    fn test_declared_length_too_short() {
        // {"a": 1} declaring one byte fewer than it really is.
        let mut raw = vec![0, 0, 0, 0, 0x10, b'a', 0, 1, 0, 0, 0, 0];
        let declared = (raw.len() as i32 - 1).to_le_bytes();
        raw[..4].copy_from_slice(&declared);
        let err = DocumentDecoder::default()
            .decode(&Bytes::from(raw), AllocationStrategy::Copy)
            .unwrap_err();
        assert!(matches!(err, DecodeError::LengthMismatch { declared: 11, .. }));
    }

    #[test]
    fn test_declared_length_too_long() {
        // Terminator arrives before the declared end; padding keeps the
        // region long enough.
        let mut raw = vec![0, 0, 0, 0, 0x10, b'a', 0, 1, 0, 0, 0, 0, 0xAA, 0xAA];
        let declared = (raw.len() as i32).to_le_bytes();
        raw[..4].copy_from_slice(&declared);
        let err = DocumentDecoder::default()
            .decode(&Bytes::from(raw), AllocationStrategy::Copy)
            .unwrap_err();
        assert_eq!(
            err,
            DecodeError::LengthMismatch {
                declared: 14,
                consumed: 12
            }
        );
    }

    #[test]
    fn test_nested_length_exceeds_parent() {
        // {"d": {}} where the inner document claims 50 bytes.
        let raw = with_length(vec![0, 0, 0, 0, 0x03, b'd', 0, 50, 0, 0, 0, 0, 0]);
        let err = DocumentDecoder::default()
            .decode(&raw, AllocationStrategy::Copy)
            .unwrap_err();
        assert_eq!(
            err,
            DecodeError::LengthMismatch {
                declared: 13,
                consumed: 57
            }
        );
    }

    #[test]
    fn test_invalid_type_tag() {
        let raw = with_length(vec![0, 0, 0, 0, 0x42, b'a', 0, 0]);
        let err = DocumentDecoder::default()
            .decode(&raw, AllocationStrategy::Copy)
            .unwrap_err();
        assert_eq!(err, DecodeError::InvalidTypeTag { offset: 4, tag: 0x42 });
    }

    #[test]
    fn test_unterminated_key() {
        let raw = with_length(vec![0, 0, 0, 0, 0x0A, b'a', b'b']);
        let err = DocumentDecoder::default()
            .decode(&raw, AllocationStrategy::Copy)
            .unwrap_err();
        assert_eq!(err, DecodeError::UnterminatedCString { offset: 5 });
    }

    #[test]
    fn test_invalid_utf8_in_every_strategy() {
        let raw = with_length(vec![0, 0, 0, 0, 0x02, b's', 0, 2, 0, 0, 0, 0xFF, 0, 0]);
        let decoder = DocumentDecoder::default();
        for strategy in STRATEGIES {
            let err = decoder.decode(&raw, strategy).unwrap_err();
            assert_eq!(err, DecodeError::InvalidUtf8 { offset: 11 }, "{strategy}");
        }
    }

    #[test]
    fn test_string_missing_terminator() {
        let raw = with_length(vec![0, 0, 0, 0, 0x02, b's', 0, 2, 0, 0, 0, b'x', b'y', 0]);
        let err = DocumentDecoder::default()
            .decode(&raw, AllocationStrategy::Copy)
            .unwrap_err();
        assert!(matches!(err, DecodeError::InvalidValue { offset: 12, .. }));
    }

    #[test]
    fn test_invalid_boolean() {
        let raw = with_length(vec![0, 0, 0, 0, 0x08, b'b', 0, 2, 0]);
        let err = DocumentDecoder::default()
            .decode(&raw, AllocationStrategy::Copy)
            .unwrap_err();
        assert!(matches!(err, DecodeError::InvalidValue { offset: 7, .. }));
    }

    fn nest(levels: usize) -> Document {
        let mut doc = DocumentBuilder::new().append("leaf", true).build();
        for _ in 0..levels {
            doc = DocumentBuilder::new().append("d", doc).build();
        }
        doc
    }

    #[test]
    fn test_nesting_limit() {
        let decoder = DocumentDecoder::default();
        let ok = encode(&nest(MAX_NESTING_DEPTH));
        assert!(decoder.decode(&ok, AllocationStrategy::Copy).is_ok());

        let deep = encode(&nest(MAX_NESTING_DEPTH + 1));
        let err = decoder.decode(&deep, AllocationStrategy::Copy).unwrap_err();
        assert_eq!(err, DecodeError::NestingTooDeep { max: MAX_NESTING_DEPTH });
    }

    #[test]
    fn test_decode_prefix_reports_consumed() {
        let first = encode(&sample_doc());
        let second = encode(&DocumentBuilder::new().append("k", 1).build());
        let mut joined = first.to_vec();
        joined.extend_from_slice(&second);
        let joined = Bytes::from(joined);

        let decoder = DocumentDecoder::default();
        let (doc, consumed) = decoder
            .decode_prefix(&joined, AllocationStrategy::Borrow)
            .unwrap();
        assert_eq!(consumed, first.len());
        assert_eq!(doc, sample_doc());

        let (next, consumed_next) = decoder
            .decode_prefix(&joined.slice(consumed..), AllocationStrategy::Borrow)
            .unwrap();
        assert_eq!(consumed_next, second.len());
        assert_eq!(next.first_key(), Some("k"));
    }

    #[test]
    fn test_code_with_scope_roundtrip() {
        let scope = DocumentBuilder::new().append("x", 1).build();
        let doc = DocumentBuilder::new()
            .append(
                "f",
                Value::JavaScriptWithScope(CodeWithScope {
                    code: "return x;".into(),
                    scope,
                }),
            )
            .append(
                "p",
                Value::DbPointer(DbPointer {
                    namespace: "db.coll".into(),
                    id: ObjectId([9; 12]),
                }),
            )
            .build();
        let bytes = encode(&doc);
        for strategy in STRATEGIES {
            assert_eq!(DocumentDecoder::default().decode(&bytes, strategy).unwrap(), doc);
        }
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("heap".parse::<AllocationStrategy>(), Ok(AllocationStrategy::Copy));
        assert_eq!("offheap".parse::<AllocationStrategy>(), Ok(AllocationStrategy::Borrow));
        assert_eq!(
            "offheap_values".parse::<AllocationStrategy>(),
            Ok(AllocationStrategy::BorrowValues)
        );
        assert!("stack".parse::<AllocationStrategy>().is_err());
    }

    fn arb_leaf() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<f64>().prop_map(Value::Double),
            ".{0,12}".prop_map(Value::from),
            any::<i32>().prop_map(Value::Int32),
            any::<i64>().prop_map(Value::Int64),
            any::<bool>().prop_map(Value::Boolean),
            any::<[u8; 12]>().prop_map(|b| Value::ObjectId(ObjectId(b))),
            any::<i64>().prop_map(|ms| Value::DateTime(DateTime::from_millis(ms))),
            any::<u64>().prop_map(|raw| Value::Timestamp(Timestamp::from_raw(raw))),
            (any::<u8>(), proptest::collection::vec(any::<u8>(), 0..16))
                .prop_map(|(subtype, bytes)| Value::Binary(Binary::new(subtype, bytes))),
            ("[a-z.*^]{0,6}", "[imsx]{0,3}")
                .prop_map(|(p, o)| Value::Regex(Regex::new(p.as_str(), o.as_str()))),
            "[a-z]{0,8}".prop_map(|s| Value::Symbol(s.as_str().into())),
            "[a-z ]{0,8}".prop_map(|s| Value::JavaScript(s.as_str().into())),
            Just(Value::Null),
            Just(Value::Undefined),
            Just(Value::MinKey),
            Just(Value::MaxKey),
        ]
    }

    fn document_of(entries: Vec<(String, Value)>) -> Document {
        let mut builder = DocumentBuilder::new();
        for (k, v) in entries {
            builder.insert(k, v);
        }
        builder.build()
    }

    fn arb_document() -> impl Strategy<Value = Document> {
        let value = arb_leaf().prop_recursive(4, 48, 6, |inner| {
            prop_oneof![
                proptest::collection::vec(("[a-zA-Z_$][a-zA-Z0-9_]{0,10}", inner.clone()), 0..6)
                    .prop_map(|e| Value::Document(document_of(e))),
                proptest::collection::vec(inner, 0..6).prop_map(|v| Value::Array(Array::from(v))),
            ]
        });
        proptest::collection::vec(("[a-zA-Z_$][a-zA-Z0-9_]{0,10}", value), 0..8).prop_map(document_of)
    }

    proptest! {
        #[test]
        fn prop_roundtrip_every_strategy(doc in arb_document()) {
            let bytes = encode(&doc);
            let decoder = DocumentDecoder::default();
            for strategy in STRATEGIES {
                let (decoded, consumed) = decoder.decode_prefix(&bytes, strategy).unwrap();
                prop_assert_eq!(consumed, bytes.len());
                prop_assert_eq!(&decoded, &doc);
                prop_assert_eq!(encode(&decoded), bytes.clone());
            }
        }

        #[test]
        fn prop_wrong_declared_length_never_decodes(doc in arb_document(), delta in 1i32..8, grow in any::<bool>()) {
            let mut raw = encode(&doc).to_vec();
            let actual = raw.len() as i32;
            let declared = if grow { actual + delta } else { actual - delta };
            raw[..4].copy_from_slice(&declared.to_le_bytes());
            // Padding so a grown length is not simply truncated input.
            raw.extend(std::iter::repeat(0u8).take(8));
            let result = DocumentDecoder::default().decode(&Bytes::from(raw), AllocationStrategy::Copy);
            prop_assert!(result.is_err());
        }

        #[test]
        fn prop_borrow_reads_match_copy(doc in arb_document()) {
            let bytes = encode(&doc);
            let decoder = DocumentDecoder::default();
            let copied = decoder.decode(&bytes, AllocationStrategy::Copy).unwrap();
            let borrowed = decoder.decode(&bytes, AllocationStrategy::Borrow).unwrap();
            prop_assert_eq!(copied.to_json(), borrowed.to_json());
            prop_assert_eq!(copied, borrowed);
        }
    }
}
