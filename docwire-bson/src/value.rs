//! The value model.
//!
//! [`Value`] is a closed sum over every element type the wire format can
//! carry. Equality is strict per stored representation (an `Int32(1)` is not
//! equal to an `Int64(1)`), while ordering follows the protocol's canonical
//! cross-type order: numbers of different widths interleave by numeric value
//! and only fall back to their tag when the values coincide. This keeps
//! `a.cmp(b) == Equal` exactly when `a == b`.

use crate::document::{Array, Document};
use crate::element::ElementType;
use crate::error::ValueError;
use crate::string::BsonString;
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use serde_json::json;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A single element value.
#[derive(Debug, Clone)]
pub enum Value {
    Double(f64),
    String(BsonString),
    Document(Document),
    Array(Array),
    Binary(Binary),
    Undefined,
    ObjectId(ObjectId),
    Boolean(bool),
    DateTime(DateTime),
    Null,
    Regex(Regex),
    DbPointer(DbPointer),
    JavaScript(BsonString),
    Symbol(BsonString),
    JavaScriptWithScope(CodeWithScope),
    Int32(i32),
    Timestamp(Timestamp),
    Int64(i64),
    MinKey,
    MaxKey,
}

impl Value {
    pub const NULL: Value = Value::Null;
    pub const UNDEFINED: Value = Value::Undefined;
    pub const MIN_KEY: Value = Value::MinKey;
    pub const MAX_KEY: Value = Value::MaxKey;
    pub const TRUE: Value = Value::Boolean(true);
    pub const FALSE: Value = Value::Boolean(false);

    /// Returns the type tag of this value.
    pub fn element_type(&self) -> ElementType {
        match self {
            Value::Double(_) => ElementType::Double,
            Value::String(_) => ElementType::String,
            Value::Document(_) => ElementType::Document,
            Value::Array(_) => ElementType::Array,
            Value::Binary(_) => ElementType::Binary,
            Value::Undefined => ElementType::Undefined,
            Value::ObjectId(_) => ElementType::ObjectId,
            Value::Boolean(_) => ElementType::Boolean,
            Value::DateTime(_) => ElementType::DateTime,
            Value::Null => ElementType::Null,
            Value::Regex(_) => ElementType::Regex,
            Value::DbPointer(_) => ElementType::DbPointer,
            Value::JavaScript(_) => ElementType::JavaScript,
            Value::Symbol(_) => ElementType::Symbol,
            Value::JavaScriptWithScope(_) => ElementType::JavaScriptWithScope,
            Value::Int32(_) => ElementType::Int32,
            Value::Timestamp(_) => ElementType::Timestamp,
            Value::Int64(_) => ElementType::Int64,
            Value::MinKey => ElementType::MinKey,
            Value::MaxKey => ElementType::MaxKey,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.element_type().is_numeric()
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_object_id(&self) -> Option<&ObjectId> {
        match self {
            Value::ObjectId(oid) => Some(oid),
            _ => None,
        }
    }

    /// Copies view strings into owned storage. Binary payloads keep sharing
    /// their region.
    pub fn into_owned(self) -> Value {
        match self {
            Value::String(s) => Value::String(s.into_owned()),
            Value::Symbol(s) => Value::Symbol(s.into_owned()),
            Value::JavaScript(s) => Value::JavaScript(s.into_owned()),
            Value::Document(d) => Value::Document(d.into_owned()),
            Value::Array(a) => Value::Array(a.into_owned()),
            Value::Regex(r) => Value::Regex(Regex {
                pattern: r.pattern.into_owned(),
                options: r.options.into_owned(),
            }),
            Value::DbPointer(p) => Value::DbPointer(DbPointer {
                namespace: p.namespace.into_owned(),
                id: p.id,
            }),
            Value::JavaScriptWithScope(c) => Value::JavaScriptWithScope(CodeWithScope {
                code: c.code.into_owned(),
                scope: c.scope.into_owned(),
            }),
            other => other,
        }
    }

    /// Converts a numeric value to `i32`, failing if information would be lost.
    pub fn to_i32(&self) -> Result<i32, ValueError> {
        match *self {
            Value::Int32(v) => Ok(v),
            Value::Int64(v) => i32::try_from(v).map_err(|_| self.lossy("int32")),
            Value::Double(v) => {
                if v.fract() == 0.0 && v >= i32::MIN as f64 && v <= i32::MAX as f64 {
                    Ok(v as i32)
                } else {
                    Err(self.lossy("int32"))
                }
            }
            _ => Err(ValueError::NotNumeric(self.element_type())),
        }
    }

    /// Converts a numeric value to `i64`, failing if information would be lost.
    pub fn to_i64(&self) -> Result<i64, ValueError> {
        match *self {
            Value::Int32(v) => Ok(v as i64),
            Value::Int64(v) => Ok(v),
            Value::Double(v) => {
                if v.fract() == 0.0 && v >= -TWO_POW_63 && v < TWO_POW_63 {
                    Ok(v as i64)
                } else {
                    Err(self.lossy("int64"))
                }
            }
            _ => Err(ValueError::NotNumeric(self.element_type())),
        }
    }

    /// Converts a numeric value to `f64`, failing if the integer is not
    /// exactly representable.
    pub fn to_f64(&self) -> Result<f64, ValueError> {
        match *self {
            Value::Int32(v) => Ok(v as f64),
            Value::Int64(v) => {
                let f = v as f64;
                if f as i128 == v as i128 {
                    Ok(f)
                } else {
                    Err(self.lossy("double"))
                }
            }
            Value::Double(v) => Ok(v),
            _ => Err(ValueError::NotNumeric(self.element_type())),
        }
    }

    /// Converts a numeric value to `i64`, truncating fractions and saturating
    /// at the bounds. The caller asks for the loss explicitly.
    pub fn truncated_i64(&self) -> Result<i64, ValueError> {
        match *self {
            Value::Int32(v) => Ok(v as i64),
            Value::Int64(v) => Ok(v),
            Value::Double(v) => Ok(v as i64),
            _ => Err(ValueError::NotNumeric(self.element_type())),
        }
    }

    fn lossy(&self, target: &'static str) -> ValueError {
        ValueError::LossyCoercion {
            value: self.to_string(),
            target,
        }
    }

    /// Renders the value as relaxed extended JSON.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Double(v) if v.is_finite() => json!(v),
            Value::Double(v) => json!({ "$numberDouble": v.to_string() }),
            Value::String(s) => json!(s.as_str()),
            Value::Document(d) => d.to_json(),
            Value::Array(a) => serde_json::Value::Array(a.iter().map(Value::to_json).collect()),
            Value::Binary(b) => json!({
                "$binary": { "hex": hex::encode(&b.bytes), "subType": format!("{:02x}", b.subtype) }
            }),
            Value::Undefined => json!({ "$undefined": true }),
            Value::ObjectId(oid) => json!({ "$oid": oid.to_hex() }),
            Value::Boolean(b) => json!(b),
            Value::DateTime(dt) => match dt.to_chrono() {
                Some(t) => json!({ "$date": t.to_rfc3339() }),
                None => json!({ "$date": { "$numberLong": dt.timestamp_millis().to_string() } }),
            },
            Value::Null => serde_json::Value::Null,
            Value::Regex(r) => json!({
                "$regularExpression": { "pattern": r.pattern.as_str(), "options": r.options.as_str() }
            }),
            Value::DbPointer(p) => json!({
                "$dbPointer": { "$ref": p.namespace.as_str(), "$id": { "$oid": p.id.to_hex() } }
            }),
            Value::JavaScript(code) => json!({ "$code": code.as_str() }),
            Value::Symbol(s) => json!({ "$symbol": s.as_str() }),
            Value::JavaScriptWithScope(c) => json!({
                "$code": c.code.as_str(), "$scope": c.scope.to_json()
            }),
            Value::Int32(v) => json!(v),
            Value::Timestamp(ts) => json!({ "$timestamp": { "t": ts.seconds, "i": ts.ordinal } }),
            Value::Int64(v) => json!(v),
            Value::MinKey => json!({ "$minKey": 1 }),
            Value::MaxKey => json!({ "$maxKey": 1 }),
        }
    }

    /// Compares payloads of two values of the same comparison class.
    fn cmp_payload(&self, other: &Self) -> Ordering {
        if let (Some(a), Some(b)) = (Number::of(self), Number::of(other)) {
            return a.cmp(b);
        }
        match (self, other) {
            (Value::String(a) | Value::Symbol(a), Value::String(b) | Value::Symbol(b)) => a.cmp(b),
            (Value::Document(a), Value::Document(b)) => a.cmp(b),
            (Value::Array(a), Value::Array(b)) => a.cmp(b),
            (Value::Binary(a), Value::Binary(b)) => a.cmp(b),
            (Value::ObjectId(a), Value::ObjectId(b)) => a.cmp(b),
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
            (Value::Regex(a), Value::Regex(b)) => a.cmp(b),
            (Value::DbPointer(a), Value::DbPointer(b)) => a.cmp(b),
            (Value::JavaScript(a), Value::JavaScript(b)) => a.cmp(b),
            (Value::JavaScriptWithScope(a), Value::JavaScriptWithScope(b)) => a.cmp(b),
            // Singletons: min/max key, null, undefined.
            _ => Ordering::Equal,
        }
    }
}

const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;

/// Numeric view used for cross-width comparison.
#[derive(Clone, Copy)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn of(value: &Value) -> Option<Number> {
        match *value {
            Value::Int32(v) => Some(Number::Int(v as i64)),
            Value::Int64(v) => Some(Number::Int(v)),
            Value::Double(v) => Some(Number::Float(v)),
            _ => None,
        }
    }

    fn cmp(self, other: Number) -> Ordering {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a.cmp(&b),
            (Number::Float(a), Number::Float(b)) => cmp_f64(a, b),
            (Number::Int(a), Number::Float(b)) => cmp_i64_f64(a, b),
            (Number::Float(a), Number::Int(b)) => cmp_i64_f64(b, a).reverse(),
        }
    }
}

/// NaN sorts below every other number; otherwise IEEE total order.
fn cmp_f64(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => a.to_bits().cmp(&b.to_bits()),
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.total_cmp(&b),
    }
}

/// Exact comparison of an integer against a double.
fn cmp_i64_f64(i: i64, f: f64) -> Ordering {
    if f.is_nan() {
        return Ordering::Greater;
    }
    if f >= TWO_POW_63 {
        return Ordering::Less;
    }
    if f < -TWO_POW_63 {
        return Ordering::Greater;
    }
    let whole = f.trunc();
    match i.cmp(&(whole as i64)) {
        Ordering::Equal => {
            if f > whole {
                Ordering::Less
            } else if f < whole {
                Ordering::Greater
            } else {
                Ordering::Equal
            }
        }
        ord => ord,
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        let (ta, tb) = (self.element_type(), other.element_type());
        ta.class_rank()
            .cmp(&tb.class_rank())
            .then_with(|| self.cmp_payload(other))
            .then_with(|| (ta as u8).cmp(&(tb as u8)))
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self.element_type() as u8).hash(state);
        match self {
            Value::Double(v) => v.to_bits().hash(state),
            Value::String(s) | Value::JavaScript(s) | Value::Symbol(s) => s.hash(state),
            Value::Document(d) => d.hash(state),
            Value::Array(a) => a.hash(state),
            Value::Binary(b) => b.hash(state),
            Value::ObjectId(oid) => oid.hash(state),
            Value::Boolean(b) => b.hash(state),
            Value::DateTime(dt) => dt.hash(state),
            Value::Regex(r) => r.hash(state),
            Value::DbPointer(p) => p.hash(state),
            Value::JavaScriptWithScope(c) => c.hash(state),
            Value::Int32(v) => v.hash(state),
            Value::Timestamp(ts) => ts.hash(state),
            Value::Int64(v) => v.hash(state),
            Value::Undefined | Value::Null | Value::MinKey | Value::MaxKey => {}
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

/// Binary payload with its subtype byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Binary {
    pub subtype: u8,
    pub bytes: Bytes,
}

impl Binary {
    pub const GENERIC: u8 = 0x00;
    pub const FUNCTION: u8 = 0x01;
    pub const OLD_BINARY: u8 = 0x02;
    pub const UUID: u8 = 0x04;
    pub const MD5: u8 = 0x05;
    pub const USER_DEFINED: u8 = 0x80;

    pub fn new(subtype: u8, bytes: impl Into<Bytes>) -> Self {
        Self {
            subtype,
            bytes: bytes.into(),
        }
    }
}

impl PartialOrd for Binary {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Binary {
    fn cmp(&self, other: &Self) -> Ordering {
        self.bytes
            .as_ref()
            .cmp(other.bytes.as_ref())
            .then(self.subtype.cmp(&other.subtype))
    }
}

/// A 12-byte object identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub [u8; 12]);

impl ObjectId {
    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    pub fn bytes(&self) -> [u8; 12] {
        self.0
    }

    /// Parses a 24-character hex string.
    pub fn parse_str(s: &str) -> Result<Self, ValueError> {
        let mut bytes = [0u8; 12];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| ValueError::InvalidObjectId(format!("{}: {}", s, e)))?;
        Ok(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Seconds since the epoch stored in the leading four bytes (big-endian).
    pub fn timestamp_secs(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DateTime(i64);

impl DateTime {
    pub fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    pub fn now() -> Self {
        Self::from_chrono(Utc::now())
    }

    pub fn from_chrono(dt: chrono::DateTime<Utc>) -> Self {
        Self(dt.timestamp_millis())
    }

    pub fn timestamp_millis(&self) -> i64 {
        self.0
    }

    /// Returns `None` when the instant is outside chrono's range.
    pub fn to_chrono(&self) -> Option<chrono::DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.0).single()
    }
}

/// Replication timestamp: seconds plus an ordinal within the second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timestamp {
    pub seconds: u32,
    pub ordinal: u32,
}

impl Timestamp {
    pub fn new(seconds: u32, ordinal: u32) -> Self {
        Self { seconds, ordinal }
    }

    /// Packs seconds into the high 32 bits and the ordinal into the low 32.
    pub fn raw(&self) -> u64 {
        ((self.seconds as u64) << 32) | self.ordinal as u64
    }

    pub fn from_raw(raw: u64) -> Self {
        Self {
            seconds: (raw >> 32) as u32,
            ordinal: raw as u32,
        }
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.raw().cmp(&other.raw())
    }
}

/// A regular expression with its option flags.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Regex {
    pub pattern: BsonString,
    pub options: BsonString,
}

impl Regex {
    pub fn new(pattern: impl Into<BsonString>, options: impl Into<BsonString>) -> Self {
        Self {
            pattern: pattern.into(),
            options: options.into(),
        }
    }
}

/// Legacy reference to a document in another collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DbPointer {
    pub namespace: BsonString,
    pub id: ObjectId,
}

/// JavaScript code with a scope document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CodeWithScope {
    pub code: BsonString,
    pub scope: Document,
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.into())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v.into())
    }
}

impl From<BsonString> for Value {
    fn from(v: BsonString) -> Self {
        Value::String(v)
    }
}

impl From<Document> for Value {
    fn from(v: Document) -> Self {
        Value::Document(v)
    }
}

impl From<Array> for Value {
    fn from(v: Array) -> Self {
        Value::Array(v)
    }
}

impl From<Binary> for Value {
    fn from(v: Binary) -> Self {
        Value::Binary(v)
    }
}

impl From<ObjectId> for Value {
    fn from(v: ObjectId) -> Self {
        Value::ObjectId(v)
    }
}

impl From<DateTime> for Value {
    fn from(v: DateTime) -> Self {
        Value::DateTime(v)
    }
}

impl From<Timestamp> for Value {
    fn from(v: Timestamp) -> Self {
        Value::Timestamp(v)
    }
}

impl From<Regex> for Value {
    fn from(v: Regex) -> Self {
        Value::Regex(v)
    }
}
