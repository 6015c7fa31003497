//! Typed field readers.
//!
//! Command arguments are unmarshalled by pulling typed fields out of the
//! command document. Missing fields yield [`FieldError::NoSuchKey`]; fields of
//! the wrong type yield [`FieldError::TypeMismatch`] naming the expected type.
//! The `_or` variants substitute a default for a missing field but still
//! reject a present field of the wrong type.

use crate::document::{Array, Document};
use crate::error::FieldError;
use crate::value::{DateTime, ObjectId, Timestamp, Value};

type Result<T> = std::result::Result<T, FieldError>;

fn mismatch(key: &str, expected: &'static str, found: &Value) -> FieldError {
    FieldError::TypeMismatch {
        key: key.to_string(),
        expected,
        found: found.element_type(),
    }
}

/// Returns the value of `key`.
pub fn get_value<'a>(doc: &'a Document, key: &str) -> Result<&'a Value> {
    doc.get(key)
        .ok_or_else(|| FieldError::NoSuchKey(key.to_string()))
}

pub fn get_str<'a>(doc: &'a Document, key: &str) -> Result<&'a str> {
    match get_value(doc, key)? {
        Value::String(s) => Ok(s.as_str()),
        other => Err(mismatch(key, "string", other)),
    }
}

pub fn get_str_or<'a>(doc: &'a Document, key: &str, default: &'a str) -> Result<&'a str> {
    match doc.get(key) {
        None => Ok(default),
        Some(_) => get_str(doc, key),
    }
}

/// Reads an int32 field. Other numeric widths are rejected.
pub fn get_i32(doc: &Document, key: &str) -> Result<i32> {
    match get_value(doc, key)? {
        Value::Int32(v) => Ok(*v),
        other => Err(mismatch(key, "integer", other)),
    }
}

pub fn get_i32_or(doc: &Document, key: &str, default: i32) -> Result<i32> {
    match doc.get(key) {
        None => Ok(default),
        Some(_) => get_i32(doc, key),
    }
}

/// Reads an int64 field.
pub fn get_i64(doc: &Document, key: &str) -> Result<i64> {
    match get_value(doc, key)? {
        Value::Int64(v) => Ok(*v),
        other => Err(mismatch(key, "long", other)),
    }
}

pub fn get_i64_or(doc: &Document, key: &str, default: i64) -> Result<i64> {
    match doc.get(key) {
        None => Ok(default),
        Some(_) => get_i64(doc, key),
    }
}

/// Reads a double field.
pub fn get_f64(doc: &Document, key: &str) -> Result<f64> {
    match get_value(doc, key)? {
        Value::Double(v) => Ok(*v),
        other => Err(mismatch(key, "double", other)),
    }
}

/// Reads a field of any numeric width.
pub fn get_numeric<'a>(doc: &'a Document, key: &str) -> Result<&'a Value> {
    let value = get_value(doc, key)?;
    if value.is_numeric() {
        Ok(value)
    } else {
        Err(mismatch(key, "numeric", value))
    }
}

pub fn get_bool(doc: &Document, key: &str) -> Result<bool> {
    match get_value(doc, key)? {
        Value::Boolean(b) => Ok(*b),
        other => Err(mismatch(key, "boolean", other)),
    }
}

pub fn get_bool_or(doc: &Document, key: &str, default: bool) -> Result<bool> {
    match doc.get(key) {
        None => Ok(default),
        Some(_) => get_bool(doc, key),
    }
}

/// Reads a flag that drivers send either as a boolean or as a number.
/// Numbers are truncated to an integer and compared against zero.
pub fn get_bool_or_numeric(doc: &Document, key: &str, default: bool) -> Result<bool> {
    match doc.get(key) {
        None => Ok(default),
        Some(Value::Boolean(b)) => Ok(*b),
        Some(v) if v.is_numeric() => Ok(v.truncated_i64().map(|n| n != 0).unwrap_or(false)),
        Some(other) => Err(mismatch(key, "boolean or numeric", other)),
    }
}

/// Truthiness used by legacy option fields: absent, zero, `false` and
/// undefined are false; anything else is true.
pub fn is_pseudo_true(doc: &Document, key: &str) -> bool {
    match doc.get(key) {
        None => false,
        Some(Value::Int32(v)) => *v != 0,
        Some(Value::Int64(v)) => *v != 0,
        Some(Value::Double(v)) => *v != 0.0,
        Some(Value::Boolean(b)) => *b,
        Some(Value::Undefined) => false,
        Some(_) => true,
    }
}

pub fn get_document<'a>(doc: &'a Document, key: &str) -> Result<&'a Document> {
    match get_value(doc, key)? {
        Value::Document(d) => Ok(d),
        other => Err(mismatch(key, "document", other)),
    }
}

pub fn get_array<'a>(doc: &'a Document, key: &str) -> Result<&'a Array> {
    match get_value(doc, key)? {
        Value::Array(a) => Ok(a),
        other => Err(mismatch(key, "array", other)),
    }
}

pub fn get_object_id(doc: &Document, key: &str) -> Result<ObjectId> {
    match get_value(doc, key)? {
        Value::ObjectId(oid) => Ok(*oid),
        other => Err(mismatch(key, "objectId", other)),
    }
}

pub fn get_datetime(doc: &Document, key: &str) -> Result<DateTime> {
    match get_value(doc, key)? {
        Value::DateTime(dt) => Ok(*dt),
        other => Err(mismatch(key, "date", other)),
    }
}

pub fn get_timestamp(doc: &Document, key: &str) -> Result<Timestamp> {
    match get_value(doc, key)? {
        Value::Timestamp(ts) => Ok(*ts),
        other => Err(mismatch(key, "timestamp", other)),
    }
}

/// Fails with [`FieldError::BadValue`] if `doc` has a field outside `allowed`.
pub fn check_only_has_fields(object_name: &str, doc: &Document, allowed: &[&str]) -> Result<()> {
    match doc.keys().find(|key| !allowed.contains(key)) {
        Some(key) => Err(FieldError::BadValue(format!(
            "Unexpected field {} in {}",
            key, object_name
        ))),
        None => Ok(()),
    }
}
