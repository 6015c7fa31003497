//! Element type tags.

use std::fmt;

/// The one-byte type tag that precedes every element in an encoded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ElementType {
    Double = 0x01,
    String = 0x02,
    Document = 0x03,
    Array = 0x04,
    Binary = 0x05,
    /// Deprecated, still seen from old drivers.
    Undefined = 0x06,
    ObjectId = 0x07,
    Boolean = 0x08,
    DateTime = 0x09,
    Null = 0x0A,
    Regex = 0x0B,
    DbPointer = 0x0C,
    JavaScript = 0x0D,
    Symbol = 0x0E,
    JavaScriptWithScope = 0x0F,
    Int32 = 0x10,
    Timestamp = 0x11,
    Int64 = 0x12,
    MaxKey = 0x7F,
    MinKey = 0xFF,
}

impl TryFrom<u8> for ElementType {
    /// The unrecognized tag.
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(ElementType::Double),
            0x02 => Ok(ElementType::String),
            0x03 => Ok(ElementType::Document),
            0x04 => Ok(ElementType::Array),
            0x05 => Ok(ElementType::Binary),
            0x06 => Ok(ElementType::Undefined),
            0x07 => Ok(ElementType::ObjectId),
            0x08 => Ok(ElementType::Boolean),
            0x09 => Ok(ElementType::DateTime),
            0x0A => Ok(ElementType::Null),
            0x0B => Ok(ElementType::Regex),
            0x0C => Ok(ElementType::DbPointer),
            0x0D => Ok(ElementType::JavaScript),
            0x0E => Ok(ElementType::Symbol),
            0x0F => Ok(ElementType::JavaScriptWithScope),
            0x10 => Ok(ElementType::Int32),
            0x11 => Ok(ElementType::Timestamp),
            0x12 => Ok(ElementType::Int64),
            0x7F => Ok(ElementType::MaxKey),
            0xFF => Ok(ElementType::MinKey),
            other => Err(other),
        }
    }
}

impl ElementType {
    /// Rank of the comparison class this type belongs to.
    ///
    /// Types sharing a rank (the numeric types, string and symbol) are
    /// compared by payload before their tags are consulted.
    pub fn class_rank(self) -> u8 {
        match self {
            ElementType::MinKey => 0,
            ElementType::Undefined => 1,
            ElementType::Null => 2,
            ElementType::Int32 | ElementType::Int64 | ElementType::Double => 3,
            ElementType::String | ElementType::Symbol => 4,
            ElementType::Document => 5,
            ElementType::Array => 6,
            ElementType::Binary => 7,
            ElementType::ObjectId => 8,
            ElementType::Boolean => 9,
            ElementType::DateTime => 10,
            ElementType::Timestamp => 11,
            ElementType::Regex => 12,
            ElementType::DbPointer => 13,
            ElementType::JavaScript => 14,
            ElementType::JavaScriptWithScope => 15,
            ElementType::MaxKey => 16,
        }
    }

    /// Returns whether values of this type are numbers.
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            ElementType::Int32 | ElementType::Int64 | ElementType::Double
        )
    }

    /// Lowercase name used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            ElementType::Double => "double",
            ElementType::String => "string",
            ElementType::Document => "document",
            ElementType::Array => "array",
            ElementType::Binary => "binary",
            ElementType::Undefined => "undefined",
            ElementType::ObjectId => "object_id",
            ElementType::Boolean => "boolean",
            ElementType::DateTime => "datetime",
            ElementType::Null => "null",
            ElementType::Regex => "regex",
            ElementType::DbPointer => "db_pointer",
            ElementType::JavaScript => "javascript",
            ElementType::Symbol => "symbol",
            ElementType::JavaScriptWithScope => "javascript_with_scope",
            ElementType::Int32 => "int32",
            ElementType::Timestamp => "timestamp",
            ElementType::Int64 => "int64",
            ElementType::MaxKey => "max",
            ElementType::MinKey => "min",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
