//! String payloads that are either owned or views into a decoded region.

use bytes::Bytes;
use bytestring::ByteString;
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

/// A UTF-8 string held by a decoded document.
///
/// Strings built by hand or decoded under the copy strategy own their storage
/// (possibly shared through the string pool). Strings decoded under a borrow
/// strategy are views into the source region; the region stays alive and
/// immutable for as long as the view exists.
#[derive(Clone)]
pub struct BsonString(Repr);

#[derive(Clone)]
enum Repr {
    Shared(Arc<str>),
    View(ByteString),
}

impl BsonString {
    /// Creates an owned string.
    pub fn new(value: impl Into<Arc<str>>) -> Self {
        Self(Repr::Shared(value.into()))
    }

    /// Wraps a region slice after validating it as UTF-8.
    pub fn from_utf8_view(bytes: Bytes) -> Result<Self, std::str::Utf8Error> {
        ByteString::try_from(bytes).map(|view| Self(Repr::View(view)))
    }

    /// Returns the string contents.
    pub fn as_str(&self) -> &str {
        match &self.0 {
            Repr::Shared(s) => &**s,
            Repr::View(view) => &**view,
        }
    }

    /// Returns whether this string borrows from a decoded region.
    pub fn is_view(&self) -> bool {
        matches!(self.0, Repr::View(_))
    }

    /// Returns whether two strings share the same heap allocation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (Repr::Shared(a), Repr::Shared(b)) => Arc::ptr_eq(a, b),
            (Repr::View(a), Repr::View(b)) => {
                a.as_bytes().as_ptr() == b.as_bytes().as_ptr() && a.len() == b.len()
            }
            _ => false,
        }
    }

    /// Detaches a view from its source region by copying it.
    pub fn into_owned(self) -> Self {
        match self.0 {
            Repr::Shared(_) => self,
            Repr::View(_) => Self::new(self.as_str()),
        }
    }
}

impl Deref for BsonString {
    type Target = str;

    fn deref(&self) -> &str {
        self.as_str()
    }
}

impl AsRef<str> for BsonString {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Borrow<str> for BsonString {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl PartialEq for BsonString {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for BsonString {}

impl PartialEq<str> for BsonString {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for BsonString {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl PartialOrd for BsonString {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BsonString {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().as_bytes().cmp(other.as_str().as_bytes())
    }
}

impl Hash for BsonString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state)
    }
}

impl fmt::Debug for BsonString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl fmt::Display for BsonString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for BsonString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for BsonString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<Arc<str>> for BsonString {
    fn from(value: Arc<str>) -> Self {
        Self(Repr::Shared(value))
    }
}
