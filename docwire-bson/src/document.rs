//! Ordered documents, arrays and the document builder.

use crate::string::BsonString;
use crate::value::Value;
use std::collections::HashMap;
use std::fmt;

/// Builders switch from a linear key scan to a hash index past this size.
const INDEX_THRESHOLD: usize = 16;

/// An immutable, ordered mapping from unique keys to values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Document {
    entries: Vec<(BsonString, Value)>,
}

impl Document {
    /// Returns an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> DocumentBuilder {
        DocumentBuilder::new()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up a value by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k.as_str() == key)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Key of the first entry. Commands are identified by it.
    pub fn first_key(&self) -> Option<&str> {
        self.entries.first().map(|(k, _)| k.as_str())
    }

    pub fn first(&self) -> Option<(&str, &Value)> {
        self.entries.first().map(|(k, v)| (k.as_str(), v))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BsonString, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }

    /// Copies every view string into owned storage, detaching the document
    /// from the region it was decoded from. Binary payloads keep sharing it.
    pub fn into_owned(self) -> Document {
        Document {
            entries: self
                .entries
                .into_iter()
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_json()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl IntoIterator for Document {
    type Item = (BsonString, Value);
    type IntoIter = std::vec::IntoIter<(BsonString, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Accumulates entries for a [`Document`].
///
/// Appending an existing key replaces its value in place, so the key keeps the
/// position of its first occurrence. `build` consumes the builder.
#[derive(Debug, Default)]
pub struct DocumentBuilder {
    entries: Vec<(BsonString, Value)>,
    index: Option<HashMap<BsonString, usize>>,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            index: None,
        }
    }

    /// Reopens a copy of `doc` for appending.
    pub fn from_document(doc: &Document) -> Self {
        let mut builder = Self::with_capacity(doc.len() + 1);
        for (k, v) in doc.iter() {
            builder.insert(k.clone(), v.clone());
        }
        builder
    }

    /// Appends an entry and returns the builder.
    pub fn append(mut self, key: impl Into<BsonString>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Appends an entry in place.
    pub fn insert(&mut self, key: impl Into<BsonString>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();

        if let Some(pos) = self.position(&key) {
            self.entries[pos].1 = value;
            return;
        }

        let pos = self.entries.len();
        if let Some(index) = self.index.as_mut() {
            index.insert(key.clone(), pos);
        } else if pos + 1 > INDEX_THRESHOLD {
            let mut index: HashMap<BsonString, usize> = self
                .entries
                .iter()
                .enumerate()
                .map(|(i, (k, _))| (k.clone(), i))
                .collect();
            index.insert(key.clone(), pos);
            self.index = Some(index);
        }
        self.entries.push((key, value));
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, key: &str) -> Option<usize> {
        match &self.index {
            Some(index) => index.get(key).copied(),
            None => self.entries.iter().position(|(k, _)| k.as_str() == key),
        }
    }

    pub fn build(self) -> Document {
        Document {
            entries: self.entries,
        }
    }
}

/// An ordered list of values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Array(Vec<Value>);

impl Array {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<Value> {
        self.0
    }

    pub fn into_owned(self) -> Array {
        Array(self.0.into_iter().map(Value::into_owned).collect())
    }
}

impl From<Vec<Value>> for Array {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

impl FromIterator<Value> for Array {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Array {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
