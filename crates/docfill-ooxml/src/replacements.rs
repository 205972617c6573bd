//! Ordered placeholder -> value mapping

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Result;
use crate::scanner::Delimiters;

/// Mapping from token text (delimiters included) to a plain-text value
///
/// Iteration follows insertion order. Re-inserting a token updates its value
/// in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplacementMap {
    entries: IndexMap<String, String>,
}

impl ReplacementMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update a token, returning the previous value
    pub fn insert(&mut self, token: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(token.into(), value.into())
    }

    /// Insert by bare identifier, wrapping it in `delimiters`
    ///
    /// Identifiers that already carry the delimiters are kept as they are.
    pub fn insert_identifier(
        &mut self,
        delimiters: &Delimiters,
        identifier: &str,
        value: impl Into<String>,
    ) -> Option<String> {
        let token = if delimiters.identifier(identifier).is_some() {
            identifier.to_string()
        } else {
            delimiters.wrap(identifier)
        };
        self.insert(token, value)
    }

    pub fn get(&self, token: &str) -> Option<&str> {
        self.entries.get(token).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(t, v)| (t.as_str(), v.as_str()))
    }

    /// Tokens in insertion order
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Parse a JSON object, keeping the key order of the document
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ReplacementMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for ReplacementMap {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (token, value) in iter {
            self.insert(token, value);
        }
    }
}

/// Values may be given as JSON strings, numbers or booleans
#[derive(Deserialize)]
#[serde(untagged)]
enum ScalarValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Flag(bool),
}

impl From<ScalarValue> for String {
    fn from(value: ScalarValue) -> Self {
        match value {
            ScalarValue::Text(s) => s,
            ScalarValue::Integer(i) => i.to_string(),
            ScalarValue::Float(f) => f.to_string(),
            ScalarValue::Flag(b) => b.to_string(),
        }
    }
}

impl Serialize for ReplacementMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ReplacementMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = IndexMap::<String, ScalarValue>::deserialize(deserializer)?;
        Ok(raw.into_iter().collect())
    }
}
