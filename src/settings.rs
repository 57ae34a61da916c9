//! Settings container shared by adapters and the aggregator.
//!
//! A [`Settings`] value is a tree of string keys to JSON-compatible values.
//! Published snapshots are never mutated once they are handed to readers; the
//! aggregator builds a fresh value and swaps it in.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings {
    values: Map<String, Value>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a value by key.
    ///
    /// An exact top-level match wins. Otherwise the key is treated as a dotted
    /// path and resolved through nested mappings, so `"db.pool.size"` reaches
    /// `{"db": {"pool": {"size": ..}}}`.
    pub fn get(
        &self,
        key: &str,
    ) -> Option<&Value> {
        if let Some(value) = self.values.get(key) {
            return Some(value);
        }

        let mut segments = key.split('.');
        let mut current = self.values.get(segments.next()?)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Deep-merges `other` into `self`.
    ///
    /// Nested mappings are merged recursively; every other collision takes
    /// `other`'s value.
    pub fn merge(
        &mut self,
        other: &Settings,
    ) {
        merge_maps(&mut self.values, &other.values);
    }

    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: Value,
    ) -> Option<Value> {
        self.values.insert(key.into(), value)
    }

    /// The full settings tree.
    pub fn all(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.values
    }
}

impl From<Map<String, Value>> for Settings {
    fn from(values: Map<String, Value>) -> Self {
        Self { values }
    }
}

impl FromIterator<(String, Value)> for Settings {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

fn merge_maps(
    dst: &mut Map<String, Value>,
    src: &Map<String, Value>,
) {
    for (key, value) in src {
        if let (Some(Value::Object(existing)), Value::Object(incoming)) = (dst.get_mut(key), value) {
            merge_maps(existing, incoming);
            continue;
        }
        dst.insert(key.clone(), value.clone());
    }
}
