//! String metadata attached to images.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ordered key/value metadata.
///
/// Keys are human-readable labels such as `"Creator"` or `"Timecode"`.
/// Values are stored as text; codecs parse them back when writing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tags {
    map: BTreeMap<String, String>,
}

impl Tags {
    /// Creates an empty tag set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a tag.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.map.insert(key.into(), value.into());
    }

    /// Returns a tag value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    /// Returns true if the key exists.
    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// Removes a tag, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.map.remove(key)
    }

    /// Copies every tag of `other` into `self`, replacing duplicates.
    pub fn merge(&mut self, other: &Tags) {
        for (k, v) in other.iter() {
            self.set(k, v);
        }
    }

    /// Iterates over key/value pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of tags.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns true if empty.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Tags {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut tags = Tags::new();
        for (k, v) in iter {
            tags.set(k, v);
        }
        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_merge() {
        let mut a: Tags = [("Creator", "pixio"), ("Project", "one")].into_iter().collect();
        let b: Tags = [("Project", "two"), ("Copyright", "c")].into_iter().collect();
        a.merge(&b);
        assert_eq!(a.len(), 3);
        assert_eq!(a.get("Project"), Some("two"));
        assert_eq!(a.remove("Creator").as_deref(), Some("pixio"));
        assert!(!a.contains("Creator"));
    }

    #[test]
    fn test_json_is_a_plain_object() {
        let tags: Tags = [("Timecode", "01:00:00:00")].into_iter().collect();
        let json = serde_json::to_string(&tags).unwrap();
        assert_eq!(json, r#"{"Timecode":"01:00:00:00"}"#);
        let back: Tags = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tags);
    }
}
