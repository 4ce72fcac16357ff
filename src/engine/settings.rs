//! Engine settings as an opaque name → JSON value map.
//!
//! The gate never interprets keys or values; the engine owns the recognised
//! set and validates what it is given.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// String-keyed engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EngineSettings(BTreeMap<String, Value>);

impl EngineSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(name.into(), value)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for EngineSettings {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserializes_from_plain_object() {
        let settings: EngineSettings =
            serde_json::from_value(json!({"fast_parser": false, "cache_directory": "/tmp"})).unwrap();
        assert_eq!(settings.len(), 2);
        assert_eq!(settings.get("fast_parser"), Some(&json!(false)));
        assert_eq!(settings.names().collect::<Vec<_>>(), ["cache_directory", "fast_parser"]);
    }

    #[test]
    fn test_collects_from_pairs() {
        let settings: EngineSettings = [("opt", json!("X"))].into_iter().collect();
        assert_eq!(settings.get("opt"), Some(&json!("X")));
        assert!(!settings.is_empty());
    }
}
