//! Ordered key/value payload carried by wants and saved ability state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single typed parameter value.
///
/// Untagged on the wire: `5` parses as `Int`, `5.5` as `Double`, arrays of
/// strings before arrays of integers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PacValue {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
    StrVec(Vec<String>),
    IntVec(Vec<i64>),
}

/// String-keyed parameter map with stable iteration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PacMap {
    entries: BTreeMap<String, PacValue>,
}

impl PacMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: PacValue) {
        self.entries.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&PacValue> {
        self.entries.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<PacValue> {
        self.entries.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn put_string(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.insert(key, PacValue::Str(value.into()));
    }

    pub fn put_int(&mut self, key: impl Into<String>, value: i64) {
        self.insert(key, PacValue::Int(value));
    }

    pub fn put_bool(&mut self, key: impl Into<String>, value: bool) {
        self.insert(key, PacValue::Bool(value));
    }

    pub fn put_double(&mut self, key: impl Into<String>, value: f64) {
        self.insert(key, PacValue::Double(value));
    }

    pub fn put_string_vec(&mut self, key: impl Into<String>, value: Vec<String>) {
        self.insert(key, PacValue::StrVec(value));
    }

    pub fn put_int_vec(&mut self, key: impl Into<String>, value: Vec<i64>) {
        self.insert(key, PacValue::IntVec(value));
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        match self.entries.get(key) {
            Some(PacValue::Str(value)) => Some(value),
            _ => None,
        }
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.entries.get(key) {
            Some(PacValue::Int(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.entries.get(key) {
            Some(PacValue::Bool(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn get_double(&self, key: &str) -> Option<f64> {
        match self.entries.get(key) {
            Some(PacValue::Double(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn get_string_vec(&self, key: &str) -> Option<&[String]> {
        match self.entries.get(key) {
            Some(PacValue::StrVec(value)) => Some(value),
            _ => None,
        }
    }

    pub fn get_int_vec(&self, key: &str) -> Option<&[i64]> {
        match self.entries.get(key) {
            Some(PacValue::IntVec(value)) => Some(value),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_accessors_round_trip() {
        let mut map = PacMap::new();
        map.put_string("name", "notes");
        map.put_int("count", 3);
        map.put_bool("dirty", true);
        map.put_double("ratio", 0.5);
        map.put_string_vec("tags", vec!["a".to_string(), "b".to_string()]);
        map.put_int_vec("grants", vec![0, -1]);

        assert_eq!(map.get_string("name"), Some("notes"));
        assert_eq!(map.get_int("count"), Some(3));
        assert_eq!(map.get_bool("dirty"), Some(true));
        assert_eq!(map.get_double("ratio"), Some(0.5));
        assert_eq!(map.get_string_vec("tags").map(|v| v.len()), Some(2));
        assert_eq!(map.get_int_vec("grants"), Some(&[0, -1][..]));
        assert_eq!(map.len(), 6);
    }

    #[test]
    fn typed_accessor_rejects_wrong_type() {
        let mut map = PacMap::new();
        map.put_int("count", 3);
        assert_eq!(map.get_string("count"), None);
        assert_eq!(map.get_int("missing"), None);
    }

    #[test]
    fn json_distinguishes_int_and_double() {
        let map: PacMap = serde_json::from_str(r#"{"a": 5, "b": 5.5}"#).unwrap();
        assert_eq!(map.get_int("a"), Some(5));
        assert_eq!(map.get_double("b"), Some(5.5));
    }

    #[test]
    fn json_distinguishes_string_and_int_arrays() {
        let map: PacMap = serde_json::from_str(r#"{"s": ["x"], "i": [1, 2]}"#).unwrap();
        assert_eq!(map.get_string_vec("s").map(|v| v.len()), Some(1));
        assert_eq!(map.get_int_vec("i"), Some(&[1, 2][..]));
    }

    #[test]
    fn serializes_transparently() {
        let mut map = PacMap::new();
        map.put_string("k", "v");
        assert_eq!(serde_json::to_string(&map).unwrap(), r#"{"k":"v"}"#);
    }
}
