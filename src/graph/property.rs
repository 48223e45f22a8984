//! Property value types for graph nodes
//!
//! Values are JSON-shaped: scalars, dates, arrays and insertion-ordered objects.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Property value stored inside a node
///
/// Supports:
/// - Null
/// - Boolean
/// - Number (f64, as in JSON)
/// - String
/// - Array (Vec<PropertyValue>)
/// - Object (insertion-ordered map)
/// - Date (UTC timestamp, serialized as RFC 3339)
///
/// Deserialization is untagged, so a date read back from JSON arrives as a
/// `String`; `schema::parse_value` turns it back into a `Date` when the
/// property is declared as one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    Array(Vec<PropertyValue>),
    Object(PropertyMap),
    Date(DateTime<Utc>),
}

/// Property map for storing node properties and object values
pub type PropertyMap = IndexMap<String, PropertyValue>;

impl PropertyValue {
    /// Check if value is null
    pub fn is_null(&self) -> bool {
        matches!(self, PropertyValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            PropertyValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            PropertyValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<&DateTime<Utc>> {
        match self {
            PropertyValue::Date(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<PropertyValue>> {
        match self {
            PropertyValue::Array(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut Vec<PropertyValue>> {
        match self {
            PropertyValue::Array(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&PropertyMap> {
        match self {
            PropertyValue::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut PropertyMap> {
        match self {
            PropertyValue::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Get type name as string, using the schema's scalar tags
    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyValue::Null => "null",
            PropertyValue::Boolean(_) => "boolean",
            PropertyValue::Number(_) => "number",
            PropertyValue::String(_) => "string",
            PropertyValue::Array(_) => "array",
            PropertyValue::Object(_) => "object",
            PropertyValue::Date(_) => "date",
        }
    }

    /// Textual form used as an index key. Strings are taken verbatim,
    /// everything else uses its JSON rendering.
    pub fn key_string(&self) -> String {
        match self {
            PropertyValue::String(s) => s.clone(),
            PropertyValue::Date(d) => d.to_rfc3339(),
            other => other.to_json().to_string(),
        }
    }

    /// Direct child by key. Arrays are addressed by decimal index.
    pub fn child(&self, key: &str) -> Option<&PropertyValue> {
        match self {
            PropertyValue::Object(map) => map.get(key),
            PropertyValue::Array(arr) => key.parse::<usize>().ok().and_then(|i| arr.get(i)),
            _ => None,
        }
    }

    pub fn child_mut(&mut self, key: &str) -> Option<&mut PropertyValue> {
        match self {
            PropertyValue::Object(map) => map.get_mut(key),
            PropertyValue::Array(arr) => key
                .parse::<usize>()
                .ok()
                .and_then(move |i| arr.get_mut(i)),
            _ => None,
        }
    }

    /// Follow a key path below this value
    pub fn get_path<S: AsRef<str>>(&self, keys: &[S]) -> Option<&PropertyValue> {
        keys.iter()
            .try_fold(self, |value, key| value.child(key.as_ref()))
    }

    pub fn get_path_mut<S: AsRef<str>>(&mut self, keys: &[S]) -> Option<&mut PropertyValue> {
        let mut current = self;
        for key in keys {
            current = current.child_mut(key.as_ref())?;
        }
        Some(current)
    }

    /// Insert or replace a direct child, returning the previous value.
    ///
    /// For arrays the key must be an existing index or exactly the length
    /// (append). Returns `None` from the outer option if this value cannot
    /// hold the key.
    pub fn insert_child(&mut self, key: &str, value: PropertyValue) -> Option<Option<PropertyValue>> {
        match self {
            PropertyValue::Object(map) => Some(map.insert(key.to_string(), value)),
            PropertyValue::Array(arr) => {
                let index = key.parse::<usize>().ok()?;
                if index < arr.len() {
                    Some(Some(std::mem::replace(&mut arr[index], value)))
                } else if index == arr.len() {
                    arr.push(value);
                    Some(None)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Remove a direct child
    pub fn remove_child(&mut self, key: &str) -> Option<PropertyValue> {
        match self {
            PropertyValue::Object(map) => map.shift_remove(key),
            PropertyValue::Array(arr) => {
                let index = key.parse::<usize>().ok()?;
                (index < arr.len()).then(|| arr.remove(index))
            }
            _ => None,
        }
    }

    /// Convert into a `serde_json::Value`
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            PropertyValue::Null => serde_json::Value::Null,
            PropertyValue::Boolean(b) => serde_json::Value::Bool(*b),
            PropertyValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            PropertyValue::String(s) => serde_json::Value::String(s.clone()),
            PropertyValue::Date(d) => serde_json::Value::String(d.to_rfc3339()),
            PropertyValue::Array(arr) => {
                serde_json::Value::Array(arr.iter().map(PropertyValue::to_json).collect())
            }
            PropertyValue::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    /// Build from a `serde_json::Value`
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => PropertyValue::Null,
            serde_json::Value::Bool(b) => PropertyValue::Boolean(b),
            serde_json::Value::Number(n) => PropertyValue::Number(n.as_f64().unwrap_or_default()),
            serde_json::Value::String(s) => PropertyValue::String(s),
            serde_json::Value::Array(arr) => {
                PropertyValue::Array(arr.into_iter().map(PropertyValue::from_json).collect())
            }
            serde_json::Value::Object(map) => PropertyValue::Object(
                map.into_iter()
                    .map(|(k, v)| (k, PropertyValue::from_json(v)))
                    .collect(),
            ),
        }
    }
}

impl Default for PropertyValue {
    fn default() -> Self {
        PropertyValue::Null
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::String(s) => write!(f, "\"{}\"", s),
            PropertyValue::Number(n) => write!(f, "{}", n),
            PropertyValue::Boolean(b) => write!(f, "{}", b),
            PropertyValue::Date(d) => write!(f, "Date({})", d.to_rfc3339()),
            PropertyValue::Array(arr) => {
                write!(f, "[")?;
                for (i, val) in arr.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", val)?;
                }
                write!(f, "]")
            }
            PropertyValue::Object(map) => {
                write!(f, "{{")?;
                for (i, (key, val)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, val)?;
                }
                write!(f, "}}")
            }
            PropertyValue::Null => write!(f, "null"),
        }
    }
}

// Convenience conversions
impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::String(s)
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::String(s.to_string())
    }
}

impl From<f64> for PropertyValue {
    fn from(n: f64) -> Self {
        PropertyValue::Number(n)
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        PropertyValue::Number(i as f64)
    }
}

impl From<i32> for PropertyValue {
    fn from(i: i32) -> Self {
        PropertyValue::Number(f64::from(i))
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Boolean(b)
    }
}

impl From<DateTime<Utc>> for PropertyValue {
    fn from(d: DateTime<Utc>) -> Self {
        PropertyValue::Date(d)
    }
}

impl From<Vec<PropertyValue>> for PropertyValue {
    fn from(arr: Vec<PropertyValue>) -> Self {
        PropertyValue::Array(arr)
    }
}

impl From<PropertyMap> for PropertyValue {
    fn from(map: PropertyMap) -> Self {
        PropertyValue::Object(map)
    }
}

impl From<serde_json::Value> for PropertyValue {
    fn from(value: serde_json::Value) -> Self {
        PropertyValue::from_json(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_property_value_types() {
        assert_eq!(PropertyValue::String("test".to_string()).type_name(), "string");
        assert_eq!(PropertyValue::Number(42.0).type_name(), "number");
        assert_eq!(PropertyValue::Boolean(true).type_name(), "boolean");
        assert_eq!(PropertyValue::Date(Utc::now()).type_name(), "date");
        assert_eq!(PropertyValue::Array(vec![]).type_name(), "array");
        assert_eq!(PropertyValue::Object(PropertyMap::new()).type_name(), "object");
        assert_eq!(PropertyValue::Null.type_name(), "null");
    }

    #[test]
    fn test_property_value_conversions() {
        let string_prop: PropertyValue = "hello".into();
        assert_eq!(string_prop.as_str(), Some("hello"));

        let int_prop: PropertyValue = 42i64.into();
        assert_eq!(int_prop.as_number(), Some(42.0));

        let bool_prop: PropertyValue = true.into();
        assert_eq!(bool_prop.as_boolean(), Some(true));
    }

    #[test]
    fn test_json_roundtrip_keeps_order() {
        let value = PropertyValue::from_json(json!({"b": 1, "a": [true, null, "x"]}));
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(value.to_json(), json!({"b": 1.0, "a": [true, null, "x"]}));
    }

    #[test]
    fn test_untagged_deserialize() {
        let value: PropertyValue = serde_json::from_str(r#"{"n": 3, "s": "x"}"#).unwrap();
        assert_eq!(value.child("n"), Some(&PropertyValue::Number(3.0)));
        assert_eq!(value.child("s"), Some(&PropertyValue::String("x".into())));
    }

    #[test]
    fn test_nested_paths() {
        let mut value = PropertyValue::from_json(json!({"list": [{"name": "a"}]}));
        assert_eq!(
            value.get_path(&["list", "0", "name"]).and_then(PropertyValue::as_str),
            Some("a")
        );
        assert!(value.get_path(&["list", "3"]).is_none());

        let list = value.get_path_mut(&["list"]).unwrap();
        assert_eq!(list.insert_child("1", 7i64.into()), Some(None));
        assert_eq!(list.insert_child("5", 7i64.into()), None);
        assert_eq!(list.remove_child("0").unwrap().child("name").unwrap().as_str(), Some("a"));
        assert_eq!(list.as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_key_string() {
        assert_eq!(PropertyValue::from("bla").key_string(), "bla");
        assert_eq!(PropertyValue::from(true).key_string(), "true");
    }
}
