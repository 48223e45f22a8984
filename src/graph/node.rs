//! Node implementation
//!
//! A node is a typed record: a unique string id, a schema type name and a
//! property map. It serializes flat, `{"id": .., "type": .., <properties>}`,
//! which is also the shape carried by Create/Delete operations.

use super::property::{PropertyMap, PropertyValue};
use serde::{Deserialize, Serialize};

/// Node set owned by a graph, in insertion order
pub type NodeSet = indexmap::IndexMap<String, Node>;

/// A typed record in the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier for this node; seeds may leave it to the map key
    #[serde(default)]
    pub id: String,

    /// Schema type name
    #[serde(rename = "type")]
    pub node_type: String,

    /// Properties associated with this node
    #[serde(flatten)]
    pub properties: PropertyMap,
}

impl Node {
    /// Create a new node without properties
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        Node {
            id: id.into(),
            node_type: node_type.into(),
            properties: PropertyMap::new(),
        }
    }

    /// Builder-style property setter
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Set a property value
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Option<PropertyValue> {
        self.properties.insert(key.into(), value.into())
    }

    /// Get a property value
    pub fn get_property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// Remove a property
    pub fn remove_property(&mut self, key: &str) -> Option<PropertyValue> {
        self.properties.shift_remove(key)
    }

    /// Check if property exists
    pub fn has_property(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    /// Get number of properties
    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    /// Value at a key path below the node's top level
    pub fn get_path<S: AsRef<str>>(&self, keys: &[S]) -> Option<&PropertyValue> {
        let (first, rest) = keys.split_first()?;
        self.properties.get(first.as_ref())?.get_path(rest)
    }

    pub fn get_path_mut<S: AsRef<str>>(&mut self, keys: &[S]) -> Option<&mut PropertyValue> {
        let (first, rest) = keys.split_first()?;
        self.properties.get_mut(first.as_ref())?.get_path_mut(rest)
    }

    /// Insert or replace the value at a key path. The container holding the
    /// last key must already exist. Returns the previous value, or `None` in
    /// the outer option when the container is missing.
    pub fn set_path<S: AsRef<str>>(&mut self, keys: &[S], value: PropertyValue) -> Option<Option<PropertyValue>> {
        let (last, parents) = keys.split_last()?;
        if parents.is_empty() {
            return Some(self.properties.insert(last.as_ref().to_string(), value));
        }
        self.get_path_mut(parents)?.insert_child(last.as_ref(), value)
    }

    /// Remove the value at a key path
    pub fn remove_path<S: AsRef<str>>(&mut self, keys: &[S]) -> Option<PropertyValue> {
        let (last, parents) = keys.split_last()?;
        if parents.is_empty() {
            return self.properties.shift_remove(last.as_ref());
        }
        self.get_path_mut(parents)?.remove_child(last.as_ref())
    }

    /// Flat object form, as carried by operations
    pub fn to_value(&self) -> PropertyValue {
        let mut map = PropertyMap::with_capacity(self.properties.len() + 2);
        map.insert("id".to_string(), PropertyValue::String(self.id.clone()));
        map.insert("type".to_string(), PropertyValue::String(self.node_type.clone()));
        for (key, value) in &self.properties {
            map.insert(key.clone(), value.clone());
        }
        PropertyValue::Object(map)
    }

    /// Rebuild a node from its flat object form. Returns `None` if the value
    /// is not an object or lacks a string `id`/`type`.
    pub fn from_value(value: &PropertyValue) -> Option<Node> {
        let map = value.as_object()?;
        let id = map.get("id")?.as_str()?.to_string();
        let node_type = map.get("type")?.as_str()?.to_string();
        let properties = map
            .iter()
            .filter(|(key, _)| key.as_str() != "id" && key.as_str() != "type")
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Some(Node {
            id,
            node_type,
            properties,
        })
    }
}
