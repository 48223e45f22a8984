//! Key/value indexes
//!
//! Both flavors derive a key and a stored value from each node that passes
//! the filter. `CustomIndex` keeps every value per key; `SimpleIndex` keeps
//! one value per key, last write wins.

use super::{Index, IndexAdapter, IndexContent, NodeFilter};
use crate::graph::{Node, PropertyValue};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::debug;

/// Derives the key from a node and the tracked property's value
pub type KeyFn = Box<dyn Fn(&Node, Option<&PropertyValue>) -> Option<String>>;

/// Derives the stored value from a node and the tracked property's value
pub type ValueFn = Box<dyn Fn(&Node, Option<&PropertyValue>) -> String>;

fn property_key() -> KeyFn {
    Box::new(|_: &Node, value: Option<&PropertyValue>| value.map(PropertyValue::key_string))
}

fn type_key() -> KeyFn {
    Box::new(|node: &Node, _: Option<&PropertyValue>| Some(node.node_type.clone()))
}

fn node_id_value() -> ValueFn {
    Box::new(|node: &Node, _: Option<&PropertyValue>| node.id.clone())
}

fn non_null(value: Option<&PropertyValue>) -> Option<&PropertyValue> {
    value.filter(|v| !v.is_null())
}

/// Filter plus key and value derivation, shared by both index flavors
struct KeySpec {
    property: Option<String>,
    filter: NodeFilter,
    key_fn: KeyFn,
    value_fn: ValueFn,
}

impl KeySpec {
    fn entry_for(&self, node: &Node, value: Option<&PropertyValue>) -> Option<(String, String)> {
        let value = non_null(value);
        let key = (self.key_fn)(node, value)?;
        Some((key, (self.value_fn)(node, value)))
    }

    /// Entry for a node as it currently is, if it is covered
    fn entry(&self, node: &Node) -> Option<(String, String)> {
        if !self.filter.accepts(node) {
            return None;
        }
        let tracked = self.property.as_deref().and_then(|p| node.get_property(p));
        self.entry_for(node, tracked)
    }

    /// `(old entry, new entry)` when a change to `property` re-keys the node
    #[allow(clippy::type_complexity)]
    fn rekey(
        &self,
        node: &Node,
        property: &str,
        new: Option<&PropertyValue>,
        old: Option<&PropertyValue>,
    ) -> Option<(Option<(String, String)>, Option<(String, String)>)> {
        if self.property.as_deref() != Some(property) || !self.filter.accepts(node) {
            return None;
        }
        let before = self.entry_for(node, old);
        let after = self.entry_for(node, new);
        (before != after).then_some((before, after))
    }
}

/// Index keeping every stored value per key
pub struct CustomIndex {
    name: String,
    spec: KeySpec,
    entries: BTreeMap<String, Vec<String>>,
}

impl CustomIndex {
    pub fn new(
        name: impl Into<String>,
        property: Option<String>,
        filter: NodeFilter,
        key_fn: KeyFn,
        value_fn: ValueFn,
    ) -> Self {
        Self {
            name: name.into(),
            spec: KeySpec {
                property,
                filter,
                key_fn,
                value_fn,
            },
            entries: BTreeMap::new(),
        }
    }

    /// Node ids keyed by the textual value of `property`
    pub fn on_property(name: impl Into<String>, property: impl Into<String>, filter: NodeFilter) -> Self {
        Self::new(name, Some(property.into()), filter, property_key(), node_id_value())
    }

    /// Node ids keyed by node type
    pub fn on_type(name: impl Into<String>, filter: NodeFilter) -> Self {
        Self::new(name, None, filter, type_key(), node_id_value())
    }

    pub fn get(&self, key: &str) -> &[String] {
        self.entries.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, (key, value): (String, String)) {
        self.entries.entry(key).or_default().push(value);
    }

    fn remove(&mut self, (key, value): (String, String)) {
        if let Some(values) = self.entries.get_mut(&key) {
            if let Some(pos) = values.iter().position(|v| *v == value) {
                values.remove(pos);
            }
            if values.is_empty() {
                self.entries.remove(&key);
            }
        }
    }
}

impl IndexAdapter for CustomIndex {
    fn create(&mut self, node: &Node) {
        if let Some(entry) = self.spec.entry(node) {
            self.insert(entry);
        }
    }

    fn delete(&mut self, node: &Node) {
        if let Some(entry) = self.spec.entry(node) {
            self.remove(entry);
        }
    }

    fn update(&mut self, node: &Node, property: &str, new: Option<&PropertyValue>, old: Option<&PropertyValue>) {
        let Some((before, after)) = self.spec.rekey(node, property, new, old) else {
            return;
        };
        debug!("index {} re-keying {}", self.name, node.id);
        if let Some(entry) = before {
            self.remove(entry);
        }
        if let Some(entry) = after {
            self.insert(entry);
        }
    }
}

impl Index for CustomIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn node_ids(&self, scope: Option<&[String]>) -> Vec<String> {
        match scope {
            Some(scope) => self.get(&scope.join("/")).to_vec(),
            None => {
                let mut seen = HashSet::new();
                self.entries
                    .values()
                    .flatten()
                    .filter(|id| seen.insert(id.as_str()))
                    .cloned()
                    .collect()
            }
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn content(&self) -> IndexContent {
        self.entries
            .iter()
            .map(|(key, values)| (key.clone(), values.iter().cloned().collect::<BTreeSet<_>>()))
            .collect()
    }
}

/// Index keeping a single stored value per key; the latest write wins
pub struct SimpleIndex {
    name: String,
    spec: KeySpec,
    entries: BTreeMap<String, String>,
}

impl SimpleIndex {
    pub fn new(
        name: impl Into<String>,
        property: Option<String>,
        filter: NodeFilter,
        key_fn: KeyFn,
        value_fn: ValueFn,
    ) -> Self {
        Self {
            name: name.into(),
            spec: KeySpec {
                property,
                filter,
                key_fn,
                value_fn,
            },
            entries: BTreeMap::new(),
        }
    }

    pub fn on_property(name: impl Into<String>, property: impl Into<String>, filter: NodeFilter) -> Self {
        Self::new(name, Some(property.into()), filter, property_key(), node_id_value())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn remove(&mut self, (key, value): (String, String)) {
        if self.entries.get(&key) == Some(&value) {
            self.entries.remove(&key);
        }
    }
}

impl IndexAdapter for SimpleIndex {
    fn create(&mut self, node: &Node) {
        if let Some((key, value)) = self.spec.entry(node) {
            self.entries.insert(key, value);
        }
    }

    fn delete(&mut self, node: &Node) {
        if let Some(entry) = self.spec.entry(node) {
            self.remove(entry);
        }
    }

    fn update(&mut self, node: &Node, property: &str, new: Option<&PropertyValue>, old: Option<&PropertyValue>) {
        let Some((before, after)) = self.spec.rekey(node, property, new, old) else {
            return;
        };
        if let Some(entry) = before {
            self.remove(entry);
        }
        if let Some((key, value)) = after {
            self.entries.insert(key, value);
        }
    }
}

impl Index for SimpleIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn node_ids(&self, scope: Option<&[String]>) -> Vec<String> {
        match scope {
            Some(scope) => self.get(&scope.join("/")).map(str::to_string).into_iter().collect(),
            None => self.entries.values().cloned().collect(),
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn content(&self) -> IndexContent {
        self.entries
            .iter()
            .map(|(key, value)| (key.clone(), BTreeSet::from([value.clone()])))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, category: &str) -> Node {
        Node::new(id, "item").with_property("category", category)
    }

    #[test]
    fn test_custom_index_rekeys_on_update() {
        let mut index = CustomIndex::on_property("by_category", "category", NodeFilter::All);
        let mut a = item("a", "foo");
        index.create(&a);
        index.create(&item("b", "foo"));
        assert_eq!(index.get("foo"), ["a", "b"]);

        let old = a.set_property("category", "bar");
        index.update(&a, "category", a.get_property("category"), old.as_ref());
        assert_eq!(index.get("foo"), ["b"]);
        assert_eq!(index.get("bar"), ["a"]);

        // untracked properties are ignored
        index.update(&a, "title", Some(&"x".into()), None);
        assert_eq!(index.len(), 2);

        index.delete(&a);
        assert!(index.get("bar").is_empty());
        assert_eq!(index.node_ids(None), vec!["b"]);
    }

    #[test]
    fn test_custom_index_filter_and_key_fn() {
        let first_letter: KeyFn = Box::new(|_: &Node, value: Option<&PropertyValue>| {
            value.and_then(PropertyValue::as_str).and_then(|s| s.chars().next()).map(String::from)
        });
        let mut index = CustomIndex::new(
            "initials",
            Some("name".to_string()),
            NodeFilter::predicate(|node| node.node_type == "person"),
            first_letter,
            Box::new(|node: &Node, _: Option<&PropertyValue>| node.id.clone()),
        );
        index.create(&Node::new("p1", "person").with_property("name", "Ada"));
        index.create(&Node::new("p2", "person").with_property("name", "Alan"));
        index.create(&Node::new("d1", "doc").with_property("name", "Appendix"));
        index.create(&Node::new("p3", "person"));
        assert_eq!(index.node_ids(Some(&["A".to_string()])), vec!["p1", "p2"]);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_type_index() {
        let mut index = CustomIndex::on_type("by_type", NodeFilter::All);
        index.create(&Node::new("a", "item"));
        index.create(&Node::new("p", "person"));
        assert_eq!(index.get("person"), ["p"]);
        // type index ignores property updates
        index.update(&Node::new("a", "item"), "category", Some(&"x".into()), None);
        assert_eq!(index.get("item"), ["a"]);
    }

    #[test]
    fn test_simple_index_last_write_wins() {
        let mut index = SimpleIndex::on_property("by_email", "email", NodeFilter::All);
        let a = Node::new("a", "user").with_property("email", "x@example.com");
        let b = Node::new("b", "user").with_property("email", "x@example.com");
        index.create(&a);
        index.create(&b);
        assert_eq!(index.get("x@example.com"), Some("b"));

        // deleting the overwritten node leaves the winner in place
        index.delete(&a);
        assert_eq!(index.get("x@example.com"), Some("b"));
        index.delete(&b);
        assert!(index.is_empty());
    }

    #[test]
    fn test_rebuild_matches_incremental() {
        let mut nodes = crate::graph::NodeSet::new();
        for (id, cat) in [("a", "foo"), ("b", "bar"), ("c", "foo")] {
            nodes.insert(id.to_string(), item(id, cat));
        }
        let mut incremental = CustomIndex::on_property("c", "category", NodeFilter::All);
        for node in nodes.values() {
            incremental.create(node);
        }
        let mut rebuilt = CustomIndex::on_property("c", "category", NodeFilter::All);
        rebuilt.rebuild(&nodes);
        assert_eq!(incremental.content(), rebuilt.content());
    }
}
