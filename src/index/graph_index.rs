//! Hierarchical index
//!
//! Nodes are placed in a tree of scopes by the value of one property: a
//! string is a one-segment scope path, an array of strings a multi-segment
//! one, and a missing value places the node at the root. Looking up a scope
//! returns every node at or below it.

use super::{Index, IndexAdapter, IndexContent, NodeFilter};
use crate::graph::{Node, PropertyValue};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

#[derive(Debug, Default)]
struct Scope {
    ids: BTreeSet<String>,
    children: BTreeMap<String, Scope>,
}

impl Scope {
    fn insert(&mut self, path: &[String], id: &str) {
        match path.split_first() {
            None => {
                self.ids.insert(id.to_string());
            }
            Some((head, rest)) => self.children.entry(head.clone()).or_default().insert(rest, id),
        }
    }

    /// Remove `id` at `path`, pruning scopes left empty
    fn remove(&mut self, path: &[String], id: &str) -> bool {
        match path.split_first() {
            None => self.ids.remove(id),
            Some((head, rest)) => {
                let Some(child) = self.children.get_mut(head) else {
                    return false;
                };
                let removed = child.remove(rest, id);
                if child.is_empty() {
                    self.children.remove(head);
                }
                removed
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.ids.is_empty() && self.children.is_empty()
    }

    fn find(&self, path: &[String]) -> Option<&Scope> {
        match path.split_first() {
            None => Some(self),
            Some((head, rest)) => self.children.get(head)?.find(rest),
        }
    }

    fn collect(&self, out: &mut Vec<String>) {
        out.extend(self.ids.iter().cloned());
        for child in self.children.values() {
            child.collect(out);
        }
    }

    fn flatten(&self, prefix: &mut Vec<String>, out: &mut IndexContent) {
        if !self.ids.is_empty() {
            out.insert(prefix.join("/"), self.ids.clone());
        }
        for (segment, child) in &self.children {
            prefix.push(segment.clone());
            child.flatten(prefix, out);
            prefix.pop();
        }
    }
}

/// Scope path derived from a property value
pub fn scope_path(value: Option<&PropertyValue>) -> Vec<String> {
    match value {
        None | Some(PropertyValue::Null) => Vec::new(),
        Some(PropertyValue::Array(items)) => items.iter().map(PropertyValue::key_string).collect(),
        Some(other) => vec![other.key_string()],
    }
}

/// Tree of scopes keyed by one property
pub struct GraphIndex {
    name: String,
    property: String,
    filter: NodeFilter,
    root: Scope,
}

impl GraphIndex {
    pub fn new(name: impl Into<String>, property: impl Into<String>, filter: NodeFilter) -> Self {
        Self {
            name: name.into(),
            property: property.into(),
            filter,
            root: Scope::default(),
        }
    }

    pub fn property(&self) -> &str {
        &self.property
    }

    /// Ids at or below `path`
    pub fn get<S: AsRef<str>>(&self, path: &[S]) -> Vec<String> {
        let path: Vec<String> = path.iter().map(|s| s.as_ref().to_string()).collect();
        let mut out = Vec::new();
        if let Some(scope) = self.root.find(&path) {
            scope.collect(&mut out);
        }
        out
    }
}

impl IndexAdapter for GraphIndex {
    fn create(&mut self, node: &Node) {
        if self.filter.accepts(node) {
            let path = scope_path(node.get_property(&self.property));
            self.root.insert(&path, &node.id);
        }
    }

    fn delete(&mut self, node: &Node) {
        if self.filter.accepts(node) {
            let path = scope_path(node.get_property(&self.property));
            self.root.remove(&path, &node.id);
        }
    }

    fn update(&mut self, node: &Node, property: &str, new: Option<&PropertyValue>, old: Option<&PropertyValue>) {
        if property != self.property || !self.filter.accepts(node) {
            return;
        }
        let (before, after) = (scope_path(old), scope_path(new));
        if before == after {
            return;
        }
        debug!("index {} moving {} to /{}", self.name, node.id, after.join("/"));
        self.root.remove(&before, &node.id);
        self.root.insert(&after, &node.id);
    }
}

impl Index for GraphIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn node_ids(&self, scope: Option<&[String]>) -> Vec<String> {
        self.get(scope.unwrap_or_default())
    }

    fn clear(&mut self) {
        self.root = Scope::default();
    }

    fn content(&self) -> IndexContent {
        let mut out = IndexContent::new();
        self.root.flatten(&mut Vec::new(), &mut out);
        out
    }
}
