//! Index engine
//!
//! Indexes are derived lookups over the node set. Each one is populated by a
//! full scan and then kept current by replaying every applied atomic
//! operation through the [`IndexAdapter`] contract, so that its content
//! always equals a fresh rebuild.

pub mod custom;
pub mod graph_index;
pub mod manager;

pub use custom::{CustomIndex, KeyFn, SimpleIndex, ValueFn};
pub use graph_index::GraphIndex;
pub use manager::IndexManager;

use crate::graph::{Node, NodeSet, PropertyValue};
use crate::schema::Schema;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

/// Index content as `key -> stored values`, used to compare with a rebuild
pub type IndexContent = BTreeMap<String, BTreeSet<String>>;

/// A change as seen by an index
#[derive(Debug, Clone, Copy)]
pub enum Change<'a> {
    Created(&'a Node),
    Deleted(&'a Node),
    /// A top-level property changed; `node` is the post-change node
    Updated {
        node: &'a Node,
        property: &'a str,
        new: Option<&'a PropertyValue>,
        old: Option<&'a PropertyValue>,
    },
}

/// Incremental update contract
pub trait IndexAdapter {
    fn create(&mut self, node: &Node);

    fn delete(&mut self, node: &Node);

    fn update(&mut self, node: &Node, property: &str, new: Option<&PropertyValue>, old: Option<&PropertyValue>);

    fn apply_change(&mut self, change: &Change<'_>) {
        match *change {
            Change::Created(node) => self.create(node),
            Change::Deleted(node) => self.delete(node),
            Change::Updated { node, property, new, old } => self.update(node, property, new, old),
        }
    }
}

/// A named, queryable index
pub trait Index: IndexAdapter {
    fn name(&self) -> &str;

    /// Stored values in scope; `None` means the whole index
    fn node_ids(&self, scope: Option<&[String]>) -> Vec<String>;

    fn clear(&mut self);

    fn content(&self) -> IndexContent;

    fn rebuild(&mut self, nodes: &NodeSet) {
        self.clear();
        for node in nodes.values() {
            self.create(node);
        }
    }
}

/// Which nodes an index covers
pub enum NodeFilter {
    All,
    /// Allowed type names, already expanded to their descendants
    Types(HashSet<String>),
    Predicate(Box<dyn Fn(&Node) -> bool>),
}

impl NodeFilter {
    /// Allow-list of `types` and every schema type inheriting from them
    pub fn for_types<I, S>(schema: &Schema, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let listed: Vec<String> = types.into_iter().map(Into::into).collect();
        if listed.is_empty() {
            return NodeFilter::All;
        }
        let mut allowed: HashSet<String> = listed.iter().cloned().collect();
        for name in schema.types.keys() {
            if listed.iter().any(|ancestor| schema.is_a(name, ancestor)) {
                allowed.insert(name.clone());
            }
        }
        NodeFilter::Types(allowed)
    }

    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&Node) -> bool + 'static,
    {
        NodeFilter::Predicate(Box::new(f))
    }

    pub fn accepts(&self, node: &Node) -> bool {
        match self {
            NodeFilter::All => true,
            NodeFilter::Types(types) => types.contains(&node.node_type),
            NodeFilter::Predicate(f) => f(node),
        }
    }
}

impl fmt::Debug for NodeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeFilter::All => f.write_str("All"),
            NodeFilter::Types(types) => f.debug_tuple("Types").field(types).finish(),
            NodeFilter::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TypeDef;

    #[test]
    fn test_type_filter_follows_inheritance() {
        let schema = Schema::new()
            .with_type("item", TypeDef::new())
            .with_type("book", TypeDef::new().with_parent("item"))
            .with_type("person", TypeDef::new());
        let filter = NodeFilter::for_types(&schema, ["item"]);
        assert!(filter.accepts(&Node::new("b", "book")));
        assert!(filter.accepts(&Node::new("i", "item")));
        assert!(!filter.accepts(&Node::new("p", "person")));

        let all = NodeFilter::for_types(&schema, Vec::<String>::new());
        assert!(all.accepts(&Node::new("p", "person")));
    }
}
