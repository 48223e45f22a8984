//! Manager for named indexes
//!
//! Handles creation, removal, and access to indexes, and dispatches every
//! applied change to all of them.

use super::{Change, CustomIndex, Index, IndexContent, NodeFilter};
use crate::graph::NodeSet;
use crate::schema::Schema;
use indexmap::IndexMap;
use std::fmt;
use tracing::{debug, info};

/// Owner of all indexes of a graph, keyed by name
#[derive(Default)]
pub struct IndexManager {
    indexes: IndexMap<String, Box<dyn Index>>,
}

impl IndexManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes declared by the schema: a property index per declaration with
    /// a `property`, a type index otherwise
    pub fn from_schema(schema: &Schema) -> Self {
        let mut manager = Self::new();
        for (name, spec) in &schema.indexes {
            let filter = NodeFilter::for_types(schema, spec.types.iter().cloned());
            let index = match &spec.property {
                Some(property) => CustomIndex::on_property(name.clone(), property.clone(), filter),
                None => CustomIndex::on_type(name.clone(), filter),
            };
            manager.add(index);
        }
        manager
    }

    /// Register an index, replacing any index with the same name. The index
    /// is not populated; call `rebuild` or use `Graph::add_index`.
    pub fn add<I: Index + 'static>(&mut self, index: I) {
        let name = index.name().to_string();
        debug!("registering index {}", name);
        self.indexes.insert(name, Box::new(index));
    }

    /// Drop an index
    pub fn drop_index(&mut self, name: &str) -> bool {
        self.indexes.shift_remove(name).is_some()
    }

    pub fn has_index(&self, name: &str) -> bool {
        self.indexes.contains_key(name)
    }

    /// Get index for querying
    pub fn get(&self, name: &str) -> Option<&dyn Index> {
        self.indexes.get(name).map(|index| index.as_ref())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.indexes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    /// Replay one change into every index
    pub fn on_change(&mut self, change: &Change<'_>) {
        for index in self.indexes.values_mut() {
            index.apply_change(change);
        }
    }

    /// Full rescan of one index
    pub fn rebuild(&mut self, name: &str, nodes: &NodeSet) -> bool {
        match self.indexes.get_mut(name) {
            Some(index) => {
                index.rebuild(nodes);
                true
            }
            None => false,
        }
    }

    pub fn rebuild_all(&mut self, nodes: &NodeSet) {
        for index in self.indexes.values_mut() {
            index.rebuild(nodes);
        }
        info!("rebuilt {} indexes over {} nodes", self.indexes.len(), nodes.len());
    }

    /// Content of every index, by name
    pub fn snapshot(&self) -> IndexMap<String, IndexContent> {
        self.indexes
            .iter()
            .map(|(name, index)| (name.clone(), index.content()))
            .collect()
    }
}

impl fmt::Debug for IndexManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexManager")
            .field("indexes", &self.indexes.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Node;
    use crate::index::GraphIndex;

    fn schema() -> Schema {
        Schema::from_json(
            r#"{
                "indexes": {
                    "by_category": {"types": ["item"], "property": "category"},
                    "by_type": {}
                },
                "types": {
                    "item": {"properties": {"category": "string"}},
                    "book": {"parent": "item"},
                    "person": {"properties": {"category": "string"}}
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_from_schema_and_dispatch() {
        let mut manager = IndexManager::from_schema(&schema());
        assert_eq!(manager.names().collect::<Vec<_>>(), vec!["by_category", "by_type"]);

        let book = Node::new("b1", "book").with_property("category", "foo");
        let person = Node::new("p1", "person").with_property("category", "foo");
        manager.on_change(&Change::Created(&book));
        manager.on_change(&Change::Created(&person));

        let by_category = manager.get("by_category").unwrap();
        assert_eq!(by_category.node_ids(Some(&["foo".to_string()])), vec!["b1"]);
        let by_type = manager.get("by_type").unwrap();
        assert_eq!(by_type.node_ids(None), vec!["b1", "p1"]);

        manager.on_change(&Change::Deleted(&book));
        assert!(manager.get("by_category").unwrap().node_ids(None).is_empty());
    }

    #[test]
    fn test_add_drop_rebuild() {
        let mut nodes = NodeSet::new();
        nodes.insert("n1".into(), Node::new("n1", "item").with_property("category", "bar"));

        let mut manager = IndexManager::new();
        manager.add(GraphIndex::new("tree", "category", NodeFilter::All));
        assert!(manager.get("tree").unwrap().node_ids(None).is_empty());
        assert!(manager.rebuild("tree", &nodes));
        assert_eq!(manager.get("tree").unwrap().node_ids(Some(&["bar".to_string()])), vec!["n1"]);

        assert!(!manager.rebuild("missing", &nodes));
        assert!(manager.drop_index("tree"));
        assert!(manager.is_empty());
    }
}
