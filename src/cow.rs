//! Copy-on-write graph
//!
//! A speculative view over a base [`Graph`]. Reads fall through to the base
//! until a node is first written; the node is then cloned into a shadow slot
//! and every later access uses the shadow. Deleted nodes leave a tombstone.
//! The base is never touched: the recorded operations are handed to
//! [`Graph::commit`] or dropped with [`CowGraph::discard`].

use crate::graph::store::{canonical, decode_node, update_operation};
use crate::graph::{
    Graph, GraphError, GraphEvent, GraphResult, ListenerId, ListenerRegistry, Node, NodeLookup,
    OperationFilter, Property, PropertyKind, PropertyValue,
};
use crate::operation::{Diff, DiffInput, ObjectAdapter, Operation, OperationError, OperationResult};
use rustc_hash::FxHashMap;
use tracing::debug;

/// Slot in the shadow arena
#[derive(Debug, Clone)]
enum Shadow {
    Node(Node),
    Deleted,
}

/// Isolated writable view over a graph
pub struct CowGraph<'a> {
    base: &'a Graph,
    shadows: FxHashMap<String, Shadow>,
    changes: Vec<Operation>,
    listeners: ListenerRegistry,
}

impl<'a> CowGraph<'a> {
    pub fn new(base: &'a Graph) -> Self {
        Self {
            base,
            shadows: FxHashMap::default(),
            changes: Vec::new(),
            listeners: ListenerRegistry::new(),
        }
    }

    pub fn base(&self) -> &Graph {
        self.base
    }

    /// Resolve a path against the view
    pub fn resolve<S: AsRef<str>>(&self, path: &[S]) -> GraphResult<Property> {
        Property::resolve(self, self.base.schema(), path)
    }

    /// Value at `path` as seen through the view, defaulted but never written
    /// back
    pub fn get<S: AsRef<str>>(&self, path: &[S]) -> GraphResult<Option<PropertyValue>> {
        let prop = self.resolve(path)?;
        let Some(node) = self.node(&prop.node_id) else {
            return Ok(None);
        };
        match prop.kind {
            PropertyKind::Empty => Ok(None),
            PropertyKind::Node => Ok(Some(node.to_value())),
            _ => {
                Ok(prop.ensure(prop.read(node).cloned()))
            }
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    /// True once `id` has been copied or tombstoned
    pub fn is_shadowed(&self, id: &str) -> bool {
        self.shadows.contains_key(id)
    }

    pub fn shadow_count(&self) -> usize {
        self.shadows.len()
    }

    pub fn create(&mut self, node: Node) -> GraphResult<Operation> {
        let node = self.base.prepare_node(node)?;
        if self.contains(&node.id) {
            return Err(GraphError::NodeAlreadyExists(node.id));
        }
        self.apply(Operation::create_node(&node))
    }

    pub fn delete(&mut self, id: &str) -> GraphResult<Operation> {
        let node = self
            .node(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))?;
        let op = Operation::delete_node(node);
        self.apply(op)
    }

    pub fn update<S: AsRef<str>>(&mut self, path: &[S], diff: impl Into<DiffInput>) -> GraphResult<Operation> {
        let prop = self.resolve(path)?;
        let op = update_operation(&*self, &prop, diff.into())?;
        self.apply(op)
    }

    pub fn set<S: AsRef<str>>(&mut self, path: &[S], value: impl Into<PropertyValue>) -> GraphResult<Operation> {
        let prop = self.resolve(path)?;
        let op = self.base.set_operation(&*self, &prop, value.into())?;
        self.apply(op)
    }

    /// Apply an operation to the view and record it for commit
    pub fn apply(&mut self, op: Operation) -> GraphResult<Operation> {
        for child in op.atomic_ops() {
            let child = canonical(&*self, self.base.schema(), child)?;
            child.apply(self)?;
            debug!("cow applied {}", child);
            self.listeners
                .emit(&GraphEvent::OperationApplied(&child))
                .map_err(|e| GraphError::Listener(format!("{:#}", e)))?;
            self.changes.push(child);
        }
        Ok(op)
    }

    pub fn bind<F>(&mut self, filter: OperationFilter, listener: F) -> ListenerId
    where
        F: FnMut(&GraphEvent<'_>) -> anyhow::Result<()> + 'static,
    {
        self.listeners.bind(filter, listener)
    }

    pub fn unbind(&mut self, id: ListenerId) -> bool {
        self.listeners.unbind(id)
    }

    /// Operations applied so far, in order
    pub fn changes(&self) -> &[Operation] {
        &self.changes
    }

    /// Drop every shadow and recorded change
    pub fn discard(&mut self) {
        debug!("discarding {} shadows and {} changes", self.shadows.len(), self.changes.len());
        self.shadows.clear();
        self.changes.clear();
    }

    /// Recorded operations, ready for [`Graph::commit`]
    pub fn into_changes(self) -> Vec<Operation> {
        self.changes
    }

    /// Writable copy of `id`, shadowing it on first access
    fn shadow(&mut self, id: &str) -> OperationResult<&mut Node> {
        if !self.shadows.contains_key(id) {
            let node = self
                .base
                .node(id)
                .cloned()
                .ok_or_else(|| OperationError::NotFound(id.to_string()))?;
            debug!("shadowing node {}", id);
            self.shadows.insert(id.to_string(), Shadow::Node(node));
        }
        match self.shadows.get_mut(id) {
            Some(Shadow::Node(node)) => Ok(node),
            _ => Err(OperationError::NotFound(id.to_string())),
        }
    }

    fn property(&self, path: &[String]) -> OperationResult<Property> {
        let prop = self
            .resolve(path)
            .map_err(|_| OperationError::InvalidPath(path.to_vec()))?;
        if prop.is_empty() {
            return Err(OperationError::NotFound(path.join(".")));
        }
        Ok(prop)
    }

    fn decode_node(&self, path: &[String], value: &PropertyValue) -> OperationResult<Node> {
        decode_node(self.base.schema(), self.base.config().strict_types, path, value)
    }
}

impl NodeLookup for CowGraph<'_> {
    fn node(&self, id: &str) -> Option<&Node> {
        match self.shadows.get(id) {
            Some(Shadow::Node(node)) => Some(node),
            Some(Shadow::Deleted) => None,
            None => self.base.node(id),
        }
    }
}

impl ObjectAdapter for CowGraph<'_> {
    fn get(&self, path: &[String]) -> Option<PropertyValue> {
        if let [id] = path {
            return self.node(id).map(Node::to_value);
        }
        let prop = self.property(path).ok()?;
        self.node(&prop.node_id).and_then(|node| prop.read(node)).cloned()
    }

    fn create(&mut self, path: &[String], value: &PropertyValue) -> OperationResult<()> {
        if path.len() == 1 {
            let node = self.decode_node(path, value)?;
            if self.contains(&node.id) {
                return Err(OperationError::AlreadyExists(node.id));
            }
            self.shadows.insert(node.id.clone(), Shadow::Node(node));
            return Ok(());
        }
        let prop = self.property(path)?;
        prop.create_in(self.shadow(&prop.node_id)?, value)
    }

    fn delete(&mut self, path: &[String], _value: &PropertyValue) -> OperationResult<()> {
        if let [id] = path {
            if !self.contains(id) {
                return Err(OperationError::NotFound(id.clone()));
            }
            self.shadows.insert(id.clone(), Shadow::Deleted);
            return Ok(());
        }
        let prop = self.property(path)?;
        prop.delete_in(self.shadow(&prop.node_id)?)
    }

    fn update(&mut self, path: &[String], diff: &Diff) -> OperationResult<()> {
        if path.len() < 2 {
            return Err(OperationError::InvalidPath(path.to_vec()));
        }
        let prop = self.property(path)?;
        prop.update_in(self.shadow(&prop.node_id)?, diff)
    }

    fn set(&mut self, path: &[String], value: &PropertyValue) -> OperationResult<()> {
        if let [id] = path {
            let node = self.decode_node(path, value)?;
            *self.shadow(id)? = node;
            return Ok(());
        }
        let prop = self.property(path)?;
        prop.set_in(self.shadow(&prop.node_id)?, value)
    }
}
