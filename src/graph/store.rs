//! In-memory graph storage implementation
//!
//! The graph never mutates nodes directly. Each public mutation builds an
//! [`Operation`] and applies it through the node-set adapter; every applied
//! atomic operation then flows to the indexes, the persistence mirror and
//! the listeners, in that order. Top-level operations are recorded into the
//! chronicle while recording is on.

use super::adapter::PersistenceAdapter;
use super::event::{GraphEvent, ListenerId, ListenerRegistry, OperationFilter};
use super::node::{Node, NodeSet};
use super::property::PropertyValue;
use super::resolver::{NodeLookup, Property, PropertyKind};
use crate::chronicle::Chronicle;
use crate::config::GraphConfig;
use crate::index::{Change, Index, IndexManager};
use crate::operation::{
    Diff, DiffInput, ObjectAdapter, Operation, OperationError, OperationResult, TransformOptions,
};
use crate::schema::{BaseType, Schema, SchemaError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that can occur during graph operations
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Invalid path: {0:?}")]
    InvalidPath(Vec<String>),

    #[error("Property {0} not found")]
    PropertyNotFound(String),

    #[error("Node {0} already exists")]
    NodeAlreadyExists(String),

    #[error("Node {0} not found")]
    NodeNotFound(String),

    #[error("Node is missing required field: {0}")]
    MissingField(&'static str),

    #[error("Unknown node type: {0}")]
    UnknownType(String),

    #[error("Seed was made for schema {found}, graph uses {expected}")]
    SchemaMismatch { expected: String, found: String },

    #[error("No diff algorithm for {0}")]
    UnsupportedType(String),

    #[error("Index {0} not found")]
    IndexNotFound(String),

    #[error("Invalid seed: {0}")]
    InvalidSeed(String),

    #[error("Listener failed: {0}")]
    Listener(String),

    #[error("Persistence adapter failed: {0}")]
    Persistence(String),

    #[error("Chronicle failed: {0}")]
    Chronicle(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Operation(OperationError),
}

impl From<OperationError> for GraphError {
    fn from(e: OperationError) -> Self {
        match e {
            OperationError::AlreadyExists(id) => GraphError::NodeAlreadyExists(id),
            OperationError::NotFound(id) => GraphError::NodeNotFound(id),
            OperationError::UnsupportedType(t) => GraphError::UnsupportedType(t),
            other => GraphError::Operation(other),
        }
    }
}

pub type GraphResult<T> = Result<T, GraphError>;

fn listener_error(e: anyhow::Error) -> GraphError {
    warn!("listener error, operation stays applied: {:#}", e);
    GraphError::Listener(format!("{:#}", e))
}

/// Initial content: `{schema?: [id, version], nodes: {id: node}}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Seed {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<(String, String)>,

    #[serde(default)]
    pub nodes: IndexMap<String, Node>,
}

impl Seed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> GraphResult<Self> {
        serde_json::from_str(json).map_err(|e| GraphError::InvalidSeed(e.to_string()))
    }

    pub fn with_schema(mut self, id: impl Into<String>, version: impl Into<String>) -> Self {
        self.schema = Some((id.into(), version.into()));
        self
    }

    pub fn with_node(mut self, node: Node) -> Self {
        self.nodes.insert(node.id.clone(), node);
        self
    }
}

/// Result of [`Graph::query`]
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Node(Node),
    Nodes(Vec<Node>),
    Value(PropertyValue),
}

/// Error for a property that resolved to nothing
pub(crate) fn unresolved<L: NodeLookup + ?Sized>(nodes: &L, prop: &Property) -> GraphError {
    if nodes.node(&prop.node_id).is_some() {
        GraphError::PropertyNotFound(prop.path().join("."))
    } else {
        GraphError::NodeNotFound(prop.node_id.clone())
    }
}

/// Build the Update operation for `input` against the value at `prop`.
/// Script diffs are converted using the property's base type.
pub(crate) fn update_operation<L: NodeLookup + ?Sized>(
    nodes: &L,
    prop: &Property,
    input: DiffInput,
) -> GraphResult<Operation> {
    if prop.is_empty() {
        return Err(unresolved(nodes, prop));
    }
    if prop.is_node() {
        return Err(GraphError::InvalidPath(prop.path()));
    }

    let current = nodes.node(&prop.node_id).and_then(|node| prop.read(node)).cloned();
    let current = prop.ensure(current).unwrap_or_default();
    let base = prop
        .base_type(Some(&current))
        .ok_or_else(|| GraphError::UnsupportedType(current.type_name().to_string()))?;

    let diff = input.into_diff(&base, &current)?;
    Ok(Operation::update(prop.path(), diff))
}

/// Rewrite a property path that goes through references into the path of
/// the node that actually holds the value
pub(crate) fn canonical<L: NodeLookup + ?Sized>(nodes: &L, schema: &Schema, op: &Operation) -> GraphResult<Operation> {
    let path = op.path();
    if path.len() < 2 {
        return Ok(op.clone());
    }
    let prop = Property::resolve(nodes, schema, path)?;
    if prop.is_empty() {
        return Err(unresolved(nodes, &prop));
    }
    let canonical = prop.path();
    if canonical == path {
        Ok(op.clone())
    } else {
        Ok(op.rebase(path, &canonical))
    }
}

/// State captured before an atomic operation, for index maintenance
enum Before {
    Node(Option<Node>),
    Property(Option<PropertyValue>),
}

/// In-memory, schema-validated graph
pub struct Graph {
    /// Type definitions and declared indexes
    schema: Schema,

    config: GraphConfig,

    /// Node storage, insertion-ordered
    nodes: NodeSet,

    /// Content restored by `reset`
    seed: Seed,

    /// Derived lookups, maintained per applied operation
    indexes: IndexManager,

    listeners: ListenerRegistry,

    /// Optional mirror of every applied change
    persistence: Option<Box<dyn PersistenceAdapter>>,

    /// Receives top-level operations while recording
    chronicle: Option<Box<dyn Chronicle>>,

    recording: bool,

    /// Change id of the last recorded or replayed operation
    state: Option<String>,
}

impl Graph {
    /// Create an empty graph with the default configuration
    pub fn new(schema: Schema) -> GraphResult<Self> {
        Self::with_config(schema, GraphConfig::default())
    }

    pub fn with_config(schema: Schema, config: GraphConfig) -> GraphResult<Self> {
        Self::from_seed(schema, config, Seed::default())
    }

    /// Create a graph populated from `seed`. A seed tagged with a schema
    /// identity must match the schema's `id` and `version`.
    pub fn from_seed(schema: Schema, config: GraphConfig, seed: Seed) -> GraphResult<Self> {
        schema.validate()?;
        if let Some((id, version)) = &seed.schema {
            let expected = (
                schema.id.clone().unwrap_or_default(),
                schema.version.clone().unwrap_or_default(),
            );
            if (id, version) != (&expected.0, &expected.1) {
                return Err(GraphError::SchemaMismatch {
                    expected: format!("{}@{}", expected.0, expected.1),
                    found: format!("{}@{}", id, version),
                });
            }
        }

        let indexes = if config.index_on_construct {
            IndexManager::from_schema(&schema)
        } else {
            IndexManager::new()
        };

        let mut graph = Graph {
            schema,
            recording: config.recording,
            config,
            nodes: NodeSet::new(),
            seed,
            indexes,
            listeners: ListenerRegistry::new(),
            persistence: None,
            chronicle: None,
            state: None,
        };
        graph.load_seed()?;

        info!(
            "graph constructed with {} nodes and {} indexes",
            graph.nodes.len(),
            graph.indexes.len()
        );
        Ok(graph)
    }

    fn load_seed(&mut self) -> GraphResult<()> {
        let prepared = self
            .seed
            .nodes
            .iter()
            .map(|(id, node)| {
                let mut node = node.clone();
                if node.id.is_empty() {
                    node.id = id.clone();
                }
                self.prepare_node(node)
            })
            .collect::<GraphResult<Vec<_>>>()?;

        self.nodes.clear();
        for node in prepared {
            self.nodes.insert(node.id.clone(), node);
        }
        self.indexes.rebuild_all(&self.nodes);
        Ok(())
    }

    /// Validate a node, coerce its declared properties and fill defaults
    pub(crate) fn prepare_node(&self, mut node: Node) -> GraphResult<Node> {
        if node.id.is_empty() {
            return Err(GraphError::MissingField("id"));
        }
        if node.node_type.is_empty() {
            return Err(GraphError::MissingField("type"));
        }
        if !self.schema.has_type(&node.node_type) {
            if self.config.strict_types {
                return Err(GraphError::UnknownType(node.node_type));
            }
            return Ok(node);
        }

        self.schema.coerce_node(&mut node)?;
        self.schema.apply_defaults(&mut node)?;
        Ok(node)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node_set(&self) -> &NodeSet {
        &self.nodes
    }

    /// Current content as a seed tagged with the schema identity
    pub fn to_seed(&self) -> Seed {
        Seed {
            schema: self.schema.id.clone().zip(self.schema.version.clone()),
            nodes: self.nodes.clone(),
        }
    }

    /// Resolve a path against the current nodes
    pub fn resolve<S: AsRef<str>>(&self, path: &[S]) -> GraphResult<Property> {
        Property::resolve(&self.nodes, &self.schema, path)
    }

    /// Create a node. Declared properties are coerced and missing ones get
    /// their defaults before the Create operation is built.
    pub fn create(&mut self, node: Node) -> GraphResult<Operation> {
        let node = self.prepare_node(node)?;
        if self.nodes.contains_key(&node.id) {
            return Err(GraphError::NodeAlreadyExists(node.id));
        }
        self.apply_local(Operation::create_node(&node))
    }

    /// Delete a node; the operation carries its final snapshot
    pub fn delete(&mut self, id: &str) -> GraphResult<Operation> {
        let node = self
            .nodes
            .get(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))?;
        let op = Operation::delete_node(node);
        self.apply_local(op)
    }

    /// Apply a diff to a string, array or object property. Script diffs are
    /// converted using the property's base type.
    pub fn update<S: AsRef<str>>(&mut self, path: &[S], diff: impl Into<DiffInput>) -> GraphResult<Operation> {
        let prop = self.resolve(path)?;
        let op = update_operation(&self.nodes, &prop, diff.into())?;
        self.apply_local(op)
    }

    /// Replace the value at `path`. Property values are coerced to their
    /// declared type; a bare node id replaces the whole node.
    pub fn set<S: AsRef<str>>(&mut self, path: &[S], value: impl Into<PropertyValue>) -> GraphResult<Operation> {
        let prop = self.resolve(path)?;
        let op = self.set_operation(&self.nodes, &prop, value.into())?;
        self.apply_local(op)
    }

    /// Build the Set operation replacing the value at `prop` in `nodes`
    pub(crate) fn set_operation<L: NodeLookup + ?Sized>(
        &self,
        nodes: &L,
        prop: &Property,
        value: PropertyValue,
    ) -> GraphResult<Operation> {
        if prop.is_empty() {
            return Err(unresolved(nodes, prop));
        }
        if prop.is_node() {
            let replacement = Node::from_value(&value)
                .filter(|node| node.id == prop.node_id)
                .ok_or_else(|| GraphError::InvalidPath(prop.path()))?;
            let replacement = self.prepare_node(replacement)?;
            let original = nodes.node(&prop.node_id).map(Node::to_value).unwrap_or_default();
            return Ok(Operation::set(prop.path(), original, replacement.to_value()));
        }
        let value = prop.coerce(value)?;
        let original = nodes
            .node(&prop.node_id)
            .and_then(|node| prop.read(node))
            .cloned()
            .unwrap_or_default();
        Ok(Operation::set(prop.path(), original, value))
    }

    /// Value at `path`: the whole node for a bare id, otherwise the property
    /// value with defaults applied. `None` when the path degrades.
    pub fn get<S: AsRef<str>>(&mut self, path: &[S]) -> GraphResult<Option<PropertyValue>> {
        let prop = self.resolve(path)?;
        match prop.kind {
            PropertyKind::Empty => Ok(None),
            PropertyKind::Node => Ok(self.nodes.get(&prop.node_id).map(Node::to_value)),
            _ => Ok(self.read_property(&prop)),
        }
    }

    /// Like [`get`](Self::get), but reference properties resolve to the
    /// referenced node(s)
    pub fn query<S: AsRef<str>>(&mut self, path: &[S]) -> GraphResult<Option<QueryResult>> {
        let prop = self.resolve(path)?;
        let element = match &prop.kind {
            PropertyKind::Empty => return Ok(None),
            PropertyKind::Node => return Ok(self.nodes.get(&prop.node_id).cloned().map(QueryResult::Node)),
            PropertyKind::Typed(pt) => Some((pt.base(), pt.element().map(|e| e.base()))),
            PropertyKind::Dynamic => None,
        };
        let value = self.read_property(&prop);

        let result = match element {
            Some((BaseType::Reference(_), _)) => value
                .as_ref()
                .and_then(PropertyValue::as_str)
                .and_then(|id| self.nodes.get(id))
                .cloned()
                .map(QueryResult::Node),
            Some((BaseType::Array, Some(BaseType::Reference(_)))) => {
                let ids = value.as_ref().and_then(PropertyValue::as_array);
                let nodes = ids
                    .into_iter()
                    .flatten()
                    .filter_map(|id| id.as_str().and_then(|id| self.nodes.get(id)))
                    .cloned()
                    .collect();
                Some(QueryResult::Nodes(nodes))
            }
            _ => value.map(QueryResult::Value),
        };
        Ok(result)
    }

    fn read_property(&mut self, prop: &Property) -> Option<PropertyValue> {
        let current = self
            .nodes
            .get(&prop.node_id)
            .and_then(|node| prop.read(node))
            .cloned();
        let Some(default) = prop.default_for(current.as_ref()) else {
            return current;
        };

        if self.config.default_on_read {
            if let (Some(node), Some(property)) = (self.nodes.get_mut(&prop.node_id), prop.keys.first()) {
                let old = node.get_property(property).cloned();
                if prop.materialize_default(node).is_some() {
                    debug!("defaulted {} on read", prop.path().join("."));
                    let node = &*node;
                    self.indexes.on_change(&Change::Updated {
                        node,
                        property,
                        new: node.get_property(property),
                        old: old.as_ref(),
                    });
                }
            }
        }
        Some(default)
    }

    /// Nodes in a named index
    pub fn find(&self, index: &str) -> GraphResult<Vec<&Node>> {
        self.find_ids(index, None)
    }

    /// Nodes in a named index, restricted to `scope`
    pub fn find_in<S: AsRef<str>>(&self, index: &str, scope: &[S]) -> GraphResult<Vec<&Node>> {
        let scope: Vec<String> = scope.iter().map(|s| s.as_ref().to_string()).collect();
        self.find_ids(index, Some(&scope))
    }

    fn find_ids(&self, index: &str, scope: Option<&[String]>) -> GraphResult<Vec<&Node>> {
        let index = self
            .indexes
            .get(index)
            .ok_or_else(|| GraphError::IndexNotFound(index.to_string()))?;
        Ok(index
            .node_ids(scope)
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .collect())
    }

    /// Register and populate an index
    pub fn add_index<I: Index + 'static>(&mut self, index: I) {
        let name = index.name().to_string();
        if self.indexes.has_index(&name) {
            warn!("replacing index {}", name);
        }
        self.indexes.add(index);
        self.indexes.rebuild(&name, &self.nodes);
    }

    pub fn drop_index(&mut self, name: &str) -> bool {
        self.indexes.drop_index(name)
    }

    pub fn index(&self, name: &str) -> Option<&dyn Index> {
        self.indexes.get(name)
    }

    pub fn indexes(&self) -> &IndexManager {
        &self.indexes
    }

    pub fn rebuild_indexes(&mut self) {
        self.indexes.rebuild_all(&self.nodes);
    }

    /// Replay every node of `other` through `create`
    pub fn merge(&mut self, other: &Graph) -> GraphResult<Vec<Operation>> {
        info!("merging {} nodes", other.node_count());
        other
            .nodes
            .values()
            .map(|node| self.create(node.clone()))
            .collect()
    }

    /// Clear all nodes, re-seed, rebuild indexes and emit a reset event
    pub fn reset(&mut self) -> GraphResult<()> {
        info!("resetting graph to seed with {} nodes", self.seed.nodes.len());
        self.load_seed()?;
        self.state = None;
        self.listeners.emit(&GraphEvent::Reset).map_err(listener_error)
    }

    /// Apply an arbitrary operation as a local change: it is recorded while
    /// recording is on
    pub fn apply(&mut self, op: Operation) -> GraphResult<Operation> {
        self.apply_local(op)
    }

    /// Apply an operation that originates elsewhere (a chronicle replay or a
    /// remote peer); it is never recorded
    pub fn apply_remote(&mut self, op: &Operation) -> GraphResult<()> {
        self.execute(op)
    }

    /// Apply the changes collected by a copy-on-write graph
    pub fn commit(&mut self, changes: Vec<Operation>) -> GraphResult<Operation> {
        info!("committing {} changes", changes.len());
        self.apply_local(Operation::compound(changes))
    }

    pub fn invert(&self, op: &Operation) -> Operation {
        op.invert()
    }

    pub fn transform(
        &self,
        a: &Operation,
        b: &Operation,
        options: &TransformOptions,
    ) -> GraphResult<(Operation, Operation)> {
        Ok(Operation::transform(a, b, options)?)
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

    pub fn set_persistence<P: PersistenceAdapter + 'static>(&mut self, adapter: P) {
        self.persistence = Some(Box::new(adapter));
    }

    pub fn clear_persistence(&mut self) {
        self.persistence = None;
    }

    pub fn set_chronicle<C: Chronicle + 'static>(&mut self, chronicle: C) {
        self.chronicle = Some(Box::new(chronicle));
    }

    pub fn start_recording(&mut self) {
        self.recording = true;
    }

    pub fn stop_recording(&mut self) {
        self.recording = false;
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }

    pub fn set_state(&mut self, state: Option<String>) {
        self.state = state;
    }

    fn apply_local(&mut self, op: Operation) -> GraphResult<Operation> {
        self.execute(&op)?;
        if self.recording {
            if let Some(chronicle) = self.chronicle.as_mut() {
                let change = chronicle
                    .record(&op)
                    .map_err(|e| GraphError::Chronicle(format!("{:#}", e)))?;
                self.state = Some(change);
            }
        }
        Ok(op)
    }

    /// Apply each atomic child in order. Compound operations are not
    /// transactional: a failure leaves earlier children applied.
    fn execute(&mut self, op: &Operation) -> GraphResult<()> {
        let atomic = op.atomic_ops();
        let total = atomic.len();
        for (i, child) in atomic.into_iter().enumerate() {
            if let Err(e) = self.apply_atomic(child) {
                if total > 1 {
                    warn!("compound operation stopped at child {} of {}: {}", i + 1, total, e);
                }
                return Err(e);
            }
        }
        Ok(())
    }

    fn apply_atomic(&mut self, op: &Operation) -> GraphResult<()> {
        let op = self.canonical(op)?;
        let Some((id, keys)) = op.path().split_first() else {
            return Err(GraphError::InvalidPath(Vec::new()));
        };
        let before = match keys.first() {
            None => Before::Node(self.nodes.get(id).cloned()),
            Some(property) => Before::Property(
                self.nodes
                    .get(id)
                    .and_then(|node| node.get_property(property))
                    .cloned(),
            ),
        };

        let mut adapter = NodeSetAdapter {
            nodes: &mut self.nodes,
            schema: &self.schema,
            strict: self.config.strict_types,
        };
        op.apply(&mut adapter)?;
        debug!("applied {}", op);

        self.maintain_indexes(&op, before);
        self.mirror(&op)?;
        self.listeners
            .emit(&GraphEvent::OperationApplied(&op))
            .map_err(listener_error)
    }

    fn canonical(&self, op: &Operation) -> GraphResult<Operation> {
        canonical(&self.nodes, &self.schema, op)
    }

    fn maintain_indexes(&mut self, op: &Operation, before: Before) {
        let Some((id, keys)) = op.path().split_first() else {
            return;
        };
        match before {
            Before::Node(old) => {
                if let Some(old) = &old {
                    self.indexes.on_change(&Change::Deleted(old));
                }
                if let Some(node) = self.nodes.get(id) {
                    self.indexes.on_change(&Change::Created(node));
                }
            }
            Before::Property(old) => {
                if let (Some(node), Some(property)) = (self.nodes.get(id), keys.first()) {
                    self.indexes.on_change(&Change::Updated {
                        node,
                        property,
                        new: node.get_property(property),
                        old: old.as_ref(),
                    });
                }
            }
        }
    }

    /// Forward an applied atomic operation to the persistence adapter
    fn mirror(&mut self, op: &Operation) -> GraphResult<()> {
        let Some(store) = self.persistence.as_mut() else {
            return Ok(());
        };
        let result = match op {
            Operation::Create { path, val } => store.create(path, val),
            Operation::Delete { path, val } => store.delete(path, val),
            Operation::Set { path, val, .. } => store.set(path, val),
            Operation::Update { path, .. } if !store.inplace() => {
                let current = path
                    .split_first()
                    .and_then(|(id, keys)| self.nodes.get(id)?.get_path(keys));
                match current {
                    Some(value) => store.set(path, value),
                    None => Ok(()),
                }
            }
            _ => Ok(()),
        };
        result.map_err(|e| GraphError::Persistence(format!("{:#}", e)))
    }
}

impl NodeLookup for Graph {
    fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("nodes", &self.nodes.len())
            .field("indexes", &self.indexes)
            .field("listeners", &self.listeners.len())
            .field("recording", &self.recording)
            .field("state", &self.state)
            .finish()
    }
}

/// Applies operations to a graph's node set
struct NodeSetAdapter<'g> {
    nodes: &'g mut NodeSet,
    schema: &'g Schema,
    strict: bool,
}

impl NodeSetAdapter<'_> {
    fn property(&self, path: &[String]) -> OperationResult<Property> {
        let prop = Property::resolve(&*self.nodes, self.schema, path)
            .map_err(|_| OperationError::InvalidPath(path.to_vec()))?;
        if prop.is_empty() {
            return Err(OperationError::NotFound(path.join(".")));
        }
        Ok(prop)
    }

    fn node_mut(&mut self, id: &str) -> OperationResult<&mut Node> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| OperationError::NotFound(id.to_string()))
    }

    fn decode_node(&self, path: &[String], value: &PropertyValue) -> OperationResult<Node> {
        decode_node(self.schema, self.strict, path, value)
    }
}

/// Node carried by a node-level Create or Set at `path`
pub(crate) fn decode_node(
    schema: &Schema,
    strict: bool,
    path: &[String],
    value: &PropertyValue,
) -> OperationResult<Node> {
    let mut node = Node::from_value(value)
        .ok_or_else(|| OperationError::Malformed(format!("not a node: {}", value)))?;
    if path.len() != 1 || node.id != path[0] {
        return Err(OperationError::InvalidPath(path.to_vec()));
    }
    match schema.validate_node(&node) {
        Ok(()) => schema
            .coerce_node(&mut node)
            .map_err(|e| OperationError::Malformed(e.to_string()))?,
        Err(_) if strict => {
            return Err(OperationError::Malformed(format!("unknown node type {}", node.node_type)));
        }
        Err(_) => {}
    }
    Ok(node)
}

impl ObjectAdapter for NodeSetAdapter<'_> {
    fn get(&self, path: &[String]) -> Option<PropertyValue> {
        if let [id] = path {
            return self.nodes.get(id).map(Node::to_value);
        }
        let prop = self.property(path).ok()?;
        self.nodes.get(&prop.node_id).and_then(|node| prop.read(node)).cloned()
    }

    fn create(&mut self, path: &[String], value: &PropertyValue) -> OperationResult<()> {
        if path.len() == 1 {
            let node = self.decode_node(path, value)?;
            if self.nodes.contains_key(&node.id) {
                return Err(OperationError::AlreadyExists(node.id));
            }
            self.nodes.insert(node.id.clone(), node);
            return Ok(());
        }
        let prop = self.property(path)?;
        prop.create_in(self.node_mut(&prop.node_id)?, value)
    }

    fn delete(&mut self, path: &[String], _value: &PropertyValue) -> OperationResult<()> {
        if let [id] = path {
            return self
                .nodes
                .shift_remove(id)
                .map(|_| ())
                .ok_or_else(|| OperationError::NotFound(id.clone()));
        }
        let prop = self.property(path)?;
        prop.delete_in(self.node_mut(&prop.node_id)?)
    }

    fn update(&mut self, path: &[String], diff: &Diff) -> OperationResult<()> {
        if path.len() < 2 {
            return Err(OperationError::InvalidPath(path.to_vec()));
        }
        let prop = self.property(path)?;
        prop.update_in(self.node_mut(&prop.node_id)?, diff)
    }

    fn set(&mut self, path: &[String], value: &PropertyValue) -> OperationResult<()> {
        if let [id] = path {
            let node = self.decode_node(path, value)?;
            *self.node_mut(id)? = node;
            return Ok(());
        }
        let prop = self.property(path)?;
        prop.set_in(self.node_mut(&prop.node_id)?, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::MemoryStore;
    use crate::operation::{ArrayOperation, TextOperation};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn schema() -> Schema {
        Schema::from_json(
            r#"{
                "id": "test",
                "version": "1",
                "types": {
                    "numbers": {"properties": {"val": "number", "arr": ["array", "number"]}},
                    "person": {"properties": {"name": "string"}},
                    "doc": {
                        "properties": {
                            "title": "string",
                            "author": "person",
                            "editors": ["array", "person"]
                        }
                    }
                }
            }"#,
        )
        .unwrap()
    }

    fn graph() -> Graph {
        Graph::new(schema()).unwrap()
    }

    #[test]
    fn test_create_fills_defaults() {
        let mut g = graph();
        g.create(Node::new("n1", "numbers")).unwrap();
        assert_eq!(g.get(&["n1", "val"]).unwrap(), Some(PropertyValue::Number(0.0)));
        assert_eq!(g.get(&["n1", "arr"]).unwrap(), Some(PropertyValue::Array(vec![])));
        assert_eq!(g.node("n1").unwrap().node_type, "numbers");
    }

    #[test]
    fn test_create_rejections() {
        let mut g = graph();
        g.create(Node::new("n1", "numbers")).unwrap();
        assert!(matches!(
            g.create(Node::new("n1", "numbers")),
            Err(GraphError::NodeAlreadyExists(id)) if id == "n1"
        ));
        assert!(matches!(g.create(Node::new("", "numbers")), Err(GraphError::MissingField("id"))));
        assert!(matches!(g.create(Node::new("x", "")), Err(GraphError::MissingField("type"))));
        assert!(matches!(g.create(Node::new("x", "ghost")), Err(GraphError::UnknownType(_))));
        assert_eq!(g.node_count(), 1);

        let mut lax = Graph::with_config(schema(), GraphConfig::default().with_strict_types(false)).unwrap();
        lax.create(Node::new("x", "ghost").with_property("free", 1i64)).unwrap();
        assert_eq!(lax.get(&["x", "free"]).unwrap(), Some(PropertyValue::Number(1.0)));
    }

    #[test]
    fn test_create_coerces_declared_values() {
        let mut g = graph();
        g.create(Node::new("n1", "numbers").with_property("val", "11")).unwrap();
        assert_eq!(g.node("n1").unwrap().get_property("val"), Some(&PropertyValue::Number(11.0)));
    }

    #[test]
    fn test_values_of_the_wrong_kind_are_rejected() {
        let mut g = graph();
        let err = g
            .create(Node::new("n1", "numbers").with_property("val", vec![PropertyValue::from(1i64)]))
            .unwrap_err();
        assert!(matches!(err, GraphError::Schema(SchemaError::InvalidValue { .. })));
        assert!(!g.contains("n1"));

        g.create(Node::new("n1", "numbers").with_property("val", 4i64)).unwrap();
        assert!(matches!(g.set(&["n1", "val"], true), Err(GraphError::Schema(_))));
        assert!(g.set(&["n1", "arr"], 7i64).is_err());
        assert_eq!(g.get(&["n1", "val"]).unwrap(), Some(PropertyValue::Number(4.0)));
    }

    #[test]
    fn test_applied_operations_are_coerced() {
        let mut g = graph();
        g.apply(Operation::create_node(&Node::new("n1", "numbers").with_property("val", "11")))
            .unwrap();
        assert_eq!(g.node("n1").unwrap().get_property("val"), Some(&PropertyValue::Number(11.0)));

        g.apply_remote(&Operation::set(vec!["n1".into(), "val".into()], 11i64, "12"))
            .unwrap();
        assert_eq!(g.get(&["n1", "val"]).unwrap(), Some(PropertyValue::Number(12.0)));

        let bad = Operation::set(vec!["n1".into(), "val".into()], 12i64, true);
        assert!(matches!(g.apply(bad), Err(GraphError::Operation(OperationError::Malformed(_)))));
        assert_eq!(g.get(&["n1", "val"]).unwrap(), Some(PropertyValue::Number(12.0)));
    }

    #[test]
    fn test_text_positions_out_of_range() {
        let mut g = graph();
        g.create(Node::new("p1", "person").with_property("name", "Ada")).unwrap();

        let script = vec![PropertyValue::from(1i64), PropertyValue::Number(-1e300)];
        assert!(matches!(
            g.update(&["p1", "name"], script),
            Err(GraphError::Operation(OperationError::IndexOutOfBounds { .. }))
        ));
        let far = Operation::update(
            vec!["p1".into(), "name".into()],
            Diff::String(TextOperation::delete(usize::MAX, "a")),
        );
        assert!(matches!(
            g.apply(far),
            Err(GraphError::Operation(OperationError::IndexOutOfBounds { .. }))
        ));
        assert_eq!(g.get(&["p1", "name"]).unwrap(), Some(PropertyValue::from("Ada")));
    }

    #[test]
    fn test_delete_and_invert() {
        let mut g = graph();
        g.create(Node::new("n1", "numbers").with_property("val", 3i64)).unwrap();
        let before = g.node("n1").cloned().unwrap();

        let op = g.delete("n1").unwrap();
        assert!(!g.contains("n1"));
        assert!(matches!(g.delete("n1"), Err(GraphError::NodeNotFound(_))));

        g.apply(op.invert()).unwrap();
        assert_eq!(g.node("n1"), Some(&before));
    }

    #[test]
    fn test_set_coerces_and_records_original() {
        let mut g = graph();
        g.create(Node::new("n1", "numbers")).unwrap();
        let op = g.set(&["n1", "val"], "11").unwrap();
        assert_eq!(op, Operation::set(vec!["n1".into(), "val".into()], 0i64, 11i64));
        assert_eq!(g.get(&["n1", "val"]).unwrap(), Some(PropertyValue::Number(11.0)));
        assert!(matches!(g.set(&["n1", "val"], "eleven"), Err(GraphError::Schema(_))));
        assert!(matches!(g.set(&["ghost", "val"], 1i64), Err(GraphError::NodeNotFound(_))));
    }

    #[test]
    fn test_set_whole_node() {
        let mut g = graph();
        g.create(Node::new("n1", "numbers").with_property("val", 1i64)).unwrap();
        let replacement = Node::new("n1", "numbers").with_property("val", 9i64);
        let op = g.set(&["n1"], replacement.to_value()).unwrap();
        assert_eq!(g.node("n1").unwrap().get_property("val"), Some(&PropertyValue::Number(9.0)));

        g.apply(op.invert()).unwrap();
        assert_eq!(g.node("n1").unwrap().get_property("val"), Some(&PropertyValue::Number(1.0)));

        let other = Node::new("n2", "numbers").to_value();
        assert!(matches!(g.set(&["n1"], other), Err(GraphError::InvalidPath(_))));
    }

    #[test]
    fn test_update_with_scripts_and_typed_diffs() {
        let mut g = graph();
        g.create(Node::new("n1", "numbers")).unwrap();
        g.create(Node::new("p1", "person").with_property("name", "Ada")).unwrap();

        let script = vec![PropertyValue::from("+"), 0i64.into(), 5i64.into()];
        g.update(&["n1", "arr"], script).unwrap();
        g.update(&["n1", "arr"], ArrayOperation::insert(1, 6i64)).unwrap();
        assert_eq!(
            g.get(&["n1", "arr"]).unwrap(),
            Some(PropertyValue::Array(vec![5i64.into(), 6i64.into()]))
        );

        let op = g.update(&["p1", "name"], TextOperation::insert(3, " L.")).unwrap();
        assert_eq!(op.path(), ["p1", "name"]);
        assert_eq!(g.get(&["p1", "name"]).unwrap(), Some(PropertyValue::from("Ada L.")));
    }

    #[test]
    fn test_update_errors() {
        let mut g = graph();
        g.create(Node::new("n1", "numbers")).unwrap();
        assert!(matches!(
            g.update(&["n1", "val"], vec![PropertyValue::from(1i64)]),
            Err(GraphError::UnsupportedType(_))
        ));
        assert!(matches!(
            g.update(&["n1", "nope"], vec![PropertyValue::from(1i64)]),
            Err(GraphError::InvalidPath(_))
        ));
        assert!(matches!(
            g.update(&["ghost", "arr"], ArrayOperation::insert(0, 1i64)),
            Err(GraphError::NodeNotFound(_))
        ));
        assert!(matches!(
            g.update(&["n1", "arr"], ArrayOperation::delete(0, 1i64)),
            Err(GraphError::Operation(OperationError::IndexOutOfBounds { .. }))
        ));
    }

    #[test]
    fn test_get_defaults_lazily() {
        let mut g = graph();
        g.create(Node::new("n1", "numbers")).unwrap();
        g.set(&["n1", "val"], PropertyValue::Null).unwrap();
        assert_eq!(g.node("n1").unwrap().get_property("val"), Some(&PropertyValue::Null));

        assert_eq!(g.get(&["n1", "val"]).unwrap(), Some(PropertyValue::Number(0.0)));
        assert_eq!(g.node("n1").unwrap().get_property("val"), Some(&PropertyValue::Number(0.0)));

        let mut passive = Graph::with_config(schema(), GraphConfig::default().with_default_on_read(false)).unwrap();
        passive.create(Node::new("n1", "numbers")).unwrap();
        passive.set(&["n1", "val"], PropertyValue::Null).unwrap();
        assert_eq!(passive.get(&["n1", "val"]).unwrap(), Some(PropertyValue::Number(0.0)));
        assert_eq!(passive.node("n1").unwrap().get_property("val"), Some(&PropertyValue::Null));
    }

    #[test]
    fn test_get_degrades() {
        let mut g = graph();
        g.create(Node::new("d1", "doc")).unwrap();
        assert_eq!(g.get(&["ghost"]).unwrap(), None);
        assert_eq!(g.get(&["d1", "author", "name"]).unwrap(), None);
    }

    #[test]
    fn test_query_and_reference_paths() {
        let mut g = graph();
        g.create(Node::new("p1", "person").with_property("name", "Ada")).unwrap();
        g.create(Node::new("p2", "person").with_property("name", "Alan")).unwrap();
        g.create(
            Node::new("d1", "doc")
                .with_property("author", "p1")
                .with_property("editors", vec![PropertyValue::from("p2"), PropertyValue::from("p1")]),
        )
        .unwrap();

        match g.query(&["d1", "author"]).unwrap() {
            Some(QueryResult::Node(node)) => assert_eq!(node.id, "p1"),
            other => panic!("unexpected {:?}", other),
        }
        match g.query(&["d1", "editors"]).unwrap() {
            Some(QueryResult::Nodes(nodes)) => {
                assert_eq!(nodes.iter().map(|n| n.id.as_str()).collect::<Vec<_>>(), vec!["p2", "p1"])
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            g.query(&["d1", "title"]).unwrap(),
            Some(QueryResult::Value(PropertyValue::from("")))
        );

        // writes through a reference land on the referenced node
        let op = g.set(&["d1", "author", "name"], "Ada L.").unwrap();
        assert_eq!(op.path(), ["p1", "name"]);
        assert_eq!(g.get(&["p1", "name"]).unwrap(), Some(PropertyValue::from("Ada L.")));
    }

    #[test]
    fn test_listeners_see_each_atomic_operation() {
        let mut g = graph();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        let id = g.bind(OperationFilter::All, move |event| {
            if let Some(op) = event.operation() {
                log.borrow_mut().push(op.to_string());
            }
            Ok(())
        });

        let ops = vec![
            Operation::create_node(&Node::new("a", "numbers")),
            Operation::create_node(&Node::new("b", "numbers")),
        ];
        g.apply(Operation::compound(ops)).unwrap();
        g.set(&["a", "val"], 2i64).unwrap();
        assert_eq!(*seen.borrow(), vec!["create a", "create b", "set a.val"]);

        assert!(g.unbind(id));
        g.delete("a").unwrap();
        assert_eq!(seen.borrow().len(), 3);
    }

    #[test]
    fn test_listener_failure_keeps_operation() {
        let mut g = graph();
        g.bind(OperationFilter::All, |_| anyhow::bail!("listener down"));
        let err = g.create(Node::new("n1", "numbers")).unwrap_err();
        assert!(matches!(err, GraphError::Listener(msg) if msg.contains("listener down")));
        assert!(g.contains("n1"));
    }

    #[test]
    fn test_compound_failure_is_not_rolled_back() {
        let mut g = graph();
        let ops = Operation::compound(vec![
            Operation::create_node(&Node::new("a", "numbers")),
            Operation::create_node(&Node::new("a", "numbers")),
            Operation::create_node(&Node::new("b", "numbers")),
        ]);
        assert!(matches!(g.apply(ops), Err(GraphError::NodeAlreadyExists(_))));
        assert!(g.contains("a"));
        assert!(!g.contains("b"));
    }

    #[test]
    fn test_persistence_mirror() {
        let store = MemoryStore::new();
        let mut g = graph();
        g.set_persistence(store.clone());

        g.create(Node::new("n1", "numbers")).unwrap();
        g.set(&["n1", "val"], 4i64).unwrap();
        g.update(&["n1", "arr"], ArrayOperation::insert(0, 7i64)).unwrap();
        let doc = store.document("n1").unwrap();
        assert_eq!(doc.get_path(&["val"]), Some(&PropertyValue::Number(4.0)));
        assert_eq!(doc.get_path(&["arr", "0"]), Some(&PropertyValue::Number(7.0)));

        g.delete("n1").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_seed_and_reset() {
        let seed = Seed::from_json(
            r#"{"schema": ["test", "1"], "nodes": {"s1": {"type": "numbers", "val": "5"}}}"#,
        )
        .unwrap();
        let mut g = Graph::from_seed(schema(), GraphConfig::default(), seed.clone()).unwrap();
        assert_eq!(g.get(&["s1", "val"]).unwrap(), Some(PropertyValue::Number(5.0)));

        let resets = Rc::new(RefCell::new(0));
        let counter = resets.clone();
        g.bind(OperationFilter::All, move |event| {
            if matches!(event, GraphEvent::Reset) {
                *counter.borrow_mut() += 1;
            }
            Ok(())
        });

        g.create(Node::new("n1", "numbers")).unwrap();
        g.delete("s1").unwrap();
        g.reset().unwrap();
        assert_eq!(g.nodes().map(|n| n.id.as_str()).collect::<Vec<_>>(), vec!["s1"]);
        assert_eq!(*resets.borrow(), 1);

        let wrong = seed.with_schema("other", "2");
        assert!(matches!(
            Graph::from_seed(schema(), GraphConfig::default(), wrong),
            Err(GraphError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_merge() {
        let mut a = graph();
        a.create(Node::new("n1", "numbers")).unwrap();
        let mut b = graph();
        b.create(Node::new("n2", "numbers")).unwrap();
        b.create(Node::new("n3", "numbers")).unwrap();

        let ops = a.merge(&b).unwrap();
        assert_eq!(ops.len(), 2);
        assert_eq!(a.node_count(), 3);
        assert!(matches!(a.merge(&b), Err(GraphError::NodeAlreadyExists(_))));
    }

    #[test]
    fn test_find_unknown_index() {
        let g = graph();
        assert!(matches!(g.find("missing"), Err(GraphError::IndexNotFound(_))));
    }
}
