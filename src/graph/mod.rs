//! Core object graph implementation
//!
//! This module implements the node data model and the graph store:
//! - Nodes with a schema type and free-form properties
//! - Property paths that follow references between nodes
//! - Operation-driven mutation with listeners and a persistence mirror

pub mod adapter;
pub mod event;
pub mod node;
pub mod property;
pub mod resolver;
pub mod store;

// Re-export main types
pub use adapter::{MemoryStore, PersistenceAdapter};
pub use event::{GraphEvent, ListenerId, ListenerRegistry, OperationFilter};
pub use node::{Node, NodeSet};
pub use property::{PropertyMap, PropertyValue};
pub use resolver::{NodeLookup, Property, PropertyKind};
pub use store::{Graph, GraphError, GraphResult, QueryResult, Seed};
