//! opgraph
//!
//! An in-memory, schema-validated object graph whose every mutation is an
//! invertible, transformable operation.
//!
//! # Architecture
//!
//! - `schema`: type definitions with single inheritance, defaults and value
//!   coercion
//! - `operation`: Create/Delete/Update/Set/Compound operations with text,
//!   array and object diffs, inversion and transformation
//! - `graph`: node storage, path resolution through references, listeners
//!   and the persistence mirror
//! - `index`: key/value and hierarchical indexes kept in sync per operation
//! - `cow`: copy-on-write views for speculative edits
//! - `chronicle`: recording plus undo/redo
//!
//! ## Example Usage
//!
//! ```rust
//! use opgraph::graph::{Graph, Node, PropertyValue};
//! use opgraph::schema::Schema;
//!
//! let schema = Schema::from_json(
//!     r#"{"types": {"numbers": {"properties": {"val": "number", "arr": ["array", "number"]}}}}"#,
//! )
//! .unwrap();
//! let mut graph = Graph::new(schema).unwrap();
//!
//! // Missing properties get their type's default
//! graph.create(Node::new("n1", "numbers")).unwrap();
//! assert_eq!(graph.get(&["n1", "val"]).unwrap(), Some(PropertyValue::Number(0.0)));
//!
//! // Editor-script shorthand for an array insert
//! let script = vec![PropertyValue::from("+"), 0i64.into(), 5i64.into()];
//! let op = graph.update(&["n1", "arr"], script).unwrap();
//! assert_eq!(graph.get(&["n1", "arr", "0"]).unwrap(), Some(PropertyValue::Number(5.0)));
//!
//! // Every operation can be undone by applying its inverse
//! graph.apply(op.invert()).unwrap();
//! assert_eq!(graph.get(&["n1", "arr"]).unwrap(), Some(PropertyValue::Array(vec![])));
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod chronicle;
pub mod config;
pub mod cow;
pub mod graph;
pub mod index;
pub mod operation;
pub mod schema;

// Re-export main types for convenience
pub use chronicle::{Chronicle, LogEntry, OperationLog, VersionedGraph};
pub use config::{ConfigError, GraphConfig};
pub use cow::CowGraph;
pub use graph::{
    Graph, GraphError, GraphEvent, GraphResult, MemoryStore, Node, OperationFilter,
    PersistenceAdapter, PropertyMap, PropertyValue, QueryResult, Seed,
};
pub use index::{CustomIndex, GraphIndex, Index, IndexManager, NodeFilter, SimpleIndex};
pub use operation::{
    ArrayOperation, Diff, DiffInput, Operation, OperationError, OperationMatcher, TextOperation,
    TransformOptions,
};
pub use schema::{Schema, SchemaError};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}
