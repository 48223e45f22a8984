//! Versioning integration
//!
//! A chronicle receives every top-level operation a graph applies locally
//! while recording is on. [`OperationLog`] is a linear chronicle with undo
//! and redo; it drives the graph back through [`VersionedGraph`], whose
//! applications are never recorded again.

use crate::graph::{Graph, GraphResult};
use crate::operation::{Operation, TransformOptions};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, info};
use uuid::Uuid;

/// Sink for locally applied operations
pub trait Chronicle {
    /// Record an applied operation, returning its change id
    fn record(&mut self, op: &Operation) -> anyhow::Result<String>;
}

/// The surface a chronicle drives when replaying history
pub trait VersionedGraph {
    /// Apply without recording
    fn apply(&mut self, op: &Operation) -> GraphResult<()>;

    fn invert(&self, op: &Operation) -> Operation;

    fn transform(
        &self,
        a: &Operation,
        b: &Operation,
        options: &TransformOptions,
    ) -> GraphResult<(Operation, Operation)>;

    fn reset(&mut self) -> GraphResult<()>;

    fn get_state(&self) -> Option<String>;

    fn set_state(&mut self, state: Option<String>);
}

impl VersionedGraph for Graph {
    fn apply(&mut self, op: &Operation) -> GraphResult<()> {
        self.apply_remote(op)
    }

    fn invert(&self, op: &Operation) -> Operation {
        Graph::invert(self, op)
    }

    fn transform(
        &self,
        a: &Operation,
        b: &Operation,
        options: &TransformOptions,
    ) -> GraphResult<(Operation, Operation)> {
        Graph::transform(self, a, b, options)
    }

    fn reset(&mut self) -> GraphResult<()> {
        Graph::reset(self)
    }

    fn get_state(&self) -> Option<String> {
        self.state().map(str::to_string)
    }

    fn set_state(&mut self, state: Option<String>) {
        Graph::set_state(self, state)
    }
}

/// One recorded change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub op: Operation,
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    fn new(op: Operation) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            op,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Default)]
struct LogState {
    entries: Vec<LogEntry>,
    /// Number of entries currently applied
    cursor: usize,
}

/// Linear history with undo/redo
///
/// Clones share the same history, so one handle can be given to the graph
/// while another drives undo and redo.
#[derive(Debug, Clone, Default)]
pub struct OperationLog {
    state: Rc<RefCell<LogState>>,
}

impl OperationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.state.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().entries.is_empty()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.state.borrow().entries.clone()
    }

    /// Id of the latest applied entry
    pub fn head(&self) -> Option<String> {
        let state = self.state.borrow();
        state.cursor.checked_sub(1).map(|i| state.entries[i].id.clone())
    }

    pub fn can_undo(&self) -> bool {
        self.state.borrow().cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        let state = self.state.borrow();
        state.cursor < state.entries.len()
    }

    /// Revert the latest applied entry. Returns false if there is nothing to
    /// undo.
    pub fn undo<G: VersionedGraph + ?Sized>(&self, graph: &mut G) -> GraphResult<bool> {
        let (op, previous) = {
            let state = self.state.borrow();
            let Some(last) = state.cursor.checked_sub(1) else {
                return Ok(false);
            };
            let previous = last.checked_sub(1).map(|i| state.entries[i].id.clone());
            (state.entries[last].op.clone(), previous)
        };

        let inverse = graph.invert(&op);
        graph.apply(&inverse)?;
        self.state.borrow_mut().cursor -= 1;
        info!("undo {}", op);
        graph.set_state(previous);
        Ok(true)
    }

    /// Re-apply the next undone entry. Returns false if there is nothing to
    /// redo.
    pub fn redo<G: VersionedGraph + ?Sized>(&self, graph: &mut G) -> GraphResult<bool> {
        let entry = {
            let state = self.state.borrow();
            match state.entries.get(state.cursor) {
                Some(entry) => entry.clone(),
                None => return Ok(false),
            }
        };

        graph.apply(&entry.op)?;
        self.state.borrow_mut().cursor += 1;
        info!("redo {}", entry.op);
        graph.set_state(Some(entry.id));
        Ok(true)
    }
}

impl Chronicle for OperationLog {
    fn record(&mut self, op: &Operation) -> anyhow::Result<String> {
        let mut state = self
            .state
            .try_borrow_mut()
            .context("operation log is busy")?;
        let cursor = state.cursor;
        state.entries.truncate(cursor);

        let entry = LogEntry::new(op.clone());
        let id = entry.id.clone();
        debug!("recording {} as {}", op, id);
        state.entries.push(entry);
        state.cursor += 1;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Node, PropertyValue};
    use crate::schema::Schema;

    fn graph_with_log() -> (Graph, OperationLog) {
        let schema = Schema::from_json(r#"{"types": {"numbers": {"properties": {"val": "number"}}}}"#).unwrap();
        let mut graph = Graph::new(schema).unwrap();
        let log = OperationLog::new();
        graph.set_chronicle(log.clone());
        graph.start_recording();
        (graph, log)
    }

    #[test]
    fn test_records_only_while_recording() {
        let (mut graph, log) = graph_with_log();
        graph.create(Node::new("n1", "numbers")).unwrap();
        graph.stop_recording();
        graph.create(Node::new("n2", "numbers")).unwrap();

        assert_eq!(log.len(), 1);
        assert_eq!(graph.state().map(str::to_string), log.head());
    }

    #[test]
    fn test_undo_redo() {
        let (mut graph, log) = graph_with_log();
        graph.create(Node::new("n1", "numbers")).unwrap();
        graph.set(&["n1", "val"], 3i64).unwrap();
        let first = log.entries()[0].id.clone();

        assert!(log.undo(&mut graph).unwrap());
        assert_eq!(graph.get(&["n1", "val"]).unwrap(), Some(PropertyValue::Number(0.0)));
        assert_eq!(graph.state(), Some(first.as_str()));

        assert!(log.undo(&mut graph).unwrap());
        assert!(!graph.contains("n1"));
        assert_eq!(graph.state(), None);
        assert!(!log.undo(&mut graph).unwrap());

        // replays are not recorded again
        assert_eq!(log.len(), 2);

        assert!(log.redo(&mut graph).unwrap());
        assert!(log.redo(&mut graph).unwrap());
        assert!(!log.redo(&mut graph).unwrap());
        assert_eq!(graph.get(&["n1", "val"]).unwrap(), Some(PropertyValue::Number(3.0)));
        assert_eq!(graph.state().map(str::to_string), log.head());
    }

    #[test]
    fn test_record_truncates_redo_tail() {
        let (mut graph, log) = graph_with_log();
        graph.create(Node::new("n1", "numbers")).unwrap();
        graph.create(Node::new("n2", "numbers")).unwrap();
        log.undo(&mut graph).unwrap();

        graph.create(Node::new("n3", "numbers")).unwrap();
        assert_eq!(log.len(), 2);
        assert!(!log.can_redo());
        assert!(matches!(&log.entries()[1].op, Operation::Create { path, .. } if path[0] == "n3"));
    }
}
