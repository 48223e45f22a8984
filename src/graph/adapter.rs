//! Persistence adapters
//!
//! A graph can mirror every applied change into an external store. The
//! store sees node documents (the flat node form) addressed by path: the
//! node id, optionally followed by property keys.

use super::property::PropertyValue;
use anyhow::{anyhow, bail, Result};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::debug;

/// Store contract used to mirror graph changes
pub trait PersistenceAdapter {
    fn get(&self, path: &[String]) -> Result<Option<PropertyValue>>;

    fn create(&mut self, path: &[String], value: &PropertyValue) -> Result<()>;

    fn set(&mut self, path: &[String], value: &PropertyValue) -> Result<()>;

    fn delete(&mut self, path: &[String], value: &PropertyValue) -> Result<()>;

    /// True if the store shares the graph's values, so in-place updates need
    /// no write-back
    fn inplace(&self) -> bool {
        false
    }
}

/// In-memory document store keyed by node id
///
/// Clones share the same documents, so a test can keep one handle and hand
/// another to the graph.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    documents: Rc<RefCell<IndexMap<String, PropertyValue>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.borrow().is_empty()
    }

    /// Copy of a stored document
    pub fn document(&self, id: &str) -> Option<PropertyValue> {
        self.documents.borrow().get(id).cloned()
    }

    pub fn ids(&self) -> Vec<String> {
        self.documents.borrow().keys().cloned().collect()
    }

    fn write(&self, path: &[String], value: &PropertyValue, must_be_new: bool) -> Result<()> {
        let (id, keys) = path.split_first().ok_or_else(|| anyhow!("empty path"))?;
        let mut documents = self.documents.borrow_mut();

        let Some((last, parents)) = keys.split_last() else {
            if must_be_new && documents.contains_key(id) {
                bail!("document {} already exists", id);
            }
            documents.insert(id.clone(), value.clone());
            return Ok(());
        };

        let container = documents
            .get_mut(id)
            .and_then(|doc| doc.get_path_mut(parents))
            .ok_or_else(|| anyhow!("no container for {}", path.join("/")))?;
        if must_be_new && container.child(last).is_some() {
            bail!("{} already exists", path.join("/"));
        }
        container
            .insert_child(last, value.clone())
            .map(|_| ())
            .ok_or_else(|| anyhow!("cannot write {}", path.join("/")))
    }
}

impl PersistenceAdapter for MemoryStore {
    fn get(&self, path: &[String]) -> Result<Option<PropertyValue>> {
        let Some((id, keys)) = path.split_first() else {
            return Ok(None);
        };
        let documents = self.documents.borrow();
        Ok(documents.get(id).and_then(|doc| doc.get_path(keys)).cloned())
    }

    fn create(&mut self, path: &[String], value: &PropertyValue) -> Result<()> {
        debug!("store create {}", path.join("/"));
        self.write(path, value, true)
    }

    fn set(&mut self, path: &[String], value: &PropertyValue) -> Result<()> {
        debug!("store set {}", path.join("/"));
        self.write(path, value, false)
    }

    fn delete(&mut self, path: &[String], _value: &PropertyValue) -> Result<()> {
        debug!("store delete {}", path.join("/"));
        let (id, keys) = path.split_first().ok_or_else(|| anyhow!("empty path"))?;
        let mut documents = self.documents.borrow_mut();

        let Some((last, parents)) = keys.split_last() else {
            return documents
                .shift_remove(id)
                .map(|_| ())
                .ok_or_else(|| anyhow!("document {} not found", id));
        };
        documents
            .get_mut(id)
            .and_then(|doc| doc.get_path_mut(parents))
            .and_then(|container| container.remove_child(last))
            .map(|_| ())
            .ok_or_else(|| anyhow!("{} not found", path.join("/")))
    }
}
