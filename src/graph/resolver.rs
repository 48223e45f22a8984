//! Property path resolution
//!
//! A path starts with a node id; the remaining keys address a property and
//! values nested inside it. Declared reference properties are followed: the
//! stored id is looked up and resolution continues on the referenced node.
//! A missing or null intermediate value degrades to an empty property.

use super::node::{Node, NodeSet};
use super::property::PropertyValue;
use super::store::{GraphError, GraphResult};
use crate::operation::{Diff, OperationError, OperationResult};
use crate::schema::{default_value, ensure_type, parse_value, BaseType, PropertyType, Schema};

/// Read access to nodes by id
pub trait NodeLookup {
    fn node(&self, id: &str) -> Option<&Node>;
}

impl NodeLookup for NodeSet {
    fn node(&self, id: &str) -> Option<&Node> {
        self.get(id)
    }
}

/// What a resolved path points at
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyKind {
    /// The path is a bare node id
    Node,
    /// A property with a declared type
    Typed(PropertyType),
    /// A value below an untyped container or an undeclared property; typed
    /// by whatever is stored
    Dynamic,
    /// Resolution fell off the graph
    Empty,
}

/// A resolved property: owning node, key path inside it, and its type
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub node_id: String,
    pub keys: Vec<String>,
    pub kind: PropertyKind,
}

impl Property {
    fn empty(path: &[String]) -> Self {
        Property {
            node_id: path.first().cloned().unwrap_or_default(),
            keys: path.iter().skip(1).cloned().collect(),
            kind: PropertyKind::Empty,
        }
    }

    /// Resolve `path` against `nodes`
    pub fn resolve<L, S>(nodes: &L, schema: &Schema, path: &[S]) -> GraphResult<Property>
    where
        L: NodeLookup + ?Sized,
        S: AsRef<str>,
    {
        let path: Vec<String> = path.iter().map(|s| s.as_ref().to_string()).collect();
        let Some((first, rest)) = path.split_first() else {
            return Err(GraphError::InvalidPath(path));
        };
        let Some(mut node) = nodes.node(first) else {
            return Ok(Property::empty(&path));
        };
        if rest.is_empty() {
            return Ok(Property {
                node_id: node.id.clone(),
                keys: Vec::new(),
                kind: PropertyKind::Node,
            });
        }

        let mut keys: Vec<String> = Vec::new();
        let mut kind = PropertyKind::Node;

        for segment in rest {
            if !keys.is_empty() {
                let current = match node.get_path(&keys) {
                    Some(value) if !value.is_null() => value,
                    _ => return Ok(Property::empty(&path)),
                };
                if let PropertyKind::Typed(pt) = &kind {
                    if let BaseType::Reference(_) = pt.base() {
                        match current.as_str().and_then(|id| nodes.node(id)) {
                            Some(target) => {
                                node = target;
                                keys.clear();
                                kind = PropertyKind::Node;
                            }
                            None => return Ok(Property::empty(&path)),
                        }
                    }
                }
            }

            kind = child_kind(schema, node, &keys, &kind, segment)
                .ok_or_else(|| GraphError::InvalidPath(path.clone()))?;
            keys.push(segment.clone());
        }

        Ok(Property {
            node_id: node.id.clone(),
            keys,
            kind,
        })
    }

    /// Canonical path: owning node id followed by the keys inside it
    pub fn path(&self) -> Vec<String> {
        std::iter::once(self.node_id.clone())
            .chain(self.keys.iter().cloned())
            .collect()
    }

    pub fn key(&self) -> Option<&str> {
        self.keys.last().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.kind == PropertyKind::Empty
    }

    pub fn is_node(&self) -> bool {
        self.kind == PropertyKind::Node
    }

    pub fn property_type(&self) -> Option<&PropertyType> {
        match &self.kind {
            PropertyKind::Typed(pt) => Some(pt),
            _ => None,
        }
    }

    /// Declared base type, or the runtime type of `current` for dynamic
    /// properties
    pub fn base_type(&self, current: Option<&PropertyValue>) -> Option<BaseType> {
        match &self.kind {
            PropertyKind::Typed(pt) => Some(pt.base()),
            PropertyKind::Dynamic => current.and_then(PropertyType::of_value).map(|pt| pt.base()),
            PropertyKind::Node | PropertyKind::Empty => None,
        }
    }

    /// Stored value, without defaulting
    pub fn read<'n>(&self, node: &'n Node) -> Option<&'n PropertyValue> {
        node.get_path(&self.keys)
    }

    /// `current` through [`ensure_type`] for typed, non-reference properties
    pub fn ensure(&self, current: Option<PropertyValue>) -> Option<PropertyValue> {
        match &self.kind {
            PropertyKind::Typed(pt) if !matches!(pt.base(), BaseType::Reference(_)) => {
                Some(ensure_type(&pt.base(), current))
            }
            _ => current,
        }
    }

    /// Default for an absent or null typed value; references have none
    pub fn default_for(&self, current: Option<&PropertyValue>) -> Option<PropertyValue> {
        let PropertyKind::Typed(pt) = &self.kind else {
            return None;
        };
        let base = pt.base();
        if matches!(base, BaseType::Reference(_)) || current.is_some_and(|v| !v.is_null()) {
            return None;
        }
        Some(default_value(&base))
    }

    /// Write the default into `node` when the value is absent or null.
    /// Returns the value written, if any.
    pub fn materialize_default(&self, node: &mut Node) -> Option<PropertyValue> {
        let default = self.default_for(self.read(node))?;
        node.set_path(&self.keys, default.clone())?;
        Some(default)
    }

    /// Coerce a raw value to the declared type
    pub fn coerce(&self, raw: PropertyValue) -> GraphResult<PropertyValue> {
        match &self.kind {
            PropertyKind::Typed(pt) => Ok(parse_value(&pt.base(), raw)?),
            _ => Ok(raw),
        }
    }

    pub(crate) fn create_in(&self, node: &mut Node, value: &PropertyValue) -> OperationResult<()> {
        if self.read(node).is_some() {
            return Err(OperationError::AlreadyExists(self.path().join(".")));
        }
        self.set_in(node, value)
    }

    pub(crate) fn delete_in(&self, node: &mut Node) -> OperationResult<()> {
        node.remove_path(&self.keys)
            .map(|_| ())
            .ok_or_else(|| OperationError::NotFound(self.path().join(".")))
    }

    pub(crate) fn update_in(&self, node: &mut Node, diff: &Diff) -> OperationResult<()> {
        self.materialize_default(node);
        let target = node
            .get_path_mut(&self.keys)
            .ok_or_else(|| OperationError::NotFound(self.path().join(".")))?;
        diff.apply_to(target)
    }

    pub(crate) fn set_in(&self, node: &mut Node, value: &PropertyValue) -> OperationResult<()> {
        let value = match &self.kind {
            PropertyKind::Typed(pt) => parse_value(&pt.base(), value.clone())
                .map_err(|e| OperationError::Malformed(e.to_string()))?,
            _ => value.clone(),
        };
        node.set_path(&self.keys, value)
            .map(|_| ())
            .ok_or_else(|| OperationError::InvalidPath(self.path()))
    }
}

/// Kind of the child `segment` below the value at `keys`
fn child_kind(schema: &Schema, node: &Node, keys: &[String], parent: &PropertyKind, segment: &str) -> Option<PropertyKind> {
    match parent {
        PropertyKind::Node => {
            let declared = schema
                .properties(&node.node_type)
                .ok()
                .and_then(|props| props.get(segment).cloned());
            match declared {
                Some(pt) => Some(PropertyKind::Typed(pt)),
                None if node.has_property(segment) || !schema.has_type(&node.node_type) => {
                    Some(PropertyKind::Dynamic)
                }
                None => None,
            }
        }
        PropertyKind::Typed(pt) => match pt.base() {
            BaseType::Array => {
                segment.parse::<usize>().ok()?;
                Some(pt.element().map_or(PropertyKind::Dynamic, PropertyKind::Typed))
            }
            BaseType::Object => Some(pt.element().map_or(PropertyKind::Dynamic, PropertyKind::Typed)),
            _ => None,
        },
        PropertyKind::Dynamic => match node.get_path(keys)? {
            PropertyValue::Array(_) => segment.parse::<usize>().ok().map(|_| PropertyKind::Dynamic),
            PropertyValue::Object(_) => Some(PropertyKind::Dynamic),
            _ => None,
        },
        PropertyKind::Empty => None,
    }
}
