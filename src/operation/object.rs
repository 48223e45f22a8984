//! Object operations
//!
//! [`Operation`] is the unit of change for the whole graph: nodes are created,
//! deleted, updated and set through it. The same type doubles as the diff for
//! `object` properties, where paths are relative to the property value and
//! are applied through a [`ValueAdapter`].

use super::{ArrayOperation, OperationError, OperationResult, TextOperation};
use crate::graph::{Node, PropertyValue};
use crate::schema::BaseType;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

const OPERATION_TAGS: [&str; 6] = ["nop", "create", "delete", "update", "set", "compound"];

/// A serializable, invertible change
///
/// Paths start with a node id when applied to a graph; nested keys address
/// properties below it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Operation {
    /// Identity; the result of transforming away a losing edit
    Nop,
    Create {
        path: Vec<String>,
        val: PropertyValue,
    },
    /// `val` is the final snapshot of what is removed
    Delete {
        path: Vec<String>,
        val: PropertyValue,
    },
    Update {
        path: Vec<String>,
        diff: Diff,
    },
    Set {
        path: Vec<String>,
        #[serde(default)]
        original: PropertyValue,
        val: PropertyValue,
    },
    Compound {
        ops: Vec<Operation>,
    },
}

/// Operation tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Nop,
    Create,
    Delete,
    Update,
    Set,
    Compound,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Nop => "nop",
            OperationKind::Create => "create",
            OperationKind::Delete => "delete",
            OperationKind::Update => "update",
            OperationKind::Set => "set",
            OperationKind::Compound => "compound",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which diff algorithm an update carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffKind {
    String,
    Array,
    Object,
}

impl DiffKind {
    /// Diff algorithm for a base type, if it has one
    pub fn for_base(base: &BaseType) -> Option<DiffKind> {
        match base {
            BaseType::String => Some(DiffKind::String),
            BaseType::Array => Some(DiffKind::Array),
            BaseType::Object => Some(DiffKind::Object),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DiffKind::String => "string",
            DiffKind::Array => "array",
            DiffKind::Object => "object",
        }
    }
}

impl fmt::Display for DiffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of an Update, tagged with its `propertyType`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "propertyType", content = "ops", rename_all = "lowercase")]
pub enum Diff {
    String(TextOperation),
    Array(ArrayOperation),
    Object(Box<Operation>),
}

impl Diff {
    pub fn kind(&self) -> DiffKind {
        match self {
            Diff::String(_) => DiffKind::String,
            Diff::Array(_) => DiffKind::Array,
            Diff::Object(_) => DiffKind::Object,
        }
    }

    pub fn is_noop(&self) -> bool {
        match self {
            Diff::String(op) => op.is_noop(),
            Diff::Array(op) => op.is_noop(),
            Diff::Object(op) => op.is_nop(),
        }
    }

    pub fn invert(&self) -> Diff {
        match self {
            Diff::String(op) => Diff::String(op.invert()),
            Diff::Array(op) => Diff::Array(op.invert()),
            Diff::Object(op) => Diff::Object(Box::new(op.invert())),
        }
    }

    /// Apply to a stored value of the matching kind
    pub fn apply_to(&self, value: &mut PropertyValue) -> OperationResult<()> {
        match (self, value) {
            (Diff::String(op), PropertyValue::String(s)) => {
                let next = op.apply(s.as_str())?;
                *s = next;
                Ok(())
            }
            (Diff::Array(op), PropertyValue::Array(arr)) => op.apply(arr),
            (Diff::Object(op), target @ PropertyValue::Object(_)) => op.apply(&mut ValueAdapter::new(target)),
            (diff, other) => Err(OperationError::UnsupportedType(format!(
                "{} diff on {} value",
                diff.kind(),
                other.type_name()
            ))),
        }
    }

    /// Transform two diffs of the same kind made against the same value
    pub fn transform(a: &Diff, b: &Diff, a_wins: bool) -> OperationResult<(Diff, Diff)> {
        match (a, b) {
            (Diff::String(x), Diff::String(y)) => {
                let (x, y) = TextOperation::transform(x, y, a_wins);
                Ok((Diff::String(x), Diff::String(y)))
            }
            (Diff::Array(x), Diff::Array(y)) => {
                let (x, y) = ArrayOperation::transform(x, y, a_wins);
                Ok((Diff::Array(x), Diff::Array(y)))
            }
            (Diff::Object(x), Diff::Object(y)) => {
                let (x, y) = Operation::transform(x, y, &TransformOptions::new(a_wins))?;
                Ok((Diff::Object(Box::new(x)), Diff::Object(Box::new(y))))
            }
            _ => Err(OperationError::Mismatch {
                expected: a.kind().to_string(),
                found: b.kind().to_string(),
            }),
        }
    }

    /// Build a typed diff from editor-script shorthand.
    ///
    /// Strings take an ot.js-style sequence, arrays take `+`/`-`/`>>`
    /// commands. Other base types have no script form.
    pub fn from_script(base: &BaseType, current: &PropertyValue, script: &[PropertyValue]) -> OperationResult<Diff> {
        match base {
            BaseType::String => {
                let text = current.as_str().unwrap_or_default();
                TextOperation::from_sequence(text, script).map(Diff::String)
            }
            BaseType::Array => {
                let items = current.as_array().map(Vec::as_slice).unwrap_or_default();
                ArrayOperation::from_script(items, script).map(Diff::Array)
            }
            other => Err(OperationError::UnsupportedType(other.to_string())),
        }
    }
}

/// A diff as handed to `Graph::update`: typed, or editor-script shorthand
/// to be converted once the property's base type is known
#[derive(Debug, Clone, PartialEq)]
pub enum DiffInput {
    Typed(Diff),
    Script(Vec<PropertyValue>),
}

impl DiffInput {
    /// Resolve against the property's base type and current value
    pub fn into_diff(self, base: &BaseType, current: &PropertyValue) -> OperationResult<Diff> {
        let expected = DiffKind::for_base(base)
            .ok_or_else(|| OperationError::UnsupportedType(base.to_string()))?;
        match self {
            DiffInput::Typed(diff) if diff.kind() == expected => Ok(diff),
            DiffInput::Typed(diff) => Err(OperationError::UnsupportedType(format!(
                "{} diff on {} property",
                diff.kind(),
                base
            ))),
            DiffInput::Script(script) => Diff::from_script(base, current, &script),
        }
    }
}

impl From<Diff> for DiffInput {
    fn from(diff: Diff) -> Self {
        DiffInput::Typed(diff)
    }
}

impl From<TextOperation> for DiffInput {
    fn from(op: TextOperation) -> Self {
        DiffInput::Typed(Diff::String(op))
    }
}

impl From<ArrayOperation> for DiffInput {
    fn from(op: ArrayOperation) -> Self {
        DiffInput::Typed(Diff::Array(op))
    }
}

impl From<Operation> for DiffInput {
    fn from(op: Operation) -> Self {
        DiffInput::Typed(Diff::Object(Box::new(op)))
    }
}

impl From<Vec<PropertyValue>> for DiffInput {
    fn from(script: Vec<PropertyValue>) -> Self {
        DiffInput::Script(script)
    }
}

/// Target of operation application
///
/// The graph implements this over its node set; [`ValueAdapter`] implements
/// it over a single object value for nested object diffs.
pub trait ObjectAdapter {
    fn get(&self, path: &[String]) -> Option<PropertyValue>;

    /// Fails with `AlreadyExists` if something is already at `path`
    fn create(&mut self, path: &[String], value: &PropertyValue) -> OperationResult<()>;

    /// Fails with `NotFound` if nothing is at `path`
    fn delete(&mut self, path: &[String], value: &PropertyValue) -> OperationResult<()>;

    fn update(&mut self, path: &[String], diff: &Diff) -> OperationResult<()>;

    fn set(&mut self, path: &[String], value: &PropertyValue) -> OperationResult<()>;
}

/// Adapter over a plain value. Array containers treat the last key as an
/// insertion index for create and delete.
pub struct ValueAdapter<'a> {
    root: &'a mut PropertyValue,
}

impl<'a> ValueAdapter<'a> {
    pub fn new(root: &'a mut PropertyValue) -> Self {
        Self { root }
    }

    fn container(&mut self, path: &[String]) -> OperationResult<(&mut PropertyValue, String)> {
        let (key, parents) = path
            .split_last()
            .ok_or_else(|| OperationError::InvalidPath(path.to_vec()))?;
        let container = self
            .root
            .get_path_mut(parents)
            .ok_or_else(|| OperationError::InvalidPath(path.to_vec()))?;
        Ok((container, key.clone()))
    }
}

impl ObjectAdapter for ValueAdapter<'_> {
    fn get(&self, path: &[String]) -> Option<PropertyValue> {
        self.root.get_path(path).cloned()
    }

    fn create(&mut self, path: &[String], value: &PropertyValue) -> OperationResult<()> {
        let (container, key) = self.container(path)?;
        match container {
            PropertyValue::Array(arr) => {
                let index = key
                    .parse::<usize>()
                    .map_err(|_| OperationError::InvalidPath(path.to_vec()))?;
                if index > arr.len() {
                    return Err(OperationError::IndexOutOfBounds { index, len: arr.len() });
                }
                arr.insert(index, value.clone());
                Ok(())
            }
            PropertyValue::Object(map) => {
                if map.contains_key(&key) {
                    return Err(OperationError::AlreadyExists(path.join(".")));
                }
                map.insert(key, value.clone());
                Ok(())
            }
            _ => Err(OperationError::InvalidPath(path.to_vec())),
        }
    }

    fn delete(&mut self, path: &[String], _value: &PropertyValue) -> OperationResult<()> {
        let (container, key) = self.container(path)?;
        container
            .remove_child(&key)
            .map(|_| ())
            .ok_or_else(|| OperationError::NotFound(path.join(".")))
    }

    fn update(&mut self, path: &[String], diff: &Diff) -> OperationResult<()> {
        let target = self
            .root
            .get_path_mut(path)
            .ok_or_else(|| OperationError::NotFound(path.join(".")))?;
        diff.apply_to(target)
    }

    fn set(&mut self, path: &[String], value: &PropertyValue) -> OperationResult<()> {
        if path.is_empty() {
            *self.root = value.clone();
            return Ok(());
        }
        let (container, key) = self.container(path)?;
        container
            .insert_child(&key, value.clone())
            .map(|_| ())
            .ok_or_else(|| OperationError::InvalidPath(path.to_vec()))
    }
}

/// Tie-breaking for concurrent edits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformOptions {
    /// When both sides write the same place, `a` wins
    pub priority_a: bool,
}

impl TransformOptions {
    pub fn new(priority_a: bool) -> Self {
        Self { priority_a }
    }
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self { priority_a: true }
    }
}

impl Operation {
    pub fn create(path: Vec<String>, val: impl Into<PropertyValue>) -> Self {
        Operation::Create { path, val: val.into() }
    }

    pub fn delete(path: Vec<String>, val: impl Into<PropertyValue>) -> Self {
        Operation::Delete { path, val: val.into() }
    }

    pub fn update(path: Vec<String>, diff: Diff) -> Self {
        Operation::Update { path, diff }
    }

    pub fn set(path: Vec<String>, original: impl Into<PropertyValue>, val: impl Into<PropertyValue>) -> Self {
        Operation::Set {
            path,
            original: original.into(),
            val: val.into(),
        }
    }

    pub fn compound(ops: Vec<Operation>) -> Self {
        Operation::Compound { ops }
    }

    /// Create carrying the node's flat form
    pub fn create_node(node: &Node) -> Self {
        Operation::create(vec![node.id.clone()], node.to_value())
    }

    /// Delete carrying the node's final snapshot
    pub fn delete_node(node: &Node) -> Self {
        Operation::delete(vec![node.id.clone()], node.to_value())
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Nop => OperationKind::Nop,
            Operation::Create { .. } => OperationKind::Create,
            Operation::Delete { .. } => OperationKind::Delete,
            Operation::Update { .. } => OperationKind::Update,
            Operation::Set { .. } => OperationKind::Set,
            Operation::Compound { .. } => OperationKind::Compound,
        }
    }

    /// Target path; empty for Nop and Compound
    pub fn path(&self) -> &[String] {
        match self {
            Operation::Create { path, .. }
            | Operation::Delete { path, .. }
            | Operation::Update { path, .. }
            | Operation::Set { path, .. } => path,
            Operation::Nop | Operation::Compound { .. } => &[],
        }
    }

    /// Diff kind of an Update
    pub fn property_type(&self) -> Option<DiffKind> {
        match self {
            Operation::Update { diff, .. } => Some(diff.kind()),
            _ => None,
        }
    }

    pub fn is_nop(&self) -> bool {
        match self {
            Operation::Nop => true,
            Operation::Compound { ops } => ops.iter().all(Operation::is_nop),
            _ => false,
        }
    }

    /// Non-nop atomic operations in application order
    pub fn atomic_ops(&self) -> Vec<&Operation> {
        let mut out = Vec::new();
        self.collect_atomic(&mut out);
        out
    }

    fn collect_atomic<'a>(&'a self, out: &mut Vec<&'a Operation>) {
        match self {
            Operation::Nop => {}
            Operation::Compound { ops } => {
                for op in ops {
                    op.collect_atomic(out);
                }
            }
            atomic => out.push(atomic),
        }
    }

    /// Apply through an adapter. Compound children run in order and a
    /// failure leaves the earlier children applied.
    pub fn apply<A: ObjectAdapter + ?Sized>(&self, adapter: &mut A) -> OperationResult<()> {
        match self {
            Operation::Nop => Ok(()),
            Operation::Create { path, val } => adapter.create(path, val),
            Operation::Delete { path, val } => adapter.delete(path, val),
            Operation::Update { path, diff } => adapter.update(path, diff),
            Operation::Set { path, val, .. } => adapter.set(path, val),
            Operation::Compound { ops } => {
                for (i, op) in ops.iter().enumerate() {
                    if let Err(e) = op.apply(adapter) {
                        warn!("compound operation failed at child {} of {}: {}", i, ops.len(), e);
                        return Err(e);
                    }
                }
                Ok(())
            }
        }
    }

    pub fn invert(&self) -> Operation {
        match self {
            Operation::Nop => Operation::Nop,
            Operation::Create { path, val } => Operation::delete(path.clone(), val.clone()),
            Operation::Delete { path, val } => Operation::create(path.clone(), val.clone()),
            Operation::Update { path, diff } => Operation::update(path.clone(), diff.invert()),
            Operation::Set { path, original, val } => Operation::set(path.clone(), val.clone(), original.clone()),
            Operation::Compound { ops } => Operation::compound(ops.iter().rev().map(Operation::invert).collect()),
        }
    }

    /// Transform two concurrent operations so that applying `b'` after `a`
    /// gives the same state as applying `a'` after `b`.
    ///
    /// Disjoint paths pass through. Writes to the same place are settled by
    /// `options.priority_a`; Set and Delete always absorb a concurrent Update
    /// at or below their path.
    pub fn transform(a: &Operation, b: &Operation, options: &TransformOptions) -> OperationResult<(Operation, Operation)> {
        match (a, b) {
            (Operation::Nop, _) | (_, Operation::Nop) => Ok((a.clone(), b.clone())),
            (Operation::Compound { ops }, _) => {
                let mut b = b.clone();
                let mut out = Vec::with_capacity(ops.len());
                for op in ops {
                    let (op_t, b_t) = Operation::transform(op, &b, options)?;
                    out.push(op_t);
                    b = b_t;
                }
                Ok((Operation::compound(out), b))
            }
            (_, Operation::Compound { ops }) => {
                let mut a = a.clone();
                let mut out = Vec::with_capacity(ops.len());
                for op in ops {
                    let (a_t, op_t) = Operation::transform(&a, op, options)?;
                    a = a_t;
                    out.push(op_t);
                }
                Ok((a, Operation::compound(out)))
            }
            _ => transform_atomic(a, b, options.priority_a),
        }
    }

    /// Copy with every path starting with `from` re-rooted at `to`
    pub fn rebase(&self, from: &[String], to: &[String]) -> Operation {
        let reroot = |path: &Vec<String>| -> Vec<String> {
            match path.strip_prefix(from) {
                Some(rest) => to.iter().chain(rest).cloned().collect(),
                None => path.clone(),
            }
        };
        match self {
            Operation::Nop => Operation::Nop,
            Operation::Create { path, val } => Operation::create(reroot(path), val.clone()),
            Operation::Delete { path, val } => Operation::delete(reroot(path), val.clone()),
            Operation::Update { path, diff } => Operation::update(reroot(path), diff.clone()),
            Operation::Set { path, original, val } => Operation::set(reroot(path), original.clone(), val.clone()),
            Operation::Compound { ops } => Operation::compound(ops.iter().map(|op| op.rebase(from, to)).collect()),
        }
    }

    pub fn matches(&self, matcher: &OperationMatcher) -> bool {
        matcher.matches(self)
    }

    /// Decode from JSON, rejecting unrecognized `type` tags
    pub fn from_json(json: &str) -> OperationResult<Operation> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| OperationError::Malformed(e.to_string()))?;
        Operation::from_json_value(value)
    }

    pub fn from_json_value(value: serde_json::Value) -> OperationResult<Operation> {
        check_tags(&value)?;
        serde_json::from_value(value).map_err(|e| OperationError::Malformed(e.to_string()))
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Compound { ops } => write!(f, "compound({})", ops.len()),
            Operation::Update { path, diff } => write!(f, "update[{}] {}", diff.kind(), path.join(".")),
            other => write!(f, "{} {}", other.kind(), other.path().join(".")),
        }
    }
}

fn check_tags(value: &serde_json::Value) -> OperationResult<()> {
    let tag = value
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or_else(|| OperationError::Malformed("missing operation type".to_string()))?;
    if !OPERATION_TAGS.contains(&tag) {
        return Err(OperationError::UnknownTag(tag.to_string()));
    }

    match tag {
        "compound" => {
            if let Some(ops) = value.get("ops").and_then(|ops| ops.as_array()) {
                for op in ops {
                    check_tags(op)?;
                }
            }
        }
        "update" => {
            if let Some(diff) = value.get("diff") {
                if diff.get("propertyType").and_then(|t| t.as_str()) == Some("object") {
                    if let Some(inner) = diff.get("ops") {
                        check_tags(inner)?;
                    }
                }
            }
        }
        _ => {}
    }
    Ok(())
}

fn transform_atomic(a: &Operation, b: &Operation, a_wins: bool) -> OperationResult<(Operation, Operation)> {
    let (pa, pb) = (a.path(), b.path());
    if pa == pb {
        transform_same_path(a, b, a_wins)
    } else if pb.starts_with(pa) {
        transform_nested(a, b, a_wins)
    } else if pa.starts_with(pb) {
        let (b_t, a_t) = transform_nested(b, a, !a_wins)?;
        Ok((a_t, b_t))
    } else {
        Ok((a.clone(), b.clone()))
    }
}

fn transform_same_path(a: &Operation, b: &Operation, a_wins: bool) -> OperationResult<(Operation, Operation)> {
    use Operation::*;

    let path = a.path().to_vec();
    match (a, b) {
        (Update { diff: da, .. }, Update { diff: db, .. }) => {
            if da.kind() != db.kind() {
                return Err(OperationError::Conflict(path));
            }
            let (da_t, db_t) = Diff::transform(da, db, a_wins)?;
            Ok((Operation::update(path.clone(), da_t), Operation::update(path, db_t)))
        }
        (Delete { .. }, Delete { .. }) => Ok((Nop, Nop)),
        (Create { val: va, .. } | Set { val: va, .. }, Create { val: vb, .. } | Set { val: vb, .. }) => {
            if a_wins {
                Ok((Operation::set(path, vb.clone(), va.clone()), Nop))
            } else {
                Ok((Nop, Operation::set(path, va.clone(), vb.clone())))
            }
        }
        (Delete { .. }, Create { .. } | Set { .. }) => delete_against_write(a, b, a_wins),
        (Create { .. } | Set { .. }, Delete { .. }) => {
            let (b_t, a_t) = delete_against_write(b, a, !a_wins)?;
            Ok((a_t, b_t))
        }
        (Update { .. }, _) => {
            let (b_t, a_t) = overwrite_update(b, a)?;
            Ok((a_t, b_t))
        }
        (_, Update { .. }) => overwrite_update(a, b),
        _ => Err(OperationError::Conflict(path)),
    }
}

/// Returns `(delete', write')`
fn delete_against_write(del: &Operation, write: &Operation, del_wins: bool) -> OperationResult<(Operation, Operation)> {
    let (Operation::Delete { path, .. }, Operation::Create { val, .. } | Operation::Set { val, .. }) = (del, write)
    else {
        return Err(OperationError::Conflict(del.path().to_vec()));
    };
    if del_wins {
        Ok((Operation::delete(path.clone(), val.clone()), Operation::Nop))
    } else {
        Ok((Operation::Nop, Operation::create(path.clone(), val.clone())))
    }
}

/// A Set or Delete at the same path as an Update; returns `(writer', update')`
fn overwrite_update(writer: &Operation, update: &Operation) -> OperationResult<(Operation, Operation)> {
    let Operation::Update { diff, .. } = update else {
        return Err(OperationError::Conflict(update.path().to_vec()));
    };
    let conflict = || OperationError::Conflict(writer.path().to_vec());

    match writer {
        Operation::Set { path, original, val } => {
            let mut original = original.clone();
            diff.apply_to(&mut original).map_err(|_| conflict())?;
            Ok((Operation::set(path.clone(), original, val.clone()), Operation::Nop))
        }
        Operation::Delete { path, val } => {
            let mut snapshot = val.clone();
            diff.apply_to(&mut snapshot).map_err(|_| conflict())?;
            Ok((Operation::delete(path.clone(), snapshot), Operation::Nop))
        }
        _ => Err(conflict()),
    }
}

/// `outer` targets a strict prefix of `inner`'s path; returns `(outer', inner')`
fn transform_nested(outer: &Operation, inner: &Operation, outer_wins: bool) -> OperationResult<(Operation, Operation)> {
    let prefix = outer.path();
    let relative = inner.rebase(prefix, &[]);
    let conflict = || OperationError::Conflict(inner.path().to_vec());

    match outer {
        Operation::Delete { path, val } => {
            let mut snapshot = val.clone();
            relative
                .apply(&mut ValueAdapter::new(&mut snapshot))
                .map_err(|_| conflict())?;
            Ok((Operation::delete(path.clone(), snapshot), Operation::Nop))
        }
        Operation::Set { path, original, val } => {
            let mut original = original.clone();
            relative
                .apply(&mut ValueAdapter::new(&mut original))
                .map_err(|_| conflict())?;
            Ok((Operation::set(path.clone(), original, val.clone()), Operation::Nop))
        }
        Operation::Update {
            path,
            diff: Diff::Object(nested),
        } => {
            let (nested_t, relative_t) =
                Operation::transform(nested, &relative, &TransformOptions::new(outer_wins))?;
            Ok((
                Operation::update(path.clone(), Diff::Object(Box::new(nested_t))),
                relative_t.rebase(&[], path),
            ))
        }
        _ => Err(conflict()),
    }
}

/// Declarative listener filter
///
/// Every present field must match. Path patterns match a prefix of the
/// operation path, with `"*"` matching any single segment. A compound
/// operation matches when any of its children does.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationMatcher {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<OperationKind>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<String>>,

    #[serde(default, rename = "propertyType", skip_serializing_if = "Option::is_none")]
    pub property_type: Option<DiffKind>,
}

impl OperationMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_kind(mut self, kind: OperationKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_path<I, S>(mut self, pattern: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.path = Some(pattern.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_property_type(mut self, kind: DiffKind) -> Self {
        self.property_type = Some(kind);
        self
    }

    pub fn matches(&self, op: &Operation) -> bool {
        if let Operation::Compound { ops } = op {
            return ops.iter().any(|child| self.matches(child));
        }
        if self.kind.is_some_and(|kind| kind != op.kind()) {
            return false;
        }
        if self.property_type.is_some() && self.property_type != op.property_type() {
            return false;
        }
        if let Some(pattern) = &self.path {
            let path = op.path();
            if pattern.len() > path.len() {
                return false;
            }
            return pattern
                .iter()
                .zip(path)
                .all(|(expected, actual)| expected == "*" || expected == actual);
        }
        true
    }
}
