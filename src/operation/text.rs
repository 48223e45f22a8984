//! Text diffs: character-index inserts and deletes over strings
//!
//! Positions count Unicode scalar values, not bytes.

use super::{OperationError, OperationResult};
use crate::graph::PropertyValue;
use serde::{Deserialize, Serialize};

/// An edit script over a string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum TextOperation {
    Insert { pos: usize, text: String },
    Delete { pos: usize, text: String },
    Compound { ops: Vec<TextOperation> },
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

impl TextOperation {
    pub fn insert(pos: usize, text: impl Into<String>) -> Self {
        TextOperation::Insert {
            pos,
            text: text.into(),
        }
    }

    pub fn delete(pos: usize, text: impl Into<String>) -> Self {
        TextOperation::Delete {
            pos,
            text: text.into(),
        }
    }

    pub fn compound(ops: Vec<TextOperation>) -> Self {
        TextOperation::Compound { ops }
    }

    /// True if applying this leaves every string unchanged
    pub fn is_noop(&self) -> bool {
        match self {
            TextOperation::Insert { text, .. } | TextOperation::Delete { text, .. } => text.is_empty(),
            TextOperation::Compound { ops } => ops.iter().all(TextOperation::is_noop),
        }
    }

    /// Apply to `input`, producing a new string
    pub fn apply(&self, input: &str) -> OperationResult<String> {
        match self {
            TextOperation::Insert { pos, text } => {
                let mut chars: Vec<char> = input.chars().collect();
                if *pos > chars.len() {
                    return Err(OperationError::IndexOutOfBounds {
                        index: *pos,
                        len: chars.len(),
                    });
                }
                chars.splice(*pos..*pos, text.chars());
                Ok(chars.into_iter().collect())
            }
            TextOperation::Delete { pos, text } => {
                let mut chars: Vec<char> = input.chars().collect();
                let end = pos
                    .checked_add(char_len(text))
                    .filter(|end| *end <= chars.len())
                    .ok_or(OperationError::IndexOutOfBounds {
                        index: *pos,
                        len: chars.len(),
                    })?;
                let removed: String = chars[*pos..end].iter().collect();
                if removed != *text {
                    return Err(OperationError::Mismatch {
                        expected: text.clone(),
                        found: removed,
                    });
                }
                chars.drain(*pos..end);
                Ok(chars.into_iter().collect())
            }
            TextOperation::Compound { ops } => ops
                .iter()
                .try_fold(input.to_string(), |acc, op| op.apply(&acc)),
        }
    }

    pub fn invert(&self) -> TextOperation {
        match self {
            TextOperation::Insert { pos, text } => TextOperation::delete(*pos, text.clone()),
            TextOperation::Delete { pos, text } => TextOperation::insert(*pos, text.clone()),
            TextOperation::Compound { ops } => {
                TextOperation::compound(ops.iter().rev().map(TextOperation::invert).collect())
            }
        }
    }

    /// Transform two concurrent edits made against the same string.
    ///
    /// Returns `(a', b')` with `b'.apply(a.apply(s)) == a'.apply(b.apply(s))`.
    /// Inserts at the same position are ordered by `a_wins`: the winner's
    /// text ends up first.
    pub fn transform(a: &TextOperation, b: &TextOperation, a_wins: bool) -> (TextOperation, TextOperation) {
        use TextOperation::*;

        match (a, b) {
            (Compound { ops }, _) => {
                let mut b = b.clone();
                let mut out = Vec::with_capacity(ops.len());
                for op in ops {
                    let (op_t, b_t) = TextOperation::transform(op, &b, a_wins);
                    out.push(op_t);
                    b = b_t;
                }
                (TextOperation::compound(out), b)
            }
            (_, Compound { ops }) => {
                let mut a = a.clone();
                let mut out = Vec::with_capacity(ops.len());
                for op in ops {
                    let (a_t, op_t) = TextOperation::transform(&a, op, a_wins);
                    a = a_t;
                    out.push(op_t);
                }
                (a, TextOperation::compound(out))
            }
            (Insert { pos: pa, text: ta }, Insert { pos: pb, text: tb }) => {
                if pa < pb || (pa == pb && a_wins) {
                    (a.clone(), TextOperation::insert(pb.saturating_add(char_len(ta)), tb.clone()))
                } else {
                    (TextOperation::insert(pa.saturating_add(char_len(tb)), ta.clone()), b.clone())
                }
            }
            (Insert { .. }, Delete { .. }) => transform_insert_delete(a, b),
            (Delete { .. }, Insert { .. }) => {
                let (b_t, a_t) = transform_insert_delete(b, a);
                (a_t, b_t)
            }
            (Delete { pos: pa, text: ta }, Delete { pos: pb, text: tb }) => (
                delete_after_delete(*pa, ta, *pb, char_len(tb)),
                delete_after_delete(*pb, tb, *pa, char_len(ta)),
            ),
        }
    }

    /// Build from an ot.js-style sequence against `original`: positive
    /// numbers retain, negative numbers delete, strings insert.
    pub fn from_sequence(original: &str, sequence: &[PropertyValue]) -> OperationResult<TextOperation> {
        let source: Vec<char> = original.chars().collect();
        let mut pos = 0usize;
        let mut src = 0usize;
        let mut ops = Vec::new();

        for step in sequence {
            match step {
                PropertyValue::Number(n) => {
                    let count = step_count(*n)?;
                    let end = src
                        .checked_add(count)
                        .filter(|end| *end <= source.len())
                        .ok_or(OperationError::IndexOutOfBounds {
                            index: src.saturating_add(count),
                            len: source.len(),
                        })?;
                    if n.is_sign_negative() {
                        let text: String = source[src..end].iter().collect();
                        ops.push(TextOperation::delete(pos, text));
                    } else {
                        pos += count;
                    }
                    src = end;
                }
                PropertyValue::String(text) => {
                    ops.push(TextOperation::insert(pos, text.clone()));
                    pos = pos.checked_add(char_len(text)).ok_or(OperationError::IndexOutOfBounds {
                        index: pos,
                        len: source.len(),
                    })?;
                }
                other => {
                    return Err(OperationError::Malformed(format!(
                        "unexpected text step {}",
                        other
                    )))
                }
            }
        }

        Ok(match ops.len() {
            1 => ops.remove(0),
            _ => TextOperation::compound(ops),
        })
    }
}

/// Retain or delete count of a script step; fractions are rejected
fn step_count(n: f64) -> OperationResult<usize> {
    if !n.is_finite() || n.fract() != 0.0 {
        return Err(OperationError::Malformed(format!("expected a whole count, found {}", n)));
    }
    Ok(n.abs() as usize)
}

/// `ins` and `del` are concurrent; returns `(ins', del')`
fn transform_insert_delete(ins: &TextOperation, del: &TextOperation) -> (TextOperation, TextOperation) {
    let (TextOperation::Insert { pos: pi, text: ti }, TextOperation::Delete { pos: pd, text: td }) = (ins, del)
    else {
        return (ins.clone(), del.clone());
    };
    let li = char_len(ti);
    let ld = char_len(td);

    if pi <= pd {
        (ins.clone(), TextOperation::delete(pd.saturating_add(li), td.clone()))
    } else if *pi >= pd.saturating_add(ld) {
        (TextOperation::insert(pi - ld, ti.clone()), del.clone())
    } else {
        // insert lands inside the deleted range: it survives at the range
        // start and the delete is split around it
        let split = pi - pd;
        let head: String = td.chars().take(split).collect();
        let tail: String = td.chars().skip(split).collect();
        (
            TextOperation::insert(*pd, ti.clone()),
            TextOperation::compound(vec![
                TextOperation::delete(*pd, head),
                TextOperation::delete(pd.saturating_add(li), tail),
            ]),
        )
    }
}

/// Rewrite delete `(p1, t1)` to run after a concurrent delete of `l2`
/// characters at `p2`
fn delete_after_delete(p1: usize, t1: &str, p2: usize, l2: usize) -> TextOperation {
    let l1 = char_len(t1);
    let (s1, e1) = (p1, p1.saturating_add(l1));
    let (s2, e2) = (p2, p2.saturating_add(l2));

    if e1 <= s2 {
        TextOperation::delete(p1, t1)
    } else if s1 >= e2 {
        TextOperation::delete(p1 - l2, t1)
    } else {
        let kept: String = t1
            .chars()
            .enumerate()
            .filter(|(i, _)| {
                let abs = s1.saturating_add(*i);
                abs < s2 || abs >= e2
            })
            .map(|(_, c)| c)
            .collect();
        TextOperation::delete(s1.min(s2), kept)
    }
}
