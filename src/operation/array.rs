//! Array diffs: index-based insert, delete and move, applied in place

use super::{OperationError, OperationResult};
use crate::graph::PropertyValue;
use serde::{Deserialize, Serialize};

/// An edit script over an array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum ArrayOperation {
    Insert { pos: usize, value: PropertyValue },
    Delete { pos: usize, value: PropertyValue },
    /// Remove the element at `from`, then insert it so it ends up at `to`
    Move { from: usize, to: usize },
    Compound { ops: Vec<ArrayOperation> },
}

impl ArrayOperation {
    pub fn insert(pos: usize, value: impl Into<PropertyValue>) -> Self {
        ArrayOperation::Insert {
            pos,
            value: value.into(),
        }
    }

    pub fn delete(pos: usize, value: impl Into<PropertyValue>) -> Self {
        ArrayOperation::Delete {
            pos,
            value: value.into(),
        }
    }

    pub fn move_item(from: usize, to: usize) -> Self {
        ArrayOperation::Move { from, to }
    }

    pub fn compound(ops: Vec<ArrayOperation>) -> Self {
        ArrayOperation::Compound { ops }
    }

    pub fn nop() -> Self {
        ArrayOperation::Compound { ops: Vec::new() }
    }

    pub fn is_noop(&self) -> bool {
        match self {
            ArrayOperation::Move { from, to } => from == to,
            ArrayOperation::Compound { ops } => ops.iter().all(ArrayOperation::is_noop),
            _ => false,
        }
    }

    /// Apply in place
    pub fn apply(&self, array: &mut Vec<PropertyValue>) -> OperationResult<()> {
        match self {
            ArrayOperation::Insert { pos, value } => {
                if *pos > array.len() {
                    return Err(OperationError::IndexOutOfBounds {
                        index: *pos,
                        len: array.len(),
                    });
                }
                array.insert(*pos, value.clone());
            }
            ArrayOperation::Delete { pos, value } => {
                let current = array.get(*pos).ok_or(OperationError::IndexOutOfBounds {
                    index: *pos,
                    len: array.len(),
                })?;
                if current != value {
                    return Err(OperationError::Mismatch {
                        expected: value.to_string(),
                        found: current.to_string(),
                    });
                }
                array.remove(*pos);
            }
            ArrayOperation::Move { from, to } => {
                let len = array.len();
                if *from >= len || *to >= len {
                    return Err(OperationError::IndexOutOfBounds {
                        index: (*from).max(*to),
                        len,
                    });
                }
                let item = array.remove(*from);
                array.insert(*to, item);
            }
            ArrayOperation::Compound { ops } => {
                for op in ops {
                    op.apply(array)?;
                }
            }
        }
        Ok(())
    }

    pub fn invert(&self) -> ArrayOperation {
        match self {
            ArrayOperation::Insert { pos, value } => ArrayOperation::delete(*pos, value.clone()),
            ArrayOperation::Delete { pos, value } => ArrayOperation::insert(*pos, value.clone()),
            ArrayOperation::Move { from, to } => ArrayOperation::move_item(*to, *from),
            ArrayOperation::Compound { ops } => {
                ArrayOperation::compound(ops.iter().rev().map(ArrayOperation::invert).collect())
            }
        }
    }

    /// Transform two concurrent edits made against the same array.
    ///
    /// Returns `(a', b')` with `b' ∘ a == a' ∘ b`. Equal-position inserts
    /// and moves of the same element are decided by `a_wins`; deleting the
    /// same element on both sides turns both into no-ops.
    pub fn transform(a: &ArrayOperation, b: &ArrayOperation, a_wins: bool) -> (ArrayOperation, ArrayOperation) {
        use ArrayOperation::*;

        match (a, b) {
            (Compound { ops }, _) => {
                let mut b = b.clone();
                let mut out = Vec::with_capacity(ops.len());
                for op in ops {
                    let (op_t, b_t) = ArrayOperation::transform(op, &b, a_wins);
                    out.push(op_t);
                    b = b_t;
                }
                (ArrayOperation::compound(out), b)
            }
            (_, Compound { ops }) => {
                let mut a = a.clone();
                let mut out = Vec::with_capacity(ops.len());
                for op in ops {
                    let (a_t, op_t) = ArrayOperation::transform(&a, op, a_wins);
                    a = a_t;
                    out.push(op_t);
                }
                (a, ArrayOperation::compound(out))
            }
            (Insert { pos: pa, value: va }, Insert { pos: pb, value: vb }) => {
                if pa < pb || (pa == pb && a_wins) {
                    (a.clone(), ArrayOperation::insert(pb + 1, vb.clone()))
                } else {
                    (ArrayOperation::insert(pa + 1, va.clone()), b.clone())
                }
            }
            (Insert { .. }, Delete { .. }) => transform_insert_delete(a, b),
            (Delete { .. }, Insert { .. }) => {
                let (b_t, a_t) = transform_insert_delete(b, a);
                (a_t, b_t)
            }
            (Delete { pos: pa, value: va }, Delete { pos: pb, value: vb }) => {
                if pa < pb {
                    (a.clone(), ArrayOperation::delete(pb - 1, vb.clone()))
                } else if pa > pb {
                    (ArrayOperation::delete(pa - 1, va.clone()), b.clone())
                } else {
                    (ArrayOperation::nop(), ArrayOperation::nop())
                }
            }
            (Move { .. }, _) => transform_move(a, b, a_wins),
            (_, Move { .. }) => {
                let (b_t, a_t) = transform_move(b, a, !a_wins);
                (a_t, b_t)
            }
        }
    }

    /// Build from editor-script shorthand against the current array.
    ///
    /// Accepts a single command or a list of commands:
    /// `["+", index, value]`, `["-", index]` / `["-", index, value]`,
    /// `[">>", from, to]`.
    pub fn from_script(current: &[PropertyValue], script: &[PropertyValue]) -> OperationResult<ArrayOperation> {
        let nested = script
            .first()
            .map(|first| matches!(first, PropertyValue::Array(_)))
            .unwrap_or(false);

        if !nested {
            return parse_command(current, script);
        }

        let mut scratch = current.to_vec();
        let mut ops = Vec::with_capacity(script.len());
        for command in script {
            let command = command.as_array().ok_or_else(|| {
                OperationError::Malformed(format!("expected array command, found {}", command))
            })?;
            let op = parse_command(&scratch, command)?;
            op.apply(&mut scratch)?;
            ops.push(op);
        }
        Ok(ArrayOperation::compound(ops))
    }
}

fn parse_index(value: Option<&PropertyValue>) -> OperationResult<usize> {
    match value.and_then(PropertyValue::as_number) {
        Some(n) if n >= 0.0 && n.fract() == 0.0 => Ok(n as usize),
        _ => Err(OperationError::Malformed(format!(
            "expected array index, found {:?}",
            value
        ))),
    }
}

fn parse_command(current: &[PropertyValue], command: &[PropertyValue]) -> OperationResult<ArrayOperation> {
    let tag = command.first().and_then(PropertyValue::as_str).unwrap_or_default();
    match tag {
        "+" => {
            let pos = parse_index(command.get(1))?;
            let value = command.get(2).cloned().unwrap_or(PropertyValue::Null);
            Ok(ArrayOperation::insert(pos, value))
        }
        "-" => {
            let pos = parse_index(command.get(1))?;
            let value = match command.get(2) {
                Some(value) => value.clone(),
                None => current.get(pos).cloned().ok_or(OperationError::IndexOutOfBounds {
                    index: pos,
                    len: current.len(),
                })?,
            };
            Ok(ArrayOperation::delete(pos, value))
        }
        ">>" => Ok(ArrayOperation::move_item(
            parse_index(command.get(1))?,
            parse_index(command.get(2))?,
        )),
        other => Err(OperationError::Malformed(format!("unknown array command {:?}", other))),
    }
}

/// `ins` and `del` are concurrent; returns `(ins', del')`
fn transform_insert_delete(ins: &ArrayOperation, del: &ArrayOperation) -> (ArrayOperation, ArrayOperation) {
    let (ArrayOperation::Insert { pos: pi, value: vi }, ArrayOperation::Delete { pos: pd, value: vd }) = (ins, del)
    else {
        return (ins.clone(), del.clone());
    };
    if pi <= pd {
        (ins.clone(), ArrayOperation::delete(pd + 1, vd.clone()))
    } else {
        (ArrayOperation::insert(pi - 1, vi.clone()), del.clone())
    }
}

/// Position of the element originally at `index` after `Move { from, to }`
fn moved_index(index: usize, from: usize, to: usize) -> usize {
    if index == from {
        return to;
    }
    let shifted = if index > from { index - 1 } else { index };
    if shifted >= to {
        shifted + 1
    } else {
        shifted
    }
}

/// Insertion point `pos` after `Move { from, to }`. An insert anchored on
/// the moved element stays where that element used to be.
fn moved_insert_point(pos: usize, from: usize, to: usize) -> usize {
    if pos == from {
        moved_index(from + 1, from, to)
    } else {
        moved_index(pos, from, to)
    }
}

/// `mv` is a move, `other` any atomic op; returns `(mv', other')`
fn transform_move(mv: &ArrayOperation, other: &ArrayOperation, mv_wins: bool) -> (ArrayOperation, ArrayOperation) {
    let ArrayOperation::Move { from, to } = *mv else {
        return (mv.clone(), other.clone());
    };

    match other {
        ArrayOperation::Insert { pos, value } => {
            let pos_t = moved_insert_point(*pos, from, to);
            let from_t = if *pos <= from { from + 1 } else { from };
            let to_t = if pos_t <= to { to + 1 } else { to };
            (
                ArrayOperation::move_item(from_t, to_t),
                ArrayOperation::insert(pos_t, value.clone()),
            )
        }
        ArrayOperation::Delete { pos, value } => {
            if *pos == from {
                return (ArrayOperation::nop(), ArrayOperation::delete(to, value.clone()));
            }
            let pos_t = moved_index(*pos, from, to);
            let from_t = if *pos < from { from - 1 } else { from };
            let to_t = if pos_t < to { to - 1 } else { to };
            (
                ArrayOperation::move_item(from_t, to_t),
                ArrayOperation::delete(pos_t, value.clone()),
            )
        }
        ArrayOperation::Move {
            from: other_from,
            to: other_to,
        } => {
            if *other_from == from {
                return if mv_wins {
                    (ArrayOperation::move_item(*other_to, to), ArrayOperation::nop())
                } else {
                    (ArrayOperation::nop(), ArrayOperation::move_item(to, *other_to))
                };
            }
            // distinct elements: each move keeps its own target index
            let other_t = ArrayOperation::move_item(moved_index(*other_from, from, to), *other_to);
            let mv_t = ArrayOperation::move_item(moved_index(from, *other_from, *other_to), to);
            (mv_t, other_t)
        }
        ArrayOperation::Compound { .. } => {
            let (other_t, mv_t) = ArrayOperation::transform(other, mv, !mv_wins);
            (mv_t, other_t)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nums(values: &[i64]) -> Vec<PropertyValue> {
        values.iter().map(|v| PropertyValue::from(*v)).collect()
    }

    fn converge(start: &[i64], a: &ArrayOperation, b: &ArrayOperation, a_wins: bool) -> Vec<PropertyValue> {
        let (a_t, b_t) = ArrayOperation::transform(a, b, a_wins);
        let mut left = nums(start);
        a.apply(&mut left).unwrap();
        b_t.apply(&mut left).unwrap();
        let mut right = nums(start);
        b.apply(&mut right).unwrap();
        a_t.apply(&mut right).unwrap();
        assert_eq!(left, right, "a={:?} b={:?}", a, b);
        left
    }

    #[test]
    fn test_insert_append() {
        let mut arr = nums(&[1, 2, 3]);
        ArrayOperation::insert(3, 4i64).apply(&mut arr).unwrap();
        assert_eq!(arr, nums(&[1, 2, 3, 4]));
    }

    #[test]
    fn test_move_and_invert() {
        let mut arr = nums(&[1, 2, 3]);
        let op = ArrayOperation::move_item(0, 2);
        op.apply(&mut arr).unwrap();
        assert_eq!(arr, nums(&[2, 3, 1]));
        op.invert().apply(&mut arr).unwrap();
        assert_eq!(arr, nums(&[1, 2, 3]));
    }

    #[test]
    fn test_delete_checks_value() {
        let mut arr = nums(&[1, 2, 3]);
        assert!(ArrayOperation::delete(0, 9i64).apply(&mut arr).is_err());
        assert!(ArrayOperation::delete(7, 1i64).apply(&mut arr).is_err());
        assert_eq!(arr.len(), 3);
    }

    #[test]
    fn test_transform_insert_delete() {
        let a = ArrayOperation::insert(1, 9i64);
        let b = ArrayOperation::delete(0, 1i64);
        assert_eq!(converge(&[1, 2, 3], &a, &b, true), nums(&[9, 2, 3]));
    }

    #[test]
    fn test_transform_same_delete() {
        let a = ArrayOperation::delete(1, 2i64);
        let (a_t, b_t) = ArrayOperation::transform(&a, &a, true);
        assert!(a_t.is_noop());
        assert!(b_t.is_noop());
    }

    #[test]
    fn test_transform_move_against_insert_and_delete() {
        let mv = ArrayOperation::move_item(0, 2);
        converge(&[1, 2, 3, 4], &mv, &ArrayOperation::insert(1, 9i64), true);
        converge(&[1, 2, 3, 4], &mv, &ArrayOperation::insert(4, 9i64), true);
        converge(&[1, 2, 3, 4], &mv, &ArrayOperation::delete(3, 4i64), true);
        converge(&[1, 2, 3, 4], &mv, &ArrayOperation::delete(0, 1i64), true);
        converge(&[1, 2, 3, 4], &ArrayOperation::insert(2, 9i64), &mv, false);
    }

    #[test]
    fn test_transform_same_move() {
        let a = ArrayOperation::move_item(0, 3);
        let b = ArrayOperation::move_item(0, 1);
        let result = converge(&[1, 2, 3, 4], &a, &b, true);
        assert_eq!(result, nums(&[2, 3, 4, 1]));
    }

    #[test]
    fn test_from_script() {
        let current = nums(&[1, 2, 3]);
        let script = vec![PropertyValue::from("+"), 3i64.into(), 4i64.into()];
        assert_eq!(
            ArrayOperation::from_script(&current, &script).unwrap(),
            ArrayOperation::insert(3, 4i64)
        );

        let script = vec![
            PropertyValue::Array(vec!["-".into(), 0i64.into()]),
            PropertyValue::Array(vec![">>".into(), 0i64.into(), 1i64.into()]),
        ];
        let op = ArrayOperation::from_script(&current, &script).unwrap();
        let mut arr = current.clone();
        op.apply(&mut arr).unwrap();
        assert_eq!(arr, nums(&[3, 2]));
        op.invert().apply(&mut arr).unwrap();
        assert_eq!(arr, current);
    }
}
