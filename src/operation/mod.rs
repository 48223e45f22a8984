//! Operation model
//!
//! Every graph edit is an [`Operation`] value: Create, Delete, Update, Set
//! or Compound. Operations are applied through an [`ObjectAdapter`], are
//! invertible, and can be transformed against concurrent operations.
//!
//! Update operations carry a [`Diff`] whose kind matches the property's base
//! type: [`TextOperation`] for strings, [`ArrayOperation`] for arrays, and a
//! nested [`Operation`] for objects.

pub mod array;
pub mod object;
pub mod text;

pub use array::ArrayOperation;
pub use object::{
    Diff, DiffInput, DiffKind, ObjectAdapter, Operation, OperationKind, OperationMatcher,
    TransformOptions, ValueAdapter,
};
pub use text::TextOperation;

use thiserror::Error;

/// Errors raised while decoding, applying or transforming operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OperationError {
    #[error("No diff algorithm for base type {0}")]
    UnsupportedType(String),

    #[error("Malformed operation: {0}")]
    Malformed(String),

    #[error("Unknown operation tag: {0}")]
    UnknownTag(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid path: {0:?}")]
    InvalidPath(Vec<String>),

    #[error("Index {index} out of bounds (length {len})")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("Expected {expected} but found {found}")]
    Mismatch { expected: String, found: String },

    #[error("Conflicting operations on {0:?} cannot be transformed")]
    Conflict(Vec<String>),
}

pub type OperationResult<T> = Result<T, OperationError>;
