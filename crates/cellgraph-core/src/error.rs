//! Core error types for cellgraph-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering the
//! failure modes of the leaf data model. Only reading a value as the wrong
//! type can fail at this level; everything else in the core is total.

use crate::id::CellId;
use crate::value::ValueType;
use thiserror::Error;

/// Core errors produced by the cellgraph-core crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A cell was read (or written) as a type its declared type disagrees with.
    #[error("type mismatch on cell {cell}: expected {expected}, found {found}")]
    TypeMismatch {
        cell: CellId,
        expected: ValueType,
        found: ValueType,
    },
}
