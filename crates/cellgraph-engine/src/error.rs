//! Engine error types for cellgraph-engine.
//!
//! [`EngineError`] covers every failure surfaced by graph edits and
//! evaluation: dependency cycles, type mismatches, node compute failures,
//! cooperative cancellation, graph-container lookups and configuration.
//! Data-model errors from cellgraph-core are wrapped unchanged.
//! All of them are returned synchronously to the immediate caller.

use cellgraph_core::{CellId, CoreError, NodeId, ValueType};
use thiserror::Error;

/// Errors produced by the engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// A dependency cycle was found. `path` lists the cells on the cycle as
    /// `node.cell` paths, starting and ending with the same cell.
    #[error("cyclic dependency: {}", path.join(" -> "))]
    CyclicDependency { path: Vec<String> },

    /// A cell was read, written or connected as a type its declared type
    /// disagrees with.
    #[error("type mismatch on cell {cell}: expected {expected}, found {found}")]
    TypeMismatch {
        cell: CellId,
        expected: ValueType,
        found: ValueType,
    },

    /// A node's compute step failed for domain reasons. Never memoized.
    #[error("compute failed for cell {cell}: {reason}")]
    ComputeFailure { cell: CellId, reason: String },

    /// The caller's cancellation token fired between compute sub-steps.
    #[error("evaluation cancelled")]
    Cancelled,

    /// A cell id does not exist in the graph.
    #[error("cell not found: CellId({0})")]
    CellNotFound(CellId),

    /// A node id does not exist in the graph.
    #[error("node not found: NodeId({0})")]
    NodeNotFound(NodeId),

    /// A value was set on a cell that takes its value from a connection.
    #[error("cell {cell} has an input connection and cannot be set")]
    InputConnected { cell: String },

    /// A value was set on a computed output cell.
    #[error("cell {cell} is an output and cannot be set")]
    NotAnInput { cell: String },

    /// The engine configuration is invalid or could not be loaded.
    #[error("invalid configuration: {reason}")]
    Config { reason: String },

    /// A data-model error, such as reading a value through a plug of the
    /// wrong type.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl EngineError {
    /// Convenience constructor for node compute steps.
    pub fn compute_failure(cell: impl Into<CellId>, reason: impl Into<String>) -> Self {
        EngineError::ComputeFailure {
            cell: cell.into(),
            reason: reason.into(),
        }
    }
}
