//! Dirty propagation.
//!
//! Given a cell that changed, computes the transitive set of cells whose
//! cached fingerprint is now stale. Two kinds of edge are followed:
//!
//! - **Connections**: every cell connected downstream of a dirty cell forwards
//!   it, so it is dirty too.
//! - **Affects**: when a dirty cell is an input of its node, the node's
//!   [`Node::affects`](crate::node::Node::affects) declaration names the cells
//!   it feeds.
//!
//! The walk is a depth-first search with a `visited` set (so diamonds are
//! visited once) and an on-stack set (so a cycle is reported instead of
//! looping). It is pure: it only reads the graph and returns the dirty cells
//! in visit order. Applying the result is the caller's job, and only ever
//! touches fingerprints, never memoized values.

use std::collections::HashSet;

use cellgraph_core::CellId;

use crate::error::EngineError;
use crate::graph::{CellRole, GraphState};

/// Returns every cell made stale by a change to `changed`, `changed` first.
///
/// Fails with [`EngineError::CyclicDependency`] when the walk revisits a cell
/// that is still on the current traversal path.
pub fn dirty_set(state: &GraphState, changed: CellId) -> Result<Vec<CellId>, EngineError> {
    let mut walk = Walk {
        state,
        visited: HashSet::new(),
        on_stack: HashSet::new(),
        stack: Vec::new(),
        order: Vec::new(),
    };
    walk.visit(changed)?;
    Ok(walk.order)
}

/// Dirty set for several changed cells at once, deduplicated, in visit order.
pub fn dirty_set_many(
    state: &GraphState,
    changed: impl IntoIterator<Item = CellId>,
) -> Result<Vec<CellId>, EngineError> {
    let mut walk = Walk {
        state,
        visited: HashSet::new(),
        on_stack: HashSet::new(),
        stack: Vec::new(),
        order: Vec::new(),
    };
    for cell in changed {
        walk.visit(cell)?;
    }
    Ok(walk.order)
}

struct Walk<'a> {
    state: &'a GraphState,
    visited: HashSet<CellId>,
    on_stack: HashSet<CellId>,
    stack: Vec<CellId>,
    order: Vec<CellId>,
}

impl Walk<'_> {
    fn visit(&mut self, cell: CellId) -> Result<(), EngineError> {
        let state = self.state;
        if self.on_stack.contains(&cell) {
            return Err(self.cycle_error(cell));
        }
        if !self.visited.insert(cell) {
            return Ok(());
        }
        self.order.push(cell);

        let mut next = state.outputs(cell);
        let data = state.cell(cell)?;
        if data.role == CellRole::Input {
            let owner = state.node(data.owner)?;
            owner.node.affects(cell, &mut next);
        }

        self.on_stack.insert(cell);
        self.stack.push(cell);
        for affected in next {
            // Reject references to cells that do not exist.
            state.cell(affected)?;
            self.visit(affected)?;
        }
        self.stack.pop();
        self.on_stack.remove(&cell);
        Ok(())
    }

    fn cycle_error(&self, repeated: CellId) -> EngineError {
        let start = self
            .stack
            .iter()
            .position(|&c| c == repeated)
            .unwrap_or(0);
        let mut path: Vec<String> = self.stack[start..]
            .iter()
            .map(|&c| self.state.cell_path(c))
            .collect();
        path.push(self.state.cell_path(repeated));
        EngineError::CyclicDependency { path }
    }
}
