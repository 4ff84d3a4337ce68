//! Stable ID newtypes for graph entities.
//!
//! Both IDs are distinct newtype wrappers over `u32`, providing type safety
//! so that a `CellId` cannot be accidentally used where a `NodeId` is expected.
//! A `CellId` is the graph container's stable index for the cell; it is never
//! reused while the owning node is alive.

use std::fmt;

use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};

/// Stable cell identifier. Maps one-to-one onto the graph container's node index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellId(pub u32);

/// Identity of a node (the owner of a group of cells).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

// Display implementations -- just print the inner value.

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Bridge between CellId and petgraph's NodeIndex<u32>.

impl From<NodeIndex<u32>> for CellId {
    fn from(idx: NodeIndex<u32>) -> Self {
        CellId(idx.index() as u32)
    }
}

impl From<CellId> for NodeIndex<u32> {
    fn from(id: CellId) -> Self {
        NodeIndex::new(id.0 as usize)
    }
}
