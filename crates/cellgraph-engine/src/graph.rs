//! GraphState: the cell/connection container.
//!
//! [`GraphState`] owns every cell of every node in a single petgraph
//! `StableGraph`. Graph nodes are cells; a directed edge `src -> dst` is a
//! connection making `dst` forward the value of `src`. A cell has at most one
//! incoming connection (its input) and any number of outgoing ones (its
//! downstream observers).
//!
//! `GraphState` is an immutable snapshot from the point of view of
//! evaluation. The [`Engine`](crate::Engine) edits a copy and publishes it
//! with a bumped generation, so evaluations that pinned an older snapshot
//! finish against consistent data.

use std::sync::Arc;

use indexmap::IndexMap;
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableGraph;
use petgraph::visit::EdgeRef;
use petgraph::{Directed, Direction};
use serde::{Deserialize, Serialize};

use cellgraph_core::{CellId, NodeId, Plug, PlugValue, Value, ValueType};

use crate::error::EngineError;
use crate::node::Node;

/// Whether a cell is written by the graph owner or computed by its node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellRole {
    Input,
    Output,
}

/// A named, typed slot owned by a node.
#[derive(Debug, Clone)]
pub struct Cell {
    pub name: String,
    pub owner: NodeId,
    pub role: CellRole,
    pub value_type: ValueType,
    /// Stored local value. Only input cells carry one.
    pub value: Option<Value>,
}

/// Edge weight of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection;

/// A registered node and the cells it owns, in declaration order.
#[derive(Clone)]
pub struct NodeEntry {
    pub name: String,
    pub node: Arc<dyn Node>,
    pub cells: Vec<CellId>,
    /// Nodes built inside this one. They are removed with it.
    pub children: Vec<NodeId>,
}

/// The cell/connection graph plus node registry.
#[derive(Clone, Default)]
pub struct GraphState {
    cells: StableGraph<Cell, Connection, Directed, u32>,
    nodes: IndexMap<NodeId, NodeEntry>,
    next_node_id: u32,
    generation: u64,
}

impl GraphState {
    pub fn new() -> Self {
        GraphState::default()
    }

    // -----------------------------------------------------------------------
    // Read-only accessors
    // -----------------------------------------------------------------------

    /// Monotonic edit counter of this snapshot.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn cell(&self, id: CellId) -> Result<&Cell, EngineError> {
        self.cells
            .node_weight(NodeIndex::from(id))
            .ok_or(EngineError::CellNotFound(id))
    }

    pub fn contains_cell(&self, id: CellId) -> bool {
        self.cells.contains_node(NodeIndex::from(id))
    }

    pub fn cell_count(&self) -> usize {
        self.cells.node_count()
    }

    /// The cell `id` takes its value from, if connected.
    pub fn input(&self, id: CellId) -> Option<CellId> {
        self.cells
            .edges_directed(NodeIndex::from(id), Direction::Incoming)
            .next()
            .map(|edge| CellId::from(edge.source()))
    }

    /// Cells connected downstream of `id`, in id order.
    pub fn outputs(&self, id: CellId) -> Vec<CellId> {
        let mut out: Vec<CellId> = self
            .cells
            .edges_directed(NodeIndex::from(id), Direction::Outgoing)
            .map(|edge| CellId::from(edge.target()))
            .collect();
        out.sort();
        out
    }

    pub fn node(&self, id: NodeId) -> Result<&NodeEntry, EngineError> {
        self.nodes.get(&id).ok_or(EngineError::NodeNotFound(id))
    }

    /// The node owning cell `id`.
    pub fn owner(&self, id: CellId) -> Result<&NodeEntry, EngineError> {
        let cell = self.cell(id)?;
        self.node(cell.owner)
    }

    /// Cells of `id` and of every node nested inside it.
    pub fn owned_cells(&self, id: NodeId) -> Result<Vec<CellId>, EngineError> {
        let entry = self.node(id)?;
        let mut cells = entry.cells.clone();
        for &child in &entry.children {
            cells.extend(self.owned_cells(child)?);
        }
        Ok(cells)
    }

    /// Registered nodes in creation order. Nested nodes precede their parent.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &NodeEntry)> {
        self.nodes.iter().map(|(id, entry)| (*id, entry))
    }

    /// Human-readable `node.cell` path, used in logs and errors.
    pub fn cell_path(&self, id: CellId) -> String {
        match self.cell(id) {
            Ok(cell) => match self.nodes.get(&cell.owner) {
                Some(entry) => format!("{}.{}", entry.name, cell.name),
                None => cell.name.clone(),
            },
            Err(_) => format!("<cell {id}>"),
        }
    }

    // -----------------------------------------------------------------------
    // Mutators (engine-internal; callers go through `Engine`)
    // -----------------------------------------------------------------------

    pub(crate) fn bump_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    pub(crate) fn allocate_node_id(&mut self) -> NodeId {
        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;
        id
    }

    pub(crate) fn add_cell(&mut self, cell: Cell) -> CellId {
        CellId::from(self.cells.add_node(cell))
    }

    pub(crate) fn insert_node(&mut self, id: NodeId, entry: NodeEntry) {
        self.nodes.insert(id, entry);
    }

    /// Stores `value` on an unconnected input cell.
    pub(crate) fn set_stored_value(&mut self, id: CellId, value: Value) -> Result<(), EngineError> {
        self.check_settable(id, value.value_type())?;
        if let Some(cell) = self.cells.node_weight_mut(NodeIndex::from(id)) {
            cell.value = Some(value);
        }
        Ok(())
    }

    /// Validates that `id` is an unconnected input of type `value_type`.
    pub(crate) fn check_settable(&self, id: CellId, value_type: ValueType) -> Result<(), EngineError> {
        let cell = self.cell(id)?;
        if cell.role != CellRole::Input {
            return Err(EngineError::NotAnInput {
                cell: self.cell_path(id),
            });
        }
        if self.input(id).is_some() {
            return Err(EngineError::InputConnected {
                cell: self.cell_path(id),
            });
        }
        if cell.value_type != value_type {
            return Err(EngineError::TypeMismatch {
                cell: id,
                expected: cell.value_type,
                found: value_type,
            });
        }
        Ok(())
    }

    /// Connects `src -> dst`, replacing any existing input of `dst`.
    ///
    /// Type-checks the pair; cycle detection is the caller's job (it runs a
    /// propagation from `dst` on the edited copy).
    pub(crate) fn set_input(&mut self, src: CellId, dst: CellId) -> Result<(), EngineError> {
        let src_type = self.cell(src)?.value_type;
        let dst_type = self.cell(dst)?.value_type;
        if src_type != dst_type {
            return Err(EngineError::TypeMismatch {
                cell: dst,
                expected: dst_type,
                found: src_type,
            });
        }
        self.clear_input(dst);
        self.cells
            .add_edge(NodeIndex::from(src), NodeIndex::from(dst), Connection);
        Ok(())
    }

    /// Removes the input connection of `dst`. Returns the former source.
    pub(crate) fn clear_input(&mut self, dst: CellId) -> Option<CellId> {
        let edge = self
            .cells
            .edges_directed(NodeIndex::from(dst), Direction::Incoming)
            .next()
            .map(|edge| (edge.id(), CellId::from(edge.source())));
        edge.map(|(edge_id, src)| {
            self.cells.remove_edge(edge_id);
            src
        })
    }

    /// Removes a node, its nested nodes and all of their cells (and therefore
    /// their connections).
    pub(crate) fn remove_node(&mut self, id: NodeId) -> Result<NodeEntry, EngineError> {
        let entry = self
            .nodes
            .shift_remove(&id)
            .ok_or(EngineError::NodeNotFound(id))?;
        for &child in &entry.children {
            if self.nodes.contains_key(&child) {
                self.remove_node(child)?;
            }
        }
        for &cell in &entry.cells {
            self.cells.remove_node(NodeIndex::from(cell));
        }
        Ok(entry)
    }
}

// ---------------------------------------------------------------------------
// NodeBuilder
// ---------------------------------------------------------------------------

/// Allocates a node's cells while the node is being constructed.
///
/// Cells are created in declaration order, so a node always gets the same
/// relative layout. Handles come back as typed [`Plug<T>`]s for the node
/// struct to keep.
pub struct NodeBuilder<'g> {
    state: &'g mut GraphState,
    node: NodeId,
    name: String,
    cells: Vec<CellId>,
    children: Vec<NodeId>,
}

impl<'g> NodeBuilder<'g> {
    pub(crate) fn new(state: &'g mut GraphState, node: NodeId, name: &str) -> Self {
        NodeBuilder {
            state,
            node,
            name: name.to_string(),
            cells: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node
    }

    /// Declares an input cell holding `default` until set or connected.
    pub fn input<T: PlugValue>(&mut self, name: &str, default: T) -> Plug<T> {
        let id = self.state.add_cell(Cell {
            name: name.to_string(),
            owner: self.node,
            role: CellRole::Input,
            value_type: T::TYPE,
            value: Some(default.into_value()),
        });
        self.cells.push(id);
        Plug::new(id)
    }

    /// Declares an output cell computed by the node.
    pub fn output<T: PlugValue>(&mut self, name: &str) -> Plug<T> {
        let id = self.state.add_cell(Cell {
            name: name.to_string(),
            owner: self.node,
            role: CellRole::Output,
            value_type: T::TYPE,
            value: None,
        });
        self.cells.push(id);
        Plug::new(id)
    }

    /// Builds a node nested inside this one, registered as `<parent>.<name>`.
    ///
    /// The child's cells live in the same graph, so the parent can wire its
    /// own cells to them with [`connect`](Self::connect). Removing the parent
    /// removes the child.
    pub fn child<N, F>(&mut self, name: &str, build: F) -> Arc<N>
    where
        N: Node,
        F: FnOnce(&mut NodeBuilder<'_>) -> N,
    {
        let id = self.state.allocate_node_id();
        let path = format!("{}.{}", self.name, name);
        let mut builder = NodeBuilder::new(&mut *self.state, id, &path);
        let node = Arc::new(build(&mut builder));
        let (cells, children) = builder.finish();
        self.state.insert_node(
            id,
            NodeEntry {
                name: path,
                node: node.clone(),
                cells,
                children,
            },
        );
        self.children.push(id);
        node
    }

    /// Wires two cells built through this builder or its children. Both
    /// plugs share `T`, so the connection is always well-typed.
    pub fn connect<T: PlugValue>(&mut self, src: Plug<T>, dst: Plug<T>) {
        self.state.clear_input(dst.cell());
        self.state.cells.add_edge(
            NodeIndex::from(src.cell()),
            NodeIndex::from(dst.cell()),
            Connection,
        );
    }

    /// The node's own cells and the ids of its nested nodes.
    pub(crate) fn finish(self) -> (Vec<CellId>, Vec<NodeId>) {
        (self.cells, self.children)
    }
}
