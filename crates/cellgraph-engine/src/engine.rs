//! The engine: graph ownership, edits, and evaluation entry points.
//!
//! [`Engine`] holds the current [`GraphState`] behind `RwLock<Arc<..>>`.
//! Edits take the write lock, apply to a private copy, run dirty propagation
//! on that copy and only publish it (with a bumped generation) if everything
//! succeeded. A rejected edit, such as a connection that would close a cycle,
//! leaves the published graph, the fingerprint cache and the memo table
//! exactly as they were.
//!
//! Readers never hold the lock while evaluating: [`Engine::evaluation`] clones
//! the current `Arc` and works from that snapshot.

use std::num::NonZeroUsize;
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

use cellgraph_core::{CellId, Context, Fingerprint, NodeId, Plug, PlugValue, Value};

use crate::config::{EngineConfig, DEFAULT_MEMO_CAPACITY};
use crate::error::EngineError;
use crate::evaluate::{CancellationToken, Evaluation};
use crate::graph::{GraphState, NodeBuilder, NodeEntry};
use crate::hash_cache::HashCache;
use crate::memo::{CachePolicy, LruPolicy, MemoTable};
use crate::node::Node;
use crate::propagate::{dirty_set, dirty_set_many};
use crate::stats::{EngineStats, StatsSnapshot};

const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(DEFAULT_MEMO_CAPACITY) {
    Some(capacity) => capacity,
    None => panic!("default memo capacity must be non-zero"),
};

pub struct Engine {
    state: RwLock<Arc<GraphState>>,
    pub(crate) hash_cache: HashCache,
    pub(crate) memo: MemoTable,
    pub(crate) stats: EngineStats,
    config: EngineConfig,
}

impl Default for Engine {
    fn default() -> Self {
        Engine::with_policy(EngineConfig::default(), Box::new(LruPolicy::new(DEFAULT_CAPACITY)))
    }
}

impl Engine {
    /// Creates an engine whose memo policy is chosen by `config`.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let policy = config.build_policy()?;
        Ok(Engine::with_policy(config, policy))
    }

    /// Creates an engine backed by a caller-supplied cache policy.
    /// `config.memo_capacity` and `config.cache_policy` are ignored.
    pub fn with_policy(config: EngineConfig, policy: Box<dyn CachePolicy>) -> Self {
        Engine {
            state: RwLock::new(Arc::new(GraphState::new())),
            hash_cache: HashCache::new(config.hash_cache_limit.max(1)),
            memo: MemoTable::new(policy),
            stats: EngineStats::default(),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------------

    /// The currently published graph.
    pub fn snapshot(&self) -> Arc<GraphState> {
        let guard = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    pub fn generation(&self) -> u64 {
        self.snapshot().generation()
    }

    fn write(&self) -> RwLockWriteGuard<'_, Arc<GraphState>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies `edit` to a copy of the graph and publishes it.
    ///
    /// `edit` returns its result plus the cells it dirtied. On error nothing
    /// is published and no cache is touched.
    fn edit<R, F>(&self, edit: F) -> Result<R, EngineError>
    where
        F: FnOnce(&mut GraphState) -> Result<(R, Vec<CellId>), EngineError>,
    {
        let mut guard = self.write();
        let mut next = GraphState::clone(&guard);
        let (result, dirty) = edit(&mut next)?;
        let generation = next.bump_generation();
        self.hash_cache.invalidate(&dirty, generation);
        self.stats.record_propagation();
        tracing::debug!(
            "generation {}: {} cell(s) dirtied",
            generation,
            dirty.len()
        );
        *guard = Arc::new(next);
        Ok(result)
    }

    // -----------------------------------------------------------------------
    // Graph edits
    // -----------------------------------------------------------------------

    /// Registers a node. `build` declares the node's cells on the builder and
    /// returns the node value holding their plugs.
    pub fn add_node<N, F>(&self, name: &str, build: F) -> Arc<N>
    where
        N: Node,
        F: FnOnce(&mut NodeBuilder<'_>) -> N,
    {
        let mut guard = self.write();
        let mut next = GraphState::clone(&guard);
        let id = next.allocate_node_id();
        let mut builder = NodeBuilder::new(&mut next, id, name);
        let node = Arc::new(build(&mut builder));
        let (cells, children) = builder.finish();
        tracing::debug!("added node {} ({}) with {} cell(s)", name, node.type_name(), cells.len());
        next.insert_node(
            id,
            NodeEntry {
                name: name.to_string(),
                node: node.clone(),
                cells,
                children,
            },
        );
        next.bump_generation();
        *guard = Arc::new(next);
        node
    }

    /// Removes a node, its nested nodes, their cells and every connection
    /// touching them.
    ///
    /// Cells that were fed by the node fall back to their stored values and
    /// are dirtied along with everything downstream of them.
    pub fn remove_node(&self, id: NodeId) -> Result<(), EngineError> {
        self.edit(|state| {
            let cells = state.owned_cells(id)?;
            let dirty = dirty_set_many(state, cells.iter().copied())?;
            state.remove_node(id)?;
            Ok(((), dirty))
        })
    }

    /// Stores `value` on an unconnected input and propagates the change.
    pub fn set_value<T: PlugValue>(&self, plug: Plug<T>, value: T) -> Result<(), EngineError> {
        self.set_dynamic(plug.cell(), value.into_value())
    }

    /// Untyped form of [`set_value`](Engine::set_value), checked against the
    /// cell's declared type.
    pub fn set_dynamic(&self, cell: CellId, value: Value) -> Result<(), EngineError> {
        self.edit(|state| {
            state.check_settable(cell, value.value_type())?;
            let dirty = dirty_set(state, cell)?;
            state.set_stored_value(cell, value)?;
            Ok(((), dirty))
        })
    }

    /// Connects `src -> dst`, replacing any existing input of `dst`.
    pub fn connect<T: PlugValue>(&self, src: Plug<T>, dst: Plug<T>) -> Result<(), EngineError> {
        self.connect_cells(src.cell(), dst.cell())
    }

    /// Untyped form of [`connect`](Engine::connect). Fails with
    /// [`EngineError::CyclicDependency`] if the connection would close a
    /// cycle, leaving the graph unchanged.
    pub fn connect_cells(&self, src: CellId, dst: CellId) -> Result<(), EngineError> {
        self.edit(|state| {
            state.set_input(src, dst)?;
            let dirty = dirty_set(state, dst)?;
            Ok(((), dirty))
        })
    }

    /// Removes the input connection of `dst`, if any.
    pub fn disconnect(&self, dst: impl Into<CellId>) -> Result<(), EngineError> {
        let dst = dst.into();
        self.edit(|state| {
            state.cell(dst)?;
            state.clear_input(dst);
            let dirty = dirty_set(state, dst)?;
            Ok(((), dirty))
        })
    }

    /// Re-runs propagation from `cell` without changing anything, for nodes
    /// whose hash reads state the graph does not see.
    pub fn notify_changed(&self, cell: impl Into<CellId>) -> Result<Vec<CellId>, EngineError> {
        let cell = cell.into();
        self.edit(|state| {
            let dirty = dirty_set(state, cell)?;
            Ok((dirty.clone(), dirty))
        })
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    pub fn input(&self, cell: impl Into<CellId>) -> Option<CellId> {
        self.snapshot().input(cell.into())
    }

    pub fn outputs(&self, cell: impl Into<CellId>) -> Vec<CellId> {
        self.snapshot().outputs(cell.into())
    }

    /// `node.cell` path of a cell.
    pub fn cell_name(&self, cell: impl Into<CellId>) -> String {
        self.snapshot().cell_path(cell.into())
    }

    /// Id of the node owning `cell`.
    pub fn node_of(&self, cell: impl Into<CellId>) -> Result<NodeId, EngineError> {
        Ok(self.snapshot().cell(cell.into())?.owner)
    }

    // -----------------------------------------------------------------------
    // Evaluation
    // -----------------------------------------------------------------------

    /// Opens an evaluation pinned to the current snapshot.
    pub fn evaluation(&self) -> Evaluation<'_> {
        Evaluation::new(self, self.snapshot(), None)
    }

    /// Opens an evaluation that fails with [`EngineError::Cancelled`] once
    /// `token` fires.
    pub fn evaluation_with_cancel<'e>(&'e self, token: &'e CancellationToken) -> Evaluation<'e> {
        Evaluation::new(self, self.snapshot(), Some(token))
    }

    pub fn value(&self, cell: impl Into<CellId>, context: &Context) -> Result<Value, EngineError> {
        self.evaluation().value(cell, context)
    }

    pub fn get<T: PlugValue>(&self, plug: Plug<T>, context: &Context) -> Result<T, EngineError> {
        self.evaluation().get(plug, context)
    }

    pub fn hash(&self, cell: impl Into<CellId>, context: &Context) -> Result<Fingerprint, EngineError> {
        self.evaluation().hash(cell, context)
    }

    pub fn value_cancellable(
        &self,
        cell: impl Into<CellId>,
        context: &Context,
        token: &CancellationToken,
    ) -> Result<Value, EngineError> {
        self.evaluation_with_cancel(token).value(cell, context)
    }

    // -----------------------------------------------------------------------
    // Caches and statistics
    // -----------------------------------------------------------------------

    /// Drops every memoized value and cached fingerprint.
    pub fn clear_memo(&self) {
        self.memo.clear();
        self.hash_cache.clear();
    }

    pub fn memo_len(&self) -> usize {
        self.memo.policy().len()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Number of compute steps run so far.
    pub fn compute_count(&self) -> u64 {
        self.stats.computes()
    }

    pub fn reset_stats(&self) {
        self.stats.reset();
    }
}
