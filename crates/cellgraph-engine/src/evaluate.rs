//! Hash engine and lazy evaluator.
//!
//! An [`Evaluation`] pins one [`GraphState`] snapshot and answers
//! `hash(cell, context)` and `value(cell, context)` against it. Node hash and
//! compute rules receive the evaluation and pull their upstream cells through
//! it, so the whole recursive request sees the same topology and stored
//! values even if the graph is edited concurrently.
//!
//! Resolution rules, shared by both requests:
//!
//! 1. A connected cell forwards its input's fingerprint/value for the same
//!    context.
//! 2. An unconnected input cell hashes its stored value and returns it.
//! 3. An output cell whose node is disabled and declares a pass-through source
//!    forwards that source verbatim.
//! 4. Any other output cell is hashed by its node (prefixed by the node type
//!    name, cell name and declared type) and valued through the memo table,
//!    keyed by `(cell, context, fingerprint)`.
//!
//! Each evaluation keeps a call-local stack of active `(cell, context)` frames.
//! A request that re-enters an active frame fails with
//! [`EngineError::CyclicDependency`] rather than recursing forever or
//! deadlocking on its own in-flight memo key.

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cellgraph_core::fingerprint::fingerprint_value;
use cellgraph_core::plug::extract;
use cellgraph_core::{CellId, Context, Fingerprint, FingerprintHasher, Plug, PlugValue, Value};

use crate::engine::Engine;
use crate::error::EngineError;
use crate::graph::{Cell, CellRole, GraphState, NodeEntry};
use crate::memo::{MemoKey, MemoOutcome};

/// Cooperative cancellation flag shared between a caller and its evaluations.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Hash,
    Compute,
}

#[derive(Debug)]
struct Frame {
    cell: CellId,
    context: Context,
    phase: Phase,
}

/// Pops the frame it was created for when dropped.
struct FrameGuard<'a> {
    stack: &'a RefCell<Vec<Frame>>,
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        self.stack.borrow_mut().pop();
    }
}

/// One pull-based request against a pinned graph snapshot.
///
/// Not `Sync`: each worker thread opens its own evaluation. They all share the
/// engine's memo table and fingerprint cache.
pub struct Evaluation<'e> {
    engine: &'e Engine,
    state: Arc<GraphState>,
    cancel: Option<&'e CancellationToken>,
    active: RefCell<Vec<Frame>>,
}

impl<'e> Evaluation<'e> {
    pub(crate) fn new(
        engine: &'e Engine,
        state: Arc<GraphState>,
        cancel: Option<&'e CancellationToken>,
    ) -> Self {
        Evaluation {
            engine,
            state,
            cancel,
            active: RefCell::new(Vec::new()),
        }
    }

    /// The snapshot this evaluation reads.
    pub fn graph(&self) -> &GraphState {
        &self.state
    }

    pub fn generation(&self) -> u64 {
        self.state.generation()
    }

    /// Fails with [`EngineError::Cancelled`] once the caller's token fired.
    ///
    /// Long-running compute steps should call this between large sub-steps.
    pub fn check_cancelled(&self) -> Result<(), EngineError> {
        match self.cancel {
            Some(token) if token.is_cancelled() => Err(EngineError::Cancelled),
            _ => Ok(()),
        }
    }

    // -----------------------------------------------------------------------
    // Hash engine
    // -----------------------------------------------------------------------

    /// Fingerprint of `cell` in `context`.
    pub fn hash(&self, cell: impl Into<CellId>, context: &Context) -> Result<Fingerprint, EngineError> {
        let cell = cell.into();
        self.check_cancelled()?;
        let data = self.state.cell(cell)?;
        if let Some(source) = self.state.input(cell) {
            return self.hash(source, context);
        }
        match data.role {
            CellRole::Input => Ok(fingerprint_value(stored_value(cell, data)?)),
            CellRole::Output => self.hash_output(cell, data, context),
        }
    }

    /// Appends the fingerprint of `cell` in `context` to `h`.
    pub fn append_hash(
        &self,
        cell: impl Into<CellId>,
        context: &Context,
        h: &mut FingerprintHasher,
    ) -> Result<(), EngineError> {
        let fp = self.hash(cell, context)?;
        h.append(&fp);
        Ok(())
    }

    fn hash_output(&self, cell: CellId, data: &Cell, context: &Context) -> Result<Fingerprint, EngineError> {
        let engine = self.engine;
        let generation = self.state.generation();
        if let Some(fp) = engine.hash_cache.get(cell, context, generation) {
            engine.stats.record_hash_cache_hit();
            return Ok(fp);
        }

        let _frame = self.enter(cell, context, Phase::Hash)?;
        let entry = self.state.node(data.owner)?;
        let fp = match self.pass_through_source(entry, cell, context)? {
            Some(source) => self.hash(source, context)?,
            None => {
                let mut h = FingerprintHasher::new();
                h.append(entry.node.type_name())
                    .append(&data.name)
                    .append(&data.value_type);
                entry.node.hash(cell, context, self, &mut h)?;
                h.finish()
            }
        };
        engine.stats.record_hash_computed();
        engine.hash_cache.insert(cell, context.clone(), fp, generation);
        Ok(fp)
    }

    // -----------------------------------------------------------------------
    // Lazy evaluator
    // -----------------------------------------------------------------------

    /// Value of `cell` in `context`, computing it on a memo miss.
    pub fn value(&self, cell: impl Into<CellId>, context: &Context) -> Result<Value, EngineError> {
        let cell = cell.into();
        self.check_cancelled()?;
        let data = self.state.cell(cell)?;
        if let Some(source) = self.state.input(cell) {
            return self.value(source, context);
        }
        match data.role {
            CellRole::Input => stored_value(cell, data).cloned(),
            CellRole::Output => self.value_output(cell, data, context),
        }
    }

    /// Typed read through a plug.
    pub fn get<T: PlugValue>(&self, plug: Plug<T>, context: &Context) -> Result<T, EngineError> {
        let value = self.value(plug.cell(), context)?;
        Ok(extract(plug.cell(), value)?)
    }

    fn value_output(&self, cell: CellId, data: &Cell, context: &Context) -> Result<Value, EngineError> {
        let engine = self.engine;
        let entry = self.state.node(data.owner)?;
        if let Some(source) = self.pass_through_source(entry, cell, context)? {
            return self.value(source, context);
        }

        let fingerprint = self.hash(cell, context)?;
        let _frame = self.enter(cell, context, Phase::Compute)?;
        let key = MemoKey {
            cell,
            context: context.clone(),
            fingerprint,
        };
        let result = engine.memo.get_or_compute(key, || {
            self.check_cancelled()?;
            engine.stats.record_compute();
            let value = entry.node.compute(cell, context, self)?;
            let found = value.value_type();
            if found != data.value_type {
                return Err(EngineError::TypeMismatch {
                    cell,
                    expected: data.value_type,
                    found,
                });
            }
            Ok(value)
        });

        match result {
            Ok((value, outcome)) => {
                match outcome {
                    MemoOutcome::Hit | MemoOutcome::Shared => {
                        engine.stats.record_memo_hit();
                        tracing::trace!("memo hit {} [{}] {}", self.state.cell_path(cell), context, fingerprint);
                    }
                    MemoOutcome::Computed => {
                        engine.stats.record_memo_miss();
                        tracing::debug!("computed {} [{}] {}", self.state.cell_path(cell), context, fingerprint);
                    }
                }
                Ok(value)
            }
            Err(EngineError::Cancelled) => Err(EngineError::Cancelled),
            Err(err) => {
                engine.stats.record_compute_failure();
                tracing::warn!("{} [{}] failed: {}", self.state.cell_path(cell), context, err);
                Err(err)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// The source an output forwards while its node is disabled.
    fn pass_through_source(
        &self,
        entry: &NodeEntry,
        output: CellId,
        context: &Context,
    ) -> Result<Option<CellId>, EngineError> {
        match entry.node.pass_through(output) {
            Some(source) if !entry.node.enabled(self, context)? => Ok(Some(source)),
            _ => Ok(None),
        }
    }

    fn enter(&self, cell: CellId, context: &Context, phase: Phase) -> Result<FrameGuard<'_>, EngineError> {
        let mut stack = self.active.borrow_mut();
        if let Some(start) = stack
            .iter()
            .position(|f| f.cell == cell && f.phase == phase && f.context == *context)
        {
            let mut path: Vec<String> = stack[start..]
                .iter()
                .map(|f| self.state.cell_path(f.cell))
                .collect();
            path.push(self.state.cell_path(cell));
            return Err(EngineError::CyclicDependency { path });
        }
        stack.push(Frame {
            cell,
            context: context.clone(),
            phase,
        });
        Ok(FrameGuard {
            stack: &self.active,
        })
    }
}

fn stored_value(cell: CellId, data: &Cell) -> Result<&Value, EngineError> {
    data.value
        .as_ref()
        .ok_or_else(|| EngineError::compute_failure(cell, format!("input '{}' holds no value", data.name)))
}
