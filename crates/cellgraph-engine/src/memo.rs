//! Memo table: computed values keyed by cell, context and fingerprint.
//!
//! Storage and eviction are delegated to a [`CachePolicy`]. The evaluator
//! only ever asks it to `lookup` and `insert`; entries are never mutated and
//! the engine never evicts anything itself. Propagation does not touch the
//! memo table at all: a stale entry simply stops being looked up because the
//! fingerprint changed, and becomes reachable again if an edit is undone.
//!
//! [`MemoTable::get_or_compute`] collapses concurrent misses on the same key
//! into a single compute: the first caller takes a per-key in-flight lock,
//! later callers wait on it and then find the published value.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use lru::LruCache;

use cellgraph_core::{CellId, Context, Fingerprint, Value};

use crate::error::EngineError;

/// Identity of one memoized value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemoKey {
    pub cell: CellId,
    pub context: Context,
    pub fingerprint: Fingerprint,
}

/// Pluggable storage/eviction policy for memoized values.
pub trait CachePolicy: Send + Sync {
    fn lookup(&self, key: &MemoKey) -> Option<Value>;
    fn insert(&self, key: MemoKey, value: Value);
    fn len(&self) -> usize;
    fn clear(&self);

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Entry-count bounded least-recently-used policy.
pub struct LruPolicy {
    entries: Mutex<LruCache<MemoKey, Value>>,
}

impl LruPolicy {
    pub fn new(capacity: NonZeroUsize) -> Self {
        LruPolicy {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<MemoKey, Value>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CachePolicy for LruPolicy {
    fn lookup(&self, key: &MemoKey) -> Option<Value> {
        self.lock().get(key).cloned()
    }

    fn insert(&self, key: MemoKey, value: Value) {
        self.lock().put(key, value);
    }

    fn len(&self) -> usize {
        self.lock().len()
    }

    fn clear(&self) {
        self.lock().clear();
    }
}

/// Never evicts. Useful for tests and short-lived batch evaluations.
#[derive(Default)]
pub struct UnboundedPolicy {
    entries: DashMap<MemoKey, Value>,
}

impl UnboundedPolicy {
    pub fn new() -> Self {
        UnboundedPolicy::default()
    }
}

impl CachePolicy for UnboundedPolicy {
    fn lookup(&self, key: &MemoKey) -> Option<Value> {
        self.entries.get(key).map(|v| v.value().clone())
    }

    fn insert(&self, key: MemoKey, value: Value) {
        self.entries.insert(key, value);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clear(&self) {
        self.entries.clear();
    }
}

/// Outcome of [`MemoTable::get_or_compute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoOutcome {
    /// Value was already memoized.
    Hit,
    /// Another caller computed the value while this one waited.
    Shared,
    /// This caller ran the compute step.
    Computed,
}

pub(crate) struct MemoTable {
    policy: Box<dyn CachePolicy>,
    in_flight: DashMap<MemoKey, Arc<Mutex<()>>>,
}

impl MemoTable {
    pub(crate) fn new(policy: Box<dyn CachePolicy>) -> Self {
        MemoTable {
            policy,
            in_flight: DashMap::new(),
        }
    }

    pub(crate) fn policy(&self) -> &dyn CachePolicy {
        self.policy.as_ref()
    }

    /// Returns the memoized value for `key`, running `compute` at most once
    /// across concurrent callers on a miss. Failed computes are not stored.
    pub(crate) fn get_or_compute<F>(
        &self,
        key: MemoKey,
        compute: F,
    ) -> Result<(Value, MemoOutcome), EngineError>
    where
        F: FnOnce() -> Result<Value, EngineError>,
    {
        if let Some(value) = self.policy.lookup(&key) {
            return Ok((value, MemoOutcome::Hit));
        }

        let gate = self
            .in_flight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        let _held = gate.lock().unwrap_or_else(PoisonError::into_inner);

        // Someone may have published while we waited for the gate.
        if let Some(value) = self.policy.lookup(&key) {
            return Ok((value, MemoOutcome::Shared));
        }

        let result = compute();
        if let Ok(value) = &result {
            self.policy.insert(key.clone(), value.clone());
        }
        self.in_flight
            .remove_if(&key, |_, current| Arc::ptr_eq(current, &gate));
        result.map(|value| (value, MemoOutcome::Computed))
    }

    pub(crate) fn clear(&self) {
        self.policy.clear();
    }
}
