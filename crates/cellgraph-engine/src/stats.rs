//! Lock-free engine counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct EngineStats {
    hash_cache_hits: AtomicU64,
    hashes_computed: AtomicU64,
    memo_hits: AtomicU64,
    memo_misses: AtomicU64,
    computes: AtomicU64,
    compute_failures: AtomicU64,
    propagations: AtomicU64,
}

/// Point-in-time copy of [`EngineStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub hash_cache_hits: u64,
    pub hashes_computed: u64,
    pub memo_hits: u64,
    pub memo_misses: u64,
    pub computes: u64,
    pub compute_failures: u64,
    pub propagations: u64,
}

impl EngineStats {
    pub(crate) fn record_hash_cache_hit(&self) {
        self.hash_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_hash_computed(&self) {
        self.hashes_computed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_memo_hit(&self) {
        self.memo_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_memo_miss(&self) {
        self.memo_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_compute(&self) {
        self.computes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_compute_failure(&self) {
        self.compute_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_propagation(&self) {
        self.propagations.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of node compute steps run so far.
    pub fn computes(&self) -> u64 {
        self.computes.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            hash_cache_hits: self.hash_cache_hits.load(Ordering::Relaxed),
            hashes_computed: self.hashes_computed.load(Ordering::Relaxed),
            memo_hits: self.memo_hits.load(Ordering::Relaxed),
            memo_misses: self.memo_misses.load(Ordering::Relaxed),
            computes: self.computes.load(Ordering::Relaxed),
            compute_failures: self.compute_failures.load(Ordering::Relaxed),
            propagations: self.propagations.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.hash_cache_hits,
            &self.hashes_computed,
            &self.memo_hits,
            &self.memo_misses,
            &self.computes,
            &self.compute_failures,
            &self.propagations,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
