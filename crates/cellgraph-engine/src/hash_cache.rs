//! Per-cell fingerprint cache.
//!
//! Remembers the last fingerprint computed for each `(output cell, context)`
//! so that a chain of hash rules does not rehash its whole upstream on every
//! request. Dirty propagation invalidates a cell by dropping its entries and
//! recording the generation at which it was invalidated.
//!
//! Every entry is tagged with the generation of the graph snapshot it was
//! computed from. An entry is only served when both the entry and the reader
//! are at or after the cell's last invalidation, so an evaluation that was
//! already in flight when an edit landed can never publish (or consume) a
//! stale fingerprint for later readers.

use std::collections::HashMap;

use dashmap::DashMap;

use cellgraph_core::{CellId, Context, Fingerprint};

#[derive(Debug)]
pub(crate) struct HashCache {
    entries: DashMap<CellId, HashMap<Context, (Fingerprint, u64)>>,
    invalidated_at: DashMap<CellId, u64>,
    /// Contexts kept per cell before the cell's map is reset.
    limit: usize,
}

impl HashCache {
    pub(crate) fn new(limit: usize) -> Self {
        HashCache {
            entries: DashMap::new(),
            invalidated_at: DashMap::new(),
            limit,
        }
    }

    fn floor(&self, cell: CellId) -> u64 {
        self.invalidated_at.get(&cell).map(|g| *g).unwrap_or(0)
    }

    pub(crate) fn get(&self, cell: CellId, context: &Context, generation: u64) -> Option<Fingerprint> {
        let floor = self.floor(cell);
        if generation < floor {
            return None;
        }
        let entries = self.entries.get(&cell)?;
        let &(fp, epoch) = entries.get(context)?;
        (epoch >= floor).then_some(fp)
    }

    pub(crate) fn insert(&self, cell: CellId, context: Context, fp: Fingerprint, generation: u64) {
        if generation < self.floor(cell) {
            return;
        }
        let mut entries = self.entries.entry(cell).or_default();
        if entries.len() >= self.limit && !entries.contains_key(&context) {
            entries.clear();
        }
        entries.insert(context, (fp, generation));
    }

    /// Marks `cells` stale as of `generation`.
    pub(crate) fn invalidate(&self, cells: &[CellId], generation: u64) {
        for &cell in cells {
            self.invalidated_at.insert(cell, generation);
            self.entries.remove(&cell);
        }
    }

    pub(crate) fn clear(&self) {
        self.entries.clear();
    }
}
