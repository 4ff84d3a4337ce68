//! The node contract.
//!
//! Every node kind implements [`Node`]: a closed set of behaviours the engine
//! dispatches to through `Arc<dyn Node>`, never down-casting. A node owns a
//! fixed set of cells, created through [`NodeBuilder`](crate::graph::NodeBuilder)
//! and kept as typed `Plug<T>` fields on the node struct.
//!
//! # The affects / hash / compute triad
//!
//! - [`Node::affects`] declares which of the node's cells go stale when one of
//!   its inputs changes. It must be a superset of the truth: an under-declared
//!   dependency is a stale-read bug, an over-declared one only costs a
//!   recomputation.
//! - [`Node::hash`] appends, in a fixed order, every quantity
//!   [`Node::compute`] reads for that output. It must not perform I/O or any
//!   other fallible work of its own; the only errors it returns are those
//!   surfaced while reading upstream cells.
//! - [`Node::compute`] produces the value on a memo miss.

use cellgraph_core::{CellId, Context, FingerprintHasher, Value};

use crate::error::EngineError;
use crate::evaluate::Evaluation;

/// A unit exposing input/output cells plus affects/hash/compute behaviour.
pub trait Node: Send + Sync + 'static {
    /// Stable name of the node kind. Folded into every output fingerprint.
    fn type_name(&self) -> &'static str;

    /// Pushes the cells directly affected by a change to `input`.
    fn affects(&self, input: CellId, outputs: &mut Vec<CellId>);

    /// Whether the node currently does any work.
    ///
    /// When this returns `false`, outputs with a [`pass_through`](Node::pass_through)
    /// source forward that source's fingerprint and value verbatim.
    fn enabled(&self, _eval: &Evaluation<'_>, _context: &Context) -> Result<bool, EngineError> {
        Ok(true)
    }

    /// The input an output degenerates to while the node is disabled.
    fn pass_through(&self, _output: CellId) -> Option<CellId> {
        None
    }

    /// Appends everything `compute(output, context)` reads to `h`.
    fn hash(
        &self,
        output: CellId,
        context: &Context,
        eval: &Evaluation<'_>,
        h: &mut FingerprintHasher,
    ) -> Result<(), EngineError>;

    /// Computes the value of `output` for `context`.
    fn compute(
        &self,
        output: CellId,
        context: &Context,
        eval: &Evaluation<'_>,
    ) -> Result<Value, EngineError>;
}
