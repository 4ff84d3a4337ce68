//! Dependency-tracked, lazily evaluated dataflow engine.
//!
//! Nodes own typed cells. Output cells are computed on demand, addressed by a
//! content-derived fingerprint, and computed at most once per distinct set of
//! inputs. Edits propagate along declared dependencies and only invalidate
//! fingerprints; memoized values stay in the memo table until its eviction
//! policy drops them, so undoing an edit reuses earlier results.
//!
//! # Architecture
//!
//! - **Graph** ([`graph`]): cells in a petgraph `StableGraph`, connections as
//!   edges, nodes as `Arc<dyn Node>` entries. Published as immutable
//!   snapshots; edits are copy-on-write.
//! - **Propagation** ([`propagate`]): DFS over connections and `affects`
//!   declarations, with cycle detection.
//! - **Evaluation** ([`evaluate`]): the hash engine and lazy evaluator,
//!   backed by a per-cell fingerprint cache and the shared memo table.
//!
//! # Modules
//!
//! - [`config`]: `EngineConfig` (env / JSON loading)
//! - [`engine`]: the `Engine` facade
//! - [`error`]: `EngineError`
//! - [`evaluate`]: `Evaluation`, `CancellationToken`
//! - [`graph`]: `GraphState`, `NodeBuilder`
//! - [`memo`]: memo table and `CachePolicy` implementations
//! - [`node`]: the `Node` trait
//! - [`propagate`]: dirty propagation
//! - [`stats`]: engine counters

pub mod config;
pub mod engine;
pub mod error;
pub mod evaluate;
pub mod graph;
mod hash_cache;
pub mod memo;
pub mod node;
pub mod propagate;
pub mod stats;

// Re-export key types for ergonomic use.
pub use config::{CachePolicyKind, EngineConfig};
pub use engine::Engine;
pub use error::EngineError;
pub use evaluate::{CancellationToken, Evaluation};
pub use graph::{Cell, CellRole, GraphState, NodeBuilder};
pub use memo::{CachePolicy, LruPolicy, MemoKey, UnboundedPolicy};
pub use node::Node;
pub use propagate::{dirty_set, dirty_set_many};
pub use stats::StatsSnapshot;
