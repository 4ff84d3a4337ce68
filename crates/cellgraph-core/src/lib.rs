//! Leaf data model for the cellgraph dataflow engine.
//!
//! - [`id`]: `CellId` / `NodeId` newtypes
//! - [`value`]: declared cell types, values and the geometry they carry
//! - [`plug`]: typed `Plug<T>` handles over cells
//! - [`context`]: immutable, ordered evaluation contexts
//! - [`fingerprint`]: blake3-backed fingerprints and their accumulator
//! - [`error`]: `CoreError`

pub mod context;
pub mod error;
pub mod fingerprint;
pub mod id;
pub mod plug;
pub mod value;

// Re-export commonly used types
pub use context::{Context, ContextValue};
pub use error::CoreError;
pub use fingerprint::{Fingerprint, FingerprintHasher, Fingerprintable};
pub use id::{CellId, NodeId};
pub use plug::{Plug, PlugValue};
pub use value::{Box2i, FloatVector, Format, OptionMap, StringVector, V2f, V2i, Value, ValueType};
