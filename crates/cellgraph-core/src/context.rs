//! Evaluation contexts.
//!
//! A [`Context`] scopes which instance of a cell's value is requested: the
//! same `channelData` cell has a different value per tile and per channel.
//! Contexts are immutable once built, totally ordered and hashable, so they
//! can key memo entries directly.
//!
//! Variables are kept in a `BTreeMap` so iteration (and therefore hashing)
//! is always in name order, independent of insertion order.

use std::collections::BTreeMap;
use std::fmt;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::value::V2i;

/// Name of the variable holding the requested image channel.
pub const CHANNEL_NAME: &str = "image:channelName";

/// Name of the variable holding the origin of the requested tile.
pub const TILE_ORIGIN: &str = "image:tileOrigin";

/// Name of the variable holding the current frame.
pub const FRAME: &str = "frame";

/// A single context variable value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ContextValue {
    Int(i64),
    Float(OrderedFloat<f32>),
    String(String),
    V2i(V2i),
}

impl From<i64> for ContextValue {
    fn from(v: i64) -> Self {
        ContextValue::Int(v)
    }
}

impl From<f32> for ContextValue {
    fn from(v: f32) -> Self {
        ContextValue::Float(OrderedFloat(v))
    }
}

impl From<&str> for ContextValue {
    fn from(v: &str) -> Self {
        ContextValue::String(v.to_string())
    }
}

impl From<String> for ContextValue {
    fn from(v: String) -> Self {
        ContextValue::String(v)
    }
}

impl From<V2i> for ContextValue {
    fn from(v: V2i) -> Self {
        ContextValue::V2i(v)
    }
}

impl fmt::Display for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextValue::Int(v) => write!(f, "{v}"),
            ContextValue::Float(v) => write!(f, "{}", v.0),
            ContextValue::String(v) => write!(f, "{v:?}"),
            ContextValue::V2i(v) => write!(f, "({}, {})", v.x, v.y),
        }
    }
}

/// Immutable, ordered set of named variables scoping an evaluation.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Context {
    variables: BTreeMap<String, ContextValue>,
}

impl Context {
    /// The empty context. Context-independent cells are requested with this.
    pub fn new() -> Self {
        Context::default()
    }

    /// Context for one channel of one tile.
    pub fn tile(channel: &str, origin: V2i) -> Self {
        Context::new()
            .with(CHANNEL_NAME, channel)
            .with(TILE_ORIGIN, origin)
    }

    /// Returns a copy of this context with `name` set to `value`.
    pub fn with(mut self, name: &str, value: impl Into<ContextValue>) -> Self {
        self.variables.insert(name.to_string(), value.into());
        self
    }

    /// Returns a copy of this context without `name`.
    pub fn without(mut self, name: &str) -> Self {
        self.variables.remove(name);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ContextValue> {
        self.variables.get(name)
    }

    pub fn channel_name(&self) -> Option<&str> {
        match self.get(CHANNEL_NAME) {
            Some(ContextValue::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn tile_origin(&self) -> Option<V2i> {
        match self.get(TILE_ORIGIN) {
            Some(ContextValue::V2i(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn frame(&self) -> Option<f32> {
        match self.get(FRAME) {
            Some(ContextValue::Float(v)) => Some(v.0),
            Some(ContextValue::Int(v)) => Some(*v as f32),
            _ => None,
        }
    }

    /// Variables in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ContextValue)> {
        self.variables.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}: {value}")?;
        }
        f.write_str("}")
    }
}
