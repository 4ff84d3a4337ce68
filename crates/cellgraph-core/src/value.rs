//! Cell value kinds.
//!
//! [`Value`] is the dynamic counterpart of a cell's declared [`ValueType`].
//! Every evaluation produces a `Value` that flows through connections to
//! downstream cells. The core only needs values to be cheap to copy and
//! appendable to a fingerprint; what they mean is up to the nodes.
//!
//! Heavy payloads (string lists, numeric buffers, option maps) are shared
//! behind `Arc`, so cloning a `Value` never copies tile data.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Shared list of strings (e.g. channel names).
pub type StringVector = Arc<Vec<String>>;

/// Shared variable-length numeric buffer (e.g. one channel of one tile).
pub type FloatVector = Arc<Vec<f32>>;

/// Shared, deterministically ordered name -> value map (e.g. render globals).
pub type OptionMap = Arc<BTreeMap<String, String>>;

/// Declared type of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Bool,
    Int,
    Float,
    V2i,
    V2f,
    Box2i,
    Format,
    String,
    StringVector,
    FloatVector,
    Options,
}

impl ValueType {
    /// Stable discriminant used when folding a type into a fingerprint.
    ///
    /// Never reorder: changing a tag changes every fingerprint that includes it.
    pub fn tag(self) -> u8 {
        match self {
            ValueType::Bool => 0,
            ValueType::Int => 1,
            ValueType::Float => 2,
            ValueType::V2i => 3,
            ValueType::V2f => 4,
            ValueType::Box2i => 5,
            ValueType::Format => 6,
            ValueType::String => 7,
            ValueType::StringVector => 8,
            ValueType::FloatVector => 9,
            ValueType::Options => 10,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Bool => "bool",
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::V2i => "v2i",
            ValueType::V2f => "v2f",
            ValueType::Box2i => "box2i",
            ValueType::Format => "format",
            ValueType::String => "string",
            ValueType::StringVector => "string[]",
            ValueType::FloatVector => "float[]",
            ValueType::Options => "options",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// Integer 2D vector (pixel coordinates, tile origins).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct V2i {
    pub x: i32,
    pub y: i32,
}

impl V2i {
    pub const fn new(x: i32, y: i32) -> Self {
        V2i { x, y }
    }
}

/// Float 2D vector (scale factors, offsets).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct V2f {
    pub x: f32,
    pub y: f32,
}

impl V2f {
    pub const fn new(x: f32, y: f32) -> Self {
        V2f { x, y }
    }
}

/// Integer box. `min` is inclusive, `max` is exclusive, so
/// `width() == max.x - min.x`. Extents are `i64` because the difference of
/// two `i32` corners need not fit an `i32`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Box2i {
    pub min: V2i,
    pub max: V2i,
}

impl Box2i {
    pub const fn new(min: V2i, max: V2i) -> Self {
        Box2i { min, max }
    }

    /// Box anchored at the origin with the given size.
    pub const fn from_size(width: i32, height: i32) -> Self {
        Box2i {
            min: V2i::new(0, 0),
            max: V2i::new(width, height),
        }
    }

    pub fn width(&self) -> i64 {
        i64::from(self.max.x) - i64::from(self.min.x)
    }

    pub fn height(&self) -> i64 {
        i64::from(self.max.y) - i64::from(self.min.y)
    }

    /// True when the box covers no pixels.
    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }
}

/// Image format: the display window plus the pixel aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Format {
    pub display_window: Box2i,
    pub pixel_aspect: f32,
}

impl Format {
    /// Square-pixel format of the given resolution anchored at the origin.
    pub const fn new(width: i32, height: i32) -> Self {
        Format {
            display_window: Box2i::from_size(width, height),
            pixel_aspect: 1.0,
        }
    }

    pub fn with_pixel_aspect(mut self, pixel_aspect: f32) -> Self {
        self.pixel_aspect = pixel_aspect;
        self
    }

    pub fn width(&self) -> i64 {
        self.display_window.width()
    }

    pub fn height(&self) -> i64 {
        self.display_window.height()
    }
}

impl Default for Format {
    fn default() -> Self {
        Format::new(1920, 1080)
    }
}

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A value held by, or computed for, a cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Int(i32),
    Float(f32),
    V2i(V2i),
    V2f(V2f),
    Box2i(Box2i),
    Format(Format),
    String(String),
    StringVector(StringVector),
    FloatVector(FloatVector),
    Options(OptionMap),
}

impl Value {
    /// Returns the [`ValueType`] of this value based on its variant.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::V2i(_) => ValueType::V2i,
            Value::V2f(_) => ValueType::V2f,
            Value::Box2i(_) => ValueType::Box2i,
            Value::Format(_) => ValueType::Format,
            Value::String(_) => ValueType::String,
            Value::StringVector(_) => ValueType::StringVector,
            Value::FloatVector(_) => ValueType::FloatVector,
            Value::Options(_) => ValueType::Options,
        }
    }
}
