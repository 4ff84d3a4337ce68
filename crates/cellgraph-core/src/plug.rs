//! Typed plug handles.
//!
//! A node keeps one [`Plug<T>`] field per cell it owns instead of looking
//! children up by index at runtime. The type parameter pins the declared
//! [`ValueType`] of the cell, so reads through a plug are checked once at the
//! value boundary and return plain Rust types to node code.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use crate::error::CoreError;
use crate::id::CellId;
use crate::value::{
    Box2i, FloatVector, Format, OptionMap, StringVector, V2f, V2i, Value, ValueType,
};

/// Rust types that can be stored in a cell.
pub trait PlugValue: Clone + Send + Sync + 'static {
    /// Declared type of cells holding this Rust type.
    const TYPE: ValueType;

    fn into_value(self) -> Value;

    /// Returns `None` when `value` is of a different kind.
    fn from_value(value: Value) -> Option<Self>;
}

macro_rules! impl_plug_value {
    ($ty:ty, $variant:ident) => {
        impl PlugValue for $ty {
            const TYPE: ValueType = ValueType::$variant;

            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            fn from_value(value: Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

impl_plug_value!(bool, Bool);
impl_plug_value!(i32, Int);
impl_plug_value!(f32, Float);
impl_plug_value!(V2i, V2i);
impl_plug_value!(V2f, V2f);
impl_plug_value!(Box2i, Box2i);
impl_plug_value!(Format, Format);
impl_plug_value!(String, String);
impl_plug_value!(StringVector, StringVector);
impl_plug_value!(FloatVector, FloatVector);
impl_plug_value!(OptionMap, Options);

/// Converts a dynamic value read from `cell` into `T`.
///
/// Fails with [`CoreError::TypeMismatch`] when the value's kind is not `T::TYPE`.
pub fn extract<T: PlugValue>(cell: CellId, value: Value) -> Result<T, CoreError> {
    let found = value.value_type();
    T::from_value(value).ok_or(CoreError::TypeMismatch {
        cell,
        expected: T::TYPE,
        found,
    })
}

/// Typed handle to a cell.
pub struct Plug<T> {
    cell: CellId,
    _marker: PhantomData<fn() -> T>,
}

impl<T: PlugValue> Plug<T> {
    /// Wraps a cell id. Only the graph container should mint plugs, after it
    /// has declared the cell with `T::TYPE`.
    pub fn new(cell: CellId) -> Self {
        Plug {
            cell,
            _marker: PhantomData,
        }
    }

    pub fn cell(&self) -> CellId {
        self.cell
    }

    pub fn value_type(&self) -> ValueType {
        T::TYPE
    }
}

// Manual impls: derives would put bounds on `T`.

impl<T> Clone for Plug<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Plug<T> {}

impl<T> PartialEq for Plug<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cell == other.cell
    }
}

impl<T> Eq for Plug<T> {}

impl<T> Hash for Plug<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.cell.hash(state);
    }
}

impl<T> fmt::Debug for Plug<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Plug({})", self.cell)
    }
}

impl<T> From<Plug<T>> for CellId {
    fn from(plug: Plug<T>) -> Self {
        plug.cell
    }
}
