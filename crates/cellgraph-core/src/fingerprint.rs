//! Deterministic content fingerprints using blake3.
//!
//! A [`Fingerprint`] stands in for "the set of inputs that produced this
//! value". Node hash rules build one by appending, in a fixed order, every
//! quantity their compute step reads.
//!
//! # Determinism
//!
//! All hashing is deterministic: the same sequence of appends always produces
//! the same fingerprint. This is ensured by:
//! - Prefixing every appended quantity with a one-byte kind tag
//! - Length-prefixing strings and buffers so concatenations cannot collide
//! - Encoding numbers little-endian, floats by their bit pattern
//! - Iterating contexts and option maps in sorted key order
//!
//! Appends are order-sensitive. The only order-insensitive fold is
//! [`FingerprintHasher::append_unordered`], for inputs that are truly
//! symmetric.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::context::{Context, ContextValue};
use crate::id::CellId;
use crate::value::{Box2i, Format, V2f, V2i, Value, ValueType};

/// A fixed-width opaque digest.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Fingerprint(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex rendering of the full digest.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl From<blake3::Hash> for Fingerprint {
    fn from(hash: blake3::Hash) -> Self {
        Fingerprint(*hash.as_bytes())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // First 8 bytes are plenty to tell digests apart in logs.
        write!(f, "Fingerprint({}..)", &self.to_hex()[..16])
    }
}

// Kind tags. Never reorder: changing a tag changes every stored fingerprint.
mod tag {
    pub const BOOL: u8 = 0x01;
    pub const I32: u8 = 0x02;
    pub const I64: u8 = 0x03;
    pub const U32: u8 = 0x04;
    pub const U64: u8 = 0x05;
    pub const F32: u8 = 0x06;
    pub const F64: u8 = 0x07;
    pub const STR: u8 = 0x08;
    pub const V2I: u8 = 0x10;
    pub const V2F: u8 = 0x11;
    pub const BOX2I: u8 = 0x12;
    pub const FORMAT: u8 = 0x13;
    pub const VALUE: u8 = 0x20;
    pub const VALUE_TYPE: u8 = 0x21;
    pub const LIST: u8 = 0x22;
    pub const MAP: u8 = 0x23;
    pub const CONTEXT: u8 = 0x30;
    pub const CELL: u8 = 0x31;
    pub const FINGERPRINT: u8 = 0x40;
    pub const UNORDERED: u8 = 0x41;
}

/// Append-only fingerprint accumulator.
#[derive(Clone)]
pub struct FingerprintHasher {
    inner: blake3::Hasher,
}

impl FingerprintHasher {
    pub fn new() -> Self {
        FingerprintHasher {
            inner: blake3::Hasher::new(),
        }
    }

    /// Appends one quantity. Order of appends is significant.
    pub fn append<T: Fingerprintable + ?Sized>(&mut self, value: &T) -> &mut Self {
        value.append_to(self);
        self
    }

    /// Folds a set of fingerprints independently of their order.
    pub fn append_unordered<I>(&mut self, fingerprints: I) -> &mut Self
    where
        I: IntoIterator<Item = Fingerprint>,
    {
        let mut sorted: Vec<Fingerprint> = fingerprints.into_iter().collect();
        sorted.sort();
        self.raw_tag(tag::UNORDERED);
        self.raw_len(sorted.len());
        for fp in &sorted {
            self.inner.update(fp.as_bytes());
        }
        self
    }

    /// Produces the digest. The accumulator may keep being appended to.
    pub fn finish(&self) -> Fingerprint {
        Fingerprint::from(self.inner.finalize())
    }

    fn raw_tag(&mut self, tag: u8) {
        self.inner.update(&[tag]);
    }

    fn raw_len(&mut self, len: usize) {
        self.inner.update(&(len as u64).to_le_bytes());
    }

    fn raw(&mut self, bytes: &[u8]) {
        self.inner.update(bytes);
    }
}

impl Default for FingerprintHasher {
    fn default() -> Self {
        FingerprintHasher::new()
    }
}

/// Quantities that can be folded into a [`FingerprintHasher`].
pub trait Fingerprintable {
    fn append_to(&self, h: &mut FingerprintHasher);
}

impl Fingerprintable for bool {
    fn append_to(&self, h: &mut FingerprintHasher) {
        h.raw_tag(tag::BOOL);
        h.raw(&[*self as u8]);
    }
}

impl Fingerprintable for i32 {
    fn append_to(&self, h: &mut FingerprintHasher) {
        h.raw_tag(tag::I32);
        h.raw(&self.to_le_bytes());
    }
}

impl Fingerprintable for i64 {
    fn append_to(&self, h: &mut FingerprintHasher) {
        h.raw_tag(tag::I64);
        h.raw(&self.to_le_bytes());
    }
}

impl Fingerprintable for u32 {
    fn append_to(&self, h: &mut FingerprintHasher) {
        h.raw_tag(tag::U32);
        h.raw(&self.to_le_bytes());
    }
}

impl Fingerprintable for u64 {
    fn append_to(&self, h: &mut FingerprintHasher) {
        h.raw_tag(tag::U64);
        h.raw(&self.to_le_bytes());
    }
}

impl Fingerprintable for f32 {
    fn append_to(&self, h: &mut FingerprintHasher) {
        h.raw_tag(tag::F32);
        h.raw(&self.to_bits().to_le_bytes());
    }
}

impl Fingerprintable for f64 {
    fn append_to(&self, h: &mut FingerprintHasher) {
        h.raw_tag(tag::F64);
        h.raw(&self.to_bits().to_le_bytes());
    }
}

impl Fingerprintable for str {
    fn append_to(&self, h: &mut FingerprintHasher) {
        h.raw_tag(tag::STR);
        h.raw_len(self.len());
        h.raw(self.as_bytes());
    }
}

impl Fingerprintable for String {
    fn append_to(&self, h: &mut FingerprintHasher) {
        self.as_str().append_to(h);
    }
}

impl<T: Fingerprintable> Fingerprintable for [T] {
    fn append_to(&self, h: &mut FingerprintHasher) {
        h.raw_tag(tag::LIST);
        h.raw_len(self.len());
        for item in self {
            item.append_to(h);
        }
    }
}

impl<T: Fingerprintable> Fingerprintable for Vec<T> {
    fn append_to(&self, h: &mut FingerprintHasher) {
        self.as_slice().append_to(h);
    }
}

impl Fingerprintable for V2i {
    fn append_to(&self, h: &mut FingerprintHasher) {
        h.raw_tag(tag::V2I);
        h.raw(&self.x.to_le_bytes());
        h.raw(&self.y.to_le_bytes());
    }
}

impl Fingerprintable for V2f {
    fn append_to(&self, h: &mut FingerprintHasher) {
        h.raw_tag(tag::V2F);
        h.raw(&self.x.to_bits().to_le_bytes());
        h.raw(&self.y.to_bits().to_le_bytes());
    }
}

impl Fingerprintable for Box2i {
    fn append_to(&self, h: &mut FingerprintHasher) {
        h.raw_tag(tag::BOX2I);
        self.min.append_to(h);
        self.max.append_to(h);
    }
}

impl Fingerprintable for Format {
    fn append_to(&self, h: &mut FingerprintHasher) {
        h.raw_tag(tag::FORMAT);
        self.display_window.append_to(h);
        self.pixel_aspect.append_to(h);
    }
}

impl Fingerprintable for ValueType {
    fn append_to(&self, h: &mut FingerprintHasher) {
        h.raw_tag(tag::VALUE_TYPE);
        h.raw(&[self.tag()]);
    }
}

impl Fingerprintable for Value {
    fn append_to(&self, h: &mut FingerprintHasher) {
        h.raw_tag(tag::VALUE);
        self.value_type().append_to(h);
        match self {
            Value::Bool(v) => v.append_to(h),
            Value::Int(v) => v.append_to(h),
            Value::Float(v) => v.append_to(h),
            Value::V2i(v) => v.append_to(h),
            Value::V2f(v) => v.append_to(h),
            Value::Box2i(v) => v.append_to(h),
            Value::Format(v) => v.append_to(h),
            Value::String(v) => v.append_to(h),
            Value::StringVector(v) => v.as_slice().append_to(h),
            Value::FloatVector(v) => v.as_slice().append_to(h),
            Value::Options(map) => {
                h.raw_tag(tag::MAP);
                h.raw_len(map.len());
                for (name, value) in map.iter() {
                    name.append_to(h);
                    value.append_to(h);
                }
            }
        }
    }
}

impl Fingerprintable for ContextValue {
    fn append_to(&self, h: &mut FingerprintHasher) {
        match self {
            ContextValue::Int(v) => v.append_to(h),
            ContextValue::Float(v) => v.0.append_to(h),
            ContextValue::String(v) => v.append_to(h),
            ContextValue::V2i(v) => v.append_to(h),
        }
    }
}

impl Fingerprintable for Context {
    fn append_to(&self, h: &mut FingerprintHasher) {
        h.raw_tag(tag::CONTEXT);
        h.raw_len(self.len());
        for (name, value) in self.iter() {
            name.append_to(h);
            value.append_to(h);
        }
    }
}

impl Fingerprintable for CellId {
    fn append_to(&self, h: &mut FingerprintHasher) {
        h.raw_tag(tag::CELL);
        h.raw(&self.0.to_le_bytes());
    }
}

impl Fingerprintable for Fingerprint {
    fn append_to(&self, h: &mut FingerprintHasher) {
        h.raw_tag(tag::FINGERPRINT);
        h.raw(self.as_bytes());
    }
}

/// Fingerprint of a single value, as used for unconnected input cells.
pub fn fingerprint_value(value: &Value) -> Fingerprint {
    let mut h = FingerprintHasher::new();
    h.append(value);
    h.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn fp_of(f: impl FnOnce(&mut FingerprintHasher)) -> Fingerprint {
        let mut h = FingerprintHasher::new();
        f(&mut h);
        h.finish()
    }

    #[test]
    fn test_same_appends_same_fingerprint() {
        let a = fp_of(|h| {
            h.append(&100i32).append(&50i32).append("fit");
        });
        let b = fp_of(|h| {
            h.append(&100i32).append(&50i32).append("fit");
        });
        assert_eq!(a, b);
    }

    #[test]
    fn test_order_sensitive() {
        let wh = fp_of(|h| {
            h.append(&100i32).append(&50i32);
        });
        let hw = fp_of(|h| {
            h.append(&50i32).append(&100i32);
        });
        assert_ne!(wh, hw, "width before height must differ from height before width");
    }

    #[test]
    fn test_unordered_fold_is_symmetric() {
        let a = fingerprint_value(&Value::Int(1));
        let b = fingerprint_value(&Value::Int(2));
        let ab = fp_of(|h| {
            h.append_unordered([a, b]);
        });
        let ba = fp_of(|h| {
            h.append_unordered([b, a]);
        });
        assert_eq!(ab, ba);
    }

    #[test]
    fn test_string_concatenation_does_not_collide() {
        let split_a = fp_of(|h| {
            h.append("ab").append("c");
        });
        let split_b = fp_of(|h| {
            h.append("a").append("bc");
        });
        assert_ne!(split_a, split_b);
    }

    #[test]
    fn test_kind_tag_separates_equal_bits() {
        // 1i32 and 1u32 have identical little-endian bytes.
        let signed = fp_of(|h| {
            h.append(&1i32);
        });
        let unsigned = fp_of(|h| {
            h.append(&1u32);
        });
        assert_ne!(signed, unsigned);
    }

    #[test]
    fn test_value_fingerprint_includes_payload() {
        let a = fingerprint_value(&Value::FloatVector(Arc::new(vec![0.5; 4])));
        let b = fingerprint_value(&Value::FloatVector(Arc::new(vec![0.5; 5])));
        assert_ne!(a, b);
    }

    #[test]
    fn test_context_fingerprint_ignores_insertion_order() {
        let a = Context::new().with("x", 1i64).with("y", "q");
        let b = Context::new().with("y", "q").with("x", 1i64);
        assert_eq!(fp_of(|h| { h.append(&a); }), fp_of(|h| { h.append(&b); }));
    }

    #[test]
    fn test_hex_rendering() {
        let fp = Fingerprint::from_bytes([0xab; 32]);
        assert_eq!(fp.to_hex().len(), 64);
        assert!(fp.to_hex().starts_with("abab"));
        assert_eq!(format!("{fp:?}"), "Fingerprint(abababababababab..)");
    }

    proptest! {
        #[test]
        fn prop_value_fingerprint_is_deterministic(x in any::<i32>(), y in any::<f32>()) {
            let a = fp_of(|h| { h.append(&x).append(&y); });
            let b = fp_of(|h| { h.append(&x).append(&y); });
            prop_assert_eq!(a, b);
        }

        #[test]
        fn prop_distinct_ints_distinct_fingerprints(a in any::<i32>(), b in any::<i32>()) {
            prop_assume!(a != b);
            prop_assert_ne!(
                fingerprint_value(&Value::Int(a)),
                fingerprint_value(&Value::Int(b))
            );
        }
    }
}
