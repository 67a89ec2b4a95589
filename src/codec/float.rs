//! IEEE-754 float codec over raw bit patterns

use std::sync::Arc;

use super::{bits, check_access, check_read, check_write, ReadMode, WriteMode};
use crate::{
    bytes::BytesStore,
    error::Result,
    schema::Supports,
};

/// Codec for an `f32` (width 32) or `f64` (width 64) field.
///
/// Values travel as `f64` through the generic API; the 32-bit variant rounds
/// on write. Compare-and-swap compares bit patterns, not IEEE equality.
#[derive(Debug, Clone)]
pub struct FloatCodec {
    field: Arc<str>,
    width: u32,
    supports: Supports,
}

impl FloatCodec {
    pub fn new(field: impl Into<Arc<str>>, width: u32, supports: Supports) -> Self {
        debug_assert!(width == 32 || width == 64);
        Self {
            field: field.into(),
            width,
            supports,
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn supports(&self) -> Supports {
        self.supports
    }

    fn to_raw(&self, value: f64) -> u64 {
        if self.width == 32 {
            (value as f32).to_bits() as u64
        } else {
            value.to_bits()
        }
    }

    fn from_raw(&self, raw: u64) -> f64 {
        if self.width == 32 {
            f32::from_bits(raw as u32) as f64
        } else {
            f64::from_bits(raw)
        }
    }

    pub fn read_bits(&self, store: &dyn BytesStore, pos: u64, mode: ReadMode) -> Result<u64> {
        check_read(&self.field, self.supports, mode)?;
        bits::load(store, pos, self.width, mode)
    }

    pub fn write_bits(&self, store: &dyn BytesStore, pos: u64, mode: WriteMode, raw: u64) -> Result<()> {
        check_write(&self.field, self.supports, mode)?;
        bits::store_raw(store, pos, self.width, mode, raw)
    }

    pub fn read(&self, store: &dyn BytesStore, pos: u64, mode: ReadMode) -> Result<f64> {
        Ok(self.from_raw(self.read_bits(store, pos, mode)?))
    }

    pub fn write(&self, store: &dyn BytesStore, pos: u64, mode: WriteMode, value: f64) -> Result<()> {
        self.write_bits(store, pos, mode, self.to_raw(value))
    }

    /// Swap when the stored bit pattern equals `expected`'s
    pub fn compare_and_swap(
        &self,
        store: &dyn BytesStore,
        pos: u64,
        expected: f64,
        new: f64,
    ) -> Result<bool> {
        self.compare_and_swap_bits(store, pos, self.to_raw(expected), self.to_raw(new))
    }

    pub fn compare_and_swap_bits(
        &self,
        store: &dyn BytesStore,
        pos: u64,
        expected: u64,
        new: u64,
    ) -> Result<bool> {
        check_access(&self.field, self.supports, Supports::CAS, "compare_and_swap")?;
        bits::cas_raw(store, pos, self.width, expected, new)
    }

    pub fn add(&self, store: &dyn BytesStore, pos: u64, delta: f64) -> Result<f64> {
        check_access(&self.field, self.supports, Supports::ADD, "add")?;
        let next = self.from_raw(bits::read_bits(store, pos, self.width)?) + delta;
        bits::write_bits(store, pos, self.width, self.to_raw(next))?;
        Ok(self.from_raw(self.to_raw(next)))
    }

    /// CAS loop over the bit pattern
    pub fn atomic_add(&self, store: &dyn BytesStore, pos: u64, delta: f64) -> Result<f64> {
        check_access(&self.field, self.supports, Supports::ATOMIC_ADD, "atomic_add")?;
        loop {
            let raw = bits::load(store, pos, self.width, ReadMode::Volatile)?;
            let next = self.to_raw(self.from_raw(raw) + delta);
            if bits::cas_raw(store, pos, self.width, raw, next)? {
                return Ok(self.from_raw(next));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytes::HeapBytes;

    #[test]
    fn test_float_round_trip_bits() {
        let store = HeapBytes::new(16);
        let f = FloatCodec::new("f", 32, Supports::ALL);
        let d = FloatCodec::new("d", 64, Supports::ALL);
        f.write(&store, 0, WriteMode::Plain, 1.5).unwrap();
        d.write(&store, 64, WriteMode::Volatile, -0.0).unwrap();
        assert_eq!(f.read(&store, 0, ReadMode::Plain).unwrap(), 1.5);
        assert_eq!(
            d.read(&store, 64, ReadMode::Volatile).unwrap().to_bits(),
            (-0.0f64).to_bits()
        );
    }

    #[test]
    fn test_cas_compares_bit_patterns() {
        let store = HeapBytes::new(8);
        let d = FloatCodec::new("d", 64, Supports::ALL);
        d.write(&store, 0, WriteMode::Plain, f64::NAN).unwrap();
        assert!(d.compare_and_swap(&store, 0, f64::NAN, 2.0).unwrap());
        // 0.0 == -0.0 in IEEE but not bitwise
        d.write(&store, 0, WriteMode::Plain, 0.0).unwrap();
        assert!(!d.compare_and_swap(&store, 0, -0.0, 1.0).unwrap());
    }

    #[test]
    fn test_atomic_add() {
        let store = HeapBytes::new(8);
        let f = FloatCodec::new("f", 32, Supports::ALL);
        assert_eq!(f.atomic_add(&store, 32, 0.25).unwrap(), 0.25);
        assert_eq!(f.atomic_add(&store, 32, 0.5).unwrap(), 0.75);
        assert_eq!(f.add(&store, 32, 1.0).unwrap(), 1.75);
    }
}
