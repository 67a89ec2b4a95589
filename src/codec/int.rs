//! Integer codec: signed, unsigned and offset-ranged bit fields

use std::sync::Arc;

use super::{bits, check_access, check_read, check_write, ReadMode, WriteMode};
use crate::{
    bytes::{BytesAccess, BytesStore},
    error::{PackError, Result},
    schema::{IntRange, Supports},
};

/// How a value in `[min, max]` maps onto the raw bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntEncoding {
    /// Raw bits are the value itself
    Unsigned,
    /// Raw bits are two's complement, sign-extended on read
    Signed,
    /// Raw bits are `value - min`
    Offset(i64),
}

/// Natural range of an integer kind at the given width
pub fn natural_range(signed: bool, width: u32) -> IntRange {
    match (signed, width) {
        (true, 64) => IntRange::new(i64::MIN, i64::MAX),
        (true, w) => IntRange::new(-(1i64 << (w - 1)), (1i64 << (w - 1)) - 1),
        (false, w) if w >= 63 => IntRange::new(0, i64::MAX),
        (false, w) => IntRange::new(0, (1i64 << w) - 1),
    }
}

/// Smallest number of bits able to hold `options` distinct values (at least 1)
pub fn bits_for(options: u128) -> u32 {
    if options <= 2 {
        1
    } else {
        128 - (options - 1).leading_zeros()
    }
}

/// Codec for an integer field of `width` bits holding values in `range`
#[derive(Debug, Clone)]
pub struct IntCodec {
    field: Arc<str>,
    width: u32,
    range: IntRange,
    encoding: IntEncoding,
    wrapping: bool,
    supports: Supports,
}

impl IntCodec {
    /// Create a codec; `wrapping` makes `add` wrap inside `range` instead of failing.
    ///
    /// The caller guarantees that `range` has at most `2^width` values.
    pub fn new(
        field: impl Into<Arc<str>>,
        width: u32,
        range: IntRange,
        wrapping: bool,
        supports: Supports,
    ) -> Self {
        let min = range.min as i128;
        let max = range.max as i128;
        let signed = natural_range(true, width);
        let encoding = if min == 0 && max <= bits::mask(width) as i128 {
            IntEncoding::Unsigned
        } else if min < 0 && max >= 0 && min >= signed.min as i128 && max <= signed.max as i128 {
            IntEncoding::Signed
        } else {
            IntEncoding::Offset(range.min)
        };
        Self {
            field: field.into(),
            width,
            range,
            encoding,
            wrapping,
            supports,
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn range(&self) -> IntRange {
        self.range
    }

    pub fn encoding(&self) -> IntEncoding {
        self.encoding
    }

    pub fn supports(&self) -> Supports {
        self.supports
    }

    /// Value of an all-zero field
    pub fn default_value(&self) -> i64 {
        self.decode(0)
    }

    /// Check that `value` lies in the field's range
    pub fn check(&self, value: i128) -> Result<i64> {
        if self.range.contains(value) {
            Ok(value as i64)
        } else {
            Err(PackError::range(
                self.field.as_ref(),
                value,
                self.range.min,
                self.range.max,
            ))
        }
    }

    pub(crate) fn decode(&self, raw: u64) -> i64 {
        match self.encoding {
            IntEncoding::Unsigned => raw as i64,
            IntEncoding::Signed => {
                let unused = 64 - self.width;
                ((raw << unused) as i64) >> unused
            }
            IntEncoding::Offset(min) => min.wrapping_add(raw as i64),
        }
    }

    pub(crate) fn encode(&self, value: i64) -> u64 {
        let raw = match self.encoding {
            IntEncoding::Unsigned | IntEncoding::Signed => value as u64,
            IntEncoding::Offset(min) => value.wrapping_sub(min) as u64,
        };
        raw & bits::mask(self.width)
    }

    pub fn read(&self, store: &dyn BytesStore, pos: u64, mode: ReadMode) -> Result<i64> {
        check_read(&self.field, self.supports, mode)?;
        Ok(self.decode(bits::load(store, pos, self.width, mode)?))
    }

    pub fn write(&self, store: &dyn BytesStore, pos: u64, mode: WriteMode, value: i64) -> Result<()> {
        check_write(&self.field, self.supports, mode)?;
        let value = self.check(value as i128)?;
        bits::store_raw(store, pos, self.width, mode, self.encode(value))
    }

    /// Replace `expected` with `new`; an out-of-range `expected` can never match
    pub fn compare_and_swap(
        &self,
        store: &dyn BytesStore,
        pos: u64,
        expected: i64,
        new: i64,
    ) -> Result<bool> {
        check_access(&self.field, self.supports, Supports::CAS, "compare_and_swap")?;
        let new = self.check(new as i128)?;
        if !self.range.contains(expected as i128) {
            return Ok(false);
        }
        bits::cas_raw(store, pos, self.width, self.encode(expected), self.encode(new))
    }

    /// Non-atomic read-modify-write add, returning the new value
    pub fn add(&self, store: &dyn BytesStore, pos: u64, delta: i64) -> Result<i64> {
        check_access(&self.field, self.supports, Supports::ADD, "add")?;
        let current = self.decode(bits::read_bits(store, pos, self.width)?);
        let next = self.sum(current, delta)?;
        bits::write_bits(store, pos, self.width, self.encode(next))?;
        Ok(next)
    }

    /// Atomic add, returning the new value
    pub fn atomic_add(&self, store: &dyn BytesStore, pos: u64, delta: i64) -> Result<i64> {
        check_access(&self.field, self.supports, Supports::ATOMIC_ADD, "atomic_add")?;
        if self.hardware_add() {
            let (byte, _) = bits::split(pos);
            let raw = match self.width {
                32 => store.add_and_get_u32(byte, delta as u32)? as u64,
                _ => store.add_and_get_u64(byte, delta as u64)?,
            };
            return Ok(self.decode(raw));
        }
        loop {
            let raw = bits::load(store, pos, self.width, ReadMode::Volatile)?;
            let next = self.sum(self.decode(raw), delta)?;
            if bits::cas_raw(store, pos, self.width, raw, self.encode(next))? {
                return Ok(next);
            }
        }
    }

    /// Whether a wrapping machine add on the raw word gives the right answer
    fn hardware_add(&self) -> bool {
        self.wrapping
            && matches!(self.width, 32 | 64)
            && self.encoding != IntEncoding::Offset(self.range.min)
            && self.range.options() == Some(1u128 << self.width)
    }

    fn sum(&self, current: i64, delta: i64) -> Result<i64> {
        let sum = current as i128 + delta as i128;
        if self.range.contains(sum) {
            return Ok(sum as i64);
        }
        if !self.wrapping {
            return Err(PackError::range(
                self.field.as_ref(),
                sum,
                self.range.min,
                self.range.max,
            ));
        }
        let min = self.range.min as i128;
        // A wrapping field always has a non-empty range
        let options = self.range.options().unwrap_or(1) as i128;
        Ok((min + (sum - min).rem_euclid(options)) as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytes::HeapBytes;

    fn codec(width: u32, range: IntRange, wrapping: bool) -> IntCodec {
        IntCodec::new("n", width, range, wrapping, Supports::ALL)
    }

    #[test]
    fn test_encoding_choice() {
        assert_eq!(codec(4, IntRange::new(0, 15), false).encoding(), IntEncoding::Unsigned);
        assert_eq!(codec(4, IntRange::new(-8, 7), true).encoding(), IntEncoding::Signed);
        assert_eq!(
            codec(4, IntRange::new(-5, 10), false).encoding(),
            IntEncoding::Offset(-5)
        );
        assert_eq!(codec(4, IntRange::new(3, 9), false).encoding(), IntEncoding::Offset(3));
        assert_eq!(bits_for(16), 4);
        assert_eq!(bits_for(17), 5);
        assert_eq!(bits_for(1), 1);
        assert_eq!(bits_for(1u128 << 64), 64);
    }

    #[test]
    fn test_ranged_round_trip() {
        let store = HeapBytes::new(8);
        let c = codec(4, IntRange::new(-5, 10), false);
        for v in -5..=10 {
            c.write(&store, 13, WriteMode::Plain, v).unwrap();
            assert_eq!(c.read(&store, 13, ReadMode::Plain).unwrap(), v);
        }
        let before = store.to_vec();
        assert!(matches!(
            c.write(&store, 13, WriteMode::Plain, 11),
            Err(PackError::Range { value: 11, .. })
        ));
        assert_eq!(store.to_vec(), before);
    }

    #[test]
    fn test_signed_sign_extension() {
        let store = HeapBytes::new(8);
        let c = codec(12, natural_range(true, 12), true);
        c.write(&store, 5, WriteMode::Plain, -2048).unwrap();
        assert_eq!(c.read(&store, 5, ReadMode::Plain).unwrap(), -2048);
        c.write(&store, 5, WriteMode::Plain, -1).unwrap();
        assert_eq!(c.read(&store, 5, ReadMode::Plain).unwrap(), -1);
    }

    #[test]
    fn test_add_wraps_natural_range() {
        let store = HeapBytes::new(8);
        let c = codec(8, natural_range(true, 8), true);
        c.write(&store, 0, WriteMode::Plain, 127).unwrap();
        assert_eq!(c.add(&store, 0, 1).unwrap(), -128);

        let c = codec(32, natural_range(true, 32), true);
        c.write(&store, 32, WriteMode::Plain, i32::MAX as i64).unwrap();
        assert_eq!(c.atomic_add(&store, 32, 1).unwrap(), i32::MIN as i64);
    }

    #[test]
    fn test_add_fails_on_explicit_range() {
        let store = HeapBytes::new(8);
        let c = codec(32, IntRange::new(0, 100), false);
        c.write(&store, 0, WriteMode::Plain, 99).unwrap();
        assert_eq!(c.atomic_add(&store, 0, 1).unwrap(), 100);
        assert!(c.atomic_add(&store, 0, 1).is_err());
        assert!(c.add(&store, 0, 1).is_err());
        assert_eq!(c.read(&store, 0, ReadMode::Plain).unwrap(), 100);
    }

    #[test]
    fn test_compare_and_swap() {
        let store = HeapBytes::new(8);
        let c = codec(64, natural_range(true, 64), true);
        assert!(c.compare_and_swap(&store, 0, 0, -42).unwrap());
        assert!(!c.compare_and_swap(&store, 0, 0, 1).unwrap());
        assert_eq!(c.read(&store, 0, ReadMode::Volatile).unwrap(), -42);

        let ranged = codec(32, IntRange::new(0, 10), false);
        assert!(!ranged.compare_and_swap(&store, 0, -1, 5).unwrap());
        assert!(ranged.compare_and_swap(&store, 0, 0, 11).is_err());
    }

    #[test]
    fn test_undeclared_access_rejected() {
        let store = HeapBytes::new(8);
        let c = IntCodec::new("n", 8, natural_range(false, 8), true, Supports::PLAIN);
        assert!(matches!(
            c.read(&store, 0, ReadMode::Volatile),
            Err(PackError::UnsupportedAccess { .. })
        ));
        assert!(c.add(&store, 0, 1).is_err());
        assert!(c.compare_and_swap(&store, 0, 0, 1).is_err());
    }
}
