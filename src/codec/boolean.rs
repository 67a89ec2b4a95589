//! Single-bit boolean codec

use std::sync::Arc;

use super::{bits, check_access, check_read, check_write, ReadMode, WriteMode};
use crate::{
    bytes::{BytesAccess, BytesStore},
    error::{PackError, Result},
    schema::Supports,
};

/// Codec for a one-bit flag.
///
/// Plain and volatile access touch the containing byte. Ordered writes and
/// compare-and-swap run a CAS loop on the 4-byte aligned word that contains
/// the bit, since no hardware atomic works on a single bit.
#[derive(Debug, Clone)]
pub struct BoolCodec {
    field: Arc<str>,
    supports: Supports,
}

impl BoolCodec {
    pub fn new(field: impl Into<Arc<str>>, supports: Supports) -> Self {
        Self {
            field: field.into(),
            supports,
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn supports(&self) -> Supports {
        self.supports
    }

    pub fn read(&self, store: &dyn BytesStore, pos: u64, mode: ReadMode) -> Result<bool> {
        check_read(&self.field, self.supports, mode)?;
        let (byte, shift) = bits::split(pos);
        let value = match mode {
            ReadMode::Plain => store.read_u8(byte)?,
            ReadMode::Volatile => store.read_volatile_u8(byte)?,
        };
        Ok((value >> shift) & 1 == 1)
    }

    pub fn write(&self, store: &dyn BytesStore, pos: u64, mode: WriteMode, value: bool) -> Result<()> {
        check_write(&self.field, self.supports, mode)?;
        let (byte, shift) = bits::split(pos);
        match mode {
            WriteMode::Plain => {
                let current = store.read_u8(byte)?;
                store.write_u8(byte, set_bit(current as u32, shift, value) as u8)
            }
            WriteMode::Volatile => {
                let current = store.read_volatile_u8(byte)?;
                store.write_volatile_u8(byte, set_bit(current as u32, shift, value) as u8)
            }
            WriteMode::Ordered => {
                let (word, shift) = self.word_of(store, pos)?;
                loop {
                    let current = store.read_volatile_u32(word)?;
                    let next = set_bit(current, shift, value);
                    if current == next || store.compare_and_swap_u32(word, current, next)? {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Flip the bit from `expected` to `new`, failing if another writer got there first
    pub fn compare_and_swap(
        &self,
        store: &dyn BytesStore,
        pos: u64,
        expected: bool,
        new: bool,
    ) -> Result<bool> {
        check_access(&self.field, self.supports, Supports::CAS, "compare_and_swap")?;
        let (word, shift) = self.word_of(store, pos)?;
        loop {
            let current = store.read_volatile_u32(word)?;
            if ((current >> shift) & 1 == 1) != expected {
                return Ok(false);
            }
            let next = set_bit(current, shift, new);
            if current == next || store.compare_and_swap_u32(word, current, next)? {
                return Ok(true);
            }
            // A neighbouring bit changed under us; re-check ours
        }
    }

    /// Offset of the 4-byte aligned word holding `pos`, and the bit's shift inside it
    fn word_of(&self, store: &dyn BytesStore, pos: u64) -> Result<(usize, u32)> {
        let (byte, shift) = bits::split(pos);
        let misalign = (store.address_of(byte) % 4) as usize;
        if byte < misalign {
            return Err(PackError::alignment(store.address_of(byte) as usize, 4));
        }
        Ok((byte - misalign, misalign as u32 * 8 + shift))
    }
}

fn set_bit(word: u32, shift: u32, value: bool) -> u32 {
    if value {
        word | (1 << shift)
    } else {
        word & !(1 << shift)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytes::HeapBytes;

    #[test]
    fn test_bits_share_a_byte() {
        let store = HeapBytes::new(8);
        let flags: Vec<BoolCodec> = (0..4)
            .map(|i| BoolCodec::new(format!("f{}", i), Supports::ALL))
            .collect();
        flags[1].write(&store, 9, WriteMode::Plain, true).unwrap();
        flags[3].write(&store, 11, WriteMode::Volatile, true).unwrap();
        assert_eq!(store.read_u8(1).unwrap(), 0b1010);
        assert!(!flags[0].read(&store, 8, ReadMode::Plain).unwrap());
        assert!(flags[1].read(&store, 9, ReadMode::Volatile).unwrap());
    }

    #[test]
    fn test_cas_on_containing_word() {
        let store = HeapBytes::new(8);
        let flag = BoolCodec::new("f", Supports::ALL);
        // Bit 45 is bit 5 of byte 5, inside the word at offset 4
        assert!(flag.compare_and_swap(&store, 45, false, true).unwrap());
        assert!(!flag.compare_and_swap(&store, 45, false, true).unwrap());
        assert_eq!(store.read_u8(5).unwrap(), 0b10_0000);
        flag.write(&store, 45, WriteMode::Ordered, false).unwrap();
        assert_eq!(store.read_u8(5).unwrap(), 0);
    }

    #[test]
    fn test_cas_requires_declaration() {
        let store = HeapBytes::new(8);
        let flag = BoolCodec::new("f", Supports::PLAIN);
        assert!(matches!(
            flag.compare_and_swap(&store, 0, false, true),
            Err(PackError::UnsupportedAccess { .. })
        ));
    }
}
