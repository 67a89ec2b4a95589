//! Bit-level helpers shared by the scalar codecs

use std::sync::atomic::{fence, Ordering};

use super::{ReadMode, WriteMode};
use crate::{
    bytes::{BytesAccess, BytesStore},
    error::{PackError, Result},
};

/// Mask of the low `width` bits
pub(crate) const fn mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

/// Round `value` up to a multiple of `alignment` (no-op for 0 or 1)
pub(crate) const fn round_up(value: u64, alignment: u64) -> u64 {
    if alignment <= 1 {
        value
    } else {
        value.div_ceil(alignment) * alignment
    }
}

/// Whether `[start, start + width)` crosses a multiple of `boundary`
pub(crate) const fn crosses(start: u64, width: u64, boundary: u64) -> bool {
    boundary != 0 && width != 0 && start / boundary != (start + width - 1) / boundary
}

/// Byte offset and in-byte shift of a bit position
pub(crate) const fn split(pos: u64) -> (usize, u32) {
    ((pos / 8) as usize, (pos % 8) as u32)
}

/// Whether the field at `pos` fills a whole byte-aligned 8/16/32/64-bit word
pub(crate) const fn is_whole_word(pos: u64, width: u32) -> bool {
    pos % 8 == 0 && matches!(width, 8 | 16 | 32 | 64)
}

/// Read `width` (1..=64) bits starting at absolute bit position `pos`
pub(crate) fn read_bits(store: &dyn BytesStore, pos: u64, width: u32) -> Result<u64> {
    let (byte, shift) = split(pos);
    if shift == 0 {
        match width {
            8 => return Ok(store.read_u8(byte)? as u64),
            16 => return Ok(store.read_u16(byte)? as u64),
            32 => return Ok(store.read_u32(byte)? as u64),
            64 => return store.read_u64(byte),
            _ => {}
        }
    }
    let span = (shift + width).div_ceil(8) as usize;
    let mut buf = [0u8; 16];
    store.read_bytes(byte, &mut buf[..span])?;
    let word = u128::from_le_bytes(buf);
    Ok(((word >> shift) as u64) & mask(width))
}

/// Write the low `width` bits of `raw` at `pos`, preserving neighbouring bits
pub(crate) fn write_bits(store: &dyn BytesStore, pos: u64, width: u32, raw: u64) -> Result<()> {
    let (byte, shift) = split(pos);
    let raw = raw & mask(width);
    if shift == 0 {
        match width {
            8 => return store.write_u8(byte, raw as u8),
            16 => return store.write_u16(byte, raw as u16),
            32 => return store.write_u32(byte, raw as u32),
            64 => return store.write_u64(byte, raw),
            _ => {}
        }
    }
    let span = (shift + width).div_ceil(8) as usize;
    let mut buf = [0u8; 16];
    store.read_bytes(byte, &mut buf[..span])?;
    let field_mask = (mask(width) as u128) << shift;
    let word = (u128::from_le_bytes(buf) & !field_mask) | ((raw as u128) << shift);
    store.write_bytes(byte, &word.to_le_bytes()[..span])
}

/// Read a field's raw bits honouring the access mode.
///
/// Whole aligned words go through the store's atomic loads; anything else
/// falls back to a plain read followed by an acquire fence.
pub(crate) fn load(store: &dyn BytesStore, pos: u64, width: u32, mode: ReadMode) -> Result<u64> {
    if mode == ReadMode::Plain {
        return read_bits(store, pos, width);
    }
    let (byte, _) = split(pos);
    if is_whole_word(pos, width) {
        return match width {
            8 => Ok(store.read_volatile_u8(byte)? as u64),
            16 => Ok(store.read_volatile_u16(byte)? as u64),
            32 => Ok(store.read_volatile_u32(byte)? as u64),
            _ => store.read_volatile_u64(byte),
        };
    }
    let raw = read_bits(store, pos, width)?;
    fence(Ordering::Acquire);
    Ok(raw)
}

/// Write a field's raw bits honouring the access mode
pub(crate) fn store_raw(
    store: &dyn BytesStore,
    pos: u64,
    width: u32,
    mode: WriteMode,
    raw: u64,
) -> Result<()> {
    let (byte, _) = split(pos);
    let raw = raw & mask(width);
    match mode {
        WriteMode::Plain => write_bits(store, pos, width, raw),
        WriteMode::Volatile if is_whole_word(pos, width) => match width {
            8 => store.write_volatile_u8(byte, raw as u8),
            16 => store.write_volatile_u16(byte, raw as u16),
            32 => store.write_volatile_u32(byte, raw as u32),
            _ => store.write_volatile_u64(byte, raw),
        },
        WriteMode::Ordered if pos % 8 == 0 && width == 32 => {
            store.write_ordered_u32(byte, raw as u32)
        }
        WriteMode::Ordered if pos % 8 == 0 && width == 64 => store.write_ordered_u64(byte, raw),
        WriteMode::Volatile => {
            write_bits(store, pos, width, raw)?;
            fence(Ordering::SeqCst);
            Ok(())
        }
        WriteMode::Ordered => {
            fence(Ordering::Release);
            write_bits(store, pos, width, raw)
        }
    }
}

/// Compare-and-swap a byte-aligned 32 or 64-bit field
pub(crate) fn cas_raw(
    store: &dyn BytesStore,
    pos: u64,
    width: u32,
    expected: u64,
    new: u64,
) -> Result<bool> {
    let (byte, shift) = split(pos);
    match (shift, width) {
        (0, 32) => store.compare_and_swap_u32(byte, expected as u32, new as u32),
        (0, 64) => store.compare_and_swap_u64(byte, expected, new),
        _ => Err(PackError::invalid_parameter(
            "width",
            format!("no compare-and-swap for {} bits at bit {}", width, pos),
        )),
    }
}
