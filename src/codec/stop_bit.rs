//! # Stop-Bit Length Encoding
//!
//! Variable-length unsigned integers used for text length prefixes and for
//! marshalled integers. Each byte carries seven payload bits, least
//! significant group first; a set high bit means another byte follows.
//!
//! | Value Range            | Bytes |
//! |------------------------|-------|
//! | 0 - 127                | 1     |
//! | 128 - 16383            | 2     |
//! | 16384 - 2097151        | 3     |
//! | ...                    | ...   |
//! | up to u64::MAX         | 10    |
//!
//! Signed values are zig-zag mapped first so small negatives stay short.

use std::io::{Read, Write};

use crate::error::{PackError, Result};

/// Largest encoded length of a `u64`
pub const MAX_STOP_BIT_LEN: usize = 10;

/// Number of bytes `value` encodes to
pub fn stop_bit_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.div_ceil(7).max(1)
}

/// Encode into `buf`, returning the number of bytes written
pub fn encode_stop_bit(mut value: u64, buf: &mut [u8]) -> Result<usize> {
    let needed = stop_bit_len(value);
    if buf.len() < needed {
        return Err(PackError::out_of_bounds(0, needed, buf.len()));
    }
    let mut i = 0;
    while value >= 0x80 {
        buf[i] = (value as u8 & 0x7F) | 0x80;
        value >>= 7;
        i += 1;
    }
    buf[i] = value as u8;
    Ok(i + 1)
}

/// Decode from the front of `buf`, returning `(value, bytes_read)`
pub fn decode_stop_bit(buf: &[u8]) -> Result<(u64, usize)> {
    let mut value = 0u64;
    for (i, &byte) in buf.iter().enumerate().take(MAX_STOP_BIT_LEN) {
        value |= ((byte & 0x7F) as u64) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(PackError::serialization("unterminated stop-bit sequence"))
}

/// Zig-zag map a signed value onto the unsigned space
pub fn zigzag(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Inverse of [`zigzag`]
pub fn unzigzag(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

/// Write a stop-bit value to a sink
pub fn write_stop_bit<W: Write + ?Sized>(w: &mut W, value: u64) -> Result<()> {
    let mut buf = [0u8; MAX_STOP_BIT_LEN];
    let len = encode_stop_bit(value, &mut buf)?;
    w.write_all(&buf[..len])?;
    Ok(())
}

/// Read a stop-bit value from a source
pub fn read_stop_bit<R: Read + ?Sized>(r: &mut R) -> Result<u64> {
    let mut value = 0u64;
    for i in 0..MAX_STOP_BIT_LEN {
        let mut byte = [0u8; 1];
        r.read_exact(&mut byte)?;
        value |= ((byte[0] & 0x7F) as u64) << (7 * i);
        if byte[0] & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(PackError::serialization("unterminated stop-bit sequence"))
}
