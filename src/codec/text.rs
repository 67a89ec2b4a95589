//! Bounded UTF-8 text codec
//!
//! Layout of a field with `max_bytes = N`:
//!
//! ```text
//! +----------------------+------------------+
//! | stop-bit length      | payload          |
//! | prefix_len bytes     | N bytes          |
//! +----------------------+------------------+
//! ```
//!
//! Nullable fields store `len + 1` in the prefix so that `0` means absent;
//! non-nullable fields store `len`.

use std::sync::{
    atomic::{fence, Ordering},
    Arc,
};

use super::{
    bits,
    check_read,
    check_write,
    stop_bit::{decode_stop_bit, encode_stop_bit, stop_bit_len, MAX_STOP_BIT_LEN},
    ReadMode,
    WriteMode,
};
use crate::{
    bytes::{BytesAccess, BytesStore},
    error::{PackError, Result},
    schema::Supports,
};

/// Codec for a length-prefixed string of at most `max_bytes` UTF-8 bytes
#[derive(Debug, Clone)]
pub struct TextCodec {
    field: Arc<str>,
    max_bytes: u32,
    nullable: bool,
    prefix_len: usize,
    supports: Supports,
}

impl TextCodec {
    pub fn new(field: impl Into<Arc<str>>, max_bytes: u32, nullable: bool, supports: Supports) -> Self {
        Self {
            field: field.into(),
            max_bytes,
            nullable,
            prefix_len: Self::prefix_len_for(max_bytes, nullable),
            supports,
        }
    }

    /// Bytes needed by the length prefix of a field
    pub fn prefix_len_for(max_bytes: u32, nullable: bool) -> usize {
        stop_bit_len(max_bytes as u64 + nullable as u64)
    }

    /// Total field size in bytes
    pub fn size_in_bytes(&self) -> usize {
        self.prefix_len + self.max_bytes as usize
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn max_bytes(&self) -> u32 {
        self.max_bytes
    }

    pub fn nullable(&self) -> bool {
        self.nullable
    }

    pub fn supports(&self) -> Supports {
        self.supports
    }

    /// Value of an all-zero field: absent when nullable, empty otherwise
    pub fn default_value(&self) -> Option<String> {
        (!self.nullable).then(String::new)
    }

    /// Check a value against the nullability flag and the byte bound
    pub fn check(&self, value: Option<&str>) -> Result<()> {
        match value {
            None if !self.nullable => Err(PackError::nullability(self.field.as_ref())),
            Some(s) if s.len() > self.max_bytes as usize => {
                Err(PackError::length(self.field.as_ref(), s.len(), self.max_bytes))
            }
            _ => Ok(()),
        }
    }

    pub fn read(&self, store: &dyn BytesStore, pos: u64, mode: ReadMode) -> Result<Option<String>> {
        check_read(&self.field, self.supports, mode)?;
        let (byte, _) = bits::split(pos);
        let mut prefix = [0u8; MAX_STOP_BIT_LEN];
        store.read_bytes(byte, &mut prefix[..self.prefix_len])?;
        if mode == ReadMode::Volatile {
            fence(Ordering::Acquire);
        }
        let (stored, _) = decode_stop_bit(&prefix[..self.prefix_len])
            .map_err(|_| PackError::corrupted(self.field.as_ref(), "unterminated length prefix"))?;
        let len = match (self.nullable, stored) {
            (true, 0) => return Ok(None),
            (true, n) => n - 1,
            (false, n) => n,
        };
        if len > self.max_bytes as u64 {
            return Err(PackError::corrupted(
                self.field.as_ref(),
                format!("length {} exceeds max {}", len, self.max_bytes),
            ));
        }
        let mut payload = vec![0u8; len as usize];
        store.read_bytes(byte + self.prefix_len, &mut payload)?;
        String::from_utf8(payload)
            .map(Some)
            .map_err(|e| PackError::corrupted(self.field.as_ref(), e.to_string()))
    }

    pub fn write(
        &self,
        store: &dyn BytesStore,
        pos: u64,
        mode: WriteMode,
        value: Option<&str>,
    ) -> Result<()> {
        check_write(&self.field, self.supports, mode)?;
        self.check(value)?;
        let (byte, _) = bits::split(pos);
        store.span(byte, self.size_in_bytes())?;

        let stored = match value {
            None => 0,
            Some(s) => s.len() as u64 + self.nullable as u64,
        };
        let mut prefix = [0u8; MAX_STOP_BIT_LEN];
        encode_stop_bit(stored, &mut prefix)?;

        if mode != WriteMode::Plain {
            fence(Ordering::Release);
        }
        if let Some(s) = value {
            store.write_bytes(byte + self.prefix_len, s.as_bytes())?;
        }
        store.write_bytes(byte, &prefix[..self.prefix_len])?;
        if mode == WriteMode::Volatile {
            fence(Ordering::SeqCst);
        }
        Ok(())
    }
}
