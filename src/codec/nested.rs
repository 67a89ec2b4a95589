//! Nested record codec: a sub-record embedded inline

use std::sync::{
    atomic::{fence, Ordering},
    Arc,
};

use super::{bits, check_read, check_write, ReadMode, WriteMode};
use crate::{
    bytes::{BytesAccess, BytesStore, HeapBytes},
    error::{PackError, Result},
    record::{PackedRecord, RecordValue},
    schema::{RecordSchema, Supports},
};

/// Codec for an inline sub-record at a byte-aligned offset
#[derive(Debug, Clone)]
pub struct NestedCodec {
    field: Arc<str>,
    schema: Arc<RecordSchema>,
    supports: Supports,
}

impl NestedCodec {
    pub fn new(field: impl Into<Arc<str>>, schema: Arc<RecordSchema>, supports: Supports) -> Self {
        Self {
            field: field.into(),
            schema,
            supports,
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn schema(&self) -> &Arc<RecordSchema> {
        &self.schema
    }

    pub fn supports(&self) -> Supports {
        self.supports
    }

    pub fn size_in_bytes(&self) -> usize {
        self.schema.size_in_bytes() as usize
    }

    pub fn default_value(&self) -> RecordValue {
        RecordValue::new(self.schema.clone())
    }

    /// Check that an unpacked value has this field's schema
    pub fn check(&self, value: &RecordValue) -> Result<()> {
        if **value.schema() == *self.schema {
            Ok(())
        } else {
            Err(PackError::type_error(
                self.field.as_ref(),
                format!(
                    "expected a {} record, got {}",
                    self.schema.name(),
                    value.schema().name()
                ),
            ))
        }
    }

    /// Packed view of the sub-record in place
    pub fn view<'a>(&self, store: &'a dyn BytesStore, pos: u64) -> Result<PackedRecord<'a>> {
        let (byte, _) = bits::split(pos);
        PackedRecord::new(store, byte, self.schema.clone())
    }

    pub fn read(&self, store: &dyn BytesStore, pos: u64, mode: ReadMode) -> Result<RecordValue> {
        check_read(&self.field, self.supports, mode)?;
        let value = self.view(store, pos)?.to_value()?;
        if mode == ReadMode::Volatile {
            fence(Ordering::Acquire);
        }
        Ok(value)
    }

    /// Encode into a scratch copy first so a failed field never leaves a half-written record
    pub fn write(
        &self,
        store: &dyn BytesStore,
        pos: u64,
        mode: WriteMode,
        value: &RecordValue,
    ) -> Result<()> {
        check_write(&self.field, self.supports, mode)?;
        self.check(value)?;
        let size = self.size_in_bytes();
        let scratch = HeapBytes::new(size);
        PackedRecord::new(&scratch, 0, self.schema.clone())?.copy_from_value(value)?;
        let bytes = scratch.to_vec();
        self.copy_in(store, pos, mode, &bytes[..size])
    }

    /// Byte-range copy from another packed record of the same schema
    pub fn copy_packed(
        &self,
        store: &dyn BytesStore,
        pos: u64,
        mode: WriteMode,
        source: &PackedRecord<'_>,
    ) -> Result<()> {
        check_write(&self.field, self.supports, mode)?;
        if **source.schema() != *self.schema {
            return Err(PackError::type_error(
                self.field.as_ref(),
                format!(
                    "expected a {} record, got {}",
                    self.schema.name(),
                    source.schema().name()
                ),
            ));
        }
        let mut bytes = vec![0u8; self.size_in_bytes()];
        source.store().read_bytes(source.offset(), &mut bytes)?;
        self.copy_in(store, pos, mode, &bytes)
    }

    fn copy_in(&self, store: &dyn BytesStore, pos: u64, mode: WriteMode, bytes: &[u8]) -> Result<()> {
        let (byte, _) = bits::split(pos);
        if mode != WriteMode::Plain {
            fence(Ordering::Release);
        }
        store.write_bytes(byte, bytes)?;
        if mode == WriteMode::Volatile {
            fence(Ordering::SeqCst);
        }
        Ok(())
    }
}
