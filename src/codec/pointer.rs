//! Pointer codec: a 64-bit address of another packed record

use std::sync::Arc;

use super::{IntCodec, ReadMode, WriteMode};
use crate::{
    bytes::{BytesAccess, BytesStore},
    error::{PackError, Result},
    record::PackedRecord,
    schema::RecordSchema,
};

/// Codec for an absolute address stored as a plain 64-bit integer.
///
/// Address `0` means absent.
#[derive(Debug, Clone)]
pub struct PointerCodec {
    int: IntCodec,
    target: Arc<RecordSchema>,
}

impl PointerCodec {
    pub fn new(int: IntCodec, target: Arc<RecordSchema>) -> Self {
        Self { int, target }
    }

    pub fn field(&self) -> &str {
        self.int.field()
    }

    pub fn int(&self) -> &IntCodec {
        &self.int
    }

    /// Schema of the records this field points at
    pub fn target(&self) -> &Arc<RecordSchema> {
        &self.target
    }

    pub fn read(&self, store: &dyn BytesStore, pos: u64, mode: ReadMode) -> Result<Option<u64>> {
        let address = self.int.read(store, pos, mode)? as u64;
        Ok((address != 0).then_some(address))
    }

    pub fn write(
        &self,
        store: &dyn BytesStore,
        pos: u64,
        mode: WriteMode,
        address: Option<u64>,
    ) -> Result<()> {
        self.int.write(store, pos, mode, address.unwrap_or(0) as i64)
    }

    pub fn compare_and_swap(
        &self,
        store: &dyn BytesStore,
        pos: u64,
        expected: Option<u64>,
        new: Option<u64>,
    ) -> Result<bool> {
        self.int.compare_and_swap(
            store,
            pos,
            expected.unwrap_or(0) as i64,
            new.unwrap_or(0) as i64,
        )
    }

    /// Point at `target`, which must be a packed record of the target schema
    pub fn write_target(
        &self,
        store: &dyn BytesStore,
        pos: u64,
        mode: WriteMode,
        target: Option<&PackedRecord<'_>>,
    ) -> Result<()> {
        if let Some(record) = target {
            if **record.schema() != *self.target {
                return Err(PackError::type_error(
                    self.field(),
                    format!(
                        "expected a {} record, got {}",
                        self.target.name(),
                        record.schema().name()
                    ),
                ));
            }
        }
        self.write(store, pos, mode, target.map(PackedRecord::address))
    }

    /// View of the pointed-to record, which must live in the same store
    pub fn deref<'a>(
        &self,
        store: &'a dyn BytesStore,
        pos: u64,
        mode: ReadMode,
    ) -> Result<Option<PackedRecord<'a>>> {
        let address = match self.read(store, pos, mode)? {
            Some(address) => address,
            None => return Ok(None),
        };
        let size = self.target.size_in_bytes() as usize;
        let offset = store.offset_of(address, size).ok_or_else(|| {
            PackError::invalid_parameter(
                self.field(),
                format!("address {:#x} does not lie inside this store", address),
            )
        })?;
        PackedRecord::new(store, offset, self.target.clone()).map(Some)
    }
}
