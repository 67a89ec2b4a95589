//! Packed records: a schema laid over bytes of a store

use std::{
    fmt,
    io::{Read, Write},
    sync::Arc,
};

use super::RecordValue;
use crate::{
    bytes::{BytesAccess, BytesStore},
    codec::{FieldCodec, ReadMode, Value, WriteMode},
    error::{PackError, Result},
    schema::RecordSchema,
};

/// A record living at `offset` inside `store`.
///
/// The view owns nothing but the schema; many views may share a store and
/// use different fields concurrently through their declared access modes.
#[derive(Debug, Clone)]
pub struct PackedRecord<'a> {
    store: &'a dyn BytesStore,
    offset: usize,
    schema: Arc<RecordSchema>,
}

impl<'a> PackedRecord<'a> {
    /// View the record at `offset`; the whole record must fit in the store
    pub fn new(store: &'a dyn BytesStore, offset: usize, schema: Arc<RecordSchema>) -> Result<Self> {
        let size = schema.size_in_bytes() as usize;
        if offset.checked_add(size).map_or(true, |end| end > store.capacity()) {
            return Err(PackError::out_of_bounds(offset, size, store.capacity()));
        }
        Ok(Self {
            store,
            offset,
            schema,
        })
    }

    /// View record `index` of a run packed at [`RecordSchema::stride`] from the start of `store`
    pub fn at_index(store: &'a dyn BytesStore, index: usize, schema: Arc<RecordSchema>) -> Result<Self> {
        let stride = schema.stride() as usize;
        let offset = stride.checked_mul(index).ok_or_else(|| {
            PackError::out_of_bounds(usize::MAX, stride, store.capacity())
        })?;
        Self::new(store, offset, schema)
    }

    pub fn store(&self) -> &'a dyn BytesStore {
        self.store
    }

    /// Byte offset of the record inside its store
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn schema(&self) -> &Arc<RecordSchema> {
        &self.schema
    }

    /// Absolute address, as stored by pointer fields
    pub fn address(&self) -> u64 {
        self.store.address_of(self.offset)
    }

    /// Handle on one field
    pub fn field(&self, name: &str) -> Result<FieldRef<'_>> {
        let planned = self.schema.require(name)?;
        Ok(FieldRef {
            store: self.store,
            codec: &planned.codec,
            pos: self.offset as u64 * 8 + planned.bit_offset() as u64,
        })
    }

    pub fn get(&self, name: &str) -> Result<Value> {
        self.field(name)?.get()
    }

    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.field(name)?.set(value)
    }

    /// Decode every field
    pub fn to_value(&self) -> Result<RecordValue> {
        let values = self
            .schema
            .fields()
            .iter()
            .map(|f| {
                f.codec
                    .read(self.store, self.offset as u64 * 8 + f.bit_offset() as u64, ReadMode::Plain)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(RecordValue::from_values(self.schema.clone(), values))
    }

    /// Write every field of `value`, which must have the same schema
    pub fn copy_from_value(&self, value: &RecordValue) -> Result<()> {
        self.check_schema(value.schema())?;
        // Validate everything before the first byte changes
        for (field, v) in self.schema.fields().iter().zip(value.values()) {
            field.codec.validate(v)?;
        }
        for (field, v) in self.schema.fields().iter().zip(value.values()) {
            let pos = self.offset as u64 * 8 + field.bit_offset() as u64;
            field.codec.write(self.store, pos, WriteMode::Plain, v)?;
        }
        Ok(())
    }

    /// Copy the raw bytes of another record of the same schema
    pub fn copy_from(&self, other: &PackedRecord<'_>) -> Result<()> {
        self.check_schema(other.schema())?;
        let mut bytes = vec![0u8; self.schema.size_in_bytes() as usize];
        other.store.read_bytes(other.offset, &mut bytes)?;
        self.store.write_bytes(self.offset, &bytes)
    }

    /// Zero the record's bytes
    pub fn clear(&self) -> Result<()> {
        self.store
            .zero(self.offset, self.schema.size_in_bytes() as usize)
    }

    pub fn write_to<W: Write + ?Sized>(&self, w: &mut W) -> Result<()> {
        self.to_value()?.write_to(w)
    }

    /// Unmarshal into this record; nothing is written unless the whole input decodes
    pub fn read_from<R: Read + ?Sized>(&self, r: &mut R) -> Result<()> {
        let value = RecordValue::read_from(&self.schema, r)?;
        self.copy_from_value(&value)
    }

    pub fn hash_code(&self) -> Result<u64> {
        Ok(self.to_value()?.hash_code())
    }

    fn check_schema(&self, other: &RecordSchema) -> Result<()> {
        if *other == *self.schema {
            Ok(())
        } else {
            Err(PackError::type_error(
                self.schema.name(),
                format!("expected a {} record, got {}", self.schema.name(), other.name()),
            ))
        }
    }
}

impl PartialEq for PackedRecord<'_> {
    /// Field-wise equality; records that fail to decode are unequal
    fn eq(&self, other: &Self) -> bool {
        match (self.to_value(), other.to_value()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialEq<RecordValue> for PackedRecord<'_> {
    fn eq(&self, other: &RecordValue) -> bool {
        self.to_value().map_or(false, |v| v == *other)
    }
}

impl fmt::Display for PackedRecord<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_value() {
            Ok(value) => value.fmt(f),
            Err(err) => write!(f, "{} {{ <{}> }}", self.schema.name(), err),
        }
    }
}

/// Handle on one field (or array element) of a packed record
#[derive(Debug, Clone, Copy)]
pub struct FieldRef<'a> {
    store: &'a dyn BytesStore,
    codec: &'a FieldCodec,
    pos: u64,
}

impl<'a> FieldRef<'a> {
    /// Name of the field this handle addresses
    pub fn name(&self) -> &str {
        self.codec.field()
    }

    pub fn codec(&self) -> &FieldCodec {
        self.codec
    }

    /// Absolute bit position inside the store
    pub fn bit_position(&self) -> u64 {
        self.pos
    }

    pub fn get(&self) -> Result<Value> {
        self.codec.read(self.store, self.pos, ReadMode::Plain)
    }

    /// Acquire load
    pub fn get_volatile(&self) -> Result<Value> {
        self.codec.read(self.store, self.pos, ReadMode::Volatile)
    }

    pub fn set(&self, value: impl Into<Value>) -> Result<()> {
        self.codec
            .write(self.store, self.pos, WriteMode::Plain, &value.into())
    }

    /// Sequentially consistent store
    pub fn set_volatile(&self, value: impl Into<Value>) -> Result<()> {
        self.codec
            .write(self.store, self.pos, WriteMode::Volatile, &value.into())
    }

    /// Release store
    pub fn set_ordered(&self, value: impl Into<Value>) -> Result<()> {
        self.codec
            .write(self.store, self.pos, WriteMode::Ordered, &value.into())
    }

    /// Atomically replace `expected` with `new`, returning whether it happened
    pub fn compare_and_swap(&self, expected: impl Into<Value>, new: impl Into<Value>) -> Result<bool> {
        self.codec
            .compare_and_swap(self.store, self.pos, &expected.into(), &new.into())
    }

    /// Non-atomic add, returning the new value
    pub fn add(&self, delta: impl Into<Value>) -> Result<Value> {
        self.codec.add(self.store, self.pos, &delta.into())
    }

    /// Atomic add, returning the new value
    pub fn atomic_add(&self, delta: impl Into<Value>) -> Result<Value> {
        self.codec.atomic_add(self.store, self.pos, &delta.into())
    }

    /// Element count of an array field
    pub fn length(&self) -> Result<u32> {
        match self.codec {
            FieldCodec::Array(c) => Ok(c.len()),
            other => Err(self.not_a("an array", other)),
        }
    }

    /// Element `index` of an array field
    pub fn at(&self, index: i64) -> Result<FieldRef<'a>> {
        match self.codec {
            FieldCodec::Array(c) => Ok(FieldRef {
                store: self.store,
                codec: c.element(),
                pos: c.element_pos(self.pos, index)?,
            }),
            other => Err(self.not_a("an array", other)),
        }
    }

    /// Packed view of a nested record field
    pub fn record(&self) -> Result<PackedRecord<'a>> {
        match self.codec {
            FieldCodec::Nested(c) => c.view(self.store, self.pos),
            other => Err(self.not_a("a record", other)),
        }
    }

    /// Copy another packed record into a nested record field
    pub fn set_record(&self, source: &PackedRecord<'_>) -> Result<()> {
        match self.codec {
            FieldCodec::Nested(c) => c.copy_packed(self.store, self.pos, WriteMode::Plain, source),
            other => Err(self.not_a("a record", other)),
        }
    }

    /// Record a pointer field points at, if any
    pub fn target(&self) -> Result<Option<PackedRecord<'a>>> {
        match self.codec {
            FieldCodec::Pointer(c) => c.deref(self.store, self.pos, ReadMode::Plain),
            other => Err(self.not_a("a pointer", other)),
        }
    }

    /// Point a pointer field at `target`, or clear it
    pub fn set_target(&self, target: Option<&PackedRecord<'_>>) -> Result<()> {
        match self.codec {
            FieldCodec::Pointer(c) => c.write_target(self.store, self.pos, WriteMode::Plain, target),
            other => Err(self.not_a("a pointer", other)),
        }
    }

    /// Constant name of an enum field, `None` when absent
    pub fn enum_name(&self) -> Result<Option<&'a str>> {
        match self.codec {
            FieldCodec::Enum(c) => {
                let ordinal = c.read(self.store, self.pos, ReadMode::Plain)?;
                Ok(ordinal.and_then(|o| c.constant_name(o)))
            }
            other => Err(self.not_a("an enum", other)),
        }
    }

    /// Set an enum field by constant name
    pub fn set_enum_name(&self, name: &str) -> Result<()> {
        match self.codec {
            FieldCodec::Enum(c) => {
                let ordinal = c.ordinal_of(name).ok_or_else(|| {
                    PackError::type_error(c.field(), format!("no constant named {}", name))
                })?;
                c.write(self.store, self.pos, WriteMode::Plain, Some(ordinal))
            }
            other => Err(self.not_a("an enum", other)),
        }
    }

    fn not_a(&self, wanted: &str, codec: &FieldCodec) -> PackError {
        PackError::type_error(
            codec.field(),
            format!("{} field is not {}", codec.kind_name(), wanted),
        )
    }
}
