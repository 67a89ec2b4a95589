//! Unpacked records: one [`Value`] per field

use std::{
    fmt,
    hash::{Hash, Hasher},
    io::{Read, Write},
    sync::Arc,
};

use super::{hashing, marshal};
use crate::{
    codec::Value,
    error::{PackError, Result},
    schema::RecordSchema,
};

/// A record held as plain values.
///
/// Every setter applies the same checks as writing the field into a packed
/// record, so a `RecordValue` can always be copied into one.
#[derive(Debug, Clone)]
pub struct RecordValue {
    schema: Arc<RecordSchema>,
    values: Vec<Value>,
}

impl RecordValue {
    /// Record with every field at its all-zero value
    pub fn new(schema: Arc<RecordSchema>) -> Self {
        let values = schema
            .fields()
            .iter()
            .map(|f| f.codec.default_value())
            .collect();
        Self { schema, values }
    }

    /// Values are trusted to match the schema
    pub(crate) fn from_values(schema: Arc<RecordSchema>, values: Vec<Value>) -> Self {
        debug_assert_eq!(schema.len(), values.len());
        Self { schema, values }
    }

    pub fn schema(&self) -> &Arc<RecordSchema> {
        &self.schema
    }

    /// Values in schema order
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn get(&self, name: &str) -> Result<&Value> {
        let index = self
            .schema
            .field_index(name)
            .ok_or_else(|| PackError::field_not_found(name))?;
        Ok(&self.values[index])
    }

    pub fn get_at(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Set a field, rejecting values its codec would reject
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let index = self
            .schema
            .field_index(name)
            .ok_or_else(|| PackError::field_not_found(name))?;
        self.set_at(index, value)
    }

    pub fn set_at(&mut self, index: usize, value: impl Into<Value>) -> Result<()> {
        let field = self.schema.fields().get(index).ok_or_else(|| {
            PackError::invalid_parameter(
                "index",
                format!("{} has {} fields", self.schema.name(), self.schema.len()),
            )
        })?;
        let value = value.into();
        field.codec.validate(&value)?;
        self.values[index] = value;
        Ok(())
    }

    /// `(name, value)` pairs in schema order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.schema
            .fields()
            .iter()
            .map(|f| f.name())
            .zip(self.values.iter())
    }

    pub fn write_to<W: Write + ?Sized>(&self, w: &mut W) -> Result<()> {
        marshal::write_record(self, w)
    }

    pub fn read_from<R: Read + ?Sized>(schema: &Arc<RecordSchema>, r: &mut R) -> Result<Self> {
        marshal::read_record(schema, r)
    }

    /// Same value as [`Hash`] feeds to the hasher
    pub fn hash_code(&self) -> u64 {
        hashing::hash_record(self)
    }
}

impl PartialEq for RecordValue {
    fn eq(&self, other: &Self) -> bool {
        *self.schema == *other.schema && self.values == other.values
    }
}

impl Eq for RecordValue {}

impl Hash for RecordValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash_code());
    }
}

impl fmt::Display for RecordValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {{ ", self.schema.name())?;
        for (i, (name, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", name, value)?;
        }
        f.write_str(" }")
    }
}
