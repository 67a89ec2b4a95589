//! Enumeration codec: ordinals stored through an integer sub-field

use std::sync::Arc;

use super::{check_access, IntCodec, ReadMode, WriteMode};
use crate::{
    bytes::BytesStore,
    error::{PackError, Result},
    schema::Supports,
};

/// Codec for an enum of N named constants.
///
/// The ordinal lives in an integer field with range `[-1, N - 1]` when
/// nullable (`-1` meaning absent) and `[0, N - 1]` otherwise.
#[derive(Debug, Clone)]
pub struct EnumCodec {
    int: IntCodec,
    constants: Arc<[Arc<str>]>,
    nullable: bool,
}

impl EnumCodec {
    pub fn new(int: IntCodec, constants: &[String], nullable: bool) -> Self {
        Self {
            int,
            constants: constants.iter().map(|c| Arc::<str>::from(c.as_str())).collect(),
            nullable,
        }
    }

    pub fn field(&self) -> &str {
        self.int.field()
    }

    pub fn int(&self) -> &IntCodec {
        &self.int
    }

    pub fn nullable(&self) -> bool {
        self.nullable
    }

    pub fn len(&self) -> usize {
        self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }

    /// Name of the constant with the given ordinal
    pub fn constant_name(&self, ordinal: u32) -> Option<&str> {
        self.constants.get(ordinal as usize).map(|c| c.as_ref())
    }

    /// Ordinal of the constant with the given name
    pub fn ordinal_of(&self, name: &str) -> Option<u32> {
        self.constants
            .iter()
            .position(|c| c.as_ref() == name)
            .map(|i| i as u32)
    }

    /// Value of an all-zero field
    pub fn default_value(&self) -> Option<u32> {
        self.from_ordinal(self.int.default_value()).unwrap_or(None)
    }

    /// Validate an ordinal, mapping `None` to `-1`
    pub fn to_ordinal(&self, value: Option<u32>) -> Result<i64> {
        match value {
            None if self.nullable => Ok(-1),
            None => Err(PackError::nullability(self.field())),
            Some(ordinal) => self.int.check(ordinal as i128),
        }
    }

    fn from_ordinal(&self, ordinal: i64) -> Result<Option<u32>> {
        match ordinal {
            -1 if self.nullable => Ok(None),
            o if o >= 0 && (o as usize) < self.constants.len() => Ok(Some(o as u32)),
            o => Err(PackError::corrupted(
                self.field(),
                format!("ordinal {} outside {} constants", o, self.constants.len()),
            )),
        }
    }

    pub fn read(&self, store: &dyn BytesStore, pos: u64, mode: ReadMode) -> Result<Option<u32>> {
        self.from_ordinal(self.int.read(store, pos, mode)?)
    }

    pub fn write(
        &self,
        store: &dyn BytesStore,
        pos: u64,
        mode: WriteMode,
        value: Option<u32>,
    ) -> Result<()> {
        let ordinal = self.to_ordinal(value)?;
        self.int.write(store, pos, mode, ordinal)
    }

    pub fn compare_and_swap(
        &self,
        store: &dyn BytesStore,
        pos: u64,
        expected: Option<u32>,
        new: Option<u32>,
    ) -> Result<bool> {
        check_access(self.field(), self.int.supports(), Supports::CAS, "compare_and_swap")?;
        let new = self.to_ordinal(new)?;
        match self.to_ordinal(expected) {
            Ok(expected) => self.int.compare_and_swap(store, pos, expected, new),
            Err(_) => Ok(false),
        }
    }
}
