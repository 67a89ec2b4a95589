//! Sizing and placement of mapped record regions

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::{
    codec::bits::round_up,
    error::{PackError, Result},
    schema::RecordSchema,
};

/// Mode of region files created on disk
pub(crate) const REGION_FILE_MODE: u32 = 0o644;

/// Where the bytes of a region live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Backing {
    /// A file; `None` means `valuepack_<name>` in the temp directory
    File(Option<PathBuf>),
    /// Anonymous memory file, private to this process and its children
    #[cfg(target_os = "linux")]
    MemFd,
}

impl Backing {
    pub fn name(&self) -> &'static str {
        match self {
            Backing::File(_) => "file",
            #[cfg(target_os = "linux")]
            Backing::MemFd => "memfd",
        }
    }
}

/// A run of records of one schema, laid out one stride apart.
///
/// Records start at multiples of `record_stride` from the mapping base,
/// which must itself satisfy `record_alignment`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionConfig {
    pub name: String,
    /// Records to make room for; 0 when opening an existing region
    pub record_count: usize,
    /// Bytes from one record to the next
    pub record_stride: usize,
    /// Alignment every record start needs for its atomic fields
    pub record_alignment: usize,
    pub backing: Backing,
    /// Create (or resize) the backing instead of opening it as it is
    pub create: bool,
}

impl RegionConfig {
    /// Make room for `count` records of `schema`
    pub fn for_records(schema: &RecordSchema, count: usize) -> Self {
        Self {
            name: schema.name().to_string(),
            record_count: count,
            record_stride: schema.stride() as usize,
            record_alignment: schema.recommended_alignment() as usize,
            backing: Backing::File(None),
            create: true,
        }
    }

    /// Open an existing region holding records of `schema`
    pub fn open(schema: &RecordSchema) -> Self {
        Self {
            create: false,
            ..Self::for_records(schema, 0)
        }
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.backing = Backing::File(Some(path.into()));
        self
    }

    #[cfg(target_os = "linux")]
    pub fn in_memory(mut self) -> Self {
        self.backing = Backing::MemFd;
        self
    }

    /// Bytes a created region needs, rounded up to a whole word so word
    /// atomics on the last record stay in bounds
    pub fn byte_len(&self) -> Result<usize> {
        let bytes = self
            .record_stride
            .checked_mul(self.record_count)
            .ok_or_else(|| {
                PackError::invalid_parameter(
                    "record_count",
                    format!(
                        "{} records of {} bytes overflow the address space",
                        self.record_count, self.record_stride
                    ),
                )
            })?;
        Ok(round_up(bytes as u64, 8).max(8) as usize)
    }

    /// File the region lives in, if it is file-backed
    pub fn file_path(&self) -> Option<PathBuf> {
        match &self.backing {
            Backing::File(Some(path)) => Some(path.clone()),
            Backing::File(None) => {
                Some(std::env::temp_dir().join(format!("valuepack_{}", self.name)))
            }
            #[cfg(target_os = "linux")]
            Backing::MemFd => None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(PackError::invalid_parameter("name", "Region name cannot be empty"));
        }
        if self.record_stride == 0 {
            return Err(PackError::invalid_parameter(
                "record_stride",
                "Records of an empty schema take no space",
            ));
        }
        if !self.record_alignment.is_power_of_two() || self.record_stride % self.record_alignment != 0
        {
            return Err(PackError::invalid_parameter(
                "record_alignment",
                format!(
                    "stride {} is not a multiple of record alignment {}",
                    self.record_stride, self.record_alignment
                ),
            ));
        }
        if self.create {
            if self.record_count == 0 {
                return Err(PackError::invalid_parameter(
                    "record_count",
                    "A new region needs room for at least one record",
                ));
            }
            self.byte_len()?;
        } else if !matches!(self.backing, Backing::File(Some(_))) {
            return Err(PackError::invalid_parameter(
                "file_path",
                "Existing regions are opened by path",
            ));
        }
        Ok(())
    }

    /// Check that records laid out from `base` keep their alignment
    pub fn check_base(&self, base: usize) -> Result<()> {
        if base % self.record_alignment != 0 {
            return Err(PackError::alignment(base, self.record_alignment));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldSchema, SchemaDef, Supports};

    fn tally() -> std::sync::Arc<RecordSchema> {
        let def = SchemaDef::new("tally")
            .field(FieldSchema::boolean("open").with_offset_alignment(0))
            .field(FieldSchema::int("count", 64).with_supports(Supports::ATOMIC_ADD));
        RecordSchema::plan(&def).unwrap()
    }

    #[test]
    fn test_sized_by_stride() {
        let config = RegionConfig::for_records(&tally(), 3);
        assert_eq!(config.record_stride, 16);
        assert_eq!(config.record_alignment, 8);
        assert_eq!(config.byte_len().unwrap(), 48);
        assert!(config.validate().is_ok());
        assert_eq!(
            config.file_path().unwrap().file_name().unwrap(),
            "valuepack_tally"
        );

        let odd = RecordSchema::plan(&SchemaDef::new("odd").field(FieldSchema::int("x", 24))).unwrap();
        assert_eq!(RegionConfig::for_records(&odd, 5).byte_len().unwrap(), 16);
    }

    #[test]
    fn test_validation() {
        let schema = tally();
        assert!(RegionConfig::for_records(&schema, 0).validate().is_err());
        assert!(RegionConfig::for_records(&schema, usize::MAX).validate().is_err());

        let mut misaligned = RegionConfig::for_records(&schema, 1);
        misaligned.record_stride = 12;
        assert!(misaligned.validate().is_err());

        let existing = RegionConfig::open(&schema);
        assert!(matches!(
            existing.validate(),
            Err(PackError::InvalidParameter { ref parameter, .. }) if parameter == "file_path"
        ));
        assert!(existing.with_file("/tmp/x").validate().is_ok());
    }

    #[test]
    fn test_base_alignment() {
        let config = RegionConfig::for_records(&tally(), 1);
        assert!(config.check_base(4096).is_ok());
        assert!(matches!(
            config.check_base(4100),
            Err(PackError::Alignment { alignment: 8, .. })
        ));
    }
}
