//! Memory-mapped region usable as a record store

use std::{
    fs::{File, OpenOptions},
    os::fd::{AsRawFd, OwnedFd},
    os::unix::fs::OpenOptionsExt,
    path::Path,
};

#[cfg(target_os = "linux")]
use std::ffi::CString;

use log::debug;
use memmap2::{MmapOptions, MmapRaw};
#[cfg(target_os = "linux")]
use nix::{
    sys::memfd::{memfd_create, MemFdCreateFlag},
    unistd::ftruncate,
};

use crate::{
    bytes::BytesStore,
    error::{PackError, Result},
};

use super::config::{Backing, RegionConfig, REGION_FILE_MODE};

/// A mapped run of packed records.
///
/// File-backed regions can be opened by several processes at once; every
/// access mode of the record codecs works across them.
#[derive(Debug)]
pub struct MappedRegion {
    name: String,
    backing: Backing,
    record_stride: usize,
    /// Raw mapping; writable through `&self`
    mmap: MmapRaw,
    /// Keeps the backing file open for file-backed regions
    _file: Option<File>,
    /// Keeps the descriptor open for memfd regions
    _owned_fd: Option<OwnedFd>,
}

impl MappedRegion {
    /// Create or open a mapped region
    pub fn new(config: RegionConfig) -> Result<Self> {
        config.validate()?;

        let (file, owned_fd) = Self::create_backing(&config)?;
        let size = match (&file, config.create) {
            (Some(f), false) => f
                .metadata()
                .map_err(|e| PackError::from_io(e, "Failed to stat region file"))?
                .len() as usize,
            _ => config.byte_len()?,
        };
        if size < config.record_stride {
            return Err(PackError::invalid_parameter(
                "size",
                format!("Region of {} bytes holds no {} record", size, config.name),
            ));
        }
        let mmap = Self::create_mapping(&file, &owned_fd, size)?;
        config.check_base(mmap.as_ptr() as usize)?;

        debug!(
            "mapped region {} ({}, {} bytes, {} records)",
            config.name,
            config.backing.name(),
            size,
            size / config.record_stride
        );

        Ok(Self {
            name: config.name,
            backing: config.backing,
            record_stride: config.record_stride,
            mmap,
            _file: file,
            _owned_fd: owned_fd,
        })
    }

    /// Create the backing storage for the region
    fn create_backing(config: &RegionConfig) -> Result<(Option<File>, Option<OwnedFd>)> {
        match config.file_path() {
            Some(path) => Ok((Some(Self::create_file_backing(config, &path)?), None)),
            #[cfg(target_os = "linux")]
            None => Ok((None, Some(Self::create_memfd_backing(config)?))),
            #[cfg(not(target_os = "linux"))]
            None => Err(PackError::platform("Region has no backing file")),
        }
    }

    /// Create or open file-backed storage
    fn create_file_backing(config: &RegionConfig, path: &Path) -> Result<File> {
        if !config.create {
            return OpenOptions::new()
                .read(true)
                .write(true)
                .open(path)
                .map_err(|e| PackError::from_io(e, "Failed to open existing file"));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .mode(REGION_FILE_MODE)
            .open(path)
            .map_err(|e| PackError::from_io(e, "Failed to create/open file"))?;
        file.set_len(config.byte_len()? as u64)
            .map_err(|e| PackError::from_io(e, "Failed to set file size"))?;
        Ok(file)
    }

    /// Create memfd-backed storage
    #[cfg(target_os = "linux")]
    fn create_memfd_backing(config: &RegionConfig) -> Result<OwnedFd> {
        let name_cstr = CString::new(config.name.clone())
            .map_err(|_| PackError::invalid_parameter("name", "Name contains null bytes"))?;

        let owned_fd = memfd_create(&name_cstr, MemFdCreateFlag::MFD_CLOEXEC)
            .map_err(|e| PackError::platform(format!("Failed to create memfd: {}", e)))?;

        ftruncate(&owned_fd, config.byte_len()? as i64)
            .map_err(|e| PackError::platform(format!("Failed to set memfd size: {}", e)))?;

        Ok(owned_fd)
    }

    /// Create the raw mapping for the backing storage
    fn create_mapping(file: &Option<File>, owned_fd: &Option<OwnedFd>, size: usize) -> Result<MmapRaw> {
        let mapped = match (file, owned_fd) {
            (Some(f), _) => MmapOptions::new().len(size).map_raw(f),
            (None, Some(fd)) => MmapOptions::new().len(size).map_raw(fd.as_raw_fd()),
            (None, None) => {
                return Err(PackError::platform("No file or owned fd available for mapping"))
            }
        };
        mapped.map_err(|e| PackError::from_io(e, "Failed to create memory mapping"))
    }

    /// Get the name of the region
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the size of the region
    pub fn size(&self) -> usize {
        self.mmap.len()
    }

    /// Where the region's bytes live
    pub fn backing(&self) -> &Backing {
        &self.backing
    }

    /// Check if the region is file-backed
    pub fn is_file_backed(&self) -> bool {
        matches!(self.backing, Backing::File(_))
    }

    /// Bytes from one record to the next
    pub fn record_stride(&self) -> usize {
        self.record_stride
    }

    /// Whole records that fit in the mapping
    pub fn record_capacity(&self) -> usize {
        self.mmap.len() / self.record_stride
    }

    /// Flush changes to persistent storage (for file-backed regions)
    pub fn flush(&self) -> Result<()> {
        self.mmap
            .flush()
            .map_err(|e| PackError::from_io(e, "Failed to flush memory mapping"))
    }
}

unsafe impl BytesStore for MappedRegion {
    fn as_ptr(&self) -> *mut u8 {
        self.mmap.as_mut_ptr()
    }

    fn capacity(&self) -> usize {
        self.mmap.len()
    }
}
