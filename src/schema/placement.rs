//! Bit placement of a field inside a record

use serde::Serialize;

/// Where a field's bits live, relative to the record start.
///
/// `bit_extent` may exceed `bit_width` when padding was donated to the
/// field; codecs only interpret the first `bit_width` bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FieldPlacement {
    pub bit_offset: u32,
    pub bit_extent: u32,
    pub bit_width: u32,
}

impl FieldPlacement {
    pub fn new(bit_offset: u32, bit_width: u32) -> Self {
        Self {
            bit_offset,
            bit_extent: bit_width,
            bit_width,
        }
    }

    /// First bit past the field's extent
    pub fn end(&self) -> u32 {
        self.bit_offset + self.bit_extent
    }

    /// Check if two placements share any bit
    pub fn overlaps(&self, other: &FieldPlacement) -> bool {
        self.bit_offset < other.end() && other.bit_offset < self.end()
    }

    /// Byte offset when the field starts on a byte boundary
    pub fn byte_offset(&self) -> Option<u32> {
        (self.bit_offset % 8 == 0).then_some(self.bit_offset / 8)
    }
}
