//! Layout planner configuration

use serde::{Deserialize, Serialize};

/// Order in which free holes are offered to the next field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HoleOrder {
    /// Smallest hole first, then lowest offset; keeps large gaps for fields that need them
    #[default]
    SmallestFirst,
    /// Largest hole first, then lowest offset
    LargestFirst,
    /// Lowest offset first
    LowestOffset,
}

/// Configuration for the layout planner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Hole selection order
    pub hole_order: HoleOrder,
    /// Largest record the planner will produce, in bytes
    pub max_record_bytes: u32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            hole_order: HoleOrder::SmallestFirst,
            max_record_bytes: crate::config::DEFAULT_MAX_RECORD_BYTES,
        }
    }
}

impl PlannerConfig {
    /// Set hole selection order
    pub fn with_hole_order(mut self, order: HoleOrder) -> Self {
        self.hole_order = order;
        self
    }

    /// Set maximum record size
    pub fn with_max_record_bytes(mut self, bytes: u32) -> Self {
        self.max_record_bytes = bytes;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::PackError;

        if self.max_record_bytes == 0 {
            return Err(PackError::invalid_parameter(
                "max_record_bytes",
                "Maximum record size cannot be zero",
            ));
        }

        // Bit offsets are u32
        if self.max_record_bytes > u32::MAX / 8 {
            return Err(PackError::invalid_parameter(
                "max_record_bytes",
                format!("Maximum record size cannot exceed {} bytes", u32::MAX / 8),
            ));
        }

        Ok(())
    }
}
