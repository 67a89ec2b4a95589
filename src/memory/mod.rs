//! Memory-mapped regions that packed records can live in

pub mod config;
pub mod regions;

pub use config::{Backing, RegionConfig};
pub use regions::MappedRegion;
