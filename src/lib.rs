//! # Valuepack - Packed Binary Records
//!
//! Valuepack compiles a schema of named, typed fields into a fixed-size
//! bit-packed record layout and reads and writes those records in place,
//! inside any byte store: a heap buffer, a memory-mapped file or a shared
//! memory region.
//!
//! ## Features
//!
//! - **Greedy bit packing**: fields are ordered by constraint and width and
//!   alignment gaps are back-filled, so records stay small
//! - **Per-field access modes**: plain, volatile, ordered, compare-and-swap,
//!   add and atomic add, each declared per field
//! - **Rich field kinds**: ranged integers, bit booleans, floats, enums,
//!   bounded text, nested records, pointers and fixed arrays
//! - **Shared memory**: file-backed and memfd-backed mapped regions
//! - **Marshalling**: compact stop-bit stream encoding with validation
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   plan    ┌──────────────────────────────┐
//! │  SchemaDef   │ ────────▶ │ RecordSchema                 │
//! │  (fields)    │           │ placements + field codecs    │
//! └──────────────┘           └──────────────────────────────┘
//!                                          │
//!                  ┌───────────────────────┴─────────────┐
//!                  ▼                                     ▼
//!       ┌─────────────────────┐               ┌─────────────────────┐
//!       │ PackedRecord        │  to_value /   │ RecordValue         │
//!       │ (store, offset)     │ ◀───────────▶ │ (unpacked values)   │
//!       └─────────────────────┘ copy_from_val └─────────────────────┘
//!                  │
//!                  ▼
//!       ┌─────────────────────┐
//!       │ BytesStore          │
//!       │ HeapBytes / Mapped  │
//!       └─────────────────────┘
//! ```

pub mod bytes;
pub mod codec;
pub mod error;
pub mod layout;
pub mod memory;
pub mod record;
pub mod schema;

// Main API re-exports
pub use bytes::{BytesAccess, BytesStore, HeapBytes};
pub use codec::{FieldCodec, ReadMode, Value, WriteMode};
pub use error::{PackError, Result, SchemaError};
pub use layout::{FieldConstraints, HoleOrder, LayoutItem, LayoutPlanner, PlacedLayout, PlannerConfig};
pub use memory::{Backing, MappedRegion, RegionConfig};
pub use record::{FieldRef, PackedRecord, RecordValue};
pub use schema::{
    FieldKind, FieldPlacement, FieldSchema, IntRange, LayoutReport, RecordSchema, SchemaCache,
    SchemaDef, Supports,
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const VERSION_MAJOR: u32 = 0;
pub const VERSION_MINOR: u32 = 1;
pub const VERSION_PATCH: u32 = 0;

/// Default configuration constants
pub mod config {
    /// Largest record the default planner produces (256MB)
    pub const DEFAULT_MAX_RECORD_BYTES: u32 = 1 << 28;

    /// Width of an integer field that declares neither width nor range
    pub const DEFAULT_INT_BITS: u32 = 32;
}
