//! Schema definitions and planned record schemas

pub mod cache;
pub mod field;
pub mod placement;
pub mod record;

pub use cache::SchemaCache;
pub use field::{FieldKind, FieldSchema, IntRange, SchemaDef, Supports};
pub use placement::FieldPlacement;
pub use record::{FieldReport, LayoutReport, PlannedField, RecordSchema};
