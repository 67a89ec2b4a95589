//! Record instances: packed views over a store and unpacked values

pub mod hashing;
pub mod marshal;
pub mod packed;
pub mod unpacked;

pub use packed::{FieldRef, PackedRecord};
pub use unpacked::RecordValue;
