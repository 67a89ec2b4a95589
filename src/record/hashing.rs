//! Stable hashing of field values and records
//!
//! Hashes depend only on field values, never on memory addresses or the
//! process, so packed and unpacked copies of a record hash alike.

use crate::codec::Value;

use super::RecordValue;

/// Multiplier applied to the running hash before each field is folded in
pub const FIELD_MULTIPLIER: u64 = 1_000_003;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-1a over raw bytes
pub fn fnv1a(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(FNV_OFFSET, |h, &b| (h ^ b as u64).wrapping_mul(FNV_PRIME))
}

/// Fold per-item hashes in order
pub fn fold<I: IntoIterator<Item = u64>>(hashes: I) -> u64 {
    hashes
        .into_iter()
        .fold(0, |h, item| h.wrapping_mul(FIELD_MULTIPLIER) ^ item)
}

fn mix64(v: u64) -> u64 {
    v ^ (v >> 32)
}

/// Hash of a single value
pub fn hash_value(value: &Value) -> u64 {
    match value {
        Value::Int(v) => mix64(*v as u64),
        Value::Bool(true) => 1231,
        Value::Bool(false) => 1237,
        Value::Float32(v) => v.to_bits() as u64,
        Value::Float64(v) => mix64(v.to_bits()),
        // Absent maps to 0, ordinals are shifted by one
        Value::Enum(ordinal) => ordinal.map_or(0, |o| o as u64 + 1),
        Value::Text(text) => text.as_deref().map_or(0, |s| fnv1a(s.as_bytes())),
        Value::Record(record) => hash_record(record),
        Value::Pointer(address) => mix64(address.unwrap_or(0)),
        Value::Array(items) => fold(items.iter().map(hash_value)),
    }
}

/// Hash of a record: its field hashes folded in schema order
pub fn hash_record(record: &RecordValue) -> u64 {
    fold(record.values().iter().map(hash_value))
}
