//! Dynamic field values exchanged with the codecs

use std::{
    fmt,
    hash::{Hash, Hasher},
};

use crate::record::{hashing, RecordValue};

/// A decoded field value.
///
/// Equality follows the per-kind rules of the record model: floats compare
/// by bit pattern (so `NaN == NaN` and `0.0 != -0.0`), enums by ordinal with
/// `None` equal only to `None`, text by byte content.
#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Float32(f32),
    Float64(f64),
    /// Enum ordinal, `None` when absent
    Enum(Option<u32>),
    /// Text, `None` when absent
    Text(Option<String>),
    Record(Box<RecordValue>),
    /// Absolute address, `None` for a null pointer
    Pointer(Option<u64>),
    Array(Vec<Value>),
}

impl Value {
    /// Short name of the value's kind for diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Bool(_) => "bool",
            Value::Float32(_) => "f32",
            Value::Float64(_) => "f64",
            Value::Enum(_) => "enum",
            Value::Text(_) => "text",
            Value::Record(_) => "record",
            Value::Pointer(_) => "pointer",
            Value::Array(_) => "array",
        }
    }

    /// Absent text
    pub fn null_text() -> Self {
        Value::Text(None)
    }

    /// Whether this is an absent enum, text or pointer
    pub fn is_null(&self) -> bool {
        matches!(
            self,
            Value::Enum(None) | Value::Text(None) | Value::Pointer(None)
        )
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::Float32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float64(v) => Some(*v),
            Value::Float32(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Enum ordinal; `None` for a non-enum or an absent enum
    pub fn as_ordinal(&self) -> Option<u32> {
        match self {
            Value::Enum(v) => *v,
            _ => None,
        }
    }

    /// Text content; `None` for non-text or absent text
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(Some(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&RecordValue> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<u64> {
        match self {
            Value::Pointer(addr) => *addr,
            _ => None,
        }
    }

    /// Deterministic hash, stable across processes
    pub fn stable_hash(&self) -> u64 {
        hashing::hash_value(self)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Float32(a), Value::Float32(b)) => a.to_bits() == b.to_bits(),
            (Value::Float64(a), Value::Float64(b)) => a.to_bits() == b.to_bits(),
            (Value::Enum(a), Value::Enum(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a == b,
            (Value::Pointer(a), Value::Pointer(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.stable_hash());
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Float32(v) => write!(f, "{}", v),
            Value::Float64(v) => write!(f, "{}", v),
            Value::Enum(Some(ordinal)) => write!(f, "#{}", ordinal),
            Value::Text(Some(s)) => write!(f, "{:?}", s),
            Value::Enum(None) | Value::Text(None) | Value::Pointer(None) => f.write_str("null"),
            Value::Record(r) => write!(f, "{}", r),
            Value::Pointer(Some(addr)) => write!(f, "@{:#x}", addr),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(Some(v.to_string()))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(Some(v))
    }
}

impl From<Option<&str>> for Value {
    fn from(v: Option<&str>) -> Self {
        Value::Text(v.map(str::to_string))
    }
}

impl From<RecordValue> for Value {
    fn from(v: RecordValue) -> Self {
        Value::Record(Box::new(v))
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_bit_equality() {
        assert_eq!(Value::Float64(f64::NAN), Value::Float64(f64::NAN));
        assert_ne!(Value::Float64(0.0), Value::Float64(-0.0));
        assert_ne!(Value::Float32(1.0), Value::Float64(1.0));
        assert_eq!(
            Value::Float32(f32::NAN).stable_hash(),
            Value::Float32(f32::NAN).stable_hash()
        );
    }

    #[test]
    fn test_null_handling() {
        assert!(Value::null_text().is_null());
        assert_ne!(Value::null_text(), Value::from(""));
        assert_eq!(Value::Enum(None), Value::Enum(None));
        assert_ne!(Value::Enum(None), Value::Enum(Some(0)));
    }

    #[test]
    fn test_display() {
        let v = Value::Array(vec![Value::Int(1), Value::from("a"), Value::Text(None)]);
        assert_eq!(v.to_string(), "[1, \"a\", null]");
        assert_eq!(Value::Pointer(Some(16)).to_string(), "@0x10");
    }
}
