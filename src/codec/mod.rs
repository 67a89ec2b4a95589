//! Field codecs
//!
//! One codec per field kind, dispatched through [`FieldCodec`]. Every codec
//! works on an absolute bit position inside a [`BytesStore`] and validates
//! its input before touching a byte, so a failed write never mutates the
//! store.

pub mod array;
pub(crate) mod bits;
pub mod boolean;
pub mod enums;
pub mod float;
pub mod int;
pub mod nested;
pub mod pointer;
pub mod stop_bit;
pub mod text;
pub mod value;

pub use array::{ArrayCodec, ArrayLayout};
pub use boolean::BoolCodec;
pub use enums::EnumCodec;
pub use float::FloatCodec;
pub use int::{IntCodec, IntEncoding};
pub use nested::NestedCodec;
pub use pointer::PointerCodec;
pub use text::TextCodec;
pub use value::Value;

use crate::{
    bytes::BytesStore,
    error::{PackError, Result},
    schema::Supports,
};

/// How a field is loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadMode {
    #[default]
    Plain,
    /// Acquire load
    Volatile,
}

/// How a field is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    #[default]
    Plain,
    /// Sequentially consistent store
    Volatile,
    /// Release-only store
    Ordered,
}

pub(crate) fn check_access(field: &str, supports: Supports, flag: Supports, access: &str) -> Result<()> {
    if supports.contains(flag) {
        Ok(())
    } else {
        Err(PackError::unsupported(field, access))
    }
}

pub(crate) fn check_read(field: &str, supports: Supports, mode: ReadMode) -> Result<()> {
    match mode {
        ReadMode::Plain => Ok(()),
        ReadMode::Volatile if supports.needs_atomic() => Ok(()),
        ReadMode::Volatile => Err(PackError::unsupported(field, "volatile read")),
    }
}

pub(crate) fn check_write(field: &str, supports: Supports, mode: WriteMode) -> Result<()> {
    match mode {
        WriteMode::Plain => Ok(()),
        WriteMode::Volatile => check_access(field, supports, Supports::VOLATILE, "volatile write"),
        WriteMode::Ordered => check_access(field, supports, Supports::ORDERED, "ordered write"),
    }
}

/// Codec for one planned field, selected by the field's kind
#[derive(Debug, Clone)]
pub enum FieldCodec {
    Int(IntCodec),
    Bool(BoolCodec),
    Float(FloatCodec),
    Enum(EnumCodec),
    Text(TextCodec),
    Nested(NestedCodec),
    Pointer(PointerCodec),
    Array(ArrayCodec),
}

impl FieldCodec {
    /// Name of the field this codec serves
    pub fn field(&self) -> &str {
        match self {
            FieldCodec::Int(c) => c.field(),
            FieldCodec::Bool(c) => c.field(),
            FieldCodec::Float(c) => c.field(),
            FieldCodec::Enum(c) => c.field(),
            FieldCodec::Text(c) => c.field(),
            FieldCodec::Nested(c) => c.field(),
            FieldCodec::Pointer(c) => c.field(),
            FieldCodec::Array(c) => c.field(),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            FieldCodec::Int(_) => "int",
            FieldCodec::Bool(_) => "bool",
            FieldCodec::Float(c) if c.width() == 32 => "f32",
            FieldCodec::Float(_) => "f64",
            FieldCodec::Enum(_) => "enum",
            FieldCodec::Text(_) => "text",
            FieldCodec::Nested(_) => "record",
            FieldCodec::Pointer(_) => "pointer",
            FieldCodec::Array(_) => "array",
        }
    }

    /// Declared access modes; arrays report their element's
    pub fn supports(&self) -> Supports {
        match self {
            FieldCodec::Int(c) => c.supports(),
            FieldCodec::Bool(c) => c.supports(),
            FieldCodec::Float(c) => c.supports(),
            FieldCodec::Enum(c) => c.int().supports(),
            FieldCodec::Text(c) => c.supports(),
            FieldCodec::Nested(c) => c.supports(),
            FieldCodec::Pointer(c) => c.int().supports(),
            FieldCodec::Array(c) => c.element().supports(),
        }
    }

    /// Bits the codec interprets
    pub fn bit_width(&self) -> u64 {
        match self {
            FieldCodec::Int(c) => c.width() as u64,
            FieldCodec::Bool(_) => 1,
            FieldCodec::Float(c) => c.width() as u64,
            FieldCodec::Enum(c) => c.int().width() as u64,
            FieldCodec::Text(c) => c.size_in_bytes() as u64 * 8,
            FieldCodec::Nested(c) => c.size_in_bytes() as u64 * 8,
            FieldCodec::Pointer(_) => 64,
            FieldCodec::Array(c) => c.total_bits(),
        }
    }

    /// Value of an all-zero field
    pub fn default_value(&self) -> Value {
        match self {
            FieldCodec::Int(c) => Value::Int(c.default_value()),
            FieldCodec::Bool(_) => Value::Bool(false),
            FieldCodec::Float(c) if c.width() == 32 => Value::Float32(0.0),
            FieldCodec::Float(_) => Value::Float64(0.0),
            FieldCodec::Enum(c) => Value::Enum(c.default_value()),
            FieldCodec::Text(c) => Value::Text(c.default_value()),
            FieldCodec::Nested(c) => Value::Record(Box::new(c.default_value())),
            FieldCodec::Pointer(_) => Value::Pointer(None),
            FieldCodec::Array(c) => Value::Array(c.default_value()),
        }
    }

    fn mismatch(&self, value: &Value) -> PackError {
        PackError::type_error(
            self.field(),
            format!("expected {} value, got {}", self.kind_name(), value.kind_name()),
        )
    }

    /// Check a value without writing it
    pub fn validate(&self, value: &Value) -> Result<()> {
        match (self, value) {
            (FieldCodec::Int(c), Value::Int(v)) => c.check(*v as i128).map(|_| ()),
            (FieldCodec::Bool(_), Value::Bool(_)) => Ok(()),
            (FieldCodec::Float(c), Value::Float32(_)) if c.width() == 32 => Ok(()),
            (FieldCodec::Float(c), Value::Float64(_)) if c.width() == 64 => Ok(()),
            (FieldCodec::Enum(c), Value::Enum(v)) => c.to_ordinal(*v).map(|_| ()),
            (FieldCodec::Text(c), Value::Text(v)) => c.check(v.as_deref()),
            (FieldCodec::Nested(c), Value::Record(r)) => c.check(r),
            (FieldCodec::Pointer(_), Value::Pointer(_)) => Ok(()),
            (FieldCodec::Pointer(c), Value::Record(_)) => Err(PackError::type_error(
                c.field(),
                "a pointer needs an addressable packed record, not an unpacked value",
            )),
            (FieldCodec::Array(c), Value::Array(items)) => c.check(items),
            _ => Err(self.mismatch(value)),
        }
    }

    pub fn read(&self, store: &dyn BytesStore, pos: u64, mode: ReadMode) -> Result<Value> {
        Ok(match self {
            FieldCodec::Int(c) => Value::Int(c.read(store, pos, mode)?),
            FieldCodec::Bool(c) => Value::Bool(c.read(store, pos, mode)?),
            FieldCodec::Float(c) if c.width() == 32 => {
                Value::Float32(f32::from_bits(c.read_bits(store, pos, mode)? as u32))
            }
            FieldCodec::Float(c) => Value::Float64(f64::from_bits(c.read_bits(store, pos, mode)?)),
            FieldCodec::Enum(c) => Value::Enum(c.read(store, pos, mode)?),
            FieldCodec::Text(c) => Value::Text(c.read(store, pos, mode)?),
            FieldCodec::Nested(c) => Value::Record(Box::new(c.read(store, pos, mode)?)),
            FieldCodec::Pointer(c) => Value::Pointer(c.read(store, pos, mode)?),
            FieldCodec::Array(c) => Value::Array(c.read(store, pos, mode)?),
        })
    }

    pub fn write(&self, store: &dyn BytesStore, pos: u64, mode: WriteMode, value: &Value) -> Result<()> {
        self.validate(value)?;
        match (self, value) {
            (FieldCodec::Int(c), Value::Int(v)) => c.write(store, pos, mode, *v),
            (FieldCodec::Bool(c), Value::Bool(v)) => c.write(store, pos, mode, *v),
            (FieldCodec::Float(c), Value::Float32(v)) => {
                c.write_bits(store, pos, mode, v.to_bits() as u64)
            }
            (FieldCodec::Float(c), Value::Float64(v)) => c.write_bits(store, pos, mode, v.to_bits()),
            (FieldCodec::Enum(c), Value::Enum(v)) => c.write(store, pos, mode, *v),
            (FieldCodec::Text(c), Value::Text(v)) => c.write(store, pos, mode, v.as_deref()),
            (FieldCodec::Nested(c), Value::Record(r)) => c.write(store, pos, mode, r),
            (FieldCodec::Pointer(c), Value::Pointer(v)) => c.write(store, pos, mode, *v),
            (FieldCodec::Array(c), Value::Array(items)) => c.write(store, pos, mode, items),
            _ => Err(self.mismatch(value)),
        }
    }

    pub fn compare_and_swap(
        &self,
        store: &dyn BytesStore,
        pos: u64,
        expected: &Value,
        new: &Value,
    ) -> Result<bool> {
        match (self, expected, new) {
            (FieldCodec::Int(c), Value::Int(e), Value::Int(n)) => {
                c.compare_and_swap(store, pos, *e, *n)
            }
            (FieldCodec::Bool(c), Value::Bool(e), Value::Bool(n)) => {
                c.compare_and_swap(store, pos, *e, *n)
            }
            (FieldCodec::Float(c), Value::Float32(e), Value::Float32(n)) if c.width() == 32 => {
                c.compare_and_swap_bits(store, pos, e.to_bits() as u64, n.to_bits() as u64)
            }
            (FieldCodec::Float(c), Value::Float64(e), Value::Float64(n)) if c.width() == 64 => {
                c.compare_and_swap_bits(store, pos, e.to_bits(), n.to_bits())
            }
            (FieldCodec::Enum(c), Value::Enum(e), Value::Enum(n)) => {
                c.compare_and_swap(store, pos, *e, *n)
            }
            (FieldCodec::Pointer(c), Value::Pointer(e), Value::Pointer(n)) => {
                c.compare_and_swap(store, pos, *e, *n)
            }
            (FieldCodec::Text(_) | FieldCodec::Nested(_) | FieldCodec::Array(_), _, _) => {
                Err(PackError::unsupported(self.field(), "compare_and_swap"))
            }
            _ if std::mem::discriminant(expected) != std::mem::discriminant(new) => {
                Err(self.mismatch(new))
            }
            _ => Err(self.mismatch(expected)),
        }
    }

    /// Non-atomic add, returning the new value
    pub fn add(&self, store: &dyn BytesStore, pos: u64, delta: &Value) -> Result<Value> {
        match (self, delta) {
            (FieldCodec::Int(c), Value::Int(d)) => c.add(store, pos, *d).map(Value::Int),
            (FieldCodec::Float(c), d) if d.as_f64().is_some() => {
                let sum = c.add(store, pos, d.as_f64().unwrap_or_default())?;
                Ok(float_value(c, sum))
            }
            (FieldCodec::Int(_) | FieldCodec::Float(_), _) => Err(self.mismatch(delta)),
            _ => Err(PackError::unsupported(self.field(), "add")),
        }
    }

    /// Atomic add, returning the new value
    pub fn atomic_add(&self, store: &dyn BytesStore, pos: u64, delta: &Value) -> Result<Value> {
        match (self, delta) {
            (FieldCodec::Int(c), Value::Int(d)) => c.atomic_add(store, pos, *d).map(Value::Int),
            (FieldCodec::Float(c), d) if d.as_f64().is_some() => {
                let sum = c.atomic_add(store, pos, d.as_f64().unwrap_or_default())?;
                Ok(float_value(c, sum))
            }
            (FieldCodec::Int(_) | FieldCodec::Float(_), _) => Err(self.mismatch(delta)),
            _ => Err(PackError::unsupported(self.field(), "atomic_add")),
        }
    }
}

fn float_value(codec: &FloatCodec, value: f64) -> Value {
    if codec.width() == 32 {
        Value::Float32(value as f32)
    } else {
        Value::Float64(value)
    }
}
