//! Static field declarations consumed by the layout planner

use std::{fmt, ops::BitOr, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::error::{PackError, Result};

/// Access modes a field declares
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Supports(u8);

impl Supports {
    pub const PLAIN: Supports = Supports(0x01);
    pub const VOLATILE: Supports = Supports(0x02);
    pub const ORDERED: Supports = Supports(0x04);
    pub const CAS: Supports = Supports(0x08);
    pub const ADD: Supports = Supports(0x10);
    pub const ATOMIC_ADD: Supports = Supports(0x20);

    /// Every access mode
    pub const ALL: Supports = Supports(0x3F);

    /// Raw flag bits
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Build from raw flag bits, ignoring unknown ones
    pub const fn from_bits(bits: u8) -> Supports {
        Supports(bits & Self::ALL.0)
    }

    /// Check that every flag in `other` is set
    pub const fn contains(self, other: Supports) -> bool {
        self.0 & other.0 == other.0
    }

    /// Check that any flag in `other` is set
    pub const fn intersects(self, other: Supports) -> bool {
        self.0 & other.0 != 0
    }

    /// Whether any hardware-atomic access was requested
    pub const fn needs_atomic(self) -> bool {
        self.intersects(Supports(0x02 | 0x04 | 0x08 | 0x20))
    }

    /// Whether an access requiring a 32-bit or wider word was requested
    pub const fn needs_word(self) -> bool {
        self.intersects(Supports(0x04 | 0x08 | 0x20))
    }
}

impl Default for Supports {
    fn default() -> Self {
        Self::PLAIN
    }
}

impl BitOr for Supports {
    type Output = Supports;

    fn bitor(self, rhs: Supports) -> Supports {
        Supports(self.0 | rhs.0)
    }
}

impl fmt::Debug for Supports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(Supports, &str); 6] = [
            (Supports::PLAIN, "plain"),
            (Supports::VOLATILE, "volatile"),
            (Supports::ORDERED, "ordered"),
            (Supports::CAS, "cas"),
            (Supports::ADD, "add"),
            (Supports::ATOMIC_ADD, "atomic_add"),
        ];
        let names: Vec<&str> = NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "Supports({})", names.join("|"))
    }
}

/// Inclusive integer range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntRange {
    pub min: i64,
    pub max: i64,
}

impl IntRange {
    pub const fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    /// Number of distinct values, `None` for an empty range
    pub fn options(&self) -> Option<u128> {
        (self.min <= self.max).then(|| (self.max as i128 - self.min as i128 + 1) as u128)
    }

    pub fn contains(&self, value: i128) -> bool {
        value >= self.min as i128 && value <= self.max as i128
    }
}

/// Field kinds understood by the codecs
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    /// Two's complement integer, 1..=64 bits
    SignedInt,
    /// Non-negative integer (or any explicit range), 1..=63 bits
    UnsignedRangeInt,
    Bool,
    Float32,
    Float64,
    /// Ordinal of one of `constants`; nullable enums encode absence as -1
    Enum {
        constants: Vec<String>,
        nullable: bool,
    },
    /// Length-prefixed UTF-8 of at most `max_bytes` bytes
    BoundedText { max_bytes: u32, nullable: bool },
    /// Sub-record embedded inline
    NestedRecord(Arc<SchemaDef>),
    /// 64-bit address of a record of the given schema
    Pointer(Arc<SchemaDef>),
    /// Fixed-length repetition of a non-array element kind
    Array {
        element: Box<FieldKind>,
        length: u32,
    },
}

impl FieldKind {
    /// Short name for diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::SignedInt => "int",
            FieldKind::UnsignedRangeInt => "uint",
            FieldKind::Bool => "bool",
            FieldKind::Float32 => "f32",
            FieldKind::Float64 => "f64",
            FieldKind::Enum { .. } => "enum",
            FieldKind::BoundedText { .. } => "text",
            FieldKind::NestedRecord(_) => "record",
            FieldKind::Pointer(_) => "pointer",
            FieldKind::Array { .. } => "array",
        }
    }
}

/// Static description of one field.
///
/// Alignments are in bytes. `None` asks for the kind's default, `Some(0)`
/// explicitly disables the constraint. For arrays the width, range,
/// alignments and access modes describe each element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub bit_width: Option<u32>,
    #[serde(default)]
    pub range: Option<IntRange>,
    #[serde(default)]
    pub offset_alignment: Option<u32>,
    #[serde(default)]
    pub dont_cross_alignment: Option<u32>,
    #[serde(default)]
    pub group: u32,
    #[serde(default)]
    pub supports: Supports,
}

impl FieldSchema {
    /// Create a field of the given kind with every hint defaulted
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            bit_width: None,
            range: None,
            offset_alignment: None,
            dont_cross_alignment: None,
            group: 0,
            supports: Supports::PLAIN,
        }
    }

    /// Signed integer of `bits` bits
    pub fn int(name: impl Into<String>, bits: u32) -> Self {
        Self::new(name, FieldKind::SignedInt).with_bit_width(bits)
    }

    /// Unsigned integer of `bits` bits
    pub fn uint(name: impl Into<String>, bits: u32) -> Self {
        Self::new(name, FieldKind::UnsignedRangeInt).with_bit_width(bits)
    }

    /// Integer restricted to `[min, max]`
    pub fn ranged(name: impl Into<String>, min: i64, max: i64) -> Self {
        Self::new(name, FieldKind::SignedInt).with_range(min, max)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Bool)
    }

    pub fn float32(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Float32)
    }

    pub fn float64(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Float64)
    }

    pub fn enumeration<S: Into<String>>(
        name: impl Into<String>,
        constants: impl IntoIterator<Item = S>,
        nullable: bool,
    ) -> Self {
        let constants = constants.into_iter().map(Into::into).collect();
        Self::new(name, FieldKind::Enum { constants, nullable })
    }

    pub fn text(name: impl Into<String>, max_bytes: u32, nullable: bool) -> Self {
        Self::new(name, FieldKind::BoundedText { max_bytes, nullable })
    }

    pub fn nested(name: impl Into<String>, schema: Arc<SchemaDef>) -> Self {
        Self::new(name, FieldKind::NestedRecord(schema))
    }

    pub fn pointer(name: impl Into<String>, target: Arc<SchemaDef>) -> Self {
        Self::new(name, FieldKind::Pointer(target))
    }

    /// Array of `length` elements of `element` kind
    pub fn array(name: impl Into<String>, element: FieldKind, length: u32) -> Self {
        Self::new(
            name,
            FieldKind::Array {
                element: Box::new(element),
                length,
            },
        )
    }

    pub fn with_bit_width(mut self, bits: u32) -> Self {
        self.bit_width = Some(bits);
        self
    }

    pub fn with_range(mut self, min: i64, max: i64) -> Self {
        self.range = Some(IntRange::new(min, max));
        self
    }

    pub fn with_offset_alignment(mut self, bytes: u32) -> Self {
        self.offset_alignment = Some(bytes);
        self
    }

    pub fn with_dont_cross(mut self, bytes: u32) -> Self {
        self.dont_cross_alignment = Some(bytes);
        self
    }

    pub fn with_group(mut self, group: u32) -> Self {
        self.group = group;
        self
    }

    /// Add access modes on top of plain access
    pub fn with_supports(mut self, supports: Supports) -> Self {
        self.supports = self.supports | supports;
        self
    }
}

/// Named, ordered field list describing one record type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaDef {
    pub name: String,
    pub fields: Vec<FieldSchema>,
}

impl SchemaDef {
    /// Create an empty schema
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Append a field
    pub fn field(mut self, field: FieldSchema) -> Self {
        self.fields.push(field);
        self
    }

    /// Wrap into an `Arc` for use as a nested or pointer target
    pub fn shared(self) -> Arc<SchemaDef> {
        Arc::new(self)
    }

    /// Encode with bincode
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode from bincode
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Decode from JSON
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(PackError::from)
    }

    /// Encode as pretty JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(PackError::from)
    }
}
