//! Per-kind constraint derivation
//!
//! Turns a [`FieldSchema`] into the width and alignments the planner packs
//! and the codec that will serve the field. Defaults:
//!
//! | Kind          | Width                               | Offset alignment      | Don't-cross            |
//! |---------------|-------------------------------------|-----------------------|------------------------|
//! | integer       | declared, or bits for the range     | 1, bit if sub-byte    | none, word if sub-byte |
//! | atomic scalar | widened to a power of two           | natural               | natural                |
//! | bool          | 1                                   | required              | none                   |
//! | float         | 32 / 64                             | 1                     | none                   |
//! | text          | (prefix + max) bytes                | 1                     | none                   |
//! | nested        | sub-record size                     | sub-record alignment  | none                   |
//! | pointer       | 64                                  | 1                     | none                   |
//! | array         | up to the last element's end        | max(elem oa, elem dc) | none                   |

use std::sync::Arc;

use serde::Serialize;

use super::LayoutPlanner;
use crate::{
    codec::{
        int::{bits_for, natural_range},
        ArrayCodec, ArrayLayout, BoolCodec, EnumCodec, FieldCodec, FloatCodec, IntCodec,
        NestedCodec, PointerCodec, TextCodec,
    },
    config::DEFAULT_INT_BITS,
    error::SchemaError,
    schema::{FieldKind, FieldSchema, IntRange, RecordSchema, SchemaDef, Supports},
};

type Result<T> = std::result::Result<T, SchemaError>;

/// Width and byte alignments the planner must honour for one field.
///
/// An alignment of `0` means no constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FieldConstraints {
    pub bit_width: u32,
    pub offset_alignment: u32,
    pub dont_cross: u32,
}

impl FieldConstraints {
    pub fn new(bit_width: u32, offset_alignment: u32, dont_cross: u32) -> Self {
        Self {
            bit_width,
            offset_alignment,
            dont_cross,
        }
    }
}

pub(crate) struct ResolvedField {
    pub constraints: FieldConstraints,
    pub codec: FieldCodec,
}

/// Derive constraints and build the codec for `field`
pub(crate) fn resolve_field(planner: &LayoutPlanner, field: &FieldSchema) -> Result<ResolvedField> {
    if field.range.is_some()
        && !matches!(field.kind, FieldKind::SignedInt | FieldKind::UnsignedRangeInt)
        && !matches!(&field.kind, FieldKind::Array { element, .. }
            if matches!(**element, FieldKind::SignedInt | FieldKind::UnsignedRangeInt))
    {
        return Err(SchemaError::invalid_field(
            &field.name,
            "a range only applies to integer fields",
        ));
    }
    match &field.kind {
        FieldKind::Array { element, length } => resolve_array(planner, field, element, *length),
        kind => resolve_kind(planner, field, kind),
    }
}

fn allowed(kind: &FieldKind) -> Supports {
    let cells = Supports::PLAIN | Supports::VOLATILE | Supports::ORDERED | Supports::CAS;
    match kind {
        FieldKind::SignedInt
        | FieldKind::UnsignedRangeInt
        | FieldKind::Float32
        | FieldKind::Float64 => Supports::ALL,
        FieldKind::Bool | FieldKind::Enum { .. } | FieldKind::Pointer(_) => cells,
        FieldKind::BoundedText { .. } | FieldKind::NestedRecord(_) => {
            Supports::PLAIN | Supports::VOLATILE
        }
        FieldKind::Array { element, .. } => allowed(element),
    }
}

fn resolve_kind(planner: &LayoutPlanner, field: &FieldSchema, kind: &FieldKind) -> Result<ResolvedField> {
    let permitted = allowed(kind);
    if !permitted.contains(field.supports) {
        return Err(SchemaError::invalid_field(
            &field.name,
            format!(
                "{} fields do not support {:?}",
                kind.name(),
                Supports::from_bits(field.supports.bits() & !permitted.bits())
            ),
        ));
    }

    match kind {
        FieldKind::SignedInt => resolve_int(field, true, field.range),
        FieldKind::UnsignedRangeInt => resolve_int(field, false, field.range),
        FieldKind::Bool => resolve_bool(field),
        FieldKind::Float32 => resolve_float(field, 32),
        FieldKind::Float64 => resolve_float(field, 64),
        FieldKind::Enum {
            constants,
            nullable,
        } => resolve_enum(field, constants, *nullable),
        FieldKind::BoundedText {
            max_bytes,
            nullable,
        } => resolve_text(field, *max_bytes, *nullable),
        FieldKind::NestedRecord(def) => resolve_nested(planner, field, def),
        FieldKind::Pointer(def) => resolve_pointer(planner, field, def),
        FieldKind::Array { .. } => Err(SchemaError::invalid_field(
            &field.name,
            "arrays of arrays are not supported",
        )),
    }
}

/// Round a width up to a power of two wide enough for the requested atomics
fn widen(width: u32, supports: Supports) -> u32 {
    if supports.needs_word() {
        width.next_power_of_two().max(32)
    } else if supports.contains(Supports::VOLATILE) {
        width.next_power_of_two().max(8)
    } else {
        width
    }
}

/// Smallest power-of-two byte count holding `width` bits
fn covering_word(width: u32) -> u32 {
    width.div_ceil(8).next_power_of_two()
}

/// Default alignments of an integer or float of `width` bits
fn scalar_alignment(field: &FieldSchema, width: u32) -> Result<(u32, u32)> {
    if field.supports.needs_atomic() {
        let natural = width / 8;
        let offset = field.offset_alignment.unwrap_or(natural);
        if offset < natural {
            return Err(SchemaError::unsatisfiable(
                &field.name,
                format!(
                    "{:?} needs {}-byte alignment, declared {}",
                    field.supports, natural, offset
                ),
            ));
        }
        Ok((offset, field.dont_cross_alignment.unwrap_or(natural.max(offset))))
    } else if width % 8 == 0 {
        Ok((
            field.offset_alignment.unwrap_or(1),
            field.dont_cross_alignment.unwrap_or(0),
        ))
    } else {
        let offset = field.offset_alignment.unwrap_or(0);
        Ok((
            offset,
            field
                .dont_cross_alignment
                .unwrap_or(covering_word(width).max(offset)),
        ))
    }
}

fn byte_alignment(field: &FieldSchema, default: u32) -> Result<u32> {
    match field.offset_alignment.unwrap_or(default) {
        0 => Err(SchemaError::invalid_field(
            &field.name,
            "field must be byte aligned",
        )),
        alignment => Ok(alignment),
    }
}

fn expect_width(field: &FieldSchema, width: u32) -> Result<()> {
    match field.bit_width {
        Some(declared) if declared != width => Err(SchemaError::invalid_field(
            &field.name,
            format!("{} fields are {} bits wide, declared {}", field.kind.name(), width, declared),
        )),
        _ => Ok(()),
    }
}

fn int_codec(field: &FieldSchema, signed: bool, range: Option<IntRange>) -> Result<(FieldConstraints, IntCodec)> {
    let max_width = if signed { 64 } else { 63 };
    if let Some(width) = field.bit_width {
        if width == 0 || width > max_width {
            return Err(SchemaError::invalid_field(
                &field.name,
                format!("width {} outside 1..={}", width, max_width),
            ));
        }
    }

    let (declared, range, wrapping) = match range {
        Some(range) => {
            let options = range.options().ok_or_else(|| {
                SchemaError::invalid_field(
                    &field.name,
                    format!("empty range [{}, {}]", range.min, range.max),
                )
            })?;
            let needed = bits_for(options);
            let width = field.bit_width.unwrap_or(needed);
            if width < needed {
                return Err(SchemaError::invalid_field(
                    &field.name,
                    format!(
                        "range [{}, {}] needs {} bits, declared {}",
                        range.min, range.max, needed, width
                    ),
                ));
            }
            (width, range, false)
        }
        None => {
            let width = field.bit_width.unwrap_or(DEFAULT_INT_BITS);
            (width, natural_range(signed, width), true)
        }
    };

    let width = widen(declared, field.supports);
    let (offset, dont_cross) = scalar_alignment(field, width)?;
    let codec = IntCodec::new(field.name.as_str(), width, range, wrapping, field.supports);
    Ok((FieldConstraints::new(width, offset, dont_cross), codec))
}

fn resolve_int(field: &FieldSchema, signed: bool, range: Option<IntRange>) -> Result<ResolvedField> {
    let (constraints, codec) = int_codec(field, signed, range)?;
    Ok(ResolvedField {
        constraints,
        codec: FieldCodec::Int(codec),
    })
}

fn resolve_bool(field: &FieldSchema) -> Result<ResolvedField> {
    expect_width(field, 1)?;
    let offset = field.offset_alignment.ok_or_else(|| {
        SchemaError::invalid_field(
            &field.name,
            "boolean fields need an explicit offset alignment (0 for bit packing)",
        )
    })?;
    Ok(ResolvedField {
        constraints: FieldConstraints::new(1, offset, field.dont_cross_alignment.unwrap_or(0)),
        codec: FieldCodec::Bool(BoolCodec::new(field.name.as_str(), field.supports)),
    })
}

fn resolve_float(field: &FieldSchema, width: u32) -> Result<ResolvedField> {
    expect_width(field, width)?;
    let (offset, dont_cross) = scalar_alignment(field, width)?;
    if offset == 0 {
        return Err(SchemaError::invalid_field(
            &field.name,
            "float fields must be byte aligned",
        ));
    }
    Ok(ResolvedField {
        constraints: FieldConstraints::new(width, offset, dont_cross),
        codec: FieldCodec::Float(FloatCodec::new(field.name.as_str(), width, field.supports)),
    })
}

fn resolve_enum(field: &FieldSchema, constants: &[String], nullable: bool) -> Result<ResolvedField> {
    if constants.is_empty() {
        return Err(SchemaError::invalid_field(&field.name, "enum has no constants"));
    }
    let min = if nullable { -1 } else { 0 };
    let range = IntRange::new(min, constants.len() as i64 - 1);
    let (constraints, int) = int_codec(field, true, Some(range))?;
    Ok(ResolvedField {
        constraints,
        codec: FieldCodec::Enum(EnumCodec::new(int, constants, nullable)),
    })
}

fn resolve_text(field: &FieldSchema, max_bytes: u32, nullable: bool) -> Result<ResolvedField> {
    if max_bytes == 0 {
        return Err(SchemaError::invalid_field(
            &field.name,
            "bounded text needs a maximum length",
        ));
    }
    let bytes = TextCodec::prefix_len_for(max_bytes, nullable) as u64 + max_bytes as u64;
    let width = u32::try_from(bytes * 8).map_err(|_| {
        SchemaError::invalid_field(&field.name, format!("{} bytes of text is too large", max_bytes))
    })?;
    expect_width(field, width)?;
    let offset = byte_alignment(field, 1)?;
    Ok(ResolvedField {
        constraints: FieldConstraints::new(width, offset, field.dont_cross_alignment.unwrap_or(0)),
        codec: FieldCodec::Text(TextCodec::new(
            field.name.as_str(),
            max_bytes,
            nullable,
            field.supports,
        )),
    })
}

/// Plan a sub-schema, reporting its errors under `outer.inner`
fn plan_inner(planner: &LayoutPlanner, field: &FieldSchema, def: &SchemaDef) -> Result<Arc<RecordSchema>> {
    planner.plan(def).map(Arc::new).map_err(|err| match err {
        SchemaError::Unsatisfiable { field: inner, reason } => {
            SchemaError::unsatisfiable(format!("{}.{}", field.name, inner), reason)
        }
        SchemaError::InvalidField { field: inner, reason } => {
            SchemaError::invalid_field(format!("{}.{}", field.name, inner), reason)
        }
    })
}

fn resolve_nested(planner: &LayoutPlanner, field: &FieldSchema, def: &SchemaDef) -> Result<ResolvedField> {
    let schema = plan_inner(planner, field, def)?;
    if schema.size_in_bytes() == 0 {
        return Err(SchemaError::invalid_field(
            &field.name,
            format!("nested record {} has no fields", def.name),
        ));
    }
    let width = schema.size_in_bytes() * 8;
    expect_width(field, width)?;
    let offset = byte_alignment(field, schema.recommended_alignment())?;
    if offset < schema.recommended_alignment() {
        return Err(SchemaError::unsatisfiable(
            &field.name,
            format!(
                "nested record {} needs {}-byte alignment, declared {}",
                def.name,
                schema.recommended_alignment(),
                offset
            ),
        ));
    }
    Ok(ResolvedField {
        constraints: FieldConstraints::new(width, offset, field.dont_cross_alignment.unwrap_or(0)),
        codec: FieldCodec::Nested(NestedCodec::new(field.name.as_str(), schema, field.supports)),
    })
}

fn resolve_pointer(planner: &LayoutPlanner, field: &FieldSchema, def: &SchemaDef) -> Result<ResolvedField> {
    expect_width(field, 64)?;
    let target = plan_inner(planner, field, def)?;
    let (offset, dont_cross) = scalar_alignment(field, 64)?;
    let offset = if offset == 0 { 1 } else { offset };
    let int = IntCodec::new(
        field.name.as_str(),
        64,
        natural_range(true, 64),
        true,
        field.supports,
    );
    Ok(ResolvedField {
        constraints: FieldConstraints::new(64, offset, dont_cross),
        codec: FieldCodec::Pointer(PointerCodec::new(int, target)),
    })
}

fn resolve_array(
    planner: &LayoutPlanner,
    field: &FieldSchema,
    element: &FieldKind,
    length: u32,
) -> Result<ResolvedField> {
    if length < 2 {
        return Err(SchemaError::invalid_field(
            &field.name,
            format!("array length {} is below 2", length),
        ));
    }
    let element = resolve_kind(planner, field, element)?;
    let c = element.constraints;
    let layout = ArrayLayout::new(c.bit_width, c.offset_alignment, c.dont_cross);
    let total = layout.total_bits(length, c.bit_width);
    let width = u32::try_from(total).map_err(|_| {
        SchemaError::invalid_field(&field.name, format!("{} elements is too large", length))
    })?;
    Ok(ResolvedField {
        constraints: FieldConstraints::new(width, c.offset_alignment.max(c.dont_cross), 0),
        codec: FieldCodec::Array(ArrayCodec::new(
            field.name.as_str(),
            length,
            c.bit_width,
            layout,
            element.codec,
        )),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(field: FieldSchema) -> Result<ResolvedField> {
        resolve_field(&LayoutPlanner::default(), &field)
    }

    fn constraints(field: FieldSchema) -> FieldConstraints {
        resolve(field).unwrap().constraints
    }

    #[test]
    fn test_integer_defaults() {
        assert_eq!(constraints(FieldSchema::int("a", 32)), FieldConstraints::new(32, 1, 0));
        assert_eq!(constraints(FieldSchema::uint("b", 5)), FieldConstraints::new(5, 0, 1));
        assert_eq!(constraints(FieldSchema::int("c", 12)), FieldConstraints::new(12, 0, 2));
        assert_eq!(constraints(FieldSchema::ranged("d", -5, 10)), FieldConstraints::new(4, 0, 1));
        assert_eq!(
            constraints(FieldSchema::new("e", FieldKind::SignedInt)),
            FieldConstraints::new(32, 1, 0)
        );
    }

    #[test]
    fn test_atomic_widening() {
        let cas = FieldSchema::uint("a", 5).with_supports(Supports::CAS);
        assert_eq!(constraints(cas), FieldConstraints::new(32, 4, 4));
        let volatile = FieldSchema::int("b", 12).with_supports(Supports::VOLATILE);
        assert_eq!(constraints(volatile), FieldConstraints::new(16, 2, 2));
        let add = FieldSchema::int("c", 64).with_supports(Supports::ATOMIC_ADD);
        assert_eq!(constraints(add), FieldConstraints::new(64, 8, 8));

        let weak = FieldSchema::int("d", 64)
            .with_supports(Supports::CAS)
            .with_offset_alignment(4);
        assert!(matches!(resolve(weak), Err(SchemaError::Unsatisfiable { .. })));
    }

    #[test]
    fn test_invalid_declarations() {
        let invalid = |field: FieldSchema| matches!(resolve(field), Err(SchemaError::InvalidField { .. }));
        assert!(invalid(FieldSchema::boolean("flag")));
        assert!(invalid(FieldSchema::enumeration("e", Vec::<String>::new(), false)));
        assert!(invalid(FieldSchema::text("t", 0, false)));
        assert!(invalid(FieldSchema::array("a", FieldKind::SignedInt, 1)));
        assert!(invalid(FieldSchema::int("w", 65)));
        assert!(invalid(FieldSchema::uint("u", 64)));
        assert!(invalid(FieldSchema::ranged("r", 5, 4)));
        assert!(invalid(FieldSchema::ranged("r", 0, 1000).with_bit_width(8)));
        assert!(invalid(
            FieldSchema::text("t", 4, false).with_supports(Supports::CAS)
        ));
        assert!(invalid(
            FieldSchema::boolean("b")
                .with_offset_alignment(0)
                .with_supports(Supports::ADD)
        ));
        assert!(invalid(FieldSchema::array(
            "aa",
            FieldKind::Array {
                element: Box::new(FieldKind::Bool),
                length: 2
            },
            2
        )));
        assert!(invalid(FieldSchema::float32("f").with_range(0, 1)));
    }

    #[test]
    fn test_text_and_enum_sizes() {
        assert_eq!(constraints(FieldSchema::text("t", 5, true)), FieldConstraints::new(48, 1, 0));
        assert_eq!(constraints(FieldSchema::text("t", 127, false)).bit_width, 128 * 8);
        assert_eq!(constraints(FieldSchema::text("t", 127, true)).bit_width, 129 * 8);

        let e = FieldSchema::enumeration("e", ["A", "B", "C"], true);
        assert_eq!(constraints(e), FieldConstraints::new(2, 0, 1));
    }

    #[test]
    fn test_nested_errors_are_prefixed() {
        let inner = SchemaDef::new("Inner").field(FieldSchema::boolean("flag")).shared();
        let err = resolve(FieldSchema::nested("outer", inner)).err().unwrap();
        assert_eq!(err.field(), "outer.flag");
    }

    #[test]
    fn test_nested_alignment_follows_inner_atomics() {
        let inner = SchemaDef::new("Counter")
            .field(FieldSchema::int("n", 64).with_supports(Supports::ATOMIC_ADD))
            .shared();
        let nested = FieldSchema::nested("c", inner.clone());
        assert_eq!(constraints(nested).offset_alignment, 8);

        let weak = FieldSchema::nested("c", inner).with_offset_alignment(2);
        assert!(matches!(resolve(weak), Err(SchemaError::Unsatisfiable { .. })));
    }

    #[test]
    fn test_array_constraints() {
        let ints = FieldSchema::array("xs", FieldKind::SignedInt, 4)
            .with_bit_width(32)
            .with_supports(Supports::CAS);
        assert_eq!(constraints(ints), FieldConstraints::new(128, 4, 0));

        let flags = FieldSchema::array("bs", FieldKind::Bool, 10).with_offset_alignment(0);
        assert_eq!(constraints(flags), FieldConstraints::new(10, 0, 0));

        let packed = FieldSchema::array("ps", FieldKind::UnsignedRangeInt, 3).with_bit_width(3);
        // Elements at bits 0, 3 and 8
        assert_eq!(constraints(packed), FieldConstraints::new(11, 1, 0));
    }
}
