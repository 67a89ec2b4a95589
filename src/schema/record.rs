//! Planned record schema: fields, placements and codecs

use std::{collections::HashMap, fmt, sync::Arc};

use serde::Serialize;

use super::{FieldPlacement, FieldSchema, SchemaDef};
use crate::{
    codec::{bits::round_up, FieldCodec},
    error::{PackError, Result, SchemaError},
    layout::{FieldConstraints, LayoutPlanner},
};

/// One field after planning
#[derive(Debug, Clone)]
pub struct PlannedField {
    pub schema: FieldSchema,
    pub placement: FieldPlacement,
    pub constraints: FieldConstraints,
    pub codec: FieldCodec,
}

impl PlannedField {
    pub fn name(&self) -> &str {
        &self.schema.name
    }

    pub fn bit_offset(&self) -> u32 {
        self.placement.bit_offset
    }

    pub fn bit_extent(&self) -> u32 {
        self.placement.bit_extent
    }
}

/// Immutable packed layout of one record type.
///
/// Fields keep declaration order; lookups by name are O(1). Shared between
/// record instances and threads through an `Arc`.
#[derive(Debug)]
pub struct RecordSchema {
    def: Arc<SchemaDef>,
    fields: Vec<PlannedField>,
    by_name: HashMap<String, usize>,
    size_in_bytes: u32,
    recommended_alignment: u32,
}

impl RecordSchema {
    /// Plan `def` with the default planner configuration
    pub fn plan(def: &SchemaDef) -> std::result::Result<Arc<RecordSchema>, SchemaError> {
        LayoutPlanner::default().plan(def).map(Arc::new)
    }

    pub(crate) fn from_parts(def: Arc<SchemaDef>, fields: Vec<PlannedField>, size_in_bytes: u32) -> Self {
        let by_name = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.schema.name.clone(), i))
            .collect();
        let recommended_alignment = fields
            .iter()
            .map(|f| f.constraints.offset_alignment.max(f.constraints.dont_cross))
            .max()
            .unwrap_or(1)
            .max(1);
        Self {
            def,
            fields,
            by_name,
            size_in_bytes,
            recommended_alignment,
        }
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    /// The definition this schema was planned from
    pub fn def(&self) -> &Arc<SchemaDef> {
        &self.def
    }

    /// Fields in declaration order
    pub fn fields(&self) -> &[PlannedField] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, name: &str) -> Option<&PlannedField> {
        self.by_name.get(name).map(|&i| &self.fields[i])
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Like [`field`](Self::field) but reports a missing name as an error
    pub fn require(&self, name: &str) -> Result<&PlannedField> {
        self.field(name)
            .ok_or_else(|| PackError::field_not_found(name))
    }

    pub fn field_bit_offset(&self, name: &str) -> Result<u32> {
        Ok(self.require(name)?.bit_offset())
    }

    pub fn field_bit_extent(&self, name: &str) -> Result<u32> {
        Ok(self.require(name)?.bit_extent())
    }

    /// Whole bytes occupied by one record
    pub fn size_in_bytes(&self) -> u32 {
        self.size_in_bytes
    }

    /// Max over fields of `max(offset_alignment, dont_cross)`, at least 1
    pub fn recommended_alignment(&self) -> u32 {
        self.recommended_alignment
    }

    /// Distance between consecutive records laid out back to back.
    ///
    /// The size rounded up to the recommended alignment, so every record of
    /// an aligned run keeps its atomic fields aligned.
    pub fn stride(&self) -> u32 {
        round_up(
            self.size_in_bytes as u64,
            self.recommended_alignment as u64,
        ) as u32
    }

    /// Serializable summary of the layout
    pub fn layout_report(&self) -> LayoutReport {
        LayoutReport {
            name: self.name().to_string(),
            size_in_bytes: self.size_in_bytes,
            recommended_alignment: self.recommended_alignment,
            stride: self.stride(),
            fields: self
                .fields
                .iter()
                .map(|f| FieldReport {
                    name: f.name().to_string(),
                    kind: f.codec.kind_name(),
                    placement: f.placement,
                    constraints: f.constraints,
                    group: f.schema.group,
                })
                .collect(),
        }
    }
}

impl PartialEq for RecordSchema {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
            || (self.def == other.def
                && self.size_in_bytes == other.size_in_bytes
                && self
                    .fields
                    .iter()
                    .zip(&other.fields)
                    .all(|(a, b)| a.placement == b.placement))
    }
}

impl Eq for RecordSchema {}

impl fmt::Display for RecordSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} ({} bytes, align {})",
            self.name(),
            self.size_in_bytes,
            self.recommended_alignment
        )?;
        for field in &self.fields {
            let p = field.placement;
            writeln!(
                f,
                "  {:<16} {:<8} bits {:>5}..{:<5} width {:>4} extent {:>4}",
                field.name(),
                field.codec.kind_name(),
                p.bit_offset,
                p.end(),
                p.bit_width,
                p.bit_extent
            )?;
        }
        Ok(())
    }
}

/// Layout summary suitable for JSON output
#[derive(Debug, Clone, Serialize)]
pub struct LayoutReport {
    pub name: String,
    pub size_in_bytes: u32,
    pub recommended_alignment: u32,
    pub stride: u32,
    pub fields: Vec<FieldReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldReport {
    pub name: String,
    pub kind: &'static str,
    pub placement: FieldPlacement,
    pub constraints: FieldConstraints,
    pub group: u32,
}
