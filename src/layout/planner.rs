//! Greedy bit packer
//!
//! Fields are placed group by group (ascending). Inside a group the most
//! constrained and widest fields go first; each field takes the first
//! free hole that holds it, otherwise it goes at the watermark and the
//! alignment gap becomes a new hole. Holes still free when a group ends
//! are donated to the field just before them, and the final byte padding
//! goes to the field at the watermark.

use std::{
    cmp::Reverse,
    collections::{HashMap, HashSet},
    sync::Arc,
};

use log::{debug, trace};

use super::{
    holes::{fit_start, HoleSet},
    resolve::resolve_field,
    PlannerConfig,
};
use crate::{
    codec::bits::round_up,
    error::{Result as PackResult, SchemaError},
    schema::{FieldPlacement, PlannedField, RecordSchema, SchemaDef},
};

type Result<T> = std::result::Result<T, SchemaError>;

/// One field as the packer sees it.
///
/// Alignments are in bytes; `0` means no constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutItem {
    pub name: String,
    pub group: u32,
    pub bit_width: u32,
    pub offset_alignment: u32,
    pub dont_cross: u32,
}

impl LayoutItem {
    pub fn new(name: impl Into<String>, bit_width: u32, offset_alignment: u32, dont_cross: u32) -> Self {
        Self {
            name: name.into(),
            group: 0,
            bit_width,
            offset_alignment,
            dont_cross,
        }
    }

    pub fn with_group(mut self, group: u32) -> Self {
        self.group = group;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.bit_width == 0 {
            return Err(SchemaError::invalid_field(&self.name, "field has no bits"));
        }
        for (what, alignment) in [
            ("offset alignment", self.offset_alignment),
            ("don't-cross alignment", self.dont_cross),
        ] {
            if alignment != 0 && !alignment.is_power_of_two() {
                return Err(SchemaError::unsatisfiable(
                    &self.name,
                    format!("{} {} is not a power of two", what, alignment),
                ));
            }
        }
        if self.dont_cross != 0
            && self.offset_alignment != 0
            && self.dont_cross % self.offset_alignment != 0
        {
            return Err(SchemaError::unsatisfiable(
                &self.name,
                format!(
                    "don't-cross alignment {} is not a multiple of offset alignment {}",
                    self.dont_cross, self.offset_alignment
                ),
            ));
        }
        if self.dont_cross != 0 && self.bit_width as u64 > self.dont_cross as u64 * 8 {
            return Err(SchemaError::unsatisfiable(
                &self.name,
                format!(
                    "{} bits cannot fit inside a {}-byte don't-cross boundary",
                    self.bit_width, self.dont_cross
                ),
            ));
        }
        Ok(())
    }
}

/// Result of packing a list of [`LayoutItem`]s
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedLayout {
    /// Placements in item order
    pub placements: Vec<FieldPlacement>,
    pub size_in_bytes: u32,
}

/// Plans packed layouts.
///
/// Planning is deterministic: the same definition and configuration always
/// produce the same layout.
#[derive(Debug, Clone, Default)]
pub struct LayoutPlanner {
    config: PlannerConfig,
}

impl LayoutPlanner {
    /// Create a planner with a validated configuration
    pub fn new(config: PlannerConfig) -> PackResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Plan the layout of `def`
    pub fn plan(&self, def: &SchemaDef) -> Result<RecordSchema> {
        let mut seen = HashSet::new();
        for field in &def.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::invalid_field(&field.name, "duplicate field name"));
            }
        }

        let resolved = def
            .fields
            .iter()
            .map(|field| resolve_field(self, field))
            .collect::<Result<Vec<_>>>()?;

        let items: Vec<LayoutItem> = def
            .fields
            .iter()
            .zip(&resolved)
            .map(|(field, r)| LayoutItem {
                name: field.name.clone(),
                group: field.group,
                bit_width: r.constraints.bit_width,
                offset_alignment: r.constraints.offset_alignment,
                dont_cross: r.constraints.dont_cross,
            })
            .collect();
        let placed = self.place(&def.name, &items)?;

        let fields = def
            .fields
            .iter()
            .zip(resolved)
            .zip(placed.placements)
            .map(|((field, r), placement)| PlannedField {
                schema: field.clone(),
                placement,
                constraints: r.constraints,
                codec: r.codec,
            })
            .collect::<Vec<_>>();

        debug!(
            "Planned {}: {} fields in {} bytes",
            def.name,
            fields.len(),
            placed.size_in_bytes
        );
        Ok(RecordSchema::from_parts(
            Arc::new(def.clone()),
            fields,
            placed.size_in_bytes,
        ))
    }

    /// Pack raw items; `record` names the record in errors and logs
    pub fn place(&self, record: &str, items: &[LayoutItem]) -> Result<PlacedLayout> {
        items.iter().try_for_each(LayoutItem::validate)?;

        let mut order: Vec<usize> = (0..items.len()).collect();
        order.sort_by_key(|&i| {
            let item = &items[i];
            (
                item.group,
                Reverse(item.offset_alignment.max(item.dont_cross)),
                Reverse(item.bit_width),
                i,
            )
        });

        // (start, extent) per item, and which item ends at a given bit
        let mut spans = vec![(0u64, 0u64); items.len()];
        let mut ends: HashMap<u64, usize> = HashMap::new();
        let mut watermark = 0u64;

        for group in order.chunk_by(|&a, &b| items[a].group == items[b].group) {
            let mut holes = HoleSet::new(self.config.hole_order);
            for &index in group {
                let item = &items[index];
                let width = item.bit_width as u64;
                let offset_alignment = item.offset_alignment as u64 * 8;
                let dont_cross = item.dont_cross as u64 * 8;

                let start = match holes.take_fit(width, offset_alignment, dont_cross) {
                    Some(start) => start,
                    None => {
                        let start = fit_start(watermark, width, offset_alignment, dont_cross);
                        holes.insert(watermark, start);
                        watermark = start + width;
                        start
                    }
                };
                trace!(
                    "{}: placed {} at bits {}..{}",
                    record,
                    item.name,
                    start,
                    start + width
                );
                spans[index] = (start, width);
                ends.insert(start + width, index);
            }

            for hole in holes.drain() {
                donate(record, items, &mut spans, &mut ends, hole.start, hole.end);
            }
        }

        let size_bits = round_up(watermark, 8);
        donate(record, items, &mut spans, &mut ends, watermark, size_bits);

        let size_in_bytes = size_bits / 8;
        if size_in_bytes > self.config.max_record_bytes as u64 {
            return Err(SchemaError::unsatisfiable(
                record,
                format!(
                    "record needs {} bytes, limit is {}",
                    size_in_bytes, self.config.max_record_bytes
                ),
            ));
        }

        let placements = items
            .iter()
            .zip(&spans)
            .map(|(item, &(start, extent))| FieldPlacement {
                bit_offset: start as u32,
                bit_extent: extent as u32,
                bit_width: item.bit_width,
            })
            .collect();
        Ok(PlacedLayout {
            placements,
            size_in_bytes: size_in_bytes as u32,
        })
    }
}

/// Grow the field ending at `start` so it also covers `[start, end)`
fn donate(
    record: &str,
    items: &[LayoutItem],
    spans: &mut [(u64, u64)],
    ends: &mut HashMap<u64, usize>,
    start: u64,
    end: u64,
) {
    if end <= start {
        return;
    }
    match ends.remove(&start) {
        Some(index) => {
            spans[index].1 += end - start;
            ends.insert(end, index);
            trace!(
                "{}: donated bits {}..{} to {}",
                record,
                start,
                end,
                items[index].name
            );
        }
        None => trace!("{}: bits {}..{} left as padding", record, start, end),
    }
}
