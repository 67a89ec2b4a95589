//! Fixed-length arrays of a single element codec

use std::sync::Arc;

use super::{FieldCodec, ReadMode, Value, WriteMode};
use crate::{
    bytes::BytesStore,
    codec::bits::round_up,
    error::{PackError, Result},
};

/// Element offsets inside an array.
///
/// Elements sit `stride` bits apart. When the element's don't-cross unit is
/// not a multiple of the stride, only `per_unit` elements share each unit and
/// the next element starts on the following unit boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayLayout {
    stride: u32,
    unit_bits: u32,
    per_unit: u32,
    /// `log2(per_unit)` when `per_unit` is a power of two
    shift: Option<u32>,
}

impl ArrayLayout {
    /// Layout for elements of `width` bits with the given byte alignments
    pub fn new(width: u32, offset_alignment: u32, dont_cross: u32) -> Self {
        let stride = round_up(width as u64, offset_alignment as u64 * 8).max(1) as u32;
        let unit_bits = dont_cross * 8;
        if unit_bits == 0 || unit_bits % stride == 0 {
            return Self {
                stride,
                unit_bits: 0,
                per_unit: 0,
                shift: None,
            };
        }
        let per_unit = (unit_bits / stride).max(1);
        Self {
            stride,
            unit_bits,
            per_unit,
            shift: per_unit.is_power_of_two().then(|| per_unit.trailing_zeros()),
        }
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// Whether elements sit back to back at `i * stride`
    pub fn is_tight(&self) -> bool {
        self.per_unit == 0
    }

    /// Bit offset of element `index` from the array start
    pub fn offset(&self, index: u32) -> u64 {
        let index = index as u64;
        if self.per_unit == 0 {
            return index * self.stride as u64;
        }
        let (unit, within) = match self.shift {
            Some(shift) => (index >> shift, index & (self.per_unit as u64 - 1)),
            None => (index / self.per_unit as u64, index % self.per_unit as u64),
        };
        unit * self.unit_bits as u64 + within * self.stride as u64
    }

    /// Bits spanned by `length` elements of `width` bits
    pub fn total_bits(&self, length: u32, width: u32) -> u64 {
        match length {
            0 => 0,
            n => self.offset(n - 1) + width as u64,
        }
    }
}

/// Codec for `length` repetitions of one element codec
#[derive(Debug, Clone)]
pub struct ArrayCodec {
    field: Arc<str>,
    length: u32,
    element_width: u32,
    layout: ArrayLayout,
    element: Box<FieldCodec>,
}

impl ArrayCodec {
    pub fn new(
        field: impl Into<Arc<str>>,
        length: u32,
        element_width: u32,
        layout: ArrayLayout,
        element: FieldCodec,
    ) -> Self {
        Self {
            field: field.into(),
            length,
            element_width,
            layout,
            element: Box::new(element),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn len(&self) -> u32 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn layout(&self) -> &ArrayLayout {
        &self.layout
    }

    pub fn element(&self) -> &FieldCodec {
        &self.element
    }

    pub fn element_width(&self) -> u32 {
        self.element_width
    }

    pub fn total_bits(&self) -> u64 {
        self.layout.total_bits(self.length, self.element_width)
    }

    /// Absolute bit position of element `index` given the array's position
    pub fn element_pos(&self, pos: u64, index: i64) -> Result<u64> {
        if index < 0 || index >= self.length as i64 {
            return Err(PackError::index(self.field.as_ref(), index, self.length));
        }
        Ok(pos + self.layout.offset(index as u32))
    }

    pub fn default_value(&self) -> Vec<Value> {
        vec![self.element.default_value(); self.length as usize]
    }

    pub fn check(&self, values: &[Value]) -> Result<()> {
        if values.len() != self.length as usize {
            return Err(PackError::type_error(
                self.field.as_ref(),
                format!("expected {} elements, got {}", self.length, values.len()),
            ));
        }
        values.iter().try_for_each(|v| self.element.validate(v))
    }

    pub fn read(&self, store: &dyn BytesStore, pos: u64, mode: ReadMode) -> Result<Vec<Value>> {
        (0..self.length)
            .map(|i| {
                self.element
                    .read(store, pos + self.layout.offset(i), mode)
            })
            .collect()
    }

    pub fn write(
        &self,
        store: &dyn BytesStore,
        pos: u64,
        mode: WriteMode,
        values: &[Value],
    ) -> Result<()> {
        self.check(values)?;
        for (i, value) in values.iter().enumerate() {
            self.element
                .write(store, pos + self.layout.offset(i as u32), mode, value)?;
        }
        Ok(())
    }
}
