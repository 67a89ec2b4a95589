//! Free bit ranges left behind by alignment gaps

use super::HoleOrder;
use crate::codec::bits::{crosses, round_up};

/// Half-open bit range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hole {
    pub start: u64,
    pub end: u64,
}

impl Hole {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// First legal start at or after `from` for a field of `width` bits.
///
/// Alignments are in bits; `0` means unconstrained.
pub(crate) fn fit_start(from: u64, width: u64, offset_alignment: u64, dont_cross: u64) -> u64 {
    let start = round_up(from, offset_alignment);
    if crosses(start, width, dont_cross) {
        round_up(start, dont_cross)
    } else {
        start
    }
}

/// Holes of the group being placed
#[derive(Debug, Clone)]
pub struct HoleSet {
    order: HoleOrder,
    holes: Vec<Hole>,
}

impl HoleSet {
    pub fn new(order: HoleOrder) -> Self {
        Self {
            order,
            holes: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.holes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holes.is_empty()
    }

    /// Add a hole; empty ranges are ignored
    pub fn insert(&mut self, start: u64, end: u64) {
        let hole = Hole { start, end };
        if !hole.is_empty() {
            self.holes.push(hole);
        }
    }

    fn sort(&mut self) {
        match self.order {
            HoleOrder::SmallestFirst => self.holes.sort_by_key(|h| (h.len(), h.start)),
            HoleOrder::LargestFirst => {
                self.holes.sort_by_key(|h| (std::cmp::Reverse(h.len()), h.start))
            }
            HoleOrder::LowestOffset => self.holes.sort_by_key(|h| h.start),
        }
    }

    /// Place a field in the first hole that holds it, returning its start.
    ///
    /// The used hole is removed and any space left before or after the field
    /// goes back into the set.
    pub fn take_fit(&mut self, width: u64, offset_alignment: u64, dont_cross: u64) -> Option<u64> {
        self.sort();
        let (index, start) = self.holes.iter().enumerate().find_map(|(i, hole)| {
            let start = fit_start(hole.start, width, offset_alignment, dont_cross);
            (start + width <= hole.end).then_some((i, start))
        })?;
        let hole = self.holes.swap_remove(index);
        self.insert(hole.start, start);
        self.insert(start + width, hole.end);
        Some(start)
    }

    /// Remove every hole, lowest offset first
    pub fn drain(&mut self) -> Vec<Hole> {
        let mut holes = std::mem::take(&mut self.holes);
        holes.sort_by_key(|h| h.start);
        holes
    }
}
