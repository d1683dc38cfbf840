use std::fmt::Display;

use serde::{Deserialize, Serialize};

pub type BlockHeight = u64;

/// Inclusive block range, always `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockRange {
    pub start: BlockHeight,
    pub end: BlockHeight,
}

impl BlockRange {
    /// Builds a range from two bounds given in any order.
    pub fn new(a: BlockHeight, b: BlockHeight) -> Self {
        Self {
            start: a.min(b),
            end: a.max(b),
        }
    }

    pub fn width(&self) -> u64 {
        self.end - self.start
    }

    pub fn block_count(&self) -> u64 {
        self.width() + 1
    }

    pub fn contains(&self, height: BlockHeight) -> bool {
        self.start <= height && height <= self.end
    }

    /// Contiguous sub-ranges of `step` blocks past the start block. The last
    /// one is clipped to `end`. A zero step yields the whole range.
    pub fn split_by_step(&self, step: u64) -> Vec<BlockRange> {
        if step == 0 {
            return vec![*self];
        }
        let count = self.width().div_ceil(step);
        self.spaced(step, count)
    }

    /// `count` sub-ranges of roughly `width / count` blocks (rounded half
    /// up). The last one always ends at `end`; pieces left empty by the
    /// rounding are dropped.
    pub fn split_by_count(&self, count: u64) -> Vec<BlockRange> {
        if count == 0 {
            return vec![*self];
        }
        let step = (self.width() * 2 + count) / (count * 2);
        self.spaced(step, count)
    }

    fn spaced(&self, step: u64, count: u64) -> Vec<BlockRange> {
        if count == 0 {
            return vec![*self];
        }

        (0..count)
            .filter_map(|i| {
                let offset = i * step;
                let start = if i == 0 {
                    self.start + offset
                } else {
                    self.start + offset + 1
                };
                let end = if i + 1 == count {
                    self.end
                } else {
                    (self.start + offset + step).min(self.end)
                };
                (start <= end).then_some(BlockRange { start, end })
            })
            .collect()
    }
}

impl Display for BlockRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}
