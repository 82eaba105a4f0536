use std::ops::Range;

/// Half-open index ranges mapped to signed offsets.
///
/// Describes how cached positions into a list move after a structural
/// change: every cached position is passed through [`RangeOffsets::apply`]
/// and comes out adjusted by the offset of the range containing it, or
/// unchanged if no range does.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeOffsets {
    ranges: Vec<(Range<usize>, isize)>,
}

impl RangeOffsets {
    /// Creates an empty offset table; every position maps to itself.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Offsets for inserting `count` items at `position`: everything at or
    /// after `position` moves forward by `count`.
    #[must_use]
    pub fn insertion(position: usize, count: usize) -> Self {
        let mut offsets = Self::new();
        offsets.insert(position..usize::MAX, signed(count));
        offsets
    }

    /// Offsets for removing `count` items starting at `position`: everything
    /// after the removed run moves back by `count`.
    ///
    /// Positions inside the removed run are left alone; they name removed
    /// items and must be discarded by the caller.
    #[must_use]
    pub fn removal(position: usize, count: usize) -> Self {
        let mut offsets = Self::new();
        offsets.insert(position.saturating_add(count)..usize::MAX, -signed(count));
        offsets
    }

    /// Maps `range` to `offset`. Ranges must not overlap; empty ranges are
    /// ignored.
    pub fn insert(&mut self, range: Range<usize>, offset: isize) {
        if range.is_empty() {
            return;
        }
        debug_assert!(
            self.ranges
                .iter()
                .all(|(r, _)| r.end <= range.start || range.end <= r.start),
            "overlapping offset ranges"
        );
        self.ranges.push((range, offset));
    }

    /// Returns the offset of the range containing `position`, if any.
    #[must_use]
    pub fn offset_for(&self, position: usize) -> Option<isize> {
        self.ranges
            .iter()
            .find(|(range, _)| range.contains(&position))
            .map(|&(_, offset)| offset)
    }

    /// Adjusts a cached position.
    #[must_use]
    pub fn apply(&self, position: usize) -> usize {
        match self.offset_for(position) {
            Some(offset) => position.saturating_add_signed(offset),
            None => position,
        }
    }

    /// Returns `true` if no range is mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

#[allow(clippy::cast_possible_wrap)]
fn signed(count: usize) -> isize {
    count as isize
}
