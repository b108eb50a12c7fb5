//! Part planning: split an object into fixed-size byte ranges.
//!
//! Parts are contiguous, non-overlapping, and cover `[0, total_size)` exactly
//! once. Only the last part may be shorter than the part size.

/// One byte range of the object: `[start, end)` (half-open), identified by
/// its position in the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartDescriptor {
    /// Zero-based index; ascending index means ascending offset.
    pub index: u64,
    /// Start offset (inclusive).
    pub start: u64,
    /// End offset (exclusive).
    pub end: u64,
}

impl PartDescriptor {
    /// Length of this part in bytes.
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value for a `Range` header (inclusive end): `bytes=start-(end-1)`.
    pub fn range_header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end.saturating_sub(1))
    }
}

/// Lazy iterator over the parts of an object. Produced by [`PartPlan::new`];
/// use [`plan_parts`] when a `Vec` is more convenient.
#[derive(Debug, Clone)]
pub struct PartPlan {
    total_size: u64,
    part_size: u64,
    next_index: u64,
}

impl PartPlan {
    /// Plan `total_size` bytes in parts of `part_size`.
    ///
    /// `part_size` must be non-zero; a zero part size yields an empty plan.
    pub fn new(total_size: u64, part_size: u64) -> Self {
        Self {
            total_size,
            part_size,
            next_index: 0,
        }
    }

    /// Number of parts in the full plan: `ceil(total_size / part_size)`.
    pub fn part_count(&self) -> u64 {
        if self.part_size == 0 {
            return 0;
        }
        self.total_size.div_ceil(self.part_size)
    }
}

impl Iterator for PartPlan {
    type Item = PartDescriptor;

    fn next(&mut self) -> Option<PartDescriptor> {
        if self.next_index >= self.part_count() {
            return None;
        }
        let index = self.next_index;
        let start = index * self.part_size;
        let end = start.saturating_add(self.part_size).min(self.total_size);
        self.next_index += 1;
        Some(PartDescriptor { index, start, end })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.part_count() - self.next_index.min(self.part_count())) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for PartPlan {}

/// Builds the full part list for `total_size` bytes split into `part_size` chunks.
///
/// Returns an empty vec if `total_size` is 0 (or `part_size` is 0).
pub fn plan_parts(total_size: u64, part_size: u64) -> Vec<PartDescriptor> {
    PartPlan::new(total_size, part_size).collect()
}
