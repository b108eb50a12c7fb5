//! In-order release of parts that complete out of order.
//!
//! Workers finish parts in any order; the sink must see them strictly by
//! ascending index with no gaps. [`Sequencer`] holds early arrivals until the
//! gap in front of them closes and hands back every part that has become
//! writable. It does no I/O, so the ordering rules can be tested without
//! channels or threads.

use std::collections::HashMap;

use crate::error::ProtocolViolation;

/// A fetched part: its plan index and exactly `end - start` bytes of payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartResult {
    pub index: u64,
    pub payload: Vec<u8>,
}

/// Expected-index accumulator with a buffer of early arrivals.
///
/// The buffer never holds the part at `next_index`: that part is released as
/// soon as it arrives, along with any buffered run directly behind it.
#[derive(Debug, Default)]
pub struct Sequencer {
    next_index: u64,
    pending: HashMap<u64, PartResult>,
    peak_pending: usize,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the next part the sink needs.
    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    /// Parts buffered behind a gap.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Largest the pending buffer has been.
    pub fn peak_pending(&self) -> usize {
        self.peak_pending
    }

    /// Accept one completed part and return the parts that are now writable,
    /// in index order. Returns an empty vec when `part` has to wait.
    pub fn push(&mut self, part: PartResult) -> Result<Vec<PartResult>, ProtocolViolation> {
        if part.index < self.next_index {
            return Err(ProtocolViolation::StaleIndex {
                index: part.index,
                expected: self.next_index,
            });
        }

        if part.index > self.next_index {
            if self.pending.contains_key(&part.index) {
                return Err(ProtocolViolation::DuplicateIndex(part.index));
            }
            self.pending.insert(part.index, part);
            self.peak_pending = self.peak_pending.max(self.pending.len());
            return Ok(Vec::new());
        }

        let mut ready = vec![part];
        self.next_index += 1;
        while let Some(buffered) = self.pending.remove(&self.next_index) {
            ready.push(buffered);
            self.next_index += 1;
        }
        Ok(ready)
    }

    /// Check that all `total_parts` were released and nothing is left buffered.
    pub fn finish(&self, total_parts: u64) -> Result<(), ProtocolViolation> {
        if !self.pending.is_empty() {
            return Err(ProtocolViolation::PartsPending {
                expected: self.next_index,
                pending: self.pending.len(),
            });
        }
        if self.next_index != total_parts {
            return Err(ProtocolViolation::PartsMissing {
                written: self.next_index,
                total: total_parts,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(index: u64) -> PartResult {
        PartResult {
            index,
            payload: vec![index as u8; 3],
        }
    }

    fn indices(parts: &[PartResult]) -> Vec<u64> {
        parts.iter().map(|p| p.index).collect()
    }

    fn permutations(items: &[u64]) -> Vec<Vec<u64>> {
        if items.len() <= 1 {
            return vec![items.to_vec()];
        }
        let mut out = Vec::new();
        for i in 0..items.len() {
            let mut rest = items.to_vec();
            let head = rest.remove(i);
            for mut tail in permutations(&rest) {
                tail.insert(0, head);
                out.push(tail);
            }
        }
        out
    }

    #[test]
    fn in_order_parts_release_immediately() {
        let mut seq = Sequencer::new();
        for i in 0..4 {
            let ready = seq.push(part(i)).unwrap();
            assert_eq!(indices(&ready), vec![i]);
        }
        assert_eq!(seq.peak_pending(), 0);
        seq.finish(4).unwrap();
    }

    #[test]
    fn gap_closes_and_flushes_buffered_run() {
        let mut seq = Sequencer::new();
        assert!(seq.push(part(2)).unwrap().is_empty());
        assert_eq!(seq.pending_len(), 1);
        assert_eq!(indices(&seq.push(part(0)).unwrap()), vec![0]);
        assert_eq!(indices(&seq.push(part(1)).unwrap()), vec![1, 2]);
        assert_eq!(seq.pending_len(), 0);
        assert_eq!(seq.next_index(), 3);
        seq.finish(3).unwrap();
    }

    #[test]
    fn release_order_is_independent_of_arrival_order() {
        let order: Vec<u64> = (0..5).collect();
        for arrival in permutations(&order) {
            let mut seq = Sequencer::new();
            let mut released = Vec::new();
            for &i in &arrival {
                released.extend(seq.push(part(i)).unwrap());
            }
            assert_eq!(indices(&released), order, "arrival {:?}", arrival);
            seq.finish(5).unwrap();
        }
    }

    #[test]
    fn stale_index_is_rejected() {
        let mut seq = Sequencer::new();
        seq.push(part(0)).unwrap();
        assert_eq!(
            seq.push(part(0)),
            Err(ProtocolViolation::StaleIndex {
                index: 0,
                expected: 1
            })
        );
    }

    #[test]
    fn duplicate_pending_index_is_rejected() {
        let mut seq = Sequencer::new();
        seq.push(part(3)).unwrap();
        assert_eq!(
            seq.push(part(3)),
            Err(ProtocolViolation::DuplicateIndex(3))
        );
    }

    #[test]
    fn finish_reports_parts_left_behind_gap() {
        let mut seq = Sequencer::new();
        seq.push(part(0)).unwrap();
        seq.push(part(2)).unwrap();
        seq.push(part(3)).unwrap();
        assert_eq!(
            seq.finish(4),
            Err(ProtocolViolation::PartsPending {
                expected: 1,
                pending: 2
            })
        );
    }

    #[test]
    fn finish_reports_missing_tail() {
        let mut seq = Sequencer::new();
        seq.push(part(0)).unwrap();
        assert_eq!(
            seq.finish(3),
            Err(ProtocolViolation::PartsMissing {
                written: 1,
                total: 3
            })
        );
    }

    #[test]
    fn empty_plan_finishes_clean() {
        Sequencer::new().finish(0).unwrap();
    }
}
