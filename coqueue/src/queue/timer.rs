use super::Work;

use std::cmp::Ordering;
use std::time::Instant;

/// A work item waiting for its deadline.
///
/// Stored in a `BinaryHeap`; entries with equal deadlines keep submission
/// order through `seq`.
pub(crate) struct TimerEntry {
    /// The instant after which the work may run.
    pub(crate) deadline: Instant,

    /// Submission counter used to break ties.
    pub(crate) seq: u64,

    pub(crate) work: Work,
}

impl Eq for TimerEntry {}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Ord for TimerEntry {
    /// Reversed, so that a `BinaryHeap<TimerEntry>` pops the earliest
    /// deadline first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BinaryHeap;
    use std::time::Duration;

    fn entry(deadline: Instant, seq: u64) -> TimerEntry {
        TimerEntry {
            deadline,
            seq,
            work: Work::new(|| {}),
        }
    }

    #[test]
    fn heap_pops_earliest_then_oldest() {
        let now = Instant::now();
        let mut heap = BinaryHeap::new();
        heap.push(entry(now + Duration::from_millis(20), 0));
        heap.push(entry(now + Duration::from_millis(5), 2));
        heap.push(entry(now + Duration::from_millis(5), 1));

        let order: Vec<u64> = std::iter::from_fn(|| heap.pop().map(|e| e.seq)).collect();
        assert_eq!(order, vec![1, 2, 0]);
    }
}
