use crate::reactor::{Registration, TimerCallback};

use std::cmp::Ordering;
use std::time::Instant;

/// What happens when a timer entry expires.
pub(crate) enum TimerKind {
    /// A one-shot timer scheduled through `schedule_timer`.
    Callback {
        registration: Registration,
        callback: TimerCallback,
    },

    /// The timeout of the I/O waiter identified by `token`.
    IoDeadline { token: usize },
}

/// An entry in the loop's timer heap.
///
/// Entries with equal deadlines expire in insertion order (`seq`).
/// Cancelled entries are skipped when they expire, unless the driver
/// compacts them away first.
pub(crate) struct TimerEntry {
    pub(crate) deadline: Instant,
    pub(crate) seq: u64,
    pub(crate) kind: TimerKind,
}

impl TimerEntry {
    fn key(&self) -> (Instant, u64) {
        (self.deadline, self.seq)
    }
}

impl Eq for TimerEntry {}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Ord for TimerEntry {
    /// Reversed so that `BinaryHeap<TimerEntry>` pops the earliest deadline
    /// first.
    fn cmp(&self, other: &Self) -> Ordering {
        other.key().cmp(&self.key())
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::{TimerEntry, TimerKind};

    use std::collections::BinaryHeap;
    use std::time::{Duration, Instant};

    fn entry(deadline: Instant, seq: u64) -> TimerEntry {
        TimerEntry {
            deadline,
            seq,
            kind: TimerKind::IoDeadline { token: seq as usize },
        }
    }

    #[test]
    fn heap_pops_earliest_first() {
        let now = Instant::now();
        let mut heap = BinaryHeap::new();

        heap.push(entry(now + Duration::from_millis(30), 0));
        heap.push(entry(now + Duration::from_millis(10), 1));
        heap.push(entry(now + Duration::from_millis(20), 2));

        let order: Vec<u64> = std::iter::from_fn(|| heap.pop().map(|e| e.seq)).collect();
        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn equal_deadlines_keep_insertion_order() {
        let now = Instant::now();
        let mut heap = BinaryHeap::new();

        for seq in 0..4 {
            heap.push(entry(now, seq));
        }

        let order: Vec<u64> = std::iter::from_fn(|| heap.pop().map(|e| e.seq)).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
    }
}
