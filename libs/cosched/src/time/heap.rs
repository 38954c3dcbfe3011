// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::task::Id;
use crate::time::Instant;
use core::cmp::Reverse;
use std::collections::BinaryHeap;

/// A pending wake-up.
///
/// Entries order by `(deadline, sequence)`. The sequence is unique per heap and strictly
/// increasing, so entries that share a deadline wake in the order they were pushed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Entry {
    pub deadline: Instant,
    pub sequence: u64,
    pub task: Id,
}

/// Sleeping tasks, ordered by wake-up time.
#[derive(Debug, Default)]
pub struct DeadlineHeap {
    entries: BinaryHeap<Reverse<Entry>>,
    next_sequence: u64,
}

impl DeadlineHeap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `task` to wake at `deadline`, returning the sequence number assigned to it.
    pub fn push(&mut self, deadline: Instant, task: Id) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        tracing::trace!(task.tid = task.as_u64(), %deadline, sequence, "DeadlineHeap::push");
        self.entries.push(Reverse(Entry {
            deadline,
            sequence,
            task,
        }));
        sequence
    }

    /// Removes the entry with the smallest `(deadline, sequence)`.
    pub fn pop(&mut self) -> Option<Entry> {
        self.entries.pop().map(|Reverse(entry)| entry)
    }

    /// Removes the entry with the smallest `(deadline, sequence)`, but only if it is due at `now`.
    pub fn pop_expired(&mut self, now: Instant) -> Option<Entry> {
        if self.next_deadline()? <= now {
            self.pop()
        } else {
            None
        }
    }

    #[must_use]
    pub fn peek(&self) -> Option<&Entry> {
        self.entries.peek().map(|Reverse(entry)| entry)
    }

    /// Returns the earliest deadline, if any task is sleeping.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.peek().map(|entry| entry.deadline)
    }

    /// Unlinks every entry belonging to `task`, returning how many were removed.
    ///
    /// The scheduler itself never needs this: only suspended tasks sleep, and a suspended task
    /// can't fail or finish before it is popped again.
    pub fn remove(&mut self, task: Id) -> usize {
        let before = self.entries.len();
        self.entries.retain(|Reverse(entry)| entry.task != task);
        before - self.entries.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;
    use proptest::prelude::*;

    fn at(secs: u64) -> Instant {
        Instant::from_duration(Duration::from_secs(secs))
    }

    #[test]
    fn pops_earliest_deadline_first() {
        let mut heap = DeadlineHeap::new();
        let (a, b, c) = (Id::next(), Id::next(), Id::next());

        heap.push(at(5), a);
        heap.push(at(1), b);
        heap.push(at(3), c);

        let order: Vec<_> = core::iter::from_fn(|| heap.pop()).map(|e| e.task).collect();
        assert_eq!(order, [b, c, a]);
    }

    #[test]
    fn equal_deadlines_wake_in_push_order() {
        let mut heap = DeadlineHeap::new();
        let tasks: Vec<_> = (0..5).map(|_| Id::next()).collect();

        // push in reverse id order so the ids can't accidentally be the tie-breaker
        for task in tasks.iter().rev() {
            heap.push(at(1), *task);
        }

        let order: Vec<_> = core::iter::from_fn(|| heap.pop()).map(|e| e.task).collect();
        let expected: Vec<_> = tasks.iter().rev().copied().collect();
        assert_eq!(order, expected);
    }

    #[test]
    fn pop_expired_leaves_future_entries() {
        let mut heap = DeadlineHeap::new();
        let (a, b) = (Id::next(), Id::next());
        heap.push(at(1), a);
        heap.push(at(10), b);

        assert_eq!(heap.pop_expired(at(2)).map(|e| e.task), Some(a));
        assert_eq!(heap.pop_expired(at(2)), None);
        assert_eq!(heap.len(), 1);
        assert_eq!(heap.next_deadline(), Some(at(10)));
    }

    #[test]
    fn remove_unlinks_all_entries_of_a_task() {
        let mut heap = DeadlineHeap::new();
        let (a, b) = (Id::next(), Id::next());
        heap.push(at(1), a);
        heap.push(at(2), b);
        heap.push(at(3), a);

        assert_eq!(heap.remove(a), 2);
        assert_eq!(heap.pop().map(|e| e.task), Some(b));
        assert!(heap.is_empty());
    }

    proptest! {
        #[test]
        fn pops_are_sorted_by_deadline_then_sequence(deadlines in proptest::collection::vec(0u64..16, 0..64)) {
            let mut heap = DeadlineHeap::new();
            for secs in &deadlines {
                heap.push(at(*secs), Id::next());
            }

            let popped: Vec<_> = core::iter::from_fn(|| heap.pop()).collect();
            prop_assert_eq!(popped.len(), deadlines.len());
            for pair in popped.windows(2) {
                prop_assert!((pair[0].deadline, pair[0].sequence) < (pair[1].deadline, pair[1].sequence));
            }
        }
    }
}
