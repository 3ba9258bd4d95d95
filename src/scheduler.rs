//! Tick scheduler - deferred callbacks on a logical clock
//!
//! Replaces the host's "call me back in N ticks" service with a plain
//! priority queue so activation timing is reproducible in tests.
//!
//! ## Key Features:
//! - **Logical ticks**: time only moves when the owner calls `advance`
//! - **Stable ordering**: tasks due on the same tick fire in schedule order
//! - **No cancellation**: stale tasks are filtered by their owner (epochs)

use std::cmp::Ordering;
use std::collections::BinaryHeap;

struct Pending<T> {
    due: u64,
    seq: u64,
    task: T,
}

impl<T> PartialEq for Pending<T> {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl<T> Eq for Pending<T> {}

impl<T> PartialOrd for Pending<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Pending<T> {
    // Reversed: BinaryHeap is a max-heap, we want the earliest first
    fn cmp(&self, other: &Self) -> Ordering {
        (other.due, other.seq).cmp(&(self.due, self.seq))
    }
}

/// Discrete-event scheduler over a logical tick counter
pub struct TickScheduler<T> {
    now: u64,
    next_seq: u64,
    pending: BinaryHeap<Pending<T>>,
}

impl<T> TickScheduler<T> {
    pub fn new() -> Self {
        Self {
            now: 0,
            next_seq: 0,
            pending: BinaryHeap::new(),
        }
    }

    /// Current tick
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Number of tasks not yet fired
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Run `task` once `delay` ticks have elapsed
    ///
    /// A zero delay fires on the next `advance`, never synchronously.
    pub fn schedule(&mut self, delay: u64, task: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.push(Pending {
            due: self.now + delay,
            seq,
            task,
        });
    }

    /// Move the clock forward and return every task now due, in order
    pub fn advance(&mut self, ticks: u64) -> Vec<T> {
        self.now += ticks;

        let mut due = Vec::new();
        while self.pending.peek().is_some_and(|p| p.due <= self.now) {
            if let Some(pending) = self.pending.pop() {
                due.push(pending.task);
            }
        }
        due
    }
}

impl<T> Default for TickScheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_after_delay() {
        let mut scheduler = TickScheduler::new();
        scheduler.schedule(5, "probe");

        assert!(scheduler.advance(4).is_empty());
        assert_eq!(scheduler.pending(), 1);
        assert_eq!(scheduler.advance(1), vec!["probe"]);
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(scheduler.now(), 5);
    }

    #[test]
    fn test_same_tick_keeps_schedule_order() {
        let mut scheduler = TickScheduler::new();
        scheduler.schedule(2, 'a');
        scheduler.schedule(1, 'b');
        scheduler.schedule(2, 'c');
        scheduler.schedule(0, 'd');

        assert_eq!(scheduler.advance(10), vec!['d', 'b', 'a', 'c']);
    }

    #[test]
    fn test_zero_delay_is_deferred() {
        let mut scheduler = TickScheduler::new();
        scheduler.schedule(0, 1);

        assert_eq!(scheduler.pending(), 1);
        assert_eq!(scheduler.advance(0), vec![1]);
    }

    #[test]
    fn test_delay_is_relative_to_now() {
        let mut scheduler = TickScheduler::new();
        scheduler.advance(100);
        scheduler.schedule(5, ());

        assert!(scheduler.advance(4).is_empty());
        assert_eq!(scheduler.advance(1).len(), 1);
    }
}
