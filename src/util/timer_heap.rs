//! Monotonic deadline priority queue.
//!
//! The scheduler loop driving one or more sessions owns a `TimerHeap` and
//! asks it which timers have fired at each tick; the sessions themselves
//! never hold timer state or callbacks. Cancellation and reschedule are
//! lazy: stale heap entries are recognized by a deadline mismatch and
//! skipped when popped.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::{Duration, Instant};

/// Identifier for a scheduled timer.
pub type TimerId = u64;

#[derive(Debug, PartialEq, Eq)]
struct HeapEntry {
    deadline: Instant,
    id: TimerId,
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.deadline.cmp(&other.deadline).then(self.id.cmp(&other.id))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Min-heap of timer deadlines yielding fired [`TimerId`]s.
#[derive(Debug, Default)]
pub struct TimerHeap {
    next_id: TimerId,
    heap: BinaryHeap<Reverse<HeapEntry>>,
    // Expected deadline per live timer; a heap entry whose deadline differs
    // is stale and gets discarded on pop.
    active: HashMap<TimerId, Instant>,
}

impl TimerHeap {
    /// An empty heap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a timer at an absolute deadline.
    pub fn schedule_at(&mut self, deadline: Instant) -> TimerId {
        let id = self.next_id;
        self.next_id += 1;
        self.active.insert(id, deadline);
        self.heap.push(Reverse(HeapEntry { deadline, id }));
        id
    }

    /// Schedule a timer `delay` after `now`.
    pub fn schedule_after(&mut self, now: Instant, delay: Duration) -> TimerId {
        self.schedule_at(now + delay)
    }

    /// Cancel a timer. Returns whether it was still live.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        self.active.remove(&id).is_some()
    }

    /// Move a live timer to a new deadline. Returns whether it was live.
    pub fn reschedule(&mut self, id: TimerId, new_deadline: Instant) -> bool {
        match self.active.get_mut(&id) {
            Some(deadline) => {
                *deadline = new_deadline;
                self.heap.push(Reverse(HeapEntry { deadline: new_deadline, id }));
                true
            }
            None => false,
        }
    }

    /// Pop every timer whose deadline is at or before `now`.
    pub fn process_expired(&mut self, now: Instant) -> Vec<TimerId> {
        let mut fired = Vec::new();
        while let Some(Reverse(entry)) = self.heap.peek() {
            match self.active.get(&entry.id) {
                // Stale entry from cancel/reschedule.
                Some(expected) if *expected != entry.deadline => {
                    self.heap.pop();
                }
                Some(_) if entry.deadline <= now => {
                    let id = entry.id;
                    self.heap.pop();
                    self.active.remove(&id);
                    fired.push(id);
                }
                Some(_) => break,
                None => {
                    self.heap.pop();
                }
            }
        }
        fired
    }

    /// Time until the next live timer fires, `None` when empty.
    pub fn time_until_next(&mut self, now: Instant) -> Option<Duration> {
        self.compact_head();
        self.heap.peek().map(|Reverse(entry)| entry.deadline.saturating_duration_since(now))
    }

    /// Number of live timers.
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// Whether no timers are scheduled.
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Drop every timer.
    pub fn clear(&mut self) {
        self.heap.clear();
        self.active.clear();
    }

    fn compact_head(&mut self) {
        while let Some(Reverse(entry)) = self.heap.peek() {
            match self.active.get(&entry.id) {
                Some(expected) if *expected == entry.deadline => break,
                _ => {
                    self.heap.pop();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_in_deadline_order() {
        let mut heap = TimerHeap::new();
        let now = Instant::now();
        let late = heap.schedule_after(now, Duration::from_millis(30));
        let early = heap.schedule_after(now, Duration::from_millis(10));
        let mid = heap.schedule_after(now, Duration::from_millis(20));

        let fired = heap.process_expired(now + Duration::from_millis(40));
        assert_eq!(fired, vec![early, mid, late]);
        assert!(heap.is_empty());
    }

    #[test]
    fn does_not_fire_before_deadline() {
        let mut heap = TimerHeap::new();
        let now = Instant::now();
        heap.schedule_after(now, Duration::from_millis(10));
        assert!(heap.process_expired(now + Duration::from_millis(5)).is_empty());
        assert_eq!(heap.len(), 1);
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let mut heap = TimerHeap::new();
        let now = Instant::now();
        let id = heap.schedule_after(now, Duration::from_millis(10));
        assert!(heap.cancel(id));
        assert!(!heap.cancel(id));
        assert!(heap.process_expired(now + Duration::from_millis(20)).is_empty());
    }

    #[test]
    fn reschedule_moves_deadline() {
        let mut heap = TimerHeap::new();
        let now = Instant::now();
        let id = heap.schedule_after(now, Duration::from_millis(10));
        assert!(heap.reschedule(id, now + Duration::from_millis(50)));

        assert!(heap.process_expired(now + Duration::from_millis(20)).is_empty());
        let fired = heap.process_expired(now + Duration::from_millis(60));
        assert_eq!(fired, vec![id]);
    }

    #[test]
    fn reschedule_unknown_timer_fails() {
        let mut heap = TimerHeap::new();
        assert!(!heap.reschedule(42, Instant::now()));
    }

    #[test]
    fn time_until_next_skips_stale_entries() {
        let mut heap = TimerHeap::new();
        let now = Instant::now();
        let soon = heap.schedule_after(now, Duration::from_millis(5));
        heap.schedule_after(now, Duration::from_millis(100));
        heap.cancel(soon);

        let next = heap.time_until_next(now).expect("one live timer");
        assert!(next >= Duration::from_millis(99));
    }

    #[test]
    fn clear_removes_everything() {
        let mut heap = TimerHeap::new();
        let now = Instant::now();
        heap.schedule_after(now, Duration::from_millis(1));
        heap.schedule_after(now, Duration::from_millis(2));
        heap.clear();
        assert!(heap.is_empty());
        assert!(heap.time_until_next(now).is_none());
    }
}
