use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

/// Identifies one scheduled event so it can be cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventHandle(u64);

#[derive(Debug)]
struct Entry<E> {
    time: f64,
    id: u64, // insertion order, breaks ties between equal times
    event: E,
}

// Custom Ord for Min-Heap (earliest time, then earliest insertion, pops first)
impl<E> PartialEq for Entry<E> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<E> Eq for Entry<E> {}

impl<E> PartialOrd for Entry<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> Ord for Entry<E> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .total_cmp(&self.time)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// Virtual-time event queue.
///
/// Events fire in nondecreasing time order; events scheduled for the same
/// instant fire in the order they were scheduled. Cancelled events are
/// dropped lazily when they reach the head of the heap but stop counting
/// towards [`Scheduler::len`] immediately.
#[derive(Debug)]
pub struct Scheduler<E> {
    now: f64,
    queue: BinaryHeap<Entry<E>>,
    live: HashSet<u64>,
    next_id: u64,
}

impl<E> Default for Scheduler<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Scheduler<E> {
    pub fn new() -> Self {
        Self {
            now: 0.0,
            queue: BinaryHeap::new(),
            live: HashSet::new(),
            next_id: 0,
        }
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    /// Schedule `event` to fire `delay` time units from now. Negative delays
    /// are treated as zero.
    pub fn schedule(&mut self, delay: f64, event: E) -> EventHandle {
        self.schedule_at(self.now + delay.max(0.0), event)
    }

    /// Schedule `event` at an absolute time, clamped to the present.
    pub fn schedule_at(&mut self, time: f64, event: E) -> EventHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.queue.push(Entry {
            time: time.max(self.now),
            id,
            event,
        });
        self.live.insert(id);
        EventHandle(id)
    }

    /// Remove a pending event. Returns false if it already fired or was
    /// already cancelled.
    pub fn cancel(&mut self, handle: EventHandle) -> bool {
        self.live.remove(&handle.0)
    }

    pub fn is_pending(&self, handle: EventHandle) -> bool {
        self.live.contains(&handle.0)
    }

    /// Number of events that will still fire.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Time of the next event that will fire.
    pub fn peek_time(&mut self) -> Option<f64> {
        self.discard_cancelled();
        self.queue.peek().map(|e| e.time)
    }

    /// Drop every pending event.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.live.clear();
    }

    /// Remove the next event and advance the clock to its time.
    pub fn pop(&mut self) -> Option<(EventHandle, E)> {
        self.discard_cancelled();
        let entry = self.queue.pop()?;
        self.live.remove(&entry.id);
        self.now = entry.time;
        Some((EventHandle(entry.id), entry.event))
    }

    /// Execute events until the queue is empty. The handler may schedule or
    /// cancel further events.
    pub fn run(&mut self, mut handler: impl FnMut(&mut Self, E)) {
        while let Some((_, event)) = self.pop() {
            handler(self, event);
        }
    }

    fn discard_cancelled(&mut self) {
        while let Some(head) = self.queue.peek() {
            if self.live.contains(&head.id) {
                break;
            }
            self.queue.pop();
        }
    }
}
