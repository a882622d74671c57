//! Bounded, thread-safe event queue.
//!
//! Multi-producer / multi-consumer behind one mutex. `push` never blocks
//! for unbounded time and never fails loudly: at capacity the event is
//! dropped and a counter bumped. The tick core is the only consumer in
//! normal operation, draining with `pop_all`.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use vita_core::Event;

pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

#[derive(Debug, Default)]
struct QueueInner {
    events: VecDeque<Event>,
    dropped: u64,
}

#[derive(Debug)]
pub struct EventQueue {
    inner: Mutex<QueueInner>,
    capacity: usize,
}

/// Serializable point-in-time view of the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub event_count: usize,
    pub dropped_events: u64,
    pub events: Vec<Event>,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl EventQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner::default()),
            capacity: capacity.max(1),
        }
    }

    // A poisoned mutex only means a producer panicked mid-push; the queue
    // contents are still structurally sound, so recover the guard.
    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Non-blocking push. Returns false (and counts the drop) when full.
    pub fn push(&self, event: Event) -> bool {
        let mut inner = self.lock();
        if inner.events.len() >= self.capacity {
            inner.dropped += 1;
            return false;
        }
        inner.events.push_back(event);
        true
    }

    /// Non-blocking single dequeue.
    pub fn pop(&self) -> Option<Event> {
        self.lock().events.pop_front()
    }

    /// Drain everything currently queued, FIFO order preserved. Events
    /// pushed concurrently land either in this batch or the next.
    pub fn pop_all(&self) -> Vec<Event> {
        let mut inner = self.lock();
        inner.events.drain(..).collect()
    }

    pub fn size(&self) -> usize {
        self.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total events dropped since construction; monotonically increasing.
    pub fn dropped_count(&self) -> u64 {
        self.lock().dropped
    }

    /// Ordered serializable view. Holds the lock for one O(n) clone.
    pub fn snapshot(&self) -> QueueSnapshot {
        let inner = self.lock();
        QueueSnapshot {
            event_count: inner.events.len(),
            dropped_events: inner.dropped,
            events: inner.events.iter().cloned().collect(),
        }
    }

    /// Refill from a restored snapshot (restart handoff). Respects
    /// capacity; surplus restored events count as dropped.
    pub fn restore(&self, events: Vec<Event>) {
        for event in events {
            self.push(event);
        }
    }
}
