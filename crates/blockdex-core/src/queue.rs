//! Freshness-ordered work queue shared by the producers and the dispatcher.
//!
//! A max-heap of block heights behind a single mutex. Any number of
//! producers may push concurrently; `pop` never blocks waiting for work, it
//! returns `None` and leaves the back-off decision to the caller.

use std::collections::BinaryHeap;

use parking_lot::Mutex;

/// A unit of work: "index the block at this height".
///
/// Ordered by height only, so the heap yields the freshest block first.
/// Duplicate heights are allowed; the store's idempotent insert absorbs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkItem {
    pub height: u64,
}

impl WorkItem {
    pub fn new(height: u64) -> Self {
        Self { height }
    }
}

impl From<u64> for WorkItem {
    fn from(height: u64) -> Self {
        Self { height }
    }
}

/// Thread-safe max-heap of [`WorkItem`]s.
#[derive(Debug, Default)]
pub struct PriorityQueue {
    heap: Mutex<BinaryHeap<WorkItem>>,
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an item. O(log n) under the queue lock.
    pub fn push(&self, item: WorkItem) {
        self.heap.lock().push(item);
    }

    /// Shorthand for `push(WorkItem::new(height))`.
    pub fn push_height(&self, height: u64) {
        self.push(WorkItem::new(height));
    }

    /// Remove and return the highest item, or `None` if the queue is empty.
    ///
    /// The emptiness check and the removal happen under one lock acquisition.
    pub fn pop(&self) -> Option<WorkItem> {
        self.heap.lock().pop()
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.heap.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.lock().is_empty()
    }
}
