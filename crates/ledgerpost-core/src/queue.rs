//! Bounded blocking queue — the substrate for page prefetching.
//!
//! One producer fills the queue while consumers drain it; capacity bounds
//! how far the producer may run ahead. Built on `Mutex + Condvar` so the
//! current depth stays observable (a plain `sync_channel` hides it).

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

struct Inner<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// A bounded FIFO queue that blocks on both ends.
///
/// `push` blocks while the queue is full; `pop` blocks while it is empty and
/// still open. After `close()`, `push` is rejected and `pop` drains the
/// remaining items before returning `None`.
pub struct Bounded<T> {
    inner: Mutex<Inner<T>>,
    capacity: usize,
    not_full: Condvar,
    not_empty: Condvar,
}

/// Error returned when pushing into a closed queue. The item is handed back.
#[derive(Debug)]
pub struct Closed<T>(pub T);

impl<T> Bounded<T> {
    /// Create a queue holding at most `capacity` items. `capacity` must be > 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be > 0");
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            capacity,
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
        }
    }

    /// Block until there is room, then enqueue `item`.
    ///
    /// Returns `Err(Closed(item))` if the queue was closed while waiting.
    pub fn push(&self, item: T) -> Result<(), Closed<T>> {
        let mut inner = self.inner.lock().expect("queue mutex poisoned");
        while inner.items.len() >= self.capacity && !inner.closed {
            inner = self.not_full.wait(inner).expect("queue mutex poisoned");
        }
        if inner.closed {
            return Err(Closed(item));
        }
        inner.items.push_back(item);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Block until an item is available, then dequeue the oldest.
    ///
    /// Returns `None` once the queue is closed and drained.
    pub fn pop(&self) -> Option<T> {
        let mut inner = self.inner.lock().expect("queue mutex poisoned");
        while inner.items.is_empty() && !inner.closed {
            inner = self.not_empty.wait(inner).expect("queue mutex poisoned");
        }
        let item = inner.items.pop_front();
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// Close the queue: no further pushes are accepted, pending items remain
    /// poppable. Idempotent.
    pub fn close(&self) {
        let mut inner = self.inner.lock().expect("queue mutex poisoned");
        inner.closed = true;
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    /// Current number of queued items.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("queue mutex poisoned").items.len()
    }

    /// Check if no items are queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
