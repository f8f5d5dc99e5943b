//! Cross-thread deferred-load queue (component I, spec.md §4.I).
//!
//! `std::sync::{Mutex, Condvar}` rather than a channel, mirroring
//! `session_mt.rs::MtState` (a `Mutex`-protected inner struct paired with a
//! `Condvar` the consumer waits on) rather than `mpsc` — this queue
//! additionally needs a plain FIFO peek/drain shape a channel doesn't give,
//! and the worker's shutdown wake-up shares the same condvar as new work,
//! exactly as `MtState` does for its own termination signal.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

use crate::actions::ActionSet;
use crate::flags::SchemeFlags;
use crate::uri::OwnedUri;

/// One deferred ingest request, queued by a producer and later drained by
/// the worker thread.
pub struct PendingItem {
    pub uri: OwnedUri,
    pub flags: SchemeFlags,
    pub actions: ActionSet,
}

struct Inner {
    items: VecDeque<PendingItem>,
    shutdown: bool,
}

/// FIFO of [`PendingItem`]s, safe to push from any thread; drained only by
/// the single ingest worker (spec.md §5).
pub struct PendingQueue {
    inner: Mutex<Inner>,
    condvar: Condvar,
}

impl Default for PendingQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingQueue {
    pub fn new() -> Self {
        PendingQueue {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                shutdown: false,
            }),
            condvar: Condvar::new(),
        }
    }

    /// Append an item and wake the worker.
    pub fn push(&self, item: PendingItem) {
        let mut inner = self.inner.lock().unwrap();
        inner.items.push_back(item);
        self.condvar.notify_one();
    }

    /// Signal the worker to stop waiting for more work.
    pub fn request_shutdown(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.shutdown = true;
        self.condvar.notify_all();
    }

    /// Remove and return the oldest item, without blocking.
    pub fn try_pop(&self) -> Option<PendingItem> {
        self.inner.lock().unwrap().items.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().items.len()
    }

    /// Block until an item is available or shutdown is requested, then pop
    /// it. Returns `None` only when the queue is empty and shutdown has
    /// been requested.
    pub fn pop_blocking(&self) -> Option<PendingItem> {
        let mut inner = self.inner.lock().unwrap();
        loop {
            if let Some(item) = inner.items.pop_front() {
                return Some(item);
            }
            if inner.shutdown {
                return None;
            }
            inner = self.condvar.wait(inner).unwrap();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn item(uri: &str) -> PendingItem {
        PendingItem {
            uri: OwnedUri::new(uri),
            flags: SchemeFlags::empty(),
            actions: ActionSet::empty(),
        }
    }

    #[test]
    fn fifo_order_is_preserved() {
        let q = PendingQueue::new();
        q.push(item("a"));
        q.push(item("b"));
        assert_eq!(q.try_pop().unwrap().uri, OwnedUri::new("a"));
        assert_eq!(q.try_pop().unwrap().uri, OwnedUri::new("b"));
        assert!(q.try_pop().is_none());
    }

    #[test]
    fn pop_blocking_wakes_on_push() {
        use std::sync::Arc;
        use std::thread;
        use std::time::Duration;

        let q = Arc::new(PendingQueue::new());
        let q2 = q.clone();
        let handle = thread::spawn(move || q2.pop_blocking());
        thread::sleep(Duration::from_millis(20));
        q.push(item("late"));
        let popped = handle.join().unwrap();
        assert_eq!(popped.unwrap().uri, OwnedUri::new("late"));
    }

    #[test]
    fn pop_blocking_returns_none_after_shutdown_with_empty_queue() {
        let q = PendingQueue::new();
        q.request_shutdown();
        assert!(q.pop_blocking().is_none());
    }
}
