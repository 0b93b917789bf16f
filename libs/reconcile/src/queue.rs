//! Deduplicating, coalescing work queue keyed by object identity.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tracing::trace;

use drift_api::ObjectKey;

/// Work queue with the following guarantees:
///
/// - A key queued twice before being picked up is delivered once.
/// - A key re-added while a worker holds it is marked dirty and
///   re-queued when that worker calls [`WorkQueue::done`], so the
///   newest state is always observed by a later run.
/// - At most one worker holds a given key at a time.
pub struct WorkQueue {
    inner: Mutex<Inner>,
    notify: Notify,
}

struct Inner {
    /// Keys awaiting pickup, in arrival order.
    queue: VecDeque<ObjectKey>,

    /// Keys that need processing (queued or re-added while in flight).
    dirty: HashSet<ObjectKey>,

    /// Keys currently held by workers.
    processing: HashSet<ObjectKey>,

    shutting_down: bool,
}

impl WorkQueue {
    /// An empty queue.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner {
                queue: VecDeque::new(),
                dirty: HashSet::new(),
                processing: HashSet::new(),
                shutting_down: false,
            }),
            notify: Notify::new(),
        })
    }

    /// Enqueue a key. Duplicates of a pending key are dropped;
    /// duplicates of an in-flight key coalesce into one re-run.
    pub fn add(&self, key: ObjectKey) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        if inner.shutting_down || inner.dirty.contains(&key) {
            return;
        }
        inner.dirty.insert(key.clone());
        if inner.processing.contains(&key) {
            // Re-queued by done() once the in-flight run finishes.
            trace!(%key, "Key dirty while in flight, coalescing");
            return;
        }
        inner.queue.push_back(key);
        drop(inner);
        self.notify.notify_one();
    }

    /// Enqueue a key after a delay.
    pub fn add_after(self: &Arc<Self>, key: ObjectKey, delay: Duration) {
        let queue = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.add(key);
        });
    }

    /// Wait for the next key. Returns `None` once the queue is shut
    /// down and drained of waiters.
    pub async fn get(&self) -> Option<ObjectKey> {
        loop {
            {
                let Ok(mut inner) = self.inner.lock() else {
                    return None;
                };
                if let Some(key) = inner.queue.pop_front() {
                    inner.dirty.remove(&key);
                    inner.processing.insert(key.clone());
                    let more_pending = !inner.queue.is_empty();
                    drop(inner);
                    // Notify holds at most one permit, so back-to-back
                    // adds can collapse into a single wakeup. Hand the
                    // wakeup on while keys remain, so every pending key
                    // reaches a worker without waiting on an unrelated
                    // done() or enqueue.
                    if more_pending {
                        self.notify.notify_one();
                    }
                    return Some(key);
                }
                if inner.shutting_down {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    /// Release a key after processing. If the key went dirty while in
    /// flight it is re-queued immediately.
    pub fn done(&self, key: &ObjectKey) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        inner.processing.remove(key);
        if inner.dirty.contains(key) && !inner.shutting_down {
            inner.queue.push_back(key.clone());
            drop(inner);
            self.notify.notify_one();
        }
    }

    /// Stop accepting work and wake all parked workers.
    pub fn shut_down(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.shutting_down = true;
        }
        self.notify.notify_waiters();
    }

    /// Number of keys awaiting pickup.
    pub fn len(&self) -> usize {
        self.inner.lock().map(|i| i.queue.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
