// src/events/channel.rs
//! Multicast observer list
//!
//! A [`Channel`] is a list of registered callbacks. Publishing walks a
//! snapshot of the list in registration order. Nothing is buffered:
//! subscribers only see events published after they attached.

use parking_lot::{Mutex, ReentrantMutex};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Handle returned by [`Channel::subscribe`], used to detach again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// One notification channel with any number of subscribers
pub struct Channel<T> {
    name: &'static str,
    next_id: AtomicU64,
    subscribers: Mutex<Vec<(SubscriptionId, Callback<T>)>>,
    /// Serializes deliveries so every subscriber sees the same order.
    /// Reentrant so a callback may publish on the channel it listens to.
    delivery: ReentrantMutex<()>,
}

impl<T> Channel<T> {
    /// Creates an empty channel; `name` only appears in log lines
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            next_id: AtomicU64::new(0),
            subscribers: Mutex::new(Vec::new()),
            delivery: ReentrantMutex::new(()),
        }
    }

    /// Attaches a callback invoked for every later event
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.lock().push((id, Arc::new(callback)));
        id
    }

    /// Detaches a callback
    ///
    /// Returns `false` if the id was not attached.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|(sub, _)| *sub != id);
        subscribers.len() != before
    }

    /// Number of attached callbacks
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Delivers `event` to every attached callback
    ///
    /// A panicking callback is logged and skipped; the rest still run.
    /// Returns the number of callbacks that completed.
    pub fn publish(&self, event: &T) -> usize {
        let _order = self.delivery.lock();
        // Snapshot so callbacks can (un)subscribe without deadlocking.
        let snapshot: Vec<Callback<T>> = self
            .subscribers
            .lock()
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();

        let mut delivered = 0;
        for callback in snapshot {
            match catch_unwind(AssertUnwindSafe(|| callback(event))) {
                Ok(()) => delivered += 1,
                Err(_) => log::error!("Subscriber on '{}' channel panicked", self.name),
            }
        }
        delivered
    }
}

impl<T> std::fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
