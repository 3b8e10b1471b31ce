//! Fan-out of live updates to connected clients.
//!
//! Each subscriber owns a bounded queue. [`BroadcastHub::publish`] only ever
//! calls `try_send`, so the publisher never waits on a client. A subscriber
//! whose queue is full (too slow) or closed (gone) is dropped from the
//! registry; its receiver then drains what was queued and ends.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, trace};

/// Default per-subscriber queue depth (about a second of updates at 60 Hz)
const DEFAULT_QUEUE_CAPACITY: usize = 64;

#[derive(Clone, Debug)]
pub struct HubConfig {
    pub queue_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self { queue_capacity: DEFAULT_QUEUE_CAPACITY }
    }
}

/// Identifies one registration; used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriberHandle(u64);

impl SubscriberHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

#[derive(Debug)]
struct Subscriber<T> {
    id: u64,
    sender: mpsc::Sender<Arc<T>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HubStats {
    pub published: u64,
    pub delivered: u64,
    pub dropped_subscribers: u64,
    pub subscriber_count: usize,
}

#[derive(Debug)]
pub struct BroadcastHub<T> {
    subscribers: RwLock<Vec<Subscriber<T>>>,
    queue_capacity: usize,
    next_id: AtomicU64,
    published: AtomicU64,
    delivered: AtomicU64,
    dropped_subscribers: AtomicU64,
}

impl<T> Default for BroadcastHub<T> {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}

impl<T> BroadcastHub<T> {
    pub fn new(cfg: HubConfig) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            queue_capacity: cfg.queue_capacity.max(1),
            next_id: AtomicU64::new(1),
            published: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            dropped_subscribers: AtomicU64::new(0),
        }
    }

    /// Register a new subscriber. Only updates published after this call are delivered.
    pub fn subscribe(&self) -> (SubscriberHandle, mpsc::Receiver<Arc<T>>) {
        let (sender, receiver) = mpsc::channel(self.queue_capacity);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.write().push(Subscriber { id, sender });
        debug!(id, "subscriber registered");
        (SubscriberHandle(id), receiver)
    }

    /// Remove a subscriber. Returns false if it was already gone; that is not an error.
    pub fn unsubscribe(&self, handle: SubscriberHandle) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|s| s.id != handle.0);
        let removed = subscribers.len() != before;
        if removed {
            debug!(id = handle.0, "subscriber removed");
        }
        removed
    }

    /// Hand `update` to every subscriber without waiting.
    ///
    /// Returns how many subscribers accepted it. Subscribers that could not
    /// take it are disconnected.
    pub fn publish(&self, update: Arc<T>) -> usize {
        self.published.fetch_add(1, Ordering::Relaxed);

        let mut delivered = 0;
        let mut failed = Vec::new();
        {
            let subscribers = self.subscribers.read();
            for s in subscribers.iter() {
                match s.sender.try_send(Arc::clone(&update)) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        debug!(id = s.id, "subscriber queue full, disconnecting");
                        failed.push(s.id);
                    }
                    Err(TrySendError::Closed(_)) => {
                        trace!(id = s.id, "subscriber gone");
                        failed.push(s.id);
                    }
                }
            }
        }

        if !failed.is_empty() {
            let mut subscribers = self.subscribers.write();
            subscribers.retain(|s| !failed.contains(&s.id));
            self.dropped_subscribers
                .fetch_add(failed.len() as u64, Ordering::Relaxed);
        }

        self.delivered.fetch_add(delivered as u64, Ordering::Relaxed);
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn stats(&self) -> HubStats {
        HubStats {
            published: self.published.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped_subscribers: self.dropped_subscribers.load(Ordering::Relaxed),
            subscriber_count: self.subscriber_count(),
        }
    }
}
