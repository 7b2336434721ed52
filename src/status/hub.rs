//! Subscriber registry and fan-out for color transitions.
//!
//! Each watch socket owns a bounded queue. The publisher only ever does a
//! non-blocking `try_send` into those queues; a subscriber whose queue is
//! full is removed on the spot. Removing a subscriber drops the sending half
//! of its queue, which its writer task observes as end-of-stream and closes
//! the socket.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use cistatus_common::Summary;
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

/// Outbound queue depth per subscriber.
pub const SUBSCRIBER_QUEUE_CAPACITY: usize = 16;

pub type SubscriberId = Uuid;

/// Receiving half handed to a newly registered subscriber.
pub struct Subscription {
    pub id: SubscriberId,
    pub rx: mpsc::Receiver<Summary>,
}

/// Result of offering one summary to every subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub dropped: usize,
}

#[derive(Default)]
struct HubInner {
    subscribers: HashMap<SubscriberId, mpsc::Sender<Summary>>,
    last_broadcast: Option<Summary>,
}

pub struct Hub {
    capacity: usize,
    inner: RwLock<HubInner>,
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

impl Hub {
    pub fn new() -> Self {
        Self::with_capacity(SUBSCRIBER_QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: RwLock::new(HubInner::default()),
        }
    }

    /// Add a subscriber.
    ///
    /// If anything has been broadcast already, the most recent summary is
    /// queued for the new subscriber before it joins the live set. Both
    /// happen under the registry lock, so no broadcast can slip in between.
    pub fn register(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.capacity);
        let id = Uuid::new_v4();

        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(last) = &inner.last_broadcast {
            // A fresh queue always has room for one item.
            let _ = tx.try_send(last.clone());
        }
        inner.subscribers.insert(id, tx);

        tracing::debug!(subscriber = %id, total = inner.subscribers.len(), "subscriber registered");
        Subscription { id, rx }
    }

    /// Remove a subscriber. Returns `false` if it was already gone.
    pub fn unregister(&self, id: SubscriberId) -> bool {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let removed = inner.subscribers.remove(&id).is_some();
        if removed {
            tracing::debug!(subscriber = %id, total = inner.subscribers.len(), "subscriber unregistered");
        }
        removed
    }

    /// Offer `summary`, stripped of its project list, to every subscriber.
    ///
    /// Never waits on a subscriber. Dispatch is serialized by the registry
    /// lock, so every subscriber sees broadcasts in publish order.
    pub fn broadcast(&self, summary: &Summary) -> BroadcastReport {
        let frame = summary.without_projects();
        let mut report = BroadcastReport::default();

        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.subscribers.retain(|id, tx| match tx.try_send(frame.clone()) {
            Ok(()) => {
                report.delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                tracing::warn!(subscriber = %id, "subscriber queue full, disconnecting");
                report.dropped += 1;
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(subscriber = %id, "subscriber already closed");
                report.dropped += 1;
                false
            }
        });
        inner.last_broadcast = Some(frame);

        report
    }

    /// Set the state handed to subscribers that join before the first
    /// broadcast. Ignored once anything has been broadcast.
    pub fn prime(&self, summary: &Summary) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if inner.last_broadcast.is_none() {
            inner.last_broadcast = Some(summary.without_projects());
        }
    }

    /// Drop every subscriber; their sockets close once their queues drain.
    pub fn close_all(&self) -> usize {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let closed = inner.subscribers.len();
        inner.subscribers.clear();
        closed
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .subscribers
            .len()
    }

    pub fn is_registered(&self, id: SubscriberId) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .subscribers
            .contains_key(&id)
    }

    pub fn last_broadcast(&self) -> Option<Summary> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .last_broadcast
            .clone()
    }
}
