//! Fire-and-forget event distribution
//!
//! Events are broadcast after the transition that produced them has been
//! stored. A missing or lagging subscriber never affects the transition.

use review_types::{ReviewEvent, ReviewEventEnvelope};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

pub struct ReviewEventBus {
    sender: broadcast::Sender<ReviewEventEnvelope>,
    published: AtomicU64,
}

/// Snapshot of bus activity
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EventBusStats {
    pub published: u64,
    pub subscriber_count: usize,
}

impl ReviewEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            published: AtomicU64::new(0),
        }
    }

    /// Publish an event. Returns how many subscribers received it.
    pub fn publish(&self, event: ReviewEvent) -> usize {
        let name = event.name();
        let workflow_id = event.workflow_id().clone();
        self.published.fetch_add(1, Ordering::Relaxed);

        // No receivers is not an error
        let delivered = self.sender.send(ReviewEventEnvelope::new(event)).unwrap_or(0);
        tracing::debug!(event = name, workflow_id = %workflow_id, delivered, "Event published");
        delivered
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReviewEventEnvelope> {
        self.sender.subscribe()
    }

    pub fn stats(&self) -> EventBusStats {
        EventBusStats {
            published: self.published.load(Ordering::Relaxed),
            subscriber_count: self.sender.receiver_count(),
        }
    }
}
