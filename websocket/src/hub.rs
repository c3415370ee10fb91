//! Subscriber registry and non-blocking fan-out.
//!
//! Each subscriber owns a bounded queue. `publish` offers the event to every
//! queue with `try_send`; a subscriber whose queue is full or whose receiving
//! end is gone is removed on the spot. Publishing therefore never waits on a
//! slow observer, and events reach each observer in publish order.
//!
//! A `vote_update` for a round the hub has already announced closed is
//! dropped, so observers never see a finished round's counters as live.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

use ballot_types::RoundId;

use crate::events::HubEvent;

/// Default per-subscriber queue depth.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 64;

pub type SubscriberId = u64;

/// Why an event could not be handed to a subscriber.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum DeliveryFailure {
    #[error("subscriber buffer full")]
    BufferFull,
    #[error("subscriber disconnected")]
    Disconnected,
    #[error("subscriber write timed out")]
    TimedOut,
}

/// The receiving side of one registration.
pub struct Subscription {
    pub id: SubscriberId,
    pub events: mpsc::Receiver<Arc<HubEvent>>,
}

#[derive(Default)]
struct Registry {
    subscribers: HashMap<SubscriberId, mpsc::Sender<Arc<HubEvent>>>,
    /// Highest round announced closed.
    closed_through: Option<RoundId>,
}

impl Registry {
    /// Whether `event` reports counters of a round already announced closed.
    fn is_stale(&self, event: &HubEvent) -> bool {
        match (event, self.closed_through) {
            (HubEvent::VoteUpdate { round_id: Some(id), .. }, Some(closed)) => *id <= closed,
            _ => false,
        }
    }
}

pub struct BroadcastHub {
    registry: Mutex<Registry>,
    next_id: AtomicU64,
    buffer: usize,
    evictions: AtomicU64,
}

impl BroadcastHub {
    pub fn new(buffer: usize) -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
            evictions: AtomicU64::new(0),
        }
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        // The map stays consistent even if a holder panicked mid-publish.
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.buffer);
        let count = {
            let mut registry = self.registry();
            registry.subscribers.insert(id, tx);
            registry.subscribers.len()
        };
        debug!(subscriber = id, active = count, "subscriber registered");
        Subscription { id, events: rx }
    }

    /// Remove a subscriber. Returns whether it was still registered.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let (removed, count) = {
            let mut registry = self.registry();
            let removed = registry.subscribers.remove(&id).is_some();
            (removed, registry.subscribers.len())
        };
        if removed {
            debug!(subscriber = id, active = count, "subscriber removed");
        }
        removed
    }

    /// Offer `event` to every subscriber; returns how many accepted it.
    ///
    /// The registry lock is held for the whole fan-out so that concurrent
    /// publishes reach every queue in the same order.
    pub fn publish(&self, event: HubEvent) -> usize {
        let kind = event.kind();
        let mut registry = self.registry();
        if registry.is_stale(&event) {
            debug!(event = kind, closed_through = ?registry.closed_through, "stale update dropped");
            return 0;
        }
        if let HubEvent::RoundClosed { round_id, .. } = &event {
            registry.closed_through = registry.closed_through.max(Some(*round_id));
        }

        let event = Arc::new(event);
        let mut failed = Vec::new();
        let subscribers = &mut registry.subscribers;
        for (id, tx) in subscribers.iter() {
            if let Err(e) = tx.try_send(Arc::clone(&event)) {
                let failure = match e {
                    TrySendError::Full(_) => DeliveryFailure::BufferFull,
                    TrySendError::Closed(_) => DeliveryFailure::Disconnected,
                };
                failed.push((*id, failure));
            }
        }
        for (id, failure) in &failed {
            subscribers.remove(id);
            debug!(subscriber = id, event = kind, reason = %failure, "subscriber evicted");
        }
        let delivered = subscribers.len();
        drop(registry);

        self.evictions
            .fetch_add(failed.len() as u64, Ordering::Relaxed);
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry().subscribers.len()
    }

    /// Total subscribers removed because a delivery failed.
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_BUFFER)
    }
}
