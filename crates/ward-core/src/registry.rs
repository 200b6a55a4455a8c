//! Subscription registry.
//!
//! Every live connection is a subscriber; there is no explicit subscribe
//! step. Each subscriber owns a bounded queue that the hub pushes into.

use crate::envelope::Envelope;
use crate::hub::HubError;
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, trace, warn};

/// Default per-subscriber queue capacity.
const DEFAULT_QUEUE_CAPACITY: usize = 256;

static NEXT_SUBSCRIBER: AtomicU64 = AtomicU64::new(1);

/// Connection-scoped subscriber identifier, assigned by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    fn next() -> Self {
        Self(NEXT_SUBSCRIBER.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw numeric id.
    #[must_use]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Registry configuration.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Maximum number of concurrently connected subscribers.
    pub max_subscribers: usize,
    /// Capacity of each subscriber's outbound queue.
    pub queue_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_subscribers: 10_000,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

struct SubscriberEntry {
    sender: mpsc::Sender<Arc<Envelope>>,
    connected_at: Instant,
}

/// The receiving side of a subscriber's queue.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    receiver: mpsc::Receiver<Arc<Envelope>>,
}

impl Subscription {
    /// The assigned subscriber id.
    #[must_use]
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next envelope. Returns `None` once unregistered.
    pub async fn recv(&mut self) -> Option<Arc<Envelope>> {
        self.receiver.recv().await
    }

    /// Take an envelope if one is queued.
    pub fn try_recv(&mut self) -> Option<Arc<Envelope>> {
        self.receiver.try_recv().ok()
    }
}

/// Outcome of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Subscribers whose queue accepted the envelope.
    pub delivered: usize,
    /// Subscribers skipped because their queue was full.
    pub dropped: usize,
    /// Subscribers found closed mid-broadcast and pruned.
    pub closed: usize,
}

/// Live set of subscribers.
pub struct SubscriptionRegistry {
    subscribers: DashMap<SubscriberId, SubscriberEntry>,
    /// Reserved slots; counts an entry before it is inserted.
    slots: AtomicUsize,
    config: RegistryConfig,
}

impl SubscriptionRegistry {
    /// Create a registry with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a registry with custom configuration.
    #[must_use]
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            subscribers: DashMap::new(),
            slots: AtomicUsize::new(0),
            config,
        }
    }

    /// Register a newly connected subscriber.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::TooManySubscribers`] when the registry is full.
    pub fn on_connect(&self) -> Result<Subscription, HubError> {
        let max = self.config.max_subscribers;
        if self
            .slots
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < max).then_some(n + 1))
            .is_err()
        {
            return Err(HubError::TooManySubscribers(max));
        }

        let id = SubscriberId::next();
        let (sender, receiver) = mpsc::channel(self.config.queue_capacity.max(1));
        self.subscribers.insert(
            id,
            SubscriberEntry {
                sender,
                connected_at: Instant::now(),
            },
        );

        debug!(subscriber = %id, total = self.subscribers.len(), "Subscriber connected");
        Ok(Subscription { id, receiver })
    }

    /// Remove a subscriber. Returns `true` if it was registered.
    pub fn on_disconnect(&self, id: &SubscriberId) -> bool {
        match self.subscribers.remove(id) {
            Some((_, entry)) => {
                self.slots.fetch_sub(1, Ordering::AcqRel);
                debug!(
                    subscriber = %id,
                    connected_for_ms = entry.connected_at.elapsed().as_millis() as u64,
                    "Subscriber disconnected"
                );
                true
            }
            None => false,
        }
    }

    /// Check whether a subscriber is registered.
    #[must_use]
    pub fn contains(&self, id: &SubscriberId) -> bool {
        self.subscribers.contains_key(id)
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Whether no subscriber is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Ids of all registered subscribers.
    #[must_use]
    pub fn ids(&self) -> Vec<SubscriberId> {
        self.subscribers.iter().map(|e| *e.key()).collect()
    }

    /// Push an envelope into every live queue.
    ///
    /// Iterates the live map, not a snapshot. A full or closed queue only
    /// affects its own subscriber.
    pub(crate) fn deliver(&self, envelope: &Arc<Envelope>) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        let mut closed = Vec::new();

        for entry in self.subscribers.iter() {
            match entry.sender.try_send(Arc::clone(envelope)) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(subscriber = %entry.key(), envelope = envelope.id, "Subscriber queue full, dropping");
                    report.dropped += 1;
                }
                Err(TrySendError::Closed(_)) => closed.push(*entry.key()),
            }
        }

        // Removal must happen after iteration releases its shard locks.
        for id in &closed {
            if self.subscribers.remove(id).is_some() {
                self.slots.fetch_sub(1, Ordering::AcqRel);
                trace!(subscriber = %id, "Pruned closed subscriber");
            }
        }
        report.closed = closed.len();

        report
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ward_protocol::Frame;

    fn envelope() -> Arc<Envelope> {
        Arc::new(Envelope::new(Frame::ping(None)))
    }

    #[test]
    fn test_connect_assigns_distinct_ids() {
        let registry = SubscriptionRegistry::new();
        let a = registry.on_connect().unwrap();
        let b = registry.on_connect().unwrap();

        assert_ne!(a.id(), b.id());
        assert_eq!(registry.len(), 2);
        assert!(registry.contains(&a.id()));
    }

    #[test]
    fn test_disconnect() {
        let registry = SubscriptionRegistry::new();
        let sub = registry.on_connect().unwrap();

        assert!(registry.on_disconnect(&sub.id()));
        assert!(!registry.on_disconnect(&sub.id()));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_subscriber_limit() {
        let registry = SubscriptionRegistry::with_config(RegistryConfig {
            max_subscribers: 1,
            queue_capacity: 4,
        });

        let _first = registry.on_connect().unwrap();
        assert!(matches!(
            registry.on_connect(),
            Err(HubError::TooManySubscribers(1))
        ));
    }

    #[test]
    fn test_concurrent_connects_respect_limit() {
        let registry = SubscriptionRegistry::with_config(RegistryConfig {
            max_subscribers: 8,
            queue_capacity: 4,
        });

        let accepted: Vec<Subscription> = std::thread::scope(|s| {
            let workers: Vec<_> = (0..16)
                .map(|_| s.spawn(|| (0..4).filter_map(|_| registry.on_connect().ok()).collect::<Vec<_>>()))
                .collect();
            workers.into_iter().flat_map(|w| w.join().unwrap()).collect()
        });
        assert_eq!(accepted.len(), 8);
        assert_eq!(registry.len(), 8);

        // A freed slot can be taken again
        assert!(registry.on_disconnect(&accepted[0].id()));
        assert!(registry.on_connect().is_ok());
        assert!(registry.on_connect().is_err());
    }

    #[test]
    fn test_full_queue_only_drops_for_that_subscriber() {
        let registry = SubscriptionRegistry::with_config(RegistryConfig {
            max_subscribers: 10,
            queue_capacity: 1,
        });
        let mut slow = registry.on_connect().unwrap();
        let mut fast = registry.on_connect().unwrap();

        assert_eq!(registry.deliver(&envelope()).delivered, 2);
        assert!(fast.try_recv().is_some());

        let report = registry.deliver(&envelope());
        assert_eq!(report.delivered, 1);
        assert_eq!(report.dropped, 1);
        assert!(fast.try_recv().is_some());
        assert!(slow.try_recv().is_some());
        assert!(slow.try_recv().is_none());
    }

    #[test]
    fn test_closed_receiver_is_pruned() {
        let registry = SubscriptionRegistry::new();
        let gone = registry.on_connect().unwrap();
        let gone_id = gone.id();
        let mut alive = registry.on_connect().unwrap();
        drop(gone);

        let report = registry.deliver(&envelope());
        assert_eq!(report.delivered, 1);
        assert_eq!(report.closed, 1);
        assert!(!registry.contains(&gone_id));
        assert!(alive.try_recv().is_some());
    }
}
