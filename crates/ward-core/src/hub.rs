//! The relay hub.
//!
//! The hub keeps no history. Each ingested payload is wrapped once and
//! pushed to whoever is connected at that moment.

use crate::envelope::Envelope;
use crate::registry::{
    BroadcastReport, RegistryConfig, SubscriberId, Subscription, SubscriptionRegistry,
};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, trace};
use ward_protocol::Frame;

/// Hub errors.
#[derive(Debug, Error)]
pub enum HubError {
    /// The subscriber limit was reached.
    #[error("Too many subscribers (limit: {0})")]
    TooManySubscribers(usize),
}

/// Fan-out broadcaster shared by every connection task.
pub struct RelayHub {
    registry: SubscriptionRegistry,
    ingested: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl RelayHub {
    /// Create a hub with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a hub with custom registry configuration.
    #[must_use]
    pub fn with_config(config: RegistryConfig) -> Self {
        info!("Creating relay hub with config: {:?}", config);
        Self {
            registry: SubscriptionRegistry::with_config(config),
            ingested: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Register a new connection as a subscriber.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscriber limit is reached.
    pub fn connect(&self) -> Result<Subscription, HubError> {
        self.registry.on_connect()
    }

    /// Unregister a connection. Returns `true` if it was registered.
    pub fn disconnect(&self, id: &SubscriberId) -> bool {
        self.registry.on_disconnect(id)
    }

    /// Accept an `update_seriousness` payload and fan it out as
    /// `dashboard_update`.
    ///
    /// The payload is forwarded as-is; nothing here validates it.
    pub fn ingest(&self, source: Option<SubscriberId>, payload: Value) -> BroadcastReport {
        self.ingested.fetch_add(1, Ordering::Relaxed);
        let report = self.broadcast(Frame::dashboard_update(payload), source);
        trace!(
            source = ?source.map(|s| s.to_string()),
            delivered = report.delivered,
            dropped = report.dropped,
            "Ingested update"
        );
        report
    }

    /// Deliver a frame to every currently connected subscriber.
    pub fn broadcast(&self, frame: Frame, source: Option<SubscriberId>) -> BroadcastReport {
        let envelope = Arc::new(Envelope::new(frame).with_source(source));
        let report = self.registry.deliver(&envelope);

        self.delivered
            .fetch_add(report.delivered as u64, Ordering::Relaxed);
        self.dropped
            .fetch_add(report.dropped as u64, Ordering::Relaxed);

        trace!(
            envelope = envelope.id,
            event = envelope.event(),
            recipients = report.delivered,
            "Broadcast"
        );
        report
    }

    /// Access the underlying registry.
    #[must_use]
    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    /// Get hub statistics.
    #[must_use]
    pub fn stats(&self) -> HubStats {
        HubStats {
            subscribers: self.registry.len(),
            ingested: self.ingested.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

impl Default for RelayHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Hub statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubStats {
    /// Currently connected subscribers.
    pub subscribers: usize,
    /// Payloads accepted through [`RelayHub::ingest`].
    pub ingested: u64,
    /// Successful queue pushes across all broadcasts.
    pub delivered: u64,
    /// Queue pushes skipped because a queue was full.
    pub dropped: u64,
}
