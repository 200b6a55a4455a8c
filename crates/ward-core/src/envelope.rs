//! Envelopes carried from the hub to subscriber queues.

use crate::registry::SubscriberId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use ward_protocol::Frame;

/// A unique envelope identifier.
pub type EnvelopeId = u64;

static ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generate a unique envelope ID.
#[must_use]
pub fn generate_envelope_id() -> EnvelopeId {
    ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// One broadcast, shared by every subscriber queue it lands in.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Unique envelope identifier.
    pub id: EnvelopeId,
    /// Connection the payload came from, if any.
    pub source: Option<SubscriberId>,
    /// The frame to deliver.
    pub frame: Frame,
    /// Milliseconds since the Unix epoch when the hub accepted it.
    pub timestamp: u64,
}

impl Envelope {
    /// Create a new envelope.
    #[must_use]
    pub fn new(frame: Frame) -> Self {
        Self {
            id: generate_envelope_id(),
            source: None,
            frame,
            timestamp: now_millis(),
        }
    }

    /// Record the originating connection.
    #[must_use]
    pub fn with_source(mut self, source: Option<SubscriberId>) -> Self {
        self.source = source;
        self
    }

    /// The event name of the carried frame.
    #[must_use]
    pub fn event(&self) -> &'static str {
        self.frame.event_name()
    }
}
