//! Debounced classify-and-submit loop for one bed.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use ward_core::{BedId, Debouncer, Seriousness, SeriousnessUpdate};
use ward_protocol::Frame;
use ward_transport::{LinkHandle, RelayClient, TransportError};

use crate::classifier::Classifier;
use crate::vitals::{ClassifierRequest, Dial, Vitals};

/// Holds one relay link and replaces it once it has shut down.
///
/// Holding the handle keeps the shared socket open between submissions.
pub struct Uplink {
    client: RelayClient,
    held: Mutex<Option<LinkHandle>>,
}

impl Uplink {
    #[must_use]
    pub fn new(client: RelayClient) -> Self {
        Self {
            client,
            held: Mutex::new(None),
        }
    }

    /// Open the link now rather than on the first send.
    ///
    /// # Errors
    ///
    /// Returns an error if the relay cannot be reached.
    pub async fn connect(&self) -> Result<(), TransportError> {
        let mut held = self.held.lock().await;
        if !held.as_ref().is_some_and(LinkHandle::is_open) {
            *held = Some(self.client.acquire().await?);
        }
        Ok(())
    }

    /// Whether a live link is held.
    pub async fn is_open(&self) -> bool {
        self.held.lock().await.as_ref().is_some_and(LinkHandle::is_open)
    }

    /// Send a frame, reconnecting first if the held link has gone down.
    ///
    /// # Errors
    ///
    /// Returns an error if no link can be opened or the new link refuses the
    /// frame.
    pub async fn send(&self, frame: Frame) -> Result<(), TransportError> {
        let mut held = self.held.lock().await;
        if let Some(link) = held.as_ref().filter(|link| link.is_open()) {
            match link.send(frame.clone()).await {
                Err(TransportError::ConnectionClosed) => {}
                sent => return sent,
            }
        }

        if held.take().is_some() {
            info!(url = %self.client.config().url, "Relay link lost, reconnecting");
        }
        let link = self.client.acquire().await?;
        let sent = link.send(frame).await;
        *held = Some(link);
        sent
    }
}

/// A simulated bed: dials, a classifier and a relay link.
pub struct BedSimulator {
    bed_id: BedId,
    vitals: Vitals,
    classifier: Arc<dyn Classifier>,
    uplink: Arc<Uplink>,
    debouncer: Debouncer,
}

impl BedSimulator {
    /// Create a simulator with default vitals and the default debounce window.
    ///
    /// The relay is dialed on the first submission unless
    /// [`Uplink::connect`] is called first.
    pub fn new(bed_id: BedId, classifier: Arc<dyn Classifier>, client: RelayClient) -> Self {
        Self {
            bed_id,
            vitals: Vitals::default(),
            classifier,
            uplink: Arc::new(Uplink::new(client)),
            debouncer: Debouncer::default(),
        }
    }

    /// Use a different debounce window.
    #[must_use]
    pub fn with_window(mut self, window: Duration) -> Self {
        self.debouncer = Debouncer::new(window);
        self
    }

    pub fn bed_id(&self) -> &BedId {
        &self.bed_id
    }

    pub fn vitals(&self) -> &Vitals {
        &self.vitals
    }

    pub fn uplink(&self) -> &Uplink {
        &self.uplink
    }

    /// Turn a dial and reschedule submission. Returns the applied value.
    pub fn adjust(&mut self, dial: Dial, value: f64) -> Option<f64> {
        let applied = self.vitals.set(dial, value)?;
        debug!(bed = %self.bed_id, dial = %dial, value = applied, "Dial adjusted");
        self.schedule();
        Some(applied)
    }

    /// Schedule a classify-and-submit of the current vitals, superseding any
    /// pending one.
    pub fn schedule(&mut self) {
        let request = self.vitals.to_request();
        let classifier = Arc::clone(&self.classifier);
        let uplink = Arc::clone(&self.uplink);
        let bed_id = self.bed_id.clone();

        self.debouncer.schedule(async move {
            // Failures are logged inside; nothing to do with the outcome here
            let _ = classify_and_submit(classifier.as_ref(), &uplink, &bed_id, &request).await;
        });
    }

    /// Wait for a pending submission to finish.
    pub async fn settle(&mut self) {
        self.debouncer.wait().await;
    }
}

/// Classify `request` and, on success, send the update to the relay.
///
/// Returns the submitted level, or `None` if the cycle was skipped.
pub async fn classify_and_submit(
    classifier: &dyn Classifier,
    uplink: &Uplink,
    bed_id: &BedId,
    request: &ClassifierRequest,
) -> Option<Seriousness> {
    let seriousness = match classifier.classify(request).await {
        Ok(seriousness) => seriousness,
        Err(e) => {
            warn!(bed = %bed_id, error = %e, "Classification failed, skipping update");
            return None;
        }
    };

    let update = SeriousnessUpdate::new(bed_id.clone(), seriousness);
    if let Err(e) = uplink.send(update.to_frame()).await {
        warn!(bed = %bed_id, error = %e, "Failed to submit update");
        return None;
    }

    info!(bed = %bed_id, seriousness = %seriousness, "Submitted update");
    Some(seriousness)
}
