//! Cancel-and-reschedule debouncing.
//!
//! A producer calls [`Debouncer::schedule`] on every input change; only the
//! action scheduled last runs, once the quiescence window has passed
//! without a newer change.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::trace;

/// Default quiescence window.
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(500);

/// A single-slot deferred action.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    /// Create a debouncer with the given quiescence window.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    /// The quiescence window.
    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Schedule `action` to run after the window, superseding whatever was
    /// scheduled before.
    ///
    /// A superseded action is aborted even if its window already elapsed
    /// and it is mid-flight, so a stale value is never sent after a newer
    /// one was scheduled.
    pub fn schedule<F>(&mut self, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.cancel() {
            trace!("Superseded pending action");
        }
        let window = self.window;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            action.await;
        }));
    }

    /// Cancel the pending action. Returns `true` if one was still running.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(handle) if !handle.is_finished() => {
                handle.abort();
                true
            }
            _ => false,
        }
    }

    /// Wait for the pending action, if any, to run to completion.
    pub async fn wait(&mut self) {
        if let Some(handle) = self.pending.take() {
            let _ = handle.await;
        }
    }

    /// Whether an action is scheduled and has not finished.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
