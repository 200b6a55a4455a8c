//! Remote seriousness classification.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use ward_core::Seriousness;

use crate::vitals::ClassifierRequest;

/// Response field carrying the score.
pub const FIELD_SERIOUSNESS: &str = "Seriousness";

/// Classification failures. Each one skips the update cycle.
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("Classifier request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Classifier returned status {0}")]
    Status(StatusCode),

    #[error("Classifier response has no Seriousness field")]
    MissingScore,

    #[error("Classifier score out of range: {0}")]
    InvalidScore(Value),
}

/// Turns vitals into a seriousness level.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify one set of vitals.
    async fn classify(&self, request: &ClassifierRequest) -> Result<Seriousness, ClassifyError>;
}

/// Classifier backed by an HTTP endpoint.
pub struct HttpClassifier {
    client: Client,
    url: String,
}

impl HttpClassifier {
    /// Create a classifier posting to `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ClassifyError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Endpoint URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(&self, request: &ClassifierRequest) -> Result<Seriousness, ClassifyError> {
        let response = self.client.post(&self.url).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClassifyError::Status(status));
        }

        let body: Value = response.json().await?;
        debug!(url = %self.url, body = %body, "Classifier responded");
        score_from(&body)
    }
}

fn score_from(body: &Value) -> Result<Seriousness, ClassifyError> {
    let raw = body.get(FIELD_SERIOUSNESS).ok_or(ClassifyError::MissingScore)?;
    Seriousness::from_value(raw).ok_or_else(|| ClassifyError::InvalidScore(raw.clone()))
}
