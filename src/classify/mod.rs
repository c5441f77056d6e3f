//! Leak classifier client.
//!
//! The sequence model itself lives behind an external inference endpoint;
//! this module only ships windows to it and parses the verdict. The trait
//! seam keeps the fuser and incident tracker testable without a network.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// One feature row fed to the sequence model: [value, raw_signal].
pub type FeatureRow = [f64; 2];

/// Verdict returned by the inference endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierResult {
    /// Probability of a leak, in [0, 1].
    pub prob_leak: f64,
    /// 1 = leak, 0 = normal.
    pub label: u8,
}

impl ClassifierResult {
    pub fn is_leak(&self) -> bool {
        self.label == 1
    }
}

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("classifier endpoint returned status {0}")]
    BadStatus(u16),
    #[error("classifier transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed classifier payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Narrow seam over the inference endpoint. Errors mean "unavailable";
/// callers degrade to threshold-only fusing and never propagate them.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, window: &[FeatureRow]) -> Result<ClassifierResult, ClassifyError>;
}

/// HTTP client for the leak-classifier service.
pub struct HttpLeakClassifier {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct WindowRequest<'a> {
    window: &'a [FeatureRow],
}

impl HttpLeakClassifier {
    /// Build a client with a bounded per-call timeout. A timeout is treated
    /// like any other transport failure by the caller.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Classifier for HttpLeakClassifier {
    async fn classify(&self, window: &[FeatureRow]) -> Result<ClassifierResult, ClassifyError> {
        let url = format!("{}/predict-window", self.base_url);

        let resp = self
            .client
            .post(&url)
            .json(&WindowRequest { window })
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ClassifyError::BadStatus(resp.status().as_u16()));
        }

        let body = resp.text().await?;
        let result: ClassifierResult = serde_json::from_str(&body)?;
        Ok(result)
    }
}
