//! The per-request analysis pipeline:
//! read window -> baseline -> classify -> fuse -> incident update.

use crate::analysis::baseline::{dynamic_threshold, Baseline};
use crate::classify::{Classifier, ClassifierResult, FeatureRow};
use crate::config::AnalysisConfig;
use crate::detect::fuser::{fuse, ClassifierOutcome};
use crate::detect::incident::{Incident, IncidentTracker};
use crate::detect::SystemStatus;
use crate::storage::{self, Pool};
use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

/// Everything one analysis call produces.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub device_id: String,
    /// Readings in the analysis window.
    pub count: usize,
    pub baseline: Baseline,
    pub dynamic_threshold: f64,
    pub hard_threshold: f64,
    pub seq_len: usize,
    pub last_value: Option<f64>,
    pub classifier: Option<ClassifierResult>,
    pub system: SystemStatus,
    /// Incident opened, extended, or closed by this evaluation.
    pub incident: Option<Incident>,
}

pub struct AnalysisEngine {
    pool: Pool,
    config: AnalysisConfig,
    classifier: Option<Arc<dyn Classifier>>,
    tracker: Arc<IncidentTracker>,
}

impl AnalysisEngine {
    pub fn new(
        pool: Pool,
        config: AnalysisConfig,
        classifier: Option<Arc<dyn Classifier>>,
        tracker: Arc<IncidentTracker>,
    ) -> Self {
        Self {
            pool,
            config,
            classifier,
            tracker,
        }
    }

    pub fn tracker(&self) -> Arc<IncidentTracker> {
        self.tracker.clone()
    }

    /// Run one evaluation for a device.
    ///
    /// Evaluations for different devices are independent; evaluations for the
    /// same device serialize their incident mutation inside the tracker.
    pub async fn run_analysis(&self, device_id: &str) -> Result<AnalysisReport> {
        let cfg = &self.config;

        let pool = self.pool.clone();
        let dev = device_id.to_string();
        let window_size = cfg.analysis_window;
        let window = tokio::task::spawn_blocking(move || {
            storage::recent_window(&pool, Some(dev.as_str()), window_size)
        })
        .await
        .context("window query task panicked")??;

        let values: Vec<f64> = window.iter().map(|r| r.value).collect();
        let baseline = Baseline::from_values(&values);
        let dynamic = dynamic_threshold(&baseline, cfg);

        let Some(last) = window.last() else {
            // Nothing ingested yet. Report NO_DATA and leave incidents alone:
            // there is no sample to attribute to one.
            let system = fuse(
                0.0,
                dynamic,
                cfg.hard_threshold,
                cfg.prob_threshold,
                &ClassifierOutcome::InsufficientData {
                    needed: cfg.seq_len,
                },
            );
            return Ok(AnalysisReport {
                device_id: device_id.to_string(),
                count: 0,
                baseline,
                dynamic_threshold: dynamic,
                hard_threshold: cfg.hard_threshold,
                seq_len: cfg.seq_len,
                last_value: None,
                classifier: None,
                system,
                incident: None,
            });
        };
        let last_value = last.value;

        let outcome = self.classify_window(&window).await;
        let system = fuse(
            last_value,
            dynamic,
            cfg.hard_threshold,
            cfg.prob_threshold,
            &outcome,
        );

        let probability = outcome.result().map(|r| r.prob_leak);

        // Incident tracking is a side effect of the analysis, not its
        // deliverable. A persistence failure here must not fail the call.
        let incident = match self
            .tracker
            .observe(device_id, &system, last_value, probability)
            .await
        {
            Ok(touched) => touched,
            Err(e) => {
                warn!(device=%device_id, "Incident update failed: {e:#}");
                None
            }
        };

        Ok(AnalysisReport {
            device_id: device_id.to_string(),
            count: window.len(),
            baseline,
            dynamic_threshold: dynamic,
            hard_threshold: cfg.hard_threshold,
            seq_len: cfg.seq_len,
            last_value: Some(last_value),
            classifier: outcome.result().cloned(),
            system,
            incident,
        })
    }

    /// One classifier attempt per analysis call, no inline retry.
    async fn classify_window(&self, window: &[storage::Reading]) -> ClassifierOutcome {
        let cfg = &self.config;

        if window.len() < cfg.seq_len {
            return ClassifierOutcome::InsufficientData {
                needed: cfg.seq_len,
            };
        }

        let Some(classifier) = &self.classifier else {
            return ClassifierOutcome::Disabled;
        };

        let features: Vec<FeatureRow> = window[window.len() - cfg.seq_len..]
            .iter()
            .map(|r| [r.value, r.raw_signal.unwrap_or(0.0)])
            .collect();

        match classifier.classify(&features).await {
            Ok(result) => ClassifierOutcome::Scored(result),
            Err(e) => {
                warn!("Classifier unavailable: {e}");
                ClassifierOutcome::Unavailable
            }
        }
    }
}
