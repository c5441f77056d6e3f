//! Baseline estimation over a bounded window of recent readings.

use crate::config::AnalysisConfig;
use serde::{Deserialize, Serialize};

/// Mean / standard deviation of the recent window. "Normal" behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Baseline {
    pub mean: f64,
    pub std_dev: f64,
    pub sample_count: u64,
}

impl Default for Baseline {
    fn default() -> Self {
        Self {
            mean: 0.0,
            std_dev: 0.0,
            sample_count: 0,
        }
    }
}

impl Baseline {
    /// Compute over the window's concentration values. An empty window yields
    /// the zero baseline; insufficient data is the caller's state to report,
    /// never a division by zero here.
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }

        let count = values.len() as u64;
        let sum: f64 = values.iter().sum();
        let mean = sum / count as f64;

        // Population variance: the thresholds were tuned against /N, not /N-1.
        let variance_sum: f64 = values
            .iter()
            .map(|v| {
                let diff = mean - *v;
                diff * diff
            })
            .sum();
        let std_dev = (variance_sum / count as f64).sqrt();

        Self {
            mean,
            std_dev,
            sample_count: count,
        }
    }
}

/// Derive the adaptive alert level: `mean + k * sigma`, clamped.
///
/// A non-finite result (empty window, pathological input) falls back to the
/// configured hard threshold before clamping, so the returned value is always
/// inside `[min_dynamic_threshold, max_dynamic_threshold]`.
pub fn dynamic_threshold(baseline: &Baseline, cfg: &AnalysisConfig) -> f64 {
    let raw = baseline.mean + cfg.sigma_multiplier * baseline.std_dev;
    let raw = if raw.is_finite() { raw } else { cfg.hard_threshold };
    raw.clamp(cfg.min_dynamic_threshold, cfg.max_dynamic_threshold)
}
