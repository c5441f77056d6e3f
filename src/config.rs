//! Runtime configuration.
//!
//! Built once at startup from environment variables and passed into the
//! pipeline explicitly. Nothing below this layer reads the environment.

use std::env;
use std::time::Duration;

/// All tunables for the analysis pipeline.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Fixed alert level independent of recent statistics (ppm).
    pub hard_threshold: f64,

    /// Sigma multiplier for the dynamic threshold (`mean + k * std_dev`).
    pub sigma_multiplier: f64,

    /// Lower clamp for the dynamic threshold. Prevents a flat baseline from
    /// producing a hair-trigger alert level.
    pub min_dynamic_threshold: f64,

    /// Upper clamp for the dynamic threshold. Prevents a noisy baseline from
    /// producing a threshold that never fires.
    pub max_dynamic_threshold: f64,

    /// Probability at or above which the classifier verdict counts as a leak.
    pub prob_threshold: f64,

    /// Sequence length the external classifier was trained on.
    pub seq_len: usize,

    /// Number of recent readings used for the statistical baseline.
    pub analysis_window: usize,

    /// Base URL of the leak-classifier endpoint. None disables the classifier.
    pub classifier_url: Option<String>,

    /// Bound on a single classifier call.
    pub classifier_timeout: Duration,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            hard_threshold: 600.0,
            sigma_multiplier: 3.0,
            min_dynamic_threshold: 300.0,
            max_dynamic_threshold: 800.0,
            prob_threshold: 0.7,
            seq_len: 50,
            analysis_window: 300,
            classifier_url: None,
            classifier_timeout: Duration::from_millis(2000),
        }
    }
}

impl AnalysisConfig {
    /// Load configuration from environment variables, falling back to the
    /// defaults above for anything unset or unparseable.
    pub fn from_env() -> Self {
        let d = Self::default();

        Self {
            hard_threshold: env_f64("GAS_HARD_THRESHOLD", d.hard_threshold),
            sigma_multiplier: env_f64("AI_SIGMA_K", d.sigma_multiplier),
            min_dynamic_threshold: env_f64("AI_MIN_DYNAMIC_THRESHOLD", d.min_dynamic_threshold),
            max_dynamic_threshold: env_f64("AI_MAX_DYNAMIC_THRESHOLD", d.max_dynamic_threshold),
            prob_threshold: env_f64("AI_PROB_THRESHOLD", d.prob_threshold),
            seq_len: env_usize("AI_SEQ_LEN", d.seq_len),
            analysis_window: env_usize("ANALYSIS_WINDOW", d.analysis_window),
            classifier_url: env::var("AI_SERVICE_URL").ok().filter(|s| !s.is_empty()),
            classifier_timeout: Duration::from_millis(env_u64(
                "AI_TIMEOUT_MS",
                d.classifier_timeout.as_millis() as u64,
            )),
        }
    }

    pub fn classifier_enabled(&self) -> bool {
        self.classifier_url.is_some()
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
