//! Status fuser: combines the last sample, the dynamic threshold, and the
//! classifier verdict into one discrete system state.

use crate::classify::ClassifierResult;
use crate::detect::{Severity, StatusMode, SystemStatus};

/// What the classifier stage produced for this evaluation.
#[derive(Debug, Clone)]
pub enum ClassifierOutcome {
    /// Fewer readings than the classifier's sequence length.
    InsufficientData { needed: usize },
    /// No endpoint configured.
    Disabled,
    /// Endpoint configured and called, but the call failed or timed out.
    /// Fusing degrades to threshold-only.
    Unavailable,
    Scored(ClassifierResult),
}

impl ClassifierOutcome {
    pub fn result(&self) -> Option<&ClassifierResult> {
        match self {
            ClassifierOutcome::Scored(r) => Some(r),
            _ => None,
        }
    }
}

/// Derive the system status for one evaluation. First match wins.
///
/// Classifier-confirmed leaks outrank plain threshold crossings, but a
/// crossing is still reported when the classifier disagrees or is down --
/// a concentration spike is never silently downgraded.
pub fn fuse(
    last_value: f64,
    dynamic_threshold: f64,
    hard_threshold: f64,
    prob_threshold: f64,
    outcome: &ClassifierOutcome,
) -> SystemStatus {
    let over_dynamic = last_value >= dynamic_threshold;
    let over_hard = last_value >= hard_threshold;

    match outcome {
        ClassifierOutcome::InsufficientData { needed } => SystemStatus {
            mode: StatusMode::NoData,
            severity: Severity::Info,
            message: format!(
                "Not enough data for analysis (need at least {needed} consecutive samples)."
            ),
        },
        ClassifierOutcome::Disabled => SystemStatus {
            mode: StatusMode::NoAi,
            severity: Severity::Info,
            message: "Classifier not engaged; threshold-only monitoring active.".to_string(),
        },
        ClassifierOutcome::Scored(r)
            if r.prob_leak >= prob_threshold && r.is_leak() && over_dynamic =>
        {
            SystemStatus {
                mode: StatusMode::LeakConfirmed,
                severity: Severity::Danger,
                message: "Classifier and dynamic threshold both indicate a likely leak. \
                          Inspect and ventilate immediately."
                    .to_string(),
            }
        }
        ClassifierOutcome::Scored(r) if r.prob_leak >= prob_threshold && r.is_leak() => {
            SystemStatus {
                mode: StatusMode::EarlyWarning,
                severity: Severity::Warning,
                message: "Classifier recognizes a leak-like pattern while concentration \
                          is still low. Keep monitoring."
                    .to_string(),
            }
        }
        _ if over_dynamic || over_hard => SystemStatus {
            mode: StatusMode::HighGas,
            severity: Severity::Warning,
            message: "Gas concentration exceeds the alert threshold but the classifier \
                      has not confirmed a leak."
                .to_string(),
        },
        _ => SystemStatus {
            mode: StatusMode::Normal,
            severity: Severity::Ok,
            message: "Concentration is low and no leak pattern detected.".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(prob: f64, label: u8) -> ClassifierOutcome {
        ClassifierOutcome::Scored(ClassifierResult {
            prob_leak: prob,
            label,
        })
    }

    #[test]
    fn test_no_data_beats_everything() {
        // Even an extreme value reports NO_DATA while the window is short.
        let s = fuse(
            9999.0,
            400.0,
            600.0,
            0.7,
            &ClassifierOutcome::InsufficientData { needed: 50 },
        );
        assert_eq!(s.mode, StatusMode::NoData);
        assert_eq!(s.severity, Severity::Info);
    }

    #[test]
    fn test_disabled_reports_no_ai() {
        let s = fuse(100.0, 400.0, 600.0, 0.7, &ClassifierOutcome::Disabled);
        assert_eq!(s.mode, StatusMode::NoAi);
        assert_eq!(s.severity, Severity::Info);
    }

    #[test]
    fn test_leak_confirmed_regardless_of_hard_threshold() {
        // Over the dynamic threshold with a confident leak verdict is always
        // LEAK_CONFIRMED, even with the hard threshold far above the value.
        let s = fuse(450.0, 400.0, 100000.0, 0.7, &scored(0.92, 1));
        assert_eq!(s.mode, StatusMode::LeakConfirmed);
        assert_eq!(s.severity, Severity::Danger);
    }

    #[test]
    fn test_early_warning_below_dynamic_threshold() {
        let s = fuse(150.0, 400.0, 600.0, 0.7, &scored(0.92, 1));
        assert_eq!(s.mode, StatusMode::EarlyWarning);
        assert_eq!(s.severity, Severity::Warning);
    }

    #[test]
    fn test_high_gas_when_classifier_unsure() {
        // Probability high but label=0: not a leak verdict, crossing still reported.
        let s = fuse(450.0, 400.0, 600.0, 0.7, &scored(0.9, 0));
        assert_eq!(s.mode, StatusMode::HighGas);

        // Low probability, over the hard threshold only.
        let s = fuse(650.0, 700.0, 600.0, 0.7, &scored(0.1, 0));
        assert_eq!(s.mode, StatusMode::HighGas);
        assert_eq!(s.severity, Severity::Warning);
    }

    #[test]
    fn test_unavailable_degrades_to_threshold_only() {
        let s = fuse(450.0, 400.0, 600.0, 0.7, &ClassifierOutcome::Unavailable);
        assert_eq!(s.mode, StatusMode::HighGas);

        let s = fuse(100.0, 400.0, 600.0, 0.7, &ClassifierOutcome::Unavailable);
        assert_eq!(s.mode, StatusMode::Normal);
        assert_eq!(s.severity, Severity::Ok);
    }

    #[test]
    fn test_threshold_comparisons_are_inclusive() {
        // Exactly at the probability threshold and exactly at the dynamic
        // threshold both count.
        let s = fuse(400.0, 400.0, 600.0, 0.7, &scored(0.7, 1));
        assert_eq!(s.mode, StatusMode::LeakConfirmed);
    }

    #[test]
    fn test_normal_when_quiet() {
        let s = fuse(100.0, 400.0, 600.0, 0.7, &scored(0.05, 0));
        assert_eq!(s.mode, StatusMode::Normal);
        assert_eq!(s.severity, Severity::Ok);
    }
}
