//! Status fusion and incident tracking.

pub mod fuser;
pub mod incident;

use serde::{Deserialize, Serialize};

/// Severity levels, ordered so an open incident can only escalate.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Info,
    Ok,
    Warning,
    Danger,
}

impl Severity {
    /// WARNING and DANGER statuses open or extend incidents; the rest close them.
    pub fn is_bad(self) -> bool {
        matches!(self, Severity::Warning | Severity::Danger)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Ok => "OK",
            Severity::Warning => "WARNING",
            Severity::Danger => "DANGER",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "DANGER" => Severity::Danger,
            "WARNING" => Severity::Warning,
            "OK" => Severity::Ok,
            _ => Severity::Info,
        }
    }
}

/// Discrete system states produced by the status fuser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusMode {
    NoData,
    NoAi,
    Normal,
    HighGas,
    EarlyWarning,
    LeakConfirmed,
}

impl StatusMode {
    pub fn as_str(self) -> &'static str {
        match self {
            StatusMode::NoData => "NO_DATA",
            StatusMode::NoAi => "NO_AI",
            StatusMode::Normal => "NORMAL",
            StatusMode::HighGas => "HIGH_GAS",
            StatusMode::EarlyWarning => "EARLY_WARNING",
            StatusMode::LeakConfirmed => "LEAK_CONFIRMED",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "NO_AI" => StatusMode::NoAi,
            "NORMAL" => StatusMode::Normal,
            "HIGH_GAS" => StatusMode::HighGas,
            "EARLY_WARNING" => StatusMode::EarlyWarning,
            "LEAK_CONFIRMED" => StatusMode::LeakConfirmed,
            _ => StatusMode::NoData,
        }
    }
}

/// Fused per-evaluation verdict. Recomputed on every analysis call,
/// never persisted on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStatus {
    pub mode: StatusMode,
    pub severity: Severity,
    pub message: String,
}
