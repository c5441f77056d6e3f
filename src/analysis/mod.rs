//! Statistical baseline and the per-request analysis pipeline.

pub mod baseline;
pub mod runner;

pub use baseline::{dynamic_threshold, Baseline};
pub use runner::{AnalysisEngine, AnalysisReport};
