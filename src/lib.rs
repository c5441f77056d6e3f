//! Gaswarden -- appliance-grade gas-leak monitoring.
//!
//! This crate provides the analysis-and-incident-tracking pipeline: dynamic
//! threshold estimation over recent readings, fusion of threshold crossings
//! with an external sequence classifier into a discrete system status, and
//! the incident state machine that turns per-sample statuses into a durable
//! leak-event log.

pub mod analysis;
pub mod api;
pub mod classify;
pub mod config;
pub mod detect;
pub mod simulate;
pub mod storage;

use crate::analysis::AnalysisEngine;
use crate::classify::{Classifier, HttpLeakClassifier};
use crate::config::AnalysisConfig;
use crate::detect::incident::IncidentTracker;
use anyhow::{Context, Result};
use std::sync::Arc;

/// Wire up storage, config, classifier, and tracker into an engine.
pub fn build_engine(pool: storage::Pool, config: AnalysisConfig) -> Result<Arc<AnalysisEngine>> {
    let classifier: Option<Arc<dyn Classifier>> = match &config.classifier_url {
        Some(url) => {
            tracing::info!(%url, "Leak classifier enabled");
            Some(Arc::new(HttpLeakClassifier::new(
                url,
                config.classifier_timeout,
            )?))
        }
        None => {
            tracing::info!("No classifier endpoint configured; threshold-only monitoring");
            None
        }
    };

    let tracker = Arc::new(IncidentTracker::new(pool.clone()));
    Ok(Arc::new(AnalysisEngine::new(
        pool, config, classifier, tracker,
    )))
}

/// Start the gaswarden daemon: storage, analysis engine, and API server.
pub async fn serve(bind: &str, db_path: &str) -> Result<()> {
    tracing::info!(%db_path, "Initializing database");
    let pool = storage::open_pool(db_path)?;

    let config = AnalysisConfig::from_env();
    tracing::info!(
        hard_threshold = config.hard_threshold,
        seq_len = config.seq_len,
        analysis_window = config.analysis_window,
        "Analysis configuration loaded"
    );

    let engine = build_engine(pool.clone(), config)?;
    let state = api::state::AppState {
        pool,
        tracker: engine.tracker(),
        engine,
    };
    let app = api::router(state);

    let addr: std::net::SocketAddr = bind.parse().context("invalid bind address")?;
    tracing::info!(%addr, "Gaswarden listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
