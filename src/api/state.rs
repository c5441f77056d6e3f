use crate::analysis::AnalysisEngine;
use crate::detect::incident::IncidentTracker;
use crate::storage::Pool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: Pool,
    pub engine: Arc<AnalysisEngine>,
    pub tracker: Arc<IncidentTracker>,
}
