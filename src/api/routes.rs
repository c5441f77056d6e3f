//! API route definitions.

use crate::api::state::AppState;
use crate::storage;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/readings", post(create_reading))
        .route("/readings/latest", get(latest_readings))
        .route("/readings/current", get(current_reading))
        .route("/analysis", get(run_analysis))
        .route("/incidents", get(list_incidents))
        .route("/incidents/summary", get(incident_summary))
}

type ApiError = (StatusCode, Json<Value>);

fn bad_request(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "message": message })))
}

fn internal_error(e: anyhow::Error) -> ApiError {
    error!("API error: {e:#}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "message": "server error" })),
    )
}

async fn health() -> Json<Value> {
    Json(json!({
        "data": {
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION")
        },
        "meta": {
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "version": env!("CARGO_PKG_VERSION")
        }
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateReading {
    device_id: Option<String>,
    value: Option<f64>,
    raw_signal: Option<f64>,
}

/// Device firmware posts one sample per tick.
async fn create_reading(
    State(state): State<AppState>,
    Json(body): Json<CreateReading>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    // Validation happens here at the boundary; the core never sees malformed input.
    let device_id = match body.device_id.as_deref() {
        Some(id) if !id.is_empty() => id,
        _ => return Err(bad_request("missing deviceId")),
    };
    let value = match body.value {
        Some(v) if v.is_finite() => v,
        _ => return Err(bad_request("value must be a finite number")),
    };

    let reading = storage::save_reading(&state.pool, device_id, value, body.raw_signal)
        .map_err(internal_error)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "data": reading, "meta": { "message": "reading recorded" } })),
    ))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryQuery {
    device_id: Option<String>,
    limit: Option<usize>,
}

/// Newest readings in ascending time order, for charting.
async fn latest_readings(
    State(state): State<AppState>,
    Query(q): Query<HistoryQuery>,
) -> Result<Json<Value>, ApiError> {
    let limit = q.limit.unwrap_or(500).min(5000);
    let history = storage::recent_window(&state.pool, q.device_id.as_deref(), limit)
        .map_err(internal_error)?;

    Ok(Json(json!({
        "data": history,
        "meta": { "total": history.len() }
    })))
}

/// Newest single reading, for the live gauge.
async fn current_reading(
    State(state): State<AppState>,
    Query(q): Query<HistoryQuery>,
) -> Result<Json<Value>, ApiError> {
    let reading =
        storage::latest_reading(&state.pool, q.device_id.as_deref()).map_err(internal_error)?;

    Ok(Json(json!({ "data": reading })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalysisQuery {
    device_id: Option<String>,
}

/// One full evaluation: baseline, classifier, fused status, incident update.
async fn run_analysis(
    State(state): State<AppState>,
    Query(q): Query<AnalysisQuery>,
) -> Result<Json<Value>, ApiError> {
    let device_id = match q.device_id.as_deref() {
        Some(id) if !id.is_empty() => id,
        _ => return Err(bad_request("missing deviceId")),
    };

    let report = state
        .engine
        .run_analysis(device_id)
        .await
        .map_err(internal_error)?;

    Ok(Json(json!({ "data": report })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IncidentsQuery {
    device_id: Option<String>,
    limit: Option<usize>,
}

async fn list_incidents(
    State(state): State<AppState>,
    Query(q): Query<IncidentsQuery>,
) -> Result<Json<Value>, ApiError> {
    let limit = q.limit.unwrap_or(50).min(500);
    let incidents = state
        .tracker
        .list_recent(q.device_id.as_deref(), limit)
        .map_err(internal_error)?;

    Ok(Json(json!({
        "data": incidents,
        "meta": { "total": incidents.len() }
    })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryQuery {
    device_id: Option<String>,
    hours: Option<i64>,
}

/// Rollup for the dashboard: counts, peak, and the rows in the window.
async fn incident_summary(
    State(state): State<AppState>,
    Query(q): Query<SummaryQuery>,
) -> Result<Json<Value>, ApiError> {
    let device_id = match q.device_id.as_deref() {
        Some(id) if !id.is_empty() => id,
        _ => return Err(bad_request("missing deviceId")),
    };
    let hours = q.hours.unwrap_or(24).clamp(1, 24 * 30);

    let summary = state
        .tracker
        .summary(device_id, hours)
        .map_err(internal_error)?;

    Ok(Json(json!({ "data": summary })))
}
