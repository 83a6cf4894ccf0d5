//! HTTP request handlers: scrape endpoint, raw report and refresh API.

use axum::body::Body;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use prometheus::{Encoder, TextEncoder};
use tracing::error;

use fbstat_core::MonitorError;
use fbstat_core::api::status::{ApiError, ApiRefresh, ApiStatus, ApiWalkSummary};

use crate::background::refresh;
use crate::state::AppState;

// ============================================================
// Health
// ============================================================

#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses(
        (status = 200, description = "Service is healthy", body = String)
    )
)]
pub(crate) async fn handle_health() -> &'static str {
    "ok"
}

// ============================================================
// Prometheus scrape
// ============================================================

#[utoipa::path(
    get,
    path = "/metrics",
    responses(
        (status = 200, description = "Published gauges in Prometheus text format", body = String)
    )
)]
pub(crate) async fn handle_metrics(State(state): AppState) -> Result<Response, StatusCode> {
    let body = state.registry.render().map_err(|e| {
        error!(error = %e, "failed to encode metrics");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(text_response(TextEncoder::new().format_type(), body))
}

// ============================================================
// Raw report
// ============================================================

#[utoipa::path(
    get,
    path = "/api/v1/metrics/database",
    responses(
        (status = 200, description = "Most recently fetched gstat report, verbatim", body = String),
        (status = 503, description = "No report fetched yet")
    )
)]
pub(crate) async fn handle_database_report(State(state): AppState) -> Result<Response, StatusCode> {
    let report = state
        .monitor
        .fetch_metrics_snapshot()
        .ok_or(StatusCode::SERVICE_UNAVAILABLE)?;
    Ok(text_response("text/plain; charset=utf-8", report))
}

#[utoipa::path(
    put,
    path = "/api/v1/metrics/database",
    responses(
        (status = 200, description = "Report fetched and published", body = ApiWalkSummary),
        (status = 422, description = "Report walk aborted; values read before the failure are published", body = ApiError),
        (status = 502, description = "Report could not be fetched", body = ApiError)
    )
)]
pub(crate) async fn handle_refresh(State(state): AppState) -> Response {
    let result = tokio::task::spawn_blocking(move || refresh(&state)).await;
    match result {
        Ok(Ok(summary)) => Json(ApiWalkSummary::from(&summary)).into_response(),
        Ok(Err(e)) => {
            let status = match e {
                MonitorError::Fetch(_) => StatusCode::BAD_GATEWAY,
                MonitorError::Report(_) => StatusCode::UNPROCESSABLE_ENTITY,
            };
            (status, Json(ApiError { error: e.to_string() })).into_response()
        }
        Err(e) => {
            error!(error = %e, "refresh panicked in spawn_blocking");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

// ============================================================
// Status
// ============================================================

#[utoipa::path(
    get,
    path = "/api/v1/status",
    responses(
        (status = 200, description = "Monitored database and last refresh", body = ApiStatus)
    )
)]
pub(crate) async fn handle_status(State(state): AppState) -> Json<ApiStatus> {
    Json(ApiStatus {
        database: state.source.database().to_string(),
        interval_secs: state.interval.as_secs(),
        gauges: state.registry.len(),
        values: state.monitor.store().len(),
        last_refresh: state.monitor.last_refresh().as_ref().map(ApiRefresh::from),
    })
}

fn text_response(content_type: &str, body: String) -> Response {
    ([(header::CONTENT_TYPE, content_type.to_string())], Body::from(body)).into_response()
}
