//! Axum handler for the gateway's Prometheus endpoint.

use crate::api::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse};
use std::sync::Arc;

/// GET /metrics - Prometheus text exposition.
///
/// Always 200, with an empty body when nothing has been recorded yet.
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.metrics_collector.update_fleet_gauges();

    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        state.metrics_collector.render_metrics(),
    )
}
