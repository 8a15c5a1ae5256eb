//! Gateway health and backend probe endpoints.

use crate::api::{ApiError, AppState, SuccessResponse};
use crate::health::HealthRecord;
use crate::monitoring::MonitoringSummary;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

/// Gateway health response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_seconds: u64,
    pub servers: ServerCounts,
    pub monitoring: MonitoringSummary,
}

#[derive(Debug, Serialize)]
pub struct ServerCounts {
    pub total: usize,
    pub healthy: usize,
    pub running: usize,
}

/// GET /health
pub async fn gateway(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let fleet = &state.fleet;
    let summary = fleet.monitoring().get_monitoring_summary();

    let status = match (summary.healthy_servers, summary.total_servers) {
        (h, t) if h == t && t > 0 => "healthy",
        (h, _) if h > 0 => "degraded",
        _ => "unhealthy",
    };

    Json(HealthResponse {
        status: status.to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        servers: ServerCounts {
            total: summary.total_servers,
            healthy: summary.healthy_servers,
            running: fleet.supervisor().list_running().len(),
        },
        monitoring: summary,
    })
}

/// GET /admin/health - probe every enabled server now.
pub async fn check_all(State(state): State<Arc<AppState>>) -> Json<Vec<HealthRecord>> {
    let fleet = &state.fleet;
    let mut records = fleet.health().check_all().await;

    let ordered = fleet
        .registry()
        .enabled()
        .iter()
        .filter_map(|server| records.remove(&server.name))
        .collect();
    Json(ordered)
}

/// GET /admin/health/:name
pub async fn check_one(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<HealthRecord>, ApiError> {
    Ok(Json(state.fleet.health().check_health(&name).await?))
}

/// DELETE /admin/health/cache
pub async fn clear_all(State(state): State<Arc<AppState>>) -> Json<SuccessResponse> {
    state.fleet.health().clear_all();
    tracing::info!("Health cache cleared");
    SuccessResponse::json(true)
}

/// DELETE /admin/health/cache/:name - `success` is false when nothing was cached.
pub async fn clear_one(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let fleet = &state.fleet;
    fleet.registry().get(&name)?;
    Ok(SuccessResponse::json(fleet.health().clear_cache(&name)))
}
