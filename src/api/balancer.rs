//! Server selection and load balancer endpoints.

use crate::api::{ApiError, AppState, SuccessResponse};
use crate::routing::{LoadBalancerStatus, RoutingStrategy, Selection, ServerStatistics};
use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct RouteRequest {
    pub model: String,
    /// Any strategy name; `round-robin` and `round_robin` both parse
    pub strategy: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CompleteRequest {
    pub latency_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct CompleteResponse {
    pub server: String,
    pub in_flight: u32,
}

/// POST /admin/route
pub async fn route(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RouteRequest>,
) -> Result<Json<Selection>, ApiError> {
    let balancer = state.fleet.balancer();
    let strategy = match request.strategy.as_deref() {
        Some(name) => name.parse::<RoutingStrategy>().map_err(ApiError::bad_request)?,
        None => balancer.default_strategy(),
    };

    Ok(Json(balancer.select_server(&request.model, strategy)?))
}

/// POST /admin/route/:name/complete - body optional.
pub async fn complete(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    body: Option<Json<CompleteRequest>>,
) -> Result<Json<CompleteResponse>, ApiError> {
    let fleet = &state.fleet;
    fleet.registry().get(&name)?;

    let request = body.map(|Json(request)| request).unwrap_or_default();
    let in_flight = match request.latency_ms {
        Some(ms) => fleet
            .balancer()
            .complete_request_with_latency(&name, Duration::from_millis(ms)),
        None => fleet.balancer().complete_request(&name),
    };

    Ok(Json(CompleteResponse {
        server: name,
        in_flight,
    }))
}

/// GET /admin/balancer
pub async fn status(State(state): State<Arc<AppState>>) -> Json<LoadBalancerStatus> {
    Json(state.fleet.balancer().get_status())
}

/// GET /admin/balancer/:name
pub async fn statistics(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<ServerStatistics>, ApiError> {
    Ok(Json(state.fleet.balancer().get_server_statistics(&name)?))
}

/// POST /admin/balancer/reset
pub async fn reset(State(state): State<Arc<AppState>>) -> Json<SuccessResponse> {
    state.fleet.balancer().reset();
    tracing::info!("Load balancer counters reset");
    SuccessResponse::json(true)
}
