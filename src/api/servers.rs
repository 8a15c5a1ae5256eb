//! Process lifecycle endpoints.

use crate::api::{ApiError, AppState, SuccessResponse};
use crate::health::HealthStatus;
use crate::supervisor::{ProcessInfo, StartOutcome};
use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

/// One registry entry with its live state.
#[derive(Debug, Serialize)]
pub struct ServerView {
    pub name: String,
    pub url: String,
    pub model: String,
    pub enabled: bool,
    pub autostart: bool,
    pub running: bool,
    pub pid: Option<u32>,
    pub health: HealthStatus,
}

#[derive(Debug, Serialize)]
pub struct RunningResponse {
    pub servers: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub success: bool,
    pub pid: u32,
    pub already_running: bool,
}

/// GET /admin/servers
pub async fn list(State(state): State<Arc<AppState>>) -> Json<Vec<ServerView>> {
    let fleet = &state.fleet;
    let views = fleet
        .registry()
        .all()
        .iter()
        .map(|server| ServerView {
            name: server.name.clone(),
            url: server.base_url(),
            model: server.model.clone(),
            enabled: server.enabled,
            autostart: server.autostart,
            running: fleet.supervisor().is_running(&server.name),
            pid: fleet.supervisor().pid(&server.name),
            health: fleet.health().status(&server.name),
        })
        .collect();
    Json(views)
}

/// GET /admin/servers/running
pub async fn running(State(state): State<Arc<AppState>>) -> Json<RunningResponse> {
    Json(RunningResponse {
        servers: state.fleet.supervisor().list_running(),
    })
}

/// POST /admin/servers/:name/start
pub async fn start(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<StartResponse>, ApiError> {
    let outcome = state.fleet.supervisor().start(&name).await?;
    Ok(Json(StartResponse {
        success: true,
        pid: outcome.pid(),
        already_running: matches!(outcome, StartOutcome::AlreadyRunning { .. }),
    }))
}

/// POST /admin/servers/:name/stop
pub async fn stop(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    Ok(SuccessResponse::json(
        state.fleet.supervisor().stop(&name).await?,
    ))
}

/// POST /admin/servers/stop-all
pub async fn stop_all(State(state): State<Arc<AppState>>) -> Json<SuccessResponse> {
    SuccessResponse::json(state.fleet.supervisor().stop_all().await)
}

/// GET /admin/servers/:name/process
pub async fn process(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<ProcessInfo>, ApiError> {
    Ok(Json(state.fleet.supervisor().get_process_info(&name)?))
}
