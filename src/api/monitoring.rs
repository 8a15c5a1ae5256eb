//! Monitoring, alert and rule endpoints.

use crate::api::{ApiError, AppState, SuccessResponse};
use crate::monitoring::{Alert, AlertRule, MetricCategory, MetricSample, MonitoringSummary};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;

/// Window used when `from` is omitted.
const DEFAULT_HISTORY_WINDOW_SECS: i64 = 3600;

#[derive(Debug, Deserialize)]
pub struct AlertsQuery {
    pub server: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// RFC 3339
    pub from: Option<DateTime<Utc>>,
    /// RFC 3339, defaults to now
    pub to: Option<DateTime<Utc>>,
}

/// GET /admin/monitoring/summary
pub async fn summary(State(state): State<Arc<AppState>>) -> Json<MonitoringSummary> {
    Json(state.fleet.monitoring().get_monitoring_summary())
}

/// GET /admin/alerts?server=
pub async fn active_alerts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AlertsQuery>,
) -> Result<Json<Vec<Alert>>, ApiError> {
    let fleet = &state.fleet;
    if let Some(server) = &query.server {
        fleet.registry().get(server)?;
    }
    Ok(Json(
        fleet.monitoring().get_active_alerts(query.server.as_deref()),
    ))
}

/// GET /admin/alerts/resolved
pub async fn resolved_alerts(State(state): State<Arc<AppState>>) -> Json<Vec<Alert>> {
    Json(state.fleet.monitoring().get_resolved_alerts())
}

/// GET /admin/rules
pub async fn list_rules(State(state): State<Arc<AppState>>) -> Json<Vec<AlertRule>> {
    Json(state.fleet.monitoring().alert_rules())
}

/// PUT /admin/rules/:name
///
/// Malformed bodies and invalid rules are both 400.
pub async fn set_rule(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    body: Result<Json<AlertRule>, JsonRejection>,
) -> Result<Json<AlertRule>, ApiError> {
    let Json(rule) = body.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    state
        .fleet
        .monitoring()
        .set_alert_rule(&name, rule.clone())?;
    Ok(Json(rule))
}

/// DELETE /admin/rules/:name
pub async fn remove_rule(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    if state.fleet.monitoring().remove_alert_rule(&name).await {
        Ok(SuccessResponse::json(true))
    } else {
        Err(ApiError::not_found(format!("Alert rule '{}' not found", name)))
    }
}

/// GET /admin/metrics/:name/:category/:metric?from=&to=
pub async fn metric_history(
    State(state): State<Arc<AppState>>,
    Path((name, category, metric)): Path<(String, String, String)>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<MetricSample>>, ApiError> {
    let category: MetricCategory = category.parse().map_err(ApiError::bad_request)?;
    let to = query.to.unwrap_or_else(Utc::now);
    let from = query
        .from
        .unwrap_or(to - chrono::Duration::seconds(DEFAULT_HISTORY_WINDOW_SECS));
    if from > to {
        return Err(ApiError::bad_request(format!(
            "'from' ({}) is after 'to' ({})",
            from.to_rfc3339(),
            to.to_rfc3339()
        )));
    }

    Ok(Json(state.fleet.monitoring().get_metric_history(
        &name, category, &metric, from, to,
    )?))
}
