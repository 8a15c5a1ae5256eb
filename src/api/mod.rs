//! # Admin API
//!
//! JSON endpoints over the fleet controller, plus the gateway's own health
//! and Prometheus endpoints.
//!
//! ## Endpoints
//!
//! - `GET /health` - Gateway liveness and monitoring summary
//! - `GET /metrics` - Prometheus text format
//! - `/admin/servers/...` - Process lifecycle
//! - `/admin/health/...` - Probe results and cache control
//! - `/admin/route`, `/admin/balancer/...` - Server selection and load figures
//! - `/admin/monitoring/summary`, `/admin/alerts`, `/admin/rules/...`,
//!   `/admin/metrics/...` - Monitoring and alerting
//!
//! ## Example
//!
//! ```no_run
//! use fleetgate::api::{create_router, AppState};
//! use fleetgate::config::FleetConfig;
//! use fleetgate::fleet::FleetController;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fleet = Arc::new(FleetController::new(FleetConfig::default())?);
//! let state = Arc::new(AppState::new(fleet));
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! All errors use one envelope:
//! ```json
//! {
//!   "error": {
//!     "message": "Server 'ghost' not found",
//!     "type": "invalid_request_error",
//!     "code": "server_not_found"
//!   }
//! }
//! ```

mod balancer;
pub mod error;
mod health;
mod monitoring;
mod servers;

pub use error::{ApiError, ApiErrorBody};

use crate::fleet::FleetController;
use crate::metrics::MetricsCollector;
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Maximum request body size (1 MB).
const MAX_BODY_SIZE: usize = 1024 * 1024;

/// Shared application state accessible to all handlers.
pub struct AppState {
    pub fleet: Arc<FleetController>,
    /// Gateway startup time for uptime tracking
    pub start_time: Instant,
    pub metrics_collector: Arc<MetricsCollector>,
}

impl AppState {
    pub fn new(fleet: Arc<FleetController>) -> Self {
        let start_time = Instant::now();
        let metrics_collector = Arc::new(MetricsCollector::new(
            Arc::clone(fleet.registry()),
            Arc::clone(fleet.health()),
            Arc::clone(fleet.supervisor()),
            start_time,
            crate::metrics::setup_or_detached(),
        ));

        Self {
            fleet,
            start_time,
            metrics_collector,
        }
    }
}

/// `{"success": bool}` body returned by lifecycle and mutation endpoints.
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn json(success: bool) -> axum::Json<Self> {
        axum::Json(Self { success })
    }
}

/// Create the admin router with all endpoints configured.
pub fn create_router(state: Arc<AppState>) -> Router {
    let timeout = Duration::from_secs(state.fleet.config().gateway.request_timeout_seconds.max(1));

    Router::new()
        .route("/health", get(health::gateway))
        .route("/metrics", get(crate::metrics::handler::metrics_handler))
        // Processes
        .route("/admin/servers", get(servers::list))
        .route("/admin/servers/running", get(servers::running))
        .route("/admin/servers/stop-all", post(servers::stop_all))
        .route("/admin/servers/:name/start", post(servers::start))
        .route("/admin/servers/:name/stop", post(servers::stop))
        .route("/admin/servers/:name/process", get(servers::process))
        // Health
        .route("/admin/health", get(health::check_all))
        .route("/admin/health/cache", delete(health::clear_all))
        .route("/admin/health/cache/:name", delete(health::clear_one))
        .route("/admin/health/:name", get(health::check_one))
        // Load balancing
        .route("/admin/route", post(balancer::route))
        .route("/admin/route/:name/complete", post(balancer::complete))
        .route("/admin/balancer", get(balancer::status))
        .route("/admin/balancer/reset", post(balancer::reset))
        .route("/admin/balancer/:name", get(balancer::statistics))
        // Monitoring
        .route("/admin/monitoring/summary", get(monitoring::summary))
        .route("/admin/alerts", get(monitoring::active_alerts))
        .route("/admin/alerts/resolved", get(monitoring::resolved_alerts))
        .route("/admin/rules", get(monitoring::list_rules))
        .route(
            "/admin/rules/:name",
            put(monitoring::set_rule).delete(monitoring::remove_rule),
        )
        .route(
            "/admin/metrics/:name/:category/:metric",
            get(monitoring::metric_history),
        )
        .layer(TimeoutLayer::new(timeout))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
