//! # Metrics Export
//!
//! The gateway's own Prometheus metrics, rendered at `GET /metrics`.
//!
//! ## Metrics Tracked
//!
//! **Counters:**
//! - `fleetgate_selections_total{server, strategy}` - Load balancer picks
//! - `fleetgate_backend_exits_total{server, requested}` - Backend process exits
//! - `fleetgate_alerts_fired_total{rule, severity}` - Alerts raised
//!
//! **Histograms:**
//! - `fleetgate_probe_latency_seconds{server}` - Health probe duration
//!
//! **Gauges:**
//! - `fleetgate_server_up{server}` - 1 when the last probe was `UP`
//! - `fleetgate_in_flight_requests{server}` - Outstanding selections
//! - `fleetgate_active_alerts` - Alerts currently active
//! - `fleetgate_servers_total` - Enabled servers
//! - `fleetgate_servers_healthy` - Enabled servers reported `UP`
//! - `fleetgate_running_processes` - Backends the supervisor is running

pub mod handler;

pub use metrics_exporter_prometheus::PrometheusBuilder;

use crate::health::HealthProbe;
use crate::registry::ServerRegistry;
use crate::supervisor::ProcessSupervisor;
use std::sync::Arc;
use std::time::Instant;

/// Computes fleet gauges on demand and renders the recorder.
pub struct MetricsCollector {
    registry: Arc<ServerRegistry>,
    health: Arc<HealthProbe>,
    supervisor: Arc<ProcessSupervisor>,
    /// Gateway startup time for uptime calculation
    start_time: Instant,
    prometheus_handle: metrics_exporter_prometheus::PrometheusHandle,
}

impl MetricsCollector {
    pub fn new(
        registry: Arc<ServerRegistry>,
        health: Arc<HealthProbe>,
        supervisor: Arc<ProcessSupervisor>,
        start_time: Instant,
        prometheus_handle: metrics_exporter_prometheus::PrometheusHandle,
    ) -> Self {
        Self {
            registry,
            health,
            supervisor,
            start_time,
            prometheus_handle,
        }
    }

    /// Refresh gauges derived from the registry, health cache and supervisor.
    pub fn update_fleet_gauges(&self) {
        metrics::gauge!("fleetgate_servers_total").set(self.registry.enabled().len() as f64);
        metrics::gauge!("fleetgate_servers_healthy").set(self.health.healthy_count() as f64);
        metrics::gauge!("fleetgate_running_processes")
            .set(self.supervisor.list_running().len() as f64);
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Render Prometheus metrics in text format.
    pub fn render_metrics(&self) -> String {
        self.prometheus_handle.render()
    }
}

/// Install the global Prometheus recorder.
///
/// Probe latency buckets are in seconds and sized for a TCP connect plus one
/// small HTTP call.
pub fn setup_metrics(
) -> Result<metrics_exporter_prometheus::PrometheusHandle, Box<dyn std::error::Error>> {
    use metrics_exporter_prometheus::Matcher;

    let probe_buckets = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("fleetgate_probe_latency_seconds".to_string()),
            probe_buckets,
        )?
        .install_recorder()?;

    Ok(handle)
}

/// Install the recorder, or build a detached one when a recorder is already
/// installed (repeated setup in tests).
pub fn setup_or_detached() -> metrics_exporter_prometheus::PrometheusHandle {
    setup_metrics().unwrap_or_else(|e| {
        tracing::debug!("Metrics already initialized, creating new handle: {}", e);
        PrometheusBuilder::new().build_recorder().handle()
    })
}
