//! Monitoring configuration.

use super::rules::AlertRule;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Metric sampling and alerting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub enabled: bool,
    /// Seconds between collection ticks
    pub interval_seconds: u64,
    /// Samples kept per (server, category, metric)
    pub history_capacity: usize,
    pub sample_ttl_hours: u64,
    pub alert_ttl_days: u64,
    /// Upper bound on one server's collection within a tick
    pub per_server_timeout_seconds: u64,
    /// Backend path scraped for Prometheus metrics
    pub metrics_path: String,
    /// Added to the shipped rules, replacing any with the same name
    pub rules: Vec<AlertRule>,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: 30,
            history_capacity: 1000,
            sample_ttl_hours: 24,
            alert_ttl_days: 7,
            per_server_timeout_seconds: 10,
            metrics_path: "/metrics".to_string(),
            rules: Vec::new(),
        }
    }
}

impl MonitoringConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds.max(1))
    }

    pub fn sample_ttl(&self) -> Duration {
        Duration::from_secs(self.sample_ttl_hours * 3600)
    }

    pub fn alert_ttl(&self) -> Duration {
        Duration::from_secs(self.alert_ttl_days * 86_400)
    }

    pub fn per_server_timeout(&self) -> Duration {
        Duration::from_secs(self.per_server_timeout_seconds.max(1))
    }
}
