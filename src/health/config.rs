//! Configuration for health probing.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for backend health probing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Whether the periodic probe loop runs
    pub enabled: bool,
    /// Seconds between probe cycles
    pub interval_seconds: u64,
    /// Bound on the TCP connect phase
    pub tcp_timeout_ms: u64,
    /// Bound on the HTTP phase
    pub http_timeout_seconds: u64,
    /// Application-level path probed after the port answers
    pub probe_path: String,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: 30,
            tcp_timeout_ms: 1500,
            http_timeout_seconds: 3,
            probe_path: "/v1/models".to_string(),
        }
    }
}

impl HealthCheckConfig {
    pub fn tcp_timeout(&self) -> Duration {
        Duration::from_millis(self.tcp_timeout_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }
}
