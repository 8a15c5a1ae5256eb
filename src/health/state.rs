//! Cached per-server health records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health status of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    /// Port open and model listing returned 200
    Up,
    /// Port closed, or the HTTP probe failed at the network level
    Down,
    /// Port open but the model listing returned a non-200 status
    Degraded,
    /// Not probed yet
    Unknown,
}

impl HealthStatus {
    /// Only `Up` servers receive traffic.
    pub fn is_healthy(self) -> bool {
        matches!(self, HealthStatus::Up)
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Up => write!(f, "UP"),
            HealthStatus::Down => write!(f, "DOWN"),
            HealthStatus::Degraded => write!(f, "DEGRADED"),
            HealthStatus::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Result of the most recent completed probe of one server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthRecord {
    pub server_name: String,
    pub status: HealthStatus,
    pub message: String,
    pub checked_at: DateTime<Utc>,
    pub latency_ms: u64,
    /// Model ids reported by the backend (empty when not parsed)
    #[serde(default)]
    pub models: Vec<String>,
}

impl HealthRecord {
    /// Placeholder for a server that has not been probed.
    pub fn unknown(server_name: &str) -> Self {
        Self {
            server_name: server_name.to_string(),
            status: HealthStatus::Unknown,
            message: "Not checked yet".to_string(),
            checked_at: Utc::now(),
            latency_ms: 0,
            models: Vec::new(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status.is_healthy()
    }
}
