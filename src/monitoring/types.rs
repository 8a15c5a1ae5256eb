//! Metric sample types and well-known metric names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Metric names recorded by the collectors.
pub mod names {
    pub const HEALTH_STATUS: &str = "health_status";
    pub const RESPONSE_TIME_MS: &str = "response_time_ms";

    pub const IN_FLIGHT_REQUESTS: &str = "in_flight_requests";
    pub const PERFORMANCE_SCORE: &str = "performance_score";
    pub const TOTAL_REQUESTS: &str = "total_requests";
    pub const REQUESTS_RUNNING: &str = "requests_running";
    pub const REQUESTS_WAITING: &str = "requests_waiting";
    pub const GENERATION_THROUGHPUT: &str = "generation_throughput";
    pub const GPU_CACHE_USAGE: &str = "gpu_cache_usage";

    pub const GPU_MEMORY_USAGE: &str = "gpu_memory_usage";
    pub const CPU_TIME_SECONDS: &str = "cpu_time_seconds";
    pub const MEMORY_RSS_MB: &str = "memory_rss_mb";
}

/// Group a metric belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricCategory {
    Health,
    Performance,
    Resource,
}

impl MetricCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricCategory::Health => "health",
            MetricCategory::Performance => "performance",
            MetricCategory::Resource => "resource",
        }
    }
}

impl std::fmt::Display for MetricCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "health" => Ok(MetricCategory::Health),
            "performance" => Ok(MetricCategory::Performance),
            "resource" => Ok(MetricCategory::Resource),
            _ => Err(format!("Unknown metric category: {}", s)),
        }
    }
}

/// History key: one ring buffer per (server, category, metric).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetricKey {
    pub server_name: String,
    pub category: MetricCategory,
    pub metric: String,
}

impl MetricKey {
    pub fn new(server_name: &str, category: MetricCategory, metric: &str) -> Self {
        Self {
            server_name: server_name.to_string(),
            category,
            metric: metric.to_string(),
        }
    }
}

impl std::fmt::Display for MetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.server_name, self.category, self.metric)
    }
}

/// A single metric observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub server_name: String,
    pub category: MetricCategory,
    pub metric: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

impl MetricSample {
    pub fn new(
        server_name: &str,
        category: MetricCategory,
        metric: &str,
        value: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            server_name: server_name.to_string(),
            category,
            metric: metric.to_string(),
            value,
            timestamp,
        }
    }

    pub fn key(&self) -> MetricKey {
        MetricKey::new(&self.server_name, self.category, &self.metric)
    }
}
