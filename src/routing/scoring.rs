//! Performance scoring for backend selection

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Backend-reported resource figures, pushed in by the monitoring engine.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    /// GPU utilisation as a fraction 0.0..=1.0
    pub gpu_utilization: Option<f64>,
    /// Generation throughput in tokens per second
    pub throughput_tokens_per_sec: Option<f64>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Score resource usage attributed to unknown GPU utilisation.
const UNKNOWN_GPU_SCORE: f64 = 0.75;

/// Faster servers score higher: 0ms = 1.0, 1000ms = 0.5, 3000ms = 0.25.
pub fn response_time_score(avg_response_ms: f64) -> f64 {
    1.0 / (1.0 + avg_response_ms.max(0.0) / 1000.0)
}

/// Fewer in-flight requests score higher: 0 = 1.0, 1 = 0.5, 3 = 0.25.
pub fn load_score(in_flight: u32) -> f64 {
    1.0 / (1.0 + f64::from(in_flight))
}

/// Penalises GPU utilisation near 0 (idle or not warmed up) and near 1
/// (saturated), and rewards reported throughput.
///
/// Returns a value in [0.5, 1.0] times the throughput bonus.
pub fn resource_score(resources: &ResourceSnapshot) -> f64 {
    let gpu = match resources.gpu_utilization {
        Some(u) => {
            let u = u.clamp(0.0, 1.0);
            let distance = 2.0 * u - 1.0;
            0.5 + 0.5 * (1.0 - distance * distance)
        }
        None => UNKNOWN_GPU_SCORE,
    };

    let throughput_bonus = resources
        .throughput_tokens_per_sec
        .map(|tps| 1.0 + (1.0 + tps.max(0.0)).ln() / 10.0)
        .unwrap_or(1.0);

    gpu * throughput_bonus
}

/// Composite score: response time × load × resources. Higher is better.
pub fn performance_score(avg_response_ms: f64, in_flight: u32, resources: &ResourceSnapshot) -> f64 {
    response_time_score(avg_response_ms) * load_score(in_flight) * resource_score(resources)
}
