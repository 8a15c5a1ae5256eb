//! Prometheus text-format parsing for backend `/metrics` endpoints.

use serde::Serialize;

const REQUESTS_RUNNING: &str = "vllm:num_requests_running";
const REQUESTS_WAITING: &str = "vllm:num_requests_waiting";
const GENERATION_THROUGHPUT: &str = "vllm:avg_generation_throughput_toks_per_s";
const GPU_CACHE_USAGE: &str = "vllm:gpu_cache_usage_perc";

/// Figures scraped from one backend. Absent metrics stay `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BackendMetrics {
    pub requests_running: Option<f64>,
    pub requests_waiting: Option<f64>,
    pub generation_throughput: Option<f64>,
    /// KV cache usage in percent (0..=100)
    pub gpu_cache_usage: Option<f64>,
}

impl BackendMetrics {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Split one exposition line into metric name and value.
///
/// Labels are skipped; comments, blanks and unparsable values yield `None`.
fn parse_line(line: &str) -> Option<(&str, f64)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let (name, rest) = match line.find('{') {
        Some(open) => {
            let close = line[open..].find('}')? + open;
            (&line[..open], &line[close + 1..])
        }
        None => line.split_once(char::is_whitespace)?,
    };

    let value = rest.split_whitespace().next()?.parse::<f64>().ok()?;
    value.is_finite().then_some((name.trim(), value))
}

/// Extract the figures the load balancer and alert rules use.
///
/// Counts and throughput are summed across label sets (one per served model);
/// cache usage takes the maximum.
pub fn parse_backend_metrics(body: &str) -> BackendMetrics {
    let mut metrics = BackendMetrics::default();

    for (name, value) in body.lines().filter_map(parse_line) {
        match name {
            REQUESTS_RUNNING => add(&mut metrics.requests_running, value),
            REQUESTS_WAITING => add(&mut metrics.requests_waiting, value),
            GENERATION_THROUGHPUT => add(&mut metrics.generation_throughput, value),
            GPU_CACHE_USAGE => {
                let percent = value * 100.0;
                metrics.gpu_cache_usage =
                    Some(metrics.gpu_cache_usage.map_or(percent, |m| m.max(percent)));
            }
            _ => {}
        }
    }

    metrics
}

fn add(slot: &mut Option<f64>, value: f64) {
    *slot = Some(slot.unwrap_or(0.0) + value);
}
