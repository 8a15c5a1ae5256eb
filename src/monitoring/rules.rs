//! Alert rules and their comparison operators.

use super::types::names;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Comparison applied as `value <op> threshold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
}

impl Operator {
    pub fn matches(&self, value: f64, threshold: f64) -> bool {
        match self {
            Operator::Gt => value > threshold,
            Operator::Ge => value >= threshold,
            Operator::Lt => value < threshold,
            Operator::Le => value <= threshold,
            Operator::Eq => (value - threshold).abs() < f64::EPSILON,
            Operator::Ne => (value - threshold).abs() >= f64::EPSILON,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Eq => "==",
            Operator::Ne => "!=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// Fires when `metric <operator> threshold` holds for every sample in the
/// trailing `sustain_seconds` window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    pub name: String,
    pub metric: String,
    pub operator: Operator,
    pub threshold: f64,
    #[serde(default)]
    pub sustain_seconds: u64,
    pub severity: Severity,
}

impl AlertRule {
    pub fn sustain(&self) -> Duration {
        Duration::from_secs(self.sustain_seconds)
    }

    pub fn matches(&self, value: f64) -> bool {
        self.operator.matches(value, self.threshold)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("rule name cannot be empty".to_string());
        }
        if self.metric.trim().is_empty() {
            return Err("metric cannot be empty".to_string());
        }
        if !self.threshold.is_finite() {
            return Err(format!("threshold must be finite, got {}", self.threshold));
        }
        Ok(())
    }

    /// Human-readable description used in alert messages.
    pub fn describe(&self, value: f64) -> String {
        format!(
            "{} is {} (threshold {} {}, sustained {}s)",
            self.metric,
            value,
            self.operator.symbol(),
            self.threshold,
            self.sustain_seconds
        )
    }
}

fn rule(
    name: &str,
    metric: &str,
    operator: Operator,
    threshold: f64,
    sustain_seconds: u64,
    severity: Severity,
) -> AlertRule {
    AlertRule {
        name: name.to_string(),
        metric: metric.to_string(),
        operator,
        threshold,
        sustain_seconds,
        severity,
    }
}

/// Rules installed before configuration overrides are applied.
pub fn default_rules() -> Vec<AlertRule> {
    vec![
        rule(
            "server_down",
            names::HEALTH_STATUS,
            Operator::Lt,
            1.0,
            60,
            Severity::Critical,
        ),
        rule(
            "high_response_time",
            names::RESPONSE_TIME_MS,
            Operator::Gt,
            5000.0,
            120,
            Severity::Warning,
        ),
        rule(
            "high_load",
            names::IN_FLIGHT_REQUESTS,
            Operator::Gt,
            100.0,
            300,
            Severity::Warning,
        ),
        rule(
            "gpu_memory_high",
            names::GPU_MEMORY_USAGE,
            Operator::Gt,
            95.0,
            180,
            Severity::Warning,
        ),
    ]
}
