//! Alert records and lifecycle events.

use super::rules::{AlertRule, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertStatus {
    Active,
    Resolved,
}

/// One firing of a rule against one server. Resolved alerts are terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub server_name: String,
    pub rule_name: String,
    pub metric: String,
    pub severity: Severity,
    /// Latest observed value when the alert fired
    pub value: f64,
    pub threshold: f64,
    pub message: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: AlertStatus,
}

impl Alert {
    pub fn fire(server_name: &str, rule: &AlertRule, value: f64, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            server_name: server_name.to_string(),
            rule_name: rule.name.clone(),
            metric: rule.metric.clone(),
            severity: rule.severity,
            value,
            threshold: rule.threshold,
            message: format!("{} on {}: {}", rule.name, server_name, rule.describe(value)),
            start_time: now,
            end_time: None,
            status: AlertStatus::Active,
        }
    }

    /// Close the alert. `end_time` never precedes `start_time`.
    pub fn resolve(&mut self, now: DateTime<Utc>) {
        self.end_time = Some(now.max(self.start_time));
        self.status = AlertStatus::Resolved;
    }

    pub fn is_active(&self) -> bool {
        self.status == AlertStatus::Active
    }
}

/// Broadcast on every alert transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "alert", rename_all = "snake_case")]
pub enum AlertEvent {
    Fired(Alert),
    Resolved(Alert),
}

impl AlertEvent {
    pub fn alert(&self) -> &Alert {
        match self {
            AlertEvent::Fired(alert) | AlertEvent::Resolved(alert) => alert,
        }
    }
}
