//! Time-series store that mirrors samples and alerts with a TTL.

use super::alert::Alert;
use super::error::MonitoringError;
use super::types::{MetricKey, MetricSample};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::time::Duration;
use uuid::Uuid;

/// Durable mirror of monitoring state.
#[async_trait]
pub trait MetricStore: Send + Sync {
    async fn put_sample(&self, sample: &MetricSample, ttl: Duration)
        -> Result<(), MonitoringError>;

    /// Insert or replace an alert by id.
    async fn put_alert(&self, alert: &Alert, ttl: Duration) -> Result<(), MonitoringError>;

    async fn samples(
        &self,
        key: &MetricKey,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<MetricSample>, MonitoringError>;

    async fn alerts(&self) -> Result<Vec<Alert>, MonitoringError>;

    /// Drop expired entries. Returns how many were removed.
    async fn purge_expired(&self) -> Result<usize, MonitoringError>;
}

struct Expiring<T> {
    value: T,
    expires_at: DateTime<Utc>,
}

fn expiry(ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// In-process store with per-entry expiry.
#[derive(Default)]
pub struct MemoryStore {
    samples: DashMap<MetricKey, Vec<Expiring<MetricSample>>>,
    alerts: DashMap<Uuid, Expiring<Alert>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetricStore for MemoryStore {
    async fn put_sample(&self, sample: &MetricSample, ttl: Duration) -> Result<(), MonitoringError> {
        self.samples.entry(sample.key()).or_default().push(Expiring {
            value: sample.clone(),
            expires_at: expiry(ttl),
        });
        Ok(())
    }

    async fn put_alert(&self, alert: &Alert, ttl: Duration) -> Result<(), MonitoringError> {
        self.alerts.insert(
            alert.id,
            Expiring {
                value: alert.clone(),
                expires_at: expiry(ttl),
            },
        );
        Ok(())
    }

    async fn samples(
        &self,
        key: &MetricKey,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<MetricSample>, MonitoringError> {
        let now = Utc::now();
        let mut samples: Vec<MetricSample> = self
            .samples
            .get(key)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| e.expires_at > now)
                    .map(|e| &e.value)
                    .filter(|s| s.timestamp >= from && s.timestamp <= to)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        samples.sort_by_key(|s| s.timestamp);
        Ok(samples)
    }

    async fn alerts(&self) -> Result<Vec<Alert>, MonitoringError> {
        let now = Utc::now();
        let mut alerts: Vec<Alert> = self
            .alerts
            .iter()
            .filter(|e| e.expires_at > now)
            .map(|e| e.value.clone())
            .collect();
        alerts.sort_by_key(|a| a.start_time);
        Ok(alerts)
    }

    async fn purge_expired(&self) -> Result<usize, MonitoringError> {
        let now = Utc::now();
        let mut removed = 0;

        for mut entry in self.samples.iter_mut() {
            let before = entry.len();
            entry.retain(|e| e.expires_at > now);
            removed += before - entry.len();
        }
        self.samples.retain(|_, entries| !entries.is_empty());

        let before = self.alerts.len();
        self.alerts.retain(|_, e| e.expires_at > now);
        removed += before - self.alerts.len();

        Ok(removed)
    }
}
