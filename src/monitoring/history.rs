//! Bounded in-memory metric history.
//!
//! One ring buffer per (server, category, metric) key. When a buffer is full
//! the oldest sample is evicted.

use super::types::{MetricKey, MetricSample};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::VecDeque;

pub struct MetricHistory {
    buffers: DashMap<MetricKey, VecDeque<MetricSample>>,
    capacity: usize,
}

impl MetricHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffers: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a sample, keeping the buffer in timestamp order.
    pub fn push(&self, sample: MetricSample) {
        let mut buffer = self
            .buffers
            .entry(sample.key())
            .or_insert_with(|| VecDeque::with_capacity(self.capacity.min(64)));

        if buffer.len() >= self.capacity {
            buffer.pop_front();
        }

        let out_of_order = buffer
            .back()
            .is_some_and(|last| last.timestamp > sample.timestamp);

        if out_of_order {
            let position = buffer.partition_point(|s| s.timestamp <= sample.timestamp);
            buffer.insert(position, sample);
        } else {
            buffer.push_back(sample);
        }
    }

    /// Samples with `from <= timestamp <= to`, oldest first.
    pub fn range(
        &self,
        key: &MetricKey,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<MetricSample> {
        self.buffers
            .get(key)
            .map(|buffer| {
                buffer
                    .iter()
                    .filter(|s| s.timestamp >= from && s.timestamp <= to)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Most recent sample at or before `at`.
    pub fn latest_at(&self, key: &MetricKey, at: DateTime<Utc>) -> Option<MetricSample> {
        self.buffers
            .get(key)
            .and_then(|buffer| buffer.iter().rev().find(|s| s.timestamp <= at).cloned())
    }

    pub fn latest(&self, key: &MetricKey) -> Option<MetricSample> {
        self.buffers.get(key).and_then(|buffer| buffer.back().cloned())
    }

    pub fn len(&self, key: &MetricKey) -> usize {
        self.buffers.get(key).map(|buffer| buffer.len()).unwrap_or(0)
    }

    /// Every key recorded for a server.
    pub fn keys_for(&self, server_name: &str) -> Vec<MetricKey> {
        self.buffers
            .iter()
            .filter(|entry| entry.key().server_name == server_name)
            .map(|entry| entry.key().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::types::MetricCategory;
    use chrono::Duration;

    fn sample(value: f64, at: DateTime<Utc>) -> MetricSample {
        MetricSample::new("a", MetricCategory::Performance, "x", value, at)
    }

    fn key() -> MetricKey {
        MetricKey::new("a", MetricCategory::Performance, "x")
    }

    #[test]
    fn test_ring_buffer_drops_oldest() {
        let history = MetricHistory::new(3);
        let start = Utc::now();
        for i in 0..5 {
            history.push(sample(i as f64, start + Duration::seconds(i)));
        }

        let all = history.range(&key(), start, start + Duration::seconds(10));
        let values: Vec<f64> = all.iter().map(|s| s.value).collect();
        assert_eq!(values, vec![2.0, 3.0, 4.0]);
        assert_eq!(history.len(&key()), 3);
    }

    #[test]
    fn test_range_is_inclusive() {
        let history = MetricHistory::new(10);
        let start = Utc::now();
        for i in 0..5 {
            history.push(sample(i as f64, start + Duration::seconds(i)));
        }

        let values: Vec<f64> = history
            .range(&key(), start + Duration::seconds(1), start + Duration::seconds(3))
            .iter()
            .map(|s| s.value)
            .collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_out_of_order_sample_is_sorted() {
        let history = MetricHistory::new(10);
        let start = Utc::now();
        history.push(sample(1.0, start));
        history.push(sample(3.0, start + Duration::seconds(2)));
        history.push(sample(2.0, start + Duration::seconds(1)));

        let values: Vec<f64> = history
            .range(&key(), start, start + Duration::seconds(5))
            .iter()
            .map(|s| s.value)
            .collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
        assert_eq!(history.latest(&key()).map(|s| s.value), Some(3.0));
    }

    #[test]
    fn test_unknown_key_is_empty() {
        let history = MetricHistory::new(10);
        let now = Utc::now();
        assert!(history.range(&key(), now, now).is_empty());
        assert!(history.latest_at(&key(), now).is_none());
        assert!(history.keys_for("a").is_empty());
    }
}
