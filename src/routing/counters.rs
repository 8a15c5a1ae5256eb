//! Per-server in-flight request counters.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

#[derive(Debug, Default)]
struct CounterEntry {
    in_flight: AtomicU32,
    total: AtomicU64,
    /// EMA of reported request latency, 0 until the first sample
    avg_latency_ms: AtomicU64,
}

/// In-flight and lifetime request counts per server.
///
/// Increments and decrements are atomic per server; the in-flight count never
/// goes below zero even when completions outnumber selections.
#[derive(Debug, Default)]
pub struct RequestCounters {
    entries: DashMap<String, CounterEntry>,
}

impl RequestCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-create the counter for a server.
    pub fn register(&self, name: &str) {
        self.entries.entry(name.to_string()).or_default();
    }

    /// Atomically increment the in-flight counter.
    ///
    /// Returns the new value after increment.
    pub fn increment(&self, name: &str) -> u32 {
        let entry = self.entries.entry(name.to_string()).or_default();
        entry.total.fetch_add(1, Ordering::SeqCst);
        entry.in_flight.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Atomically decrement the in-flight counter (saturating at 0).
    ///
    /// If already at 0, logs a warning and returns 0.
    pub fn decrement(&self, name: &str) -> u32 {
        let Some(entry) = self.entries.get(name) else {
            tracing::warn!(server = %name, "Completion reported for a server with no counter");
            return 0;
        };

        loop {
            let current = entry.in_flight.load(Ordering::SeqCst);
            if current == 0 {
                tracing::warn!(
                    server = %name,
                    "Attempted to decrement in-flight count when already at 0"
                );
                return 0;
            }

            match entry.in_flight.compare_exchange(
                current,
                current - 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return current - 1,
                Err(_) => continue,
            }
        }
    }

    /// Update rolling average latency using EMA: new = (sample + 4*old) / 5.
    ///
    /// First sample sets the initial value.
    pub fn record_latency(&self, name: &str, latency_ms: u64) {
        let entry = self.entries.entry(name.to_string()).or_default();
        // Zero is the "no samples yet" marker.
        let sample = latency_ms.max(1);

        loop {
            let current = entry.avg_latency_ms.load(Ordering::SeqCst);
            let new_val = if current == 0 {
                sample
            } else {
                (sample + 4 * current) / 5
            };

            if entry
                .avg_latency_ms
                .compare_exchange(current, new_val, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return;
            }
        }
    }

    pub fn in_flight(&self, name: &str) -> u32 {
        self.entries
            .get(name)
            .map(|e| e.in_flight.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    pub fn total(&self, name: &str) -> u64 {
        self.entries
            .get(name)
            .map(|e| e.total.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Average reported request latency, if any request reported one.
    pub fn avg_latency_ms(&self, name: &str) -> Option<u64> {
        self.entries
            .get(name)
            .map(|e| e.avg_latency_ms.load(Ordering::SeqCst))
            .filter(|&v| v > 0)
    }

    /// Sum of in-flight requests across all servers.
    pub fn total_in_flight(&self) -> u64 {
        self.entries
            .iter()
            .map(|e| u64::from(e.in_flight.load(Ordering::SeqCst)))
            .sum()
    }

    /// Zero every counter while keeping the registered keys.
    pub fn reset(&self) {
        for entry in self.entries.iter() {
            entry.in_flight.store(0, Ordering::SeqCst);
            entry.total.store(0, Ordering::SeqCst);
            entry.avg_latency_ms.store(0, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_increment_and_decrement() {
        let counters = RequestCounters::new();
        assert_eq!(counters.increment("a"), 1);
        assert_eq!(counters.increment("a"), 2);
        assert_eq!(counters.decrement("a"), 1);
        assert_eq!(counters.in_flight("a"), 1);
        assert_eq!(counters.total("a"), 2);
    }

    #[test]
    fn test_decrement_saturates_at_zero() {
        let counters = RequestCounters::new();
        counters.register("a");
        assert_eq!(counters.decrement("a"), 0);
        assert_eq!(counters.decrement("unknown"), 0);
        assert_eq!(counters.in_flight("a"), 0);
    }

    #[test]
    fn test_latency_ema() {
        let counters = RequestCounters::new();
        assert_eq!(counters.avg_latency_ms("a"), None);
        counters.record_latency("a", 100);
        assert_eq!(counters.avg_latency_ms("a"), Some(100));
        counters.record_latency("a", 600);
        // (600 + 4*100) / 5 = 200
        assert_eq!(counters.avg_latency_ms("a"), Some(200));
    }

    #[test]
    fn test_reset_clears_values() {
        let counters = RequestCounters::new();
        counters.increment("a");
        counters.record_latency("a", 50);
        counters.reset();
        assert_eq!(counters.in_flight("a"), 0);
        assert_eq!(counters.total("a"), 0);
        assert_eq!(counters.avg_latency_ms("a"), None);
    }

    #[test]
    fn test_concurrent_increments() {
        let counters = std::sync::Arc::new(RequestCounters::new());
        counters.register("a");
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counters = std::sync::Arc::clone(&counters);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        counters.increment("a");
                        counters.decrement("a");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(counters.in_flight("a"), 0);
        assert_eq!(counters.total("a"), 8000);
    }

    proptest! {
        /// Any interleaving of selects and completes keeps the count equal to
        /// max(0, running balance) and never underflows.
        #[test]
        fn prop_counter_never_negative(ops in proptest::collection::vec(any::<bool>(), 0..200)) {
            let counters = RequestCounters::new();
            let mut expected: u32 = 0;
            for increment in ops {
                if increment {
                    counters.increment("a");
                    expected += 1;
                } else {
                    counters.decrement("a");
                    expected = expected.saturating_sub(1);
                }
                prop_assert_eq!(counters.in_flight("a"), expected);
            }
        }
    }
}
