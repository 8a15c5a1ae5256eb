//! Routing strategies for backend selection

use super::scoring::ResourceSnapshot;
use crate::registry::ServerDescriptor;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Routing strategy determines how a server is picked from healthy candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingStrategy {
    /// Rotate through candidates in order
    #[default]
    RoundRobin,

    /// Pick the candidate with the fewest in-flight requests
    LeastConnections,

    /// Weighted random draw favouring larger, less loaded servers
    WeightedRoundRobin,

    /// Pick the fastest responsive candidate, rotating when none is responsive
    HealthBased,

    /// Pick the highest composite performance score
    PerformanceBased,

    /// Uniformly random
    Random,
}

impl RoutingStrategy {
    pub const ALL: [RoutingStrategy; 6] = [
        RoutingStrategy::RoundRobin,
        RoutingStrategy::LeastConnections,
        RoutingStrategy::WeightedRoundRobin,
        RoutingStrategy::HealthBased,
        RoutingStrategy::PerformanceBased,
        RoutingStrategy::Random,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingStrategy::RoundRobin => "round_robin",
            RoutingStrategy::LeastConnections => "least_connections",
            RoutingStrategy::WeightedRoundRobin => "weighted_round_robin",
            RoutingStrategy::HealthBased => "health_based",
            RoutingStrategy::PerformanceBased => "performance_based",
            RoutingStrategy::Random => "random",
        }
    }
}

impl FromStr for RoutingStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        RoutingStrategy::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == normalized)
            .ok_or_else(|| format!("Unknown routing strategy: {}", s))
    }
}

impl std::fmt::Display for RoutingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A healthy server eligible for selection, with the figures strategies need.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub server: Arc<ServerDescriptor>,
    pub in_flight: u32,
    /// Wall time of the last completed probe
    pub probe_latency_ms: u64,
    /// Reported request latency EMA, or the probe latency when none reported
    pub avg_response_ms: f64,
    pub resources: ResourceSnapshot,
    pub score: f64,
}

/// Picks one candidate out of a non-empty slice.
pub trait SelectionStrategy: Send + Sync {
    fn kind(&self) -> RoutingStrategy;

    /// Returns the index of the chosen candidate, `None` only for an empty slice.
    fn select(&self, candidates: &[Candidate]) -> Option<usize>;
}

/// Index of the first candidate minimising `key`; ties keep registry order.
fn argmin_by<F>(candidates: &[Candidate], key: F) -> Option<usize>
where
    F: Fn(&Candidate) -> f64,
{
    let mut best: Option<(usize, f64)> = None;
    for (index, candidate) in candidates.iter().enumerate() {
        let value = key(candidate);
        match best {
            Some((_, current)) if value >= current => {}
            _ => best = Some((index, value)),
        }
    }
    best.map(|(index, _)| index)
}

#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicU64,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&self) {
        self.counter.store(0, Ordering::Relaxed);
    }
}

impl SelectionStrategy for RoundRobin {
    fn kind(&self) -> RoutingStrategy {
        RoutingStrategy::RoundRobin
    }

    fn select(&self, candidates: &[Candidate]) -> Option<usize> {
        if candidates.is_empty() {
            return None;
        }
        let counter = self.counter.fetch_add(1, Ordering::Relaxed);
        Some((counter % candidates.len() as u64) as usize)
    }
}

#[derive(Debug, Default)]
pub struct LeastConnections;

impl SelectionStrategy for LeastConnections {
    fn kind(&self) -> RoutingStrategy {
        RoutingStrategy::LeastConnections
    }

    fn select(&self, candidates: &[Candidate]) -> Option<usize> {
        argmin_by(candidates, |c| f64::from(c.in_flight))
    }
}

#[derive(Debug)]
pub struct WeightedRoundRobin {
    load_dampening: f64,
}

impl WeightedRoundRobin {
    pub fn new(load_dampening: f64) -> Self {
        Self {
            load_dampening: load_dampening.max(0.0),
        }
    }

    /// GPU share times parallelism, damped by current load.
    pub fn weight(&self, candidate: &Candidate) -> f64 {
        let capacity = candidate.server.capacity_weight();
        let weight = capacity / (1.0 + f64::from(candidate.in_flight) * self.load_dampening);
        if weight.is_finite() {
            weight.max(0.0)
        } else {
            0.0
        }
    }
}

impl SelectionStrategy for WeightedRoundRobin {
    fn kind(&self) -> RoutingStrategy {
        RoutingStrategy::WeightedRoundRobin
    }

    fn select(&self, candidates: &[Candidate]) -> Option<usize> {
        if candidates.is_empty() {
            return None;
        }

        let weights: Vec<f64> = candidates.iter().map(|c| self.weight(c)).collect();
        let total: f64 = weights.iter().sum();
        let mut rng = rand::thread_rng();

        if total <= 0.0 {
            return Some(rng.gen_range(0..candidates.len()));
        }

        let mut point = rng.gen_range(0.0..total);
        for (index, weight) in weights.iter().enumerate() {
            if point < *weight {
                return Some(index);
            }
            point -= weight;
        }

        // Float rounding can leave the point just past the last bucket.
        weights.iter().rposition(|w| *w > 0.0)
    }
}

#[derive(Debug)]
pub struct HealthBased {
    responsive_threshold_ms: u64,
    fallback: Arc<RoundRobin>,
}

impl HealthBased {
    pub fn new(responsive_threshold_ms: u64, fallback: Arc<RoundRobin>) -> Self {
        Self {
            responsive_threshold_ms,
            fallback,
        }
    }
}

impl SelectionStrategy for HealthBased {
    fn kind(&self) -> RoutingStrategy {
        RoutingStrategy::HealthBased
    }

    fn select(&self, candidates: &[Candidate]) -> Option<usize> {
        let responsive: Vec<usize> = candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| c.probe_latency_ms < self.responsive_threshold_ms)
            .map(|(index, _)| index)
            .collect();

        if responsive.is_empty() {
            tracing::debug!("No responsive candidate, falling back to round robin");
            return self.fallback.select(candidates);
        }

        let mut best = responsive[0];
        for &index in &responsive[1..] {
            if candidates[index].avg_response_ms < candidates[best].avg_response_ms {
                best = index;
            }
        }
        Some(best)
    }
}

#[derive(Debug, Default)]
pub struct PerformanceBased;

impl SelectionStrategy for PerformanceBased {
    fn kind(&self) -> RoutingStrategy {
        RoutingStrategy::PerformanceBased
    }

    fn select(&self, candidates: &[Candidate]) -> Option<usize> {
        argmin_by(candidates, |c| -c.score)
    }
}

#[derive(Debug, Default)]
pub struct RandomChoice;

impl SelectionStrategy for RandomChoice {
    fn kind(&self) -> RoutingStrategy {
        RoutingStrategy::Random
    }

    fn select(&self, candidates: &[Candidate]) -> Option<usize> {
        if candidates.is_empty() {
            return None;
        }
        Some(rand::thread_rng().gen_range(0..candidates.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::LaunchParams;

    fn candidate(name: &str, in_flight: u32, probe_ms: u64, avg_ms: f64, score: f64) -> Candidate {
        Candidate {
            server: Arc::new(ServerDescriptor {
                name: name.to_string(),
                host: "127.0.0.1".to_string(),
                port: 8000,
                model: "m".to_string(),
                launch: LaunchParams::default(),
                enabled: true,
                autostart: false,
            }),
            in_flight,
            probe_latency_ms: probe_ms,
            avg_response_ms: avg_ms,
            resources: ResourceSnapshot::default(),
            score,
        }
    }

    #[test]
    fn test_strategy_parse_and_display() {
        for strategy in RoutingStrategy::ALL {
            assert_eq!(strategy.to_string().parse::<RoutingStrategy>(), Ok(strategy));
        }
        assert_eq!(
            "Least-Connections".parse::<RoutingStrategy>(),
            Ok(RoutingStrategy::LeastConnections)
        );
        assert!("smart".parse::<RoutingStrategy>().is_err());
    }

    #[test]
    fn test_strategy_serde_snake_case() {
        let json = serde_json::to_string(&RoutingStrategy::WeightedRoundRobin).unwrap();
        assert_eq!(json, "\"weighted_round_robin\"");
        let parsed: RoutingStrategy = serde_json::from_str("\"health_based\"").unwrap();
        assert_eq!(parsed, RoutingStrategy::HealthBased);
    }

    #[test]
    fn test_round_robin_rotates() {
        let rr = RoundRobin::new();
        let candidates = vec![candidate("a", 0, 1, 1.0, 0.0), candidate("b", 0, 1, 1.0, 0.0)];
        let picks: Vec<_> = (0..4).map(|_| rr.select(&candidates).unwrap()).collect();
        assert_eq!(picks, vec![0, 1, 0, 1]);
    }

    #[test]
    fn test_empty_candidates_select_none() {
        assert_eq!(RoundRobin::new().select(&[]), None);
        assert_eq!(LeastConnections.select(&[]), None);
        assert_eq!(WeightedRoundRobin::new(0.1).select(&[]), None);
        assert_eq!(PerformanceBased.select(&[]), None);
        assert_eq!(RandomChoice.select(&[]), None);
    }

    #[test]
    fn test_least_connections_ties_keep_order() {
        let candidates = vec![
            candidate("a", 3, 1, 1.0, 0.0),
            candidate("b", 1, 1, 1.0, 0.0),
            candidate("c", 1, 1, 1.0, 0.0),
        ];
        assert_eq!(LeastConnections.select(&candidates), Some(1));
    }

    #[test]
    fn test_weighted_prefers_idle_server() {
        let wrr = WeightedRoundRobin::new(10.0);
        let busy = candidate("busy", 50, 1, 1.0, 0.0);
        let idle = candidate("idle", 0, 1, 1.0, 0.0);
        assert!(wrr.weight(&idle) > wrr.weight(&busy));

        let candidates = vec![busy, idle];
        let idle_picks = (0..500)
            .filter(|_| wrr.select(&candidates) == Some(1))
            .count();
        assert!(idle_picks > 400, "idle picked {} of 500", idle_picks);
    }

    #[test]
    fn test_weighted_zero_capacity_falls_back_to_uniform() {
        let wrr = WeightedRoundRobin::new(0.1);
        let mut a = candidate("a", 0, 1, 1.0, 0.0);
        Arc::make_mut(&mut a.server).launch.gpu_memory_utilization = 0.0;
        let candidates = vec![a];
        assert_eq!(wrr.select(&candidates), Some(0));
    }

    #[test]
    fn test_health_based_picks_fastest_responsive() {
        let fallback = Arc::new(RoundRobin::new());
        let hb = HealthBased::new(5000, fallback);
        let candidates = vec![
            candidate("slow-probe", 0, 9000, 10.0, 0.0),
            candidate("a", 0, 100, 300.0, 0.0),
            candidate("b", 0, 100, 120.0, 0.0),
        ];
        assert_eq!(hb.select(&candidates), Some(2));
    }

    #[test]
    fn test_health_based_falls_back_to_shared_rotation() {
        let fallback = Arc::new(RoundRobin::new());
        let hb = HealthBased::new(50, Arc::clone(&fallback));
        let candidates = vec![candidate("a", 0, 100, 1.0, 0.0), candidate("b", 0, 100, 1.0, 0.0)];

        assert_eq!(hb.select(&candidates), Some(0));
        assert_eq!(fallback.select(&candidates), Some(1));
        assert_eq!(hb.select(&candidates), Some(0));
    }

    #[test]
    fn test_performance_based_argmax() {
        let candidates = vec![
            candidate("a", 0, 1, 1.0, 0.2),
            candidate("b", 0, 1, 1.0, 0.9),
            candidate("c", 0, 1, 1.0, 0.9),
        ];
        assert_eq!(PerformanceBased.select(&candidates), Some(1));
    }
}
