//! Load balancing across healthy backends.
//!
//! Candidates are the enabled servers serving the requested model that the
//! health cache reports as `Up`. A [`SelectionStrategy`] picks one and the
//! server's in-flight counter is incremented; callers report completion so the
//! counter comes back down.

pub mod counters;
pub mod error;
pub mod scoring;
pub mod strategies;


pub use counters::RequestCounters;
pub use error::RoutingError;
pub use scoring::{performance_score, ResourceSnapshot};
pub use strategies::{
    Candidate, HealthBased, LeastConnections, PerformanceBased, RandomChoice, RoundRobin,
    RoutingStrategy, SelectionStrategy, WeightedRoundRobin,
};

use crate::config::RoutingConfig;
use crate::health::{HealthProbe, HealthStatus};
use crate::registry::{ServerDescriptor, ServerRegistry};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// The server picked for one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selection {
    pub server: String,
    pub url: String,
    pub model: String,
    pub strategy: RoutingStrategy,
    /// In-flight count after this selection
    pub in_flight: u32,
}

/// Load figures for one server.
#[derive(Debug, Clone, Serialize)]
pub struct ServerStatistics {
    pub name: String,
    pub model: String,
    pub enabled: bool,
    pub health: HealthStatus,
    pub in_flight: u32,
    pub total_requests: u64,
    pub avg_response_ms: Option<f64>,
    pub probe_latency_ms: Option<u64>,
    pub performance_score: f64,
    pub gpu_utilization: Option<f64>,
    pub throughput_tokens_per_sec: Option<f64>,
}

/// Fleet-wide load balancer view.
#[derive(Debug, Clone, Serialize)]
pub struct LoadBalancerStatus {
    pub default_strategy: RoutingStrategy,
    pub total_servers: usize,
    pub healthy_servers: usize,
    pub total_in_flight: u64,
    pub servers: Vec<ServerStatistics>,
    pub generated_at: DateTime<Utc>,
}

/// Selects servers for requests and tracks their load.
pub struct LoadBalancer {
    registry: Arc<ServerRegistry>,
    health: Arc<HealthProbe>,
    config: RoutingConfig,
    counters: RequestCounters,
    resources: DashMap<String, ResourceSnapshot>,
    round_robin: Arc<RoundRobin>,
    least_connections: LeastConnections,
    weighted: WeightedRoundRobin,
    health_based: HealthBased,
    performance: PerformanceBased,
    random: RandomChoice,
}

impl LoadBalancer {
    pub fn new(
        registry: Arc<ServerRegistry>,
        health: Arc<HealthProbe>,
        config: RoutingConfig,
    ) -> Self {
        let counters = RequestCounters::new();
        for server in registry.all() {
            counters.register(&server.name);
        }

        let round_robin = Arc::new(RoundRobin::new());
        let health_based =
            HealthBased::new(config.responsive_threshold_ms, Arc::clone(&round_robin));
        let weighted = WeightedRoundRobin::new(config.load_dampening);

        Self {
            registry,
            health,
            config,
            counters,
            resources: DashMap::new(),
            round_robin,
            least_connections: LeastConnections,
            weighted,
            health_based,
            performance: PerformanceBased,
            random: RandomChoice,
        }
    }

    pub fn default_strategy(&self) -> RoutingStrategy {
        self.config.default_strategy
    }

    fn strategy(&self, kind: RoutingStrategy) -> &dyn SelectionStrategy {
        match kind {
            RoutingStrategy::RoundRobin => self.round_robin.as_ref(),
            RoutingStrategy::LeastConnections => &self.least_connections,
            RoutingStrategy::WeightedRoundRobin => &self.weighted,
            RoutingStrategy::HealthBased => &self.health_based,
            RoutingStrategy::PerformanceBased => &self.performance,
            RoutingStrategy::Random => &self.random,
        }
    }

    /// Pick a healthy server for `model` and count the request against it.
    ///
    /// # Errors
    ///
    /// Returns `RoutingError::SelectionExhausted` when no enabled server serves
    /// the model or none of them is currently `Up`.
    pub fn select_server(
        &self,
        model: &str,
        strategy: RoutingStrategy,
    ) -> Result<Selection, RoutingError> {
        let serving = self.registry.serving(model);
        if serving.is_empty() {
            tracing::warn!(model = %model, "No server configured for model");
            return Err(RoutingError::no_server_for(model));
        }

        let candidates: Vec<Candidate> = serving
            .iter()
            .filter(|server| self.health.is_healthy(&server.name))
            .map(|server| self.candidate(server))
            .collect();

        if candidates.is_empty() {
            tracing::warn!(
                model = %model,
                configured = serving.len(),
                "No healthy server available"
            );
            return Err(RoutingError::no_healthy_server(model, serving.len()));
        }

        let selector = self.strategy(strategy);
        let index = selector
            .select(&candidates)
            .ok_or_else(|| RoutingError::no_healthy_server(model, serving.len()))?;
        let strategy = selector.kind();
        let chosen = &candidates[index].server;

        let in_flight = self.counters.increment(&chosen.name);

        metrics::counter!("fleetgate_selections_total",
            "server" => chosen.name.clone(),
            "strategy" => strategy.as_str()
        )
        .increment(1);
        metrics::gauge!("fleetgate_in_flight_requests", "server" => chosen.name.clone())
            .set(f64::from(in_flight));

        tracing::debug!(
            model = %model,
            server = %chosen.name,
            strategy = %strategy,
            candidates = candidates.len(),
            in_flight,
            "Server selected"
        );

        Ok(Selection {
            server: chosen.name.clone(),
            url: chosen.base_url(),
            model: chosen.model.clone(),
            strategy,
            in_flight,
        })
    }

    /// Select using the configured default strategy.
    pub fn select_default(&self, model: &str) -> Result<Selection, RoutingError> {
        self.select_server(model, self.config.default_strategy)
    }

    fn candidate(&self, server: &Arc<ServerDescriptor>) -> Candidate {
        let in_flight = self.counters.in_flight(&server.name);
        let probe_latency_ms = self
            .health
            .cached(&server.name)
            .map(|record| record.latency_ms)
            .unwrap_or(0);
        let avg_response_ms = self
            .counters
            .avg_latency_ms(&server.name)
            .unwrap_or(probe_latency_ms) as f64;
        let resources = self.resources(&server.name);
        let score = performance_score(avg_response_ms, in_flight, &resources);

        Candidate {
            server: Arc::clone(server),
            in_flight,
            probe_latency_ms,
            avg_response_ms,
            resources,
            score,
        }
    }

    /// Report that a request to `name` finished.
    ///
    /// Returns the remaining in-flight count. Extra completions are ignored.
    pub fn complete_request(&self, name: &str) -> u32 {
        let remaining = self.counters.decrement(name);
        metrics::gauge!("fleetgate_in_flight_requests", "server" => name.to_string())
            .set(f64::from(remaining));
        remaining
    }

    /// Report completion along with the observed request latency.
    pub fn complete_request_with_latency(&self, name: &str, latency: Duration) -> u32 {
        self.counters
            .record_latency(name, latency.as_millis() as u64);
        self.complete_request(name)
    }

    /// Replace the backend-reported resource figures for a server.
    pub fn update_resources(&self, name: &str, mut snapshot: ResourceSnapshot) {
        snapshot.updated_at.get_or_insert_with(Utc::now);
        self.resources.insert(name.to_string(), snapshot);
    }

    pub fn resources(&self, name: &str) -> ResourceSnapshot {
        self.resources
            .get(name)
            .map(|entry| *entry.value())
            .unwrap_or_default()
    }

    pub fn in_flight(&self, name: &str) -> u32 {
        self.counters.in_flight(name)
    }

    pub fn total_requests(&self, name: &str) -> u64 {
        self.counters.total(name)
    }

    /// Current composite score for a server, whatever its health.
    pub fn performance_score(&self, name: &str) -> f64 {
        match self.registry.get(name) {
            Ok(server) => self.candidate(&server).score,
            Err(_) => 0.0,
        }
    }

    fn statistics_for(&self, server: &Arc<ServerDescriptor>) -> ServerStatistics {
        let candidate = self.candidate(server);
        let record = self.health.cached(&server.name);

        ServerStatistics {
            name: server.name.clone(),
            model: server.model.clone(),
            enabled: server.enabled,
            health: record
                .as_ref()
                .map(|r| r.status)
                .unwrap_or(HealthStatus::Unknown),
            in_flight: candidate.in_flight,
            total_requests: self.counters.total(&server.name),
            avg_response_ms: self
                .counters
                .avg_latency_ms(&server.name)
                .map(|ms| ms as f64),
            probe_latency_ms: record.map(|r| r.latency_ms),
            performance_score: candidate.score,
            gpu_utilization: candidate.resources.gpu_utilization,
            throughput_tokens_per_sec: candidate.resources.throughput_tokens_per_sec,
        }
    }

    /// Statistics for one server.
    ///
    /// # Errors
    ///
    /// Returns `RoutingError::UnknownServer` for names not in the registry.
    pub fn get_server_statistics(&self, name: &str) -> Result<ServerStatistics, RoutingError> {
        let server = self
            .registry
            .get(name)
            .map_err(|_| RoutingError::UnknownServer(name.to_string()))?;
        Ok(self.statistics_for(&server))
    }

    /// Statistics for every server in registry order.
    pub fn get_status(&self) -> LoadBalancerStatus {
        let servers: Vec<ServerStatistics> = self
            .registry
            .all()
            .iter()
            .map(|server| self.statistics_for(server))
            .collect();

        LoadBalancerStatus {
            default_strategy: self.config.default_strategy,
            total_servers: servers.len(),
            healthy_servers: servers.iter().filter(|s| s.health.is_healthy()).count(),
            total_in_flight: self.counters.total_in_flight(),
            servers,
            generated_at: Utc::now(),
        }
    }

    /// Zero counters, latency averages and rotation state.
    pub fn reset(&self) {
        self.counters.reset();
        self.round_robin.reset();
        for server in self.registry.all() {
            metrics::gauge!("fleetgate_in_flight_requests", "server" => server.name.clone())
                .set(0.0);
        }
        tracing::info!("Load balancer state reset");
    }
}
