//! Metric collection and alerting.
//!
//! Every tick samples each enabled server (fresh health probe, load balancer
//! figures, scraped backend metrics, process usage), keeps the samples in a
//! bounded history and mirrors them to a [`MetricStore`]. Alert rules are then
//! evaluated over the history with a sustain window: a rule fires only when
//! every sample in `[now - sustain, now]` violates it.

mod alert;
mod config;
mod error;
mod history;
mod rules;
mod scraper;
mod store;
mod types;


pub use alert::{Alert, AlertEvent, AlertStatus};
pub use config::MonitoringConfig;
pub use error::MonitoringError;
pub use history::MetricHistory;
pub use rules::{default_rules, AlertRule, Operator, Severity};
pub use scraper::{parse_backend_metrics, BackendMetrics};
pub use store::{MemoryStore, MetricStore};
pub use types::{names, MetricCategory, MetricKey, MetricSample};

use crate::health::HealthProbe;
use crate::registry::{RegistryError, ServerDescriptor, ServerRegistry};
use crate::routing::{LoadBalancer, ResourceSnapshot};
use crate::supervisor::ProcessSupervisor;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::future::join_all;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Resolved alerts kept for audit.
const RESOLVED_LOG_CAPACITY: usize = 1000;
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize)]
pub struct MonitoringSummary {
    pub total_servers: usize,
    pub healthy_servers: usize,
    pub total_active_alerts: usize,
    pub critical_alerts: usize,
    pub generated_at: DateTime<Utc>,
}

/// Samples the fleet and raises alerts.
pub struct MonitoringEngine {
    registry: Arc<ServerRegistry>,
    health: Arc<HealthProbe>,
    balancer: Arc<LoadBalancer>,
    supervisor: Option<Arc<ProcessSupervisor>>,
    store: Arc<dyn MetricStore>,
    client: reqwest::Client,
    config: MonitoringConfig,
    history: MetricHistory,
    rules: DashMap<String, AlertRule>,
    /// Keyed by (server, rule); at most one active alert per key
    active: DashMap<(String, String), Alert>,
    resolved: Mutex<VecDeque<Alert>>,
    events: broadcast::Sender<AlertEvent>,
}

impl MonitoringEngine {
    pub fn new(
        registry: Arc<ServerRegistry>,
        health: Arc<HealthProbe>,
        balancer: Arc<LoadBalancer>,
        config: MonitoringConfig,
    ) -> Self {
        let rules = DashMap::new();
        for rule in default_rules().into_iter().chain(config.rules.iter().cloned()) {
            rules.insert(rule.name.clone(), rule);
        }

        let client = reqwest::Client::builder()
            .timeout(health.config().http_timeout())
            .build()
            .unwrap_or_default();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            registry,
            health,
            balancer,
            supervisor: None,
            store: Arc::new(MemoryStore::new()),
            client,
            history: MetricHistory::new(config.history_capacity),
            config,
            rules,
            active: DashMap::new(),
            resolved: Mutex::new(VecDeque::new()),
            events,
        }
    }

    /// Sample process CPU and memory for backends this supervisor runs.
    pub fn with_supervisor(mut self, supervisor: Arc<ProcessSupervisor>) -> Self {
        self.supervisor = Some(supervisor);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn MetricStore>) -> Self {
        self.store = store;
        self
    }

    pub fn config(&self) -> &MonitoringConfig {
        &self.config
    }

    pub fn history(&self) -> &MetricHistory {
        &self.history
    }

    pub fn store(&self) -> &Arc<dyn MetricStore> {
        &self.store
    }

    /// Receive every alert transition from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<AlertEvent> {
        self.events.subscribe()
    }

    // ------------------------------------------------------------------
    // Ingest
    // ------------------------------------------------------------------

    /// Add a sample to the history and mirror it to the store.
    pub async fn record_sample(&self, sample: MetricSample) {
        if let Err(e) = self
            .store
            .put_sample(&sample, self.config.sample_ttl())
            .await
        {
            tracing::warn!(key = %sample.key(), error = %e, "Failed to persist metric sample");
        }
        self.history.push(sample);
    }

    /// Collect and record samples for every enabled server.
    ///
    /// Each server is bounded by its own timeout so one slow backend cannot
    /// stall the others. Returns the number of samples recorded.
    pub async fn collect_all(&self) -> usize {
        let servers = self.registry.enabled();
        let timeout = self.config.per_server_timeout();

        let batches = join_all(servers.iter().map(|server| async move {
            match tokio::time::timeout(timeout, self.collect_server(server)).await {
                Ok(samples) => samples,
                Err(_) => {
                    tracing::warn!(
                        server = %server.name,
                        timeout_seconds = timeout.as_secs(),
                        "Metric collection timed out"
                    );
                    Vec::new()
                }
            }
        }))
        .await;

        let mut recorded = 0;
        for sample in batches.into_iter().flatten() {
            self.record_sample(sample).await;
            recorded += 1;
        }
        recorded
    }

    async fn collect_server(&self, server: &ServerDescriptor) -> Vec<MetricSample> {
        let record = self.health.probe(server).await;
        self.health.record(record.clone());

        let now = Utc::now();
        let name = server.name.as_str();
        let sample = |category, metric: &str, value: f64| {
            MetricSample::new(name, category, metric, value, now)
        };

        let mut samples = vec![
            sample(
                MetricCategory::Health,
                names::HEALTH_STATUS,
                if record.is_healthy() { 1.0 } else { 0.0 },
            ),
            sample(
                MetricCategory::Health,
                names::RESPONSE_TIME_MS,
                record.latency_ms as f64,
            ),
            sample(
                MetricCategory::Performance,
                names::IN_FLIGHT_REQUESTS,
                f64::from(self.balancer.in_flight(name)),
            ),
            sample(
                MetricCategory::Performance,
                names::PERFORMANCE_SCORE,
                self.balancer.performance_score(name),
            ),
            sample(
                MetricCategory::Performance,
                names::TOTAL_REQUESTS,
                self.balancer.total_requests(name) as f64,
            ),
        ];

        let scraped = if record.is_healthy() {
            self.scrape(server).await
        } else {
            BackendMetrics::default()
        };

        let performance = [
            (names::REQUESTS_RUNNING, scraped.requests_running),
            (names::REQUESTS_WAITING, scraped.requests_waiting),
            (names::GENERATION_THROUGHPUT, scraped.generation_throughput),
            (names::GPU_CACHE_USAGE, scraped.gpu_cache_usage),
        ];
        for (metric, value) in performance {
            if let Some(value) = value {
                samples.push(sample(MetricCategory::Performance, metric, value));
            }
        }

        let gpu_memory = scraped
            .gpu_cache_usage
            .unwrap_or(server.launch.gpu_memory_utilization * 100.0);
        samples.push(sample(
            MetricCategory::Resource,
            names::GPU_MEMORY_USAGE,
            gpu_memory,
        ));

        if let Some(usage) = self
            .supervisor
            .as_ref()
            .and_then(|supervisor| supervisor.process_usage(name))
        {
            samples.push(sample(
                MetricCategory::Resource,
                names::CPU_TIME_SECONDS,
                usage.cpu_time_seconds,
            ));
            samples.push(sample(
                MetricCategory::Resource,
                names::MEMORY_RSS_MB,
                usage.memory_rss_mb,
            ));
        }

        if !scraped.is_empty() {
            self.balancer.update_resources(
                name,
                ResourceSnapshot {
                    gpu_utilization: scraped.gpu_cache_usage.map(|pct| pct / 100.0),
                    throughput_tokens_per_sec: scraped.generation_throughput,
                    updated_at: Some(now),
                },
            );
        }

        samples
    }

    /// Fetch and parse the backend's Prometheus endpoint. Failures yield no figures.
    async fn scrape(&self, server: &ServerDescriptor) -> BackendMetrics {
        let url = format!("{}{}", server.base_url(), self.config.metrics_path);

        let response = match self
            .client
            .get(&url)
            .timeout(self.health.config().http_timeout())
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                tracing::debug!(server = %server.name, status = %response.status(), "Metrics endpoint returned error");
                return BackendMetrics::default();
            }
            Err(e) => {
                tracing::debug!(server = %server.name, error = %e, "Metrics scrape failed");
                return BackendMetrics::default();
            }
        };

        match response.text().await {
            Ok(body) => parse_backend_metrics(&body),
            Err(e) => {
                tracing::debug!(server = %server.name, error = %e, "Metrics body unreadable");
                BackendMetrics::default()
            }
        }
    }

    // ------------------------------------------------------------------
    // Alerting
    // ------------------------------------------------------------------

    /// Latest value in the rule's window if the rule holds for `server` at `now`.
    ///
    /// A sustained rule also needs a violating sample at or before the window
    /// start.
    fn violation(&self, server: &str, rule: &AlertRule, now: DateTime<Utc>) -> Option<f64> {
        let keys = [
            MetricCategory::Health,
            MetricCategory::Performance,
            MetricCategory::Resource,
        ]
        .map(|category| MetricKey::new(server, category, &rule.metric));

        let window: Vec<MetricSample> = if rule.sustain_seconds == 0 {
            keys.iter()
                .filter_map(|key| self.history.latest_at(key, now))
                .max_by_key(|sample| sample.timestamp)
                .into_iter()
                .collect()
        } else {
            let from = now - chrono::Duration::seconds(rule.sustain_seconds as i64);

            // The condition must already hold at the window start, otherwise a
            // single fresh sample or a sampling gap would skip the debounce.
            let anchor = keys
                .iter()
                .filter_map(|key| self.history.latest_at(key, from))
                .max_by_key(|sample| sample.timestamp)?;

            let mut samples: Vec<MetricSample> = keys
                .iter()
                .flat_map(|key| self.history.range(key, from, now))
                .filter(|sample| sample.timestamp > anchor.timestamp)
                .collect();
            samples.push(anchor);
            samples.sort_by_key(|sample| sample.timestamp);
            samples
        };

        let latest = window.last()?.value;
        window
            .iter()
            .all(|sample| rule.matches(sample.value))
            .then_some(latest)
    }

    /// Evaluate every rule against every enabled server at `now`.
    ///
    /// Returns the transitions that happened.
    pub async fn evaluate_alerts(&self, now: DateTime<Utc>) -> Vec<AlertEvent> {
        let rules = self.alert_rules();
        let mut events = Vec::new();

        for server in self.registry.enabled() {
            for rule in &rules {
                let key = (server.name.clone(), rule.name.clone());

                match self.violation(&server.name, rule, now) {
                    Some(value) => {
                        let fired = match self.active.entry(key) {
                            dashmap::mapref::entry::Entry::Occupied(mut entry) => {
                                entry.get_mut().value = value;
                                None
                            }
                            dashmap::mapref::entry::Entry::Vacant(entry) => {
                                let alert = Alert::fire(&server.name, rule, value, now);
                                entry.insert(alert.clone());
                                Some(alert)
                            }
                        };
                        if let Some(alert) = fired {
                            events.push(self.on_fired(alert).await);
                        }
                    }
                    None => {
                        if let Some((_, mut alert)) = self.active.remove(&key) {
                            alert.resolve(now);
                            events.push(self.on_resolved(alert).await);
                        }
                    }
                }
            }
        }

        metrics::gauge!("fleetgate_active_alerts").set(self.active.len() as f64);
        events
    }

    async fn on_fired(&self, alert: Alert) -> AlertEvent {
        match alert.severity {
            Severity::Critical => tracing::error!(
                server = %alert.server_name,
                rule = %alert.rule_name,
                value = alert.value,
                threshold = alert.threshold,
                alert_id = %alert.id,
                "Alert fired"
            ),
            _ => tracing::warn!(
                server = %alert.server_name,
                rule = %alert.rule_name,
                severity = %alert.severity,
                value = alert.value,
                threshold = alert.threshold,
                alert_id = %alert.id,
                "Alert fired"
            ),
        }

        metrics::counter!("fleetgate_alerts_fired_total",
            "rule" => alert.rule_name.clone(),
            "severity" => alert.severity.to_string()
        )
        .increment(1);

        self.persist(&alert).await;
        let event = AlertEvent::Fired(alert);
        let _ = self.events.send(event.clone());
        event
    }

    async fn on_resolved(&self, alert: Alert) -> AlertEvent {
        tracing::info!(
            server = %alert.server_name,
            rule = %alert.rule_name,
            alert_id = %alert.id,
            "Alert resolved"
        );

        self.persist(&alert).await;
        {
            let mut resolved = self.resolved.lock().unwrap_or_else(|e| e.into_inner());
            if resolved.len() >= RESOLVED_LOG_CAPACITY {
                resolved.pop_front();
            }
            resolved.push_back(alert.clone());
        }

        let event = AlertEvent::Resolved(alert);
        let _ = self.events.send(event.clone());
        event
    }

    async fn persist(&self, alert: &Alert) {
        if let Err(e) = self.store.put_alert(alert, self.config.alert_ttl()).await {
            tracing::warn!(alert_id = %alert.id, error = %e, "Failed to persist alert");
        }
    }

    // ------------------------------------------------------------------
    // Queries and rule management
    // ------------------------------------------------------------------

    pub fn get_monitoring_summary(&self) -> MonitoringSummary {
        MonitoringSummary {
            total_servers: self.registry.enabled().len(),
            healthy_servers: self.health.healthy_count(),
            total_active_alerts: self.active.len(),
            critical_alerts: self
                .active
                .iter()
                .filter(|entry| entry.severity == Severity::Critical)
                .count(),
            generated_at: Utc::now(),
        }
    }

    /// Active alerts, optionally for one server, oldest first.
    pub fn get_active_alerts(&self, server: Option<&str>) -> Vec<Alert> {
        let mut alerts: Vec<Alert> = self
            .active
            .iter()
            .filter(|entry| server.map_or(true, |name| entry.server_name == name))
            .map(|entry| entry.value().clone())
            .collect();
        alerts.sort_by_key(|alert| alert.start_time);
        alerts
    }

    /// Resolved alerts retained for audit, oldest first.
    pub fn get_resolved_alerts(&self) -> Vec<Alert> {
        self.resolved
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    /// Samples for one metric within `[from, to]`, chronological.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::UnknownServer` for names not in the registry.
    pub fn get_metric_history(
        &self,
        server: &str,
        category: MetricCategory,
        metric: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<MetricSample>, RegistryError> {
        self.registry.get(server)?;
        Ok(self
            .history
            .range(&MetricKey::new(server, category, metric), from, to))
    }

    /// Install or replace the rule stored under `name`.
    ///
    /// # Errors
    ///
    /// Returns `MonitoringError::Configuration` when `rule.name` differs from
    /// `name` or the rule is malformed.
    pub fn set_alert_rule(&self, name: &str, rule: AlertRule) -> Result<(), MonitoringError> {
        if rule.name != name {
            return Err(MonitoringError::Configuration(format!(
                "rule name '{}' does not match '{}'",
                rule.name, name
            )));
        }
        rule.validate().map_err(MonitoringError::Configuration)?;

        tracing::info!(
            rule = %name,
            metric = %rule.metric,
            threshold = rule.threshold,
            sustain_seconds = rule.sustain_seconds,
            "Alert rule set"
        );
        self.rules.insert(name.to_string(), rule);
        Ok(())
    }

    /// Remove a rule. Its active alerts are resolved immediately.
    pub async fn remove_alert_rule(&self, name: &str) -> bool {
        if self.rules.remove(name).is_none() {
            return false;
        }

        let keys: Vec<(String, String)> = self
            .active
            .iter()
            .filter(|entry| entry.key().1 == name)
            .map(|entry| entry.key().clone())
            .collect();

        let now = Utc::now();
        for key in keys {
            if let Some((_, mut alert)) = self.active.remove(&key) {
                alert.resolve(now);
                self.on_resolved(alert).await;
            }
        }

        tracing::info!(rule = %name, "Alert rule removed");
        true
    }

    /// Current rules, sorted by name.
    pub fn alert_rules(&self) -> Vec<AlertRule> {
        let mut rules: Vec<AlertRule> = self.rules.iter().map(|r| r.value().clone()).collect();
        rules.sort_by(|a, b| a.name.cmp(&b.name));
        rules
    }

    // ------------------------------------------------------------------
    // Loop
    // ------------------------------------------------------------------

    /// One collection tick: sample, evaluate, purge.
    pub async fn run_cycle(&self) -> Vec<AlertEvent> {
        let recorded = self.collect_all().await;
        let events = self.evaluate_alerts(Utc::now()).await;

        match self.store.purge_expired().await {
            Ok(purged) if purged > 0 => tracing::debug!(purged, "Expired store entries purged"),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Store purge failed"),
        }

        tracing::debug!(
            samples = recorded,
            transitions = events.len(),
            active_alerts = self.active.len(),
            "Monitoring cycle completed"
        );
        events
    }

    /// Start the periodic collection loop.
    pub fn start(self: Arc<Self>, cancel_token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.interval());
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            tracing::info!(
                interval_seconds = self.config.interval_seconds,
                rules = self.rules.len(),
                "Monitoring engine started"
            );

            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        tracing::info!("Monitoring engine shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        self.run_cycle().await;
                    }
                }
            }
        })
    }
}
