//! Health probing module for backend status tracking.
//!
//! A probe is two-phase: a short TCP connect to the backend port, then an
//! HTTP call to the model-listing endpoint. The latest completed probe per
//! server is kept in a last-known-value cache consumed by the load balancer
//! and the monitoring engine.

mod config;
mod error;
mod parser;
mod state;


pub use config::*;
pub use error::*;
pub use parser::parse_model_list;
pub use state::*;

use crate::registry::{RegistryError, ServerDescriptor, ServerRegistry};
use dashmap::DashMap;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Probes backends and caches the latest result per server.
pub struct HealthProbe {
    /// Reference to the server registry
    registry: Arc<ServerRegistry>,
    /// HTTP client with connection pooling
    client: reqwest::Client,
    /// Probe configuration
    config: HealthCheckConfig,
    /// Last completed probe per server
    cache: DashMap<String, HealthRecord>,
}

impl HealthProbe {
    /// Create a new probe with a default HTTP client.
    pub fn new(registry: Arc<ServerRegistry>, config: HealthCheckConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()
            .unwrap_or_default();

        Self::with_client(registry, config, client)
    }

    /// Create a probe with a custom HTTP client (for testing).
    pub fn with_client(
        registry: Arc<ServerRegistry>,
        config: HealthCheckConfig,
        client: reqwest::Client,
    ) -> Self {
        Self {
            registry,
            client,
            config,
            cache: DashMap::new(),
        }
    }

    pub fn config(&self) -> &HealthCheckConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ServerRegistry> {
        &self.registry
    }

    /// Probe one server by name and overwrite its cache entry.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::UnknownServer` for names not in the registry.
    /// Probe failures are never errors; they produce a `Down` or `Degraded` record.
    pub async fn check_health(&self, name: &str) -> Result<HealthRecord, RegistryError> {
        let server = self.registry.get(name)?;
        let record = self.probe(&server).await;
        self.store(record.clone());
        Ok(record)
    }

    /// Run both probe phases against a server without touching the cache.
    pub async fn probe(&self, server: &ServerDescriptor) -> HealthRecord {
        let start = Instant::now();

        let (status, message, models) = match self.probe_port(server).await {
            Err(error) => (HealthStatus::Down, error.to_string(), Vec::new()),
            Ok(()) => match self.probe_http(server).await {
                Ok(models) => (HealthStatus::Up, "Server is responding".to_string(), models),
                Err(error @ ProbeError::HttpStatus(_)) => {
                    (HealthStatus::Degraded, error.to_string(), Vec::new())
                }
                Err(error) => (HealthStatus::Down, error.to_string(), Vec::new()),
            },
        };

        let latency = start.elapsed();
        metrics::histogram!("fleetgate_probe_latency_seconds",
            "server" => server.name.clone()
        )
        .record(latency.as_secs_f64());

        HealthRecord {
            server_name: server.name.clone(),
            status,
            message,
            checked_at: chrono::Utc::now(),
            latency_ms: latency.as_millis() as u64,
            models,
        }
    }

    /// Phase (a): bounded TCP connect to host:port.
    async fn probe_port(&self, server: &ServerDescriptor) -> Result<(), ProbeError> {
        let inaccessible = || ProbeError::PortInaccessible {
            host: server.host.clone(),
            port: server.port,
        };

        match tokio::time::timeout(
            self.config.tcp_timeout(),
            TcpStream::connect(server.address()),
        )
        .await
        {
            Ok(Ok(_stream)) => Ok(()),
            Ok(Err(e)) => {
                tracing::debug!(server = %server.name, error = %e, "TCP probe failed");
                Err(inaccessible())
            }
            Err(_) => {
                tracing::debug!(server = %server.name, "TCP probe timed out");
                Err(inaccessible())
            }
        }
    }

    /// Phase (b): HTTP call to the model listing path.
    async fn probe_http(&self, server: &ServerDescriptor) -> Result<Vec<String>, ProbeError> {
        let url = format!("{}{}", server.base_url(), self.config.probe_path);

        let response = self
            .client
            .get(&url)
            .timeout(self.config.http_timeout())
            .send()
            .await
            .map_err(|e| Self::classify_error(e, self.config.http_timeout_seconds))?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(ProbeError::HttpStatus(response.status().as_u16()));
        }

        // A 200 with an unexpected body still means the server is serving.
        match response.text().await {
            Ok(body) => match parse_model_list(&body) {
                Ok(models) => Ok(models),
                Err(error) => {
                    tracing::warn!(
                        server = %server.name,
                        error = %error,
                        "Backend returned 200 but an unparseable model list"
                    );
                    Ok(Vec::new())
                }
            },
            Err(e) => Err(Self::classify_error(e, self.config.http_timeout_seconds)),
        }
    }

    /// Classify reqwest error into ProbeError.
    fn classify_error(e: reqwest::Error, timeout_seconds: u64) -> ProbeError {
        if e.is_timeout() {
            ProbeError::Timeout(timeout_seconds)
        } else {
            ProbeError::Connection(e.to_string())
        }
    }

    /// Replace the cached record for a server, logging status transitions.
    fn store(&self, record: HealthRecord) {
        let name = record.server_name.clone();
        let new_status = record.status;

        metrics::gauge!("fleetgate_server_up", "server" => name.clone())
            .set(if new_status.is_healthy() { 1.0 } else { 0.0 });

        let old_status = self
            .cache
            .insert(name.clone(), record)
            .map(|old| old.status)
            .unwrap_or(HealthStatus::Unknown);

        if old_status != new_status {
            tracing::info!(
                server = %name,
                old_status = %old_status,
                new_status = %new_status,
                "Server health changed"
            );
        }
    }

    /// Probe every enabled server concurrently.
    ///
    /// One server's failure never affects another's outcome.
    pub async fn check_all(&self) -> HashMap<String, HealthRecord> {
        let servers = self.registry.enabled();

        let records = join_all(servers.iter().map(|server| async move {
            let record = self.probe(server).await;
            self.store(record.clone());
            (server.name.clone(), record)
        }))
        .await;

        records.into_iter().collect()
    }

    /// Last completed probe of a server.
    pub fn cached(&self, name: &str) -> Option<HealthRecord> {
        self.cache.get(name).map(|entry| entry.value().clone())
    }

    /// Every cached record, in registry order.
    pub fn cached_all(&self) -> Vec<HealthRecord> {
        self.registry
            .all()
            .iter()
            .filter_map(|server| self.cached(&server.name))
            .collect()
    }

    /// Cached status, `Unknown` when never probed.
    pub fn status(&self, name: &str) -> HealthStatus {
        self.cache
            .get(name)
            .map(|entry| entry.status)
            .unwrap_or(HealthStatus::Unknown)
    }

    pub fn is_healthy(&self, name: &str) -> bool {
        self.status(name).is_healthy()
    }

    /// Number of enabled servers currently cached as `Up`.
    pub fn healthy_count(&self) -> usize {
        self.registry
            .enabled()
            .iter()
            .filter(|server| self.is_healthy(&server.name))
            .count()
    }

    /// Drop one cached record so the next read forces a fresh probe.
    pub fn clear_cache(&self, name: &str) -> bool {
        self.cache.remove(name).is_some()
    }

    /// Drop every cached record.
    pub fn clear_all(&self) {
        self.cache.clear();
    }

    /// Insert a record directly. Used by tests and by callers that probe out of band.
    pub fn record(&self, record: HealthRecord) {
        self.store(record);
    }

    /// Start the periodic probe loop.
    /// Returns a JoinHandle that resolves when the loop stops.
    pub fn start(self: Arc<Self>, cancel_token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(self.config.interval_seconds.max(1)));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            tracing::info!(
                interval_seconds = self.config.interval_seconds,
                "Health probe started"
            );

            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        tracing::info!("Health probe shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        let records = self.check_all().await;
                        let healthy = records.values().filter(|r| r.is_healthy()).count();
                        tracing::debug!(
                            servers_checked = records.len(),
                            healthy,
                            "Health probe cycle completed"
                        );
                    }
                }
            }
        })
    }
}
