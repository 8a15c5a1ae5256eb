//! Wiring of the four fleet components and their background loops.

use crate::config::{ConfigError, FleetConfig};
use crate::health::HealthProbe;
use crate::monitoring::MonitoringEngine;
use crate::registry::ServerRegistry;
use crate::routing::LoadBalancer;
use crate::supervisor::ProcessSupervisor;
use futures::future::join_all;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Owns the registry, supervisor, probe, balancer and monitoring engine.
///
/// Background loops are spawned by [`FleetController::start`] and stopped by
/// [`FleetController::shutdown`], which also terminates every backend process.
pub struct FleetController {
    config: Arc<FleetConfig>,
    registry: Arc<ServerRegistry>,
    supervisor: Arc<ProcessSupervisor>,
    health: Arc<HealthProbe>,
    balancer: Arc<LoadBalancer>,
    monitoring: Arc<MonitoringEngine>,
    cancel_token: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl FleetController {
    /// Build every component from a validated configuration.
    pub fn new(config: FleetConfig) -> Result<Self, ConfigError> {
        let registry = Arc::new(config.build_registry()?);

        let supervisor = Arc::new(
            ProcessSupervisor::new(Arc::clone(&registry), config.supervisor.clone())
                .with_output_forwarding(config.logging.forward_backend_output),
        );
        let health = Arc::new(HealthProbe::new(
            Arc::clone(&registry),
            config.health_check.clone(),
        ));
        let balancer = Arc::new(LoadBalancer::new(
            Arc::clone(&registry),
            Arc::clone(&health),
            config.routing.clone(),
        ));
        let monitoring = Arc::new(
            MonitoringEngine::new(
                Arc::clone(&registry),
                Arc::clone(&health),
                Arc::clone(&balancer),
                config.monitoring.clone(),
            )
            .with_supervisor(Arc::clone(&supervisor)),
        );

        Ok(Self {
            config: Arc::new(config),
            registry,
            supervisor,
            health,
            balancer,
            monitoring,
            cancel_token: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn config(&self) -> &Arc<FleetConfig> {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ServerRegistry> {
        &self.registry
    }

    pub fn supervisor(&self) -> &Arc<ProcessSupervisor> {
        &self.supervisor
    }

    pub fn health(&self) -> &Arc<HealthProbe> {
        &self.health
    }

    pub fn balancer(&self) -> &Arc<LoadBalancer> {
        &self.balancer
    }

    pub fn monitoring(&self) -> &Arc<MonitoringEngine> {
        &self.monitoring
    }

    /// Token cancelled on shutdown; the admin listener waits on it too.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Launch `autostart` servers, then spawn the enabled background loops.
    pub async fn start(&self) {
        self.autostart().await;

        let mut tasks = Vec::new();
        if self.config.health_check.enabled {
            tasks.push(Arc::clone(&self.health).start(self.cancel_token.child_token()));
        } else {
            tracing::info!("Health probing disabled");
        }
        if self.config.monitoring.enabled {
            tasks.push(Arc::clone(&self.monitoring).start(self.cancel_token.child_token()));
        } else {
            tracing::info!("Monitoring disabled");
        }

        self.tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend(tasks);
    }

    /// Start every enabled server marked `autostart`. Returns how many launched.
    pub async fn autostart(&self) -> usize {
        let targets: Vec<_> = self
            .registry
            .enabled()
            .into_iter()
            .filter(|server| server.autostart)
            .collect();

        let results = join_all(
            targets
                .iter()
                .map(|server| self.supervisor.start(&server.name)),
        )
        .await;

        let mut launched = 0;
        for (server, result) in targets.iter().zip(results) {
            match result {
                Ok(outcome) => {
                    launched += 1;
                    tracing::info!(server = %server.name, pid = outcome.pid(), "Autostarted backend");
                }
                Err(e) => {
                    tracing::error!(server = %server.name, error = %e, "Autostart failed");
                }
            }
        }
        launched
    }

    /// Stop the loops and every backend process. Returns false if a process
    /// could not be stopped.
    pub async fn shutdown(&self) -> bool {
        self.cancel_token.cancel();

        let tasks: Vec<_> = self
            .tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        for result in join_all(tasks).await {
            if let Err(e) = result {
                tracing::warn!(error = %e, "Background task ended abnormally");
            }
        }

        let stopped = self.supervisor.shutdown().await;
        tracing::info!(all_stopped = stopped, "Fleet shut down");
        stopped
    }
}
