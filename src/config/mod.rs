//! Configuration module for fleetgate
//!
//! Provides layered configuration loading from files, environment variables, and defaults.
//!
//! # Configuration Precedence
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`FLEETGATE_*`)
//! 3. Configuration file (TOML)
//! 4. Default values (lowest priority)
//!
//! # Example
//!
//! ```rust
//! use fleetgate::config::FleetConfig;
//!
//! let toml = r#"
//! [gateway]
//! port = 9000
//!
//! [[servers]]
//! name = "llama-a"
//! port = 8001
//! model = "llama3-8b"
//! "#;
//! let config: FleetConfig = toml::from_str(toml).unwrap();
//! assert_eq!(config.gateway.port, 9000);
//! assert_eq!(config.servers.len(), 1);
//! ```

pub mod error;
pub mod gateway;
pub mod logging;
pub mod routing;

pub use error::ConfigError;
pub use gateway::GatewayConfig;
pub use logging::{LogFormat, LoggingConfig};
pub use routing::RoutingConfig;

pub use crate::health::HealthCheckConfig;
pub use crate::monitoring::MonitoringConfig;
pub use crate::supervisor::SupervisorConfig;

use crate::registry::{ServerDescriptor, ServerRegistry};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Unified configuration for the fleet controller.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FleetConfig {
    /// Admin HTTP listener
    pub gateway: GatewayConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Health probing
    pub health_check: HealthCheckConfig,
    /// Load balancing
    pub routing: RoutingConfig,
    /// Metric sampling and alerting
    pub monitoring: MonitoringConfig,
    /// Backend process launching
    pub supervisor: SupervisorConfig,
    /// Backend definitions
    pub servers: Vec<ServerDescriptor>,
}

impl FleetConfig {
    /// Load configuration from a TOML file
    ///
    /// If path is None, returns default configuration.
    /// If path doesn't exist, returns NotFound error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.to_path_buf()));
                }
                let content = std::fs::read_to_string(p)?;
                toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Invalid values are silently ignored (defaults are kept).
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(port) = std::env::var("FLEETGATE_PORT") {
            if let Ok(p) = port.parse() {
                self.gateway.port = p;
            }
        }
        if let Ok(host) = std::env::var("FLEETGATE_HOST") {
            self.gateway.host = host;
        }

        if let Ok(level) = std::env::var("FLEETGATE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("FLEETGATE_LOG_FORMAT") {
            if let Ok(f) = format.parse() {
                self.logging.format = f;
            }
        }

        if let Ok(health) = std::env::var("FLEETGATE_HEALTH_CHECK") {
            self.health_check.enabled = health.to_lowercase() == "true";
        }
        if let Ok(monitoring) = std::env::var("FLEETGATE_MONITORING") {
            self.monitoring.enabled = monitoring.to_lowercase() == "true";
        }

        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gateway.port == 0 {
            return Err(ConfigError::Validation {
                field: "gateway.port".to_string(),
                message: "port must be non-zero".to_string(),
            });
        }

        self.logging
            .validate()
            .map_err(|(field, message)| ConfigError::Validation { field, message })?;

        let mut names = HashSet::new();
        for (i, server) in self.servers.iter().enumerate() {
            if server.name.is_empty() {
                return Err(ConfigError::Validation {
                    field: format!("servers[{}].name", i),
                    message: "name cannot be empty".to_string(),
                });
            }
            if !names.insert(server.name.as_str()) {
                return Err(ConfigError::DuplicateServer(server.name.clone()));
            }
            if server.port == 0 {
                return Err(ConfigError::Validation {
                    field: format!("servers[{}].port", i),
                    message: "port must be non-zero".to_string(),
                });
            }
            if server.model.is_empty() {
                return Err(ConfigError::Validation {
                    field: format!("servers[{}].model", i),
                    message: "model cannot be empty".to_string(),
                });
            }
            let fraction = server.launch.gpu_memory_utilization;
            if !(fraction > 0.0 && fraction <= 1.0) {
                return Err(ConfigError::Validation {
                    field: format!("servers[{}].launch.gpu_memory_utilization", i),
                    message: format!("must be in (0, 1], got {}", fraction),
                });
            }
            if server.launch.tensor_parallel_size == 0 {
                return Err(ConfigError::Validation {
                    field: format!("servers[{}].launch.tensor_parallel_size", i),
                    message: "must be at least 1".to_string(),
                });
            }
        }

        if self.supervisor.executable.is_empty() {
            return Err(ConfigError::Validation {
                field: "supervisor.executable".to_string(),
                message: "executable cannot be empty".to_string(),
            });
        }

        if self.monitoring.history_capacity == 0 {
            return Err(ConfigError::Validation {
                field: "monitoring.history_capacity".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        for rule in &self.monitoring.rules {
            rule.validate().map_err(|message| ConfigError::InvalidRule {
                name: rule.name.clone(),
                message,
            })?;
        }

        Ok(())
    }

    /// Build the read-only server registry from the `[[servers]]` section.
    pub fn build_registry(&self) -> Result<ServerRegistry, ConfigError> {
        ServerRegistry::new(self.servers.clone()).map_err(|e| match e {
            crate::registry::RegistryError::DuplicateServer(name) => {
                ConfigError::DuplicateServer(name)
            }
            other => ConfigError::Parse(other.to_string()),
        })
    }
}
