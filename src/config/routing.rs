//! Routing configuration

use serde::{Deserialize, Serialize};

use crate::routing::RoutingStrategy;

/// Load balancer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Strategy used when a caller does not name one
    pub default_strategy: RoutingStrategy,
    /// Probe latency above which a healthy server is not considered responsive
    pub responsive_threshold_ms: u64,
    /// How strongly in-flight load shrinks a server's weight
    pub load_dampening: f64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            default_strategy: RoutingStrategy::RoundRobin,
            responsive_threshold_ms: 5000,
            load_dampening: 0.1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing_config_defaults() {
        let config = RoutingConfig::default();
        assert_eq!(config.default_strategy, RoutingStrategy::RoundRobin);
        assert_eq!(config.responsive_threshold_ms, 5000);
        assert!((config.load_dampening - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn test_routing_config_toml() {
        let config: RoutingConfig = toml::from_str(
            r#"
            default_strategy = "least_connections"
            responsive_threshold_ms = 2000
            "#,
        )
        .unwrap();
        assert_eq!(config.default_strategy, RoutingStrategy::LeastConnections);
        assert_eq!(config.responsive_threshold_ms, 2000);
    }
}
