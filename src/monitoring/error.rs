//! Error types for the monitoring engine.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MonitoringError {
    /// Malformed rule or other invalid monitoring input
    #[error("invalid monitoring configuration: {0}")]
    Configuration(String),

    /// The metric store rejected a read or write
    #[error("metric store error: {0}")]
    Store(String),
}
