//! Error types for routing failures

use thiserror::Error;

/// Errors that can occur during server selection
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RoutingError {
    /// No candidate survived filtering. Callers should short-circuit rather
    /// than retry against the same fleet.
    #[error("{reason} for model '{model}'")]
    SelectionExhausted { model: String, reason: String },

    #[error("unknown server: {0}")]
    UnknownServer(String),
}

impl RoutingError {
    pub(crate) fn no_server_for(model: &str) -> Self {
        RoutingError::SelectionExhausted {
            model: model.to_string(),
            reason: "No enabled server is configured".to_string(),
        }
    }

    pub(crate) fn no_healthy_server(model: &str, configured: usize) -> Self {
        RoutingError::SelectionExhausted {
            model: model.to_string(),
            reason: format!("None of {} configured servers is healthy", configured),
        }
    }
}
