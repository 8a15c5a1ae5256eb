//! Error envelope for the admin API.
//!
//! Every failure is rendered as
//! `{"error": {"message": ..., "type": ..., "code": ...}}` with the HTTP status
//! derived from the code.

use crate::monitoring::MonitoringError;
use crate::registry::RegistryError;
use crate::routing::RoutingError;
use crate::supervisor::{LaunchError, SupervisorError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Error response envelope.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiError {
    pub error: ApiErrorBody,
}

/// Error details.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiErrorBody {
    pub message: String,
    pub r#type: String,
    pub code: String,
}

impl ApiError {
    fn new(message: impl Into<String>, r#type: &str, code: &str) -> Self {
        Self {
            error: ApiErrorBody {
                message: message.into(),
                r#type: r#type.to_string(),
                code: code.to_string(),
            },
        }
    }

    /// 400
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(message, "invalid_request_error", "invalid_request_error")
    }

    /// 404 for names absent from the registry.
    pub fn server_not_found(name: &str) -> Self {
        Self::new(
            format!("Server '{}' not found", name),
            "invalid_request_error",
            "server_not_found",
        )
    }

    /// 404 for other missing resources.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(message, "invalid_request_error", "not_found")
    }

    /// 409
    pub fn conflict(message: impl Into<String>, code: &str) -> Self {
        Self::new(message, "conflict_error", code)
    }

    /// 503 when no server can take the request.
    pub fn selection_exhausted(message: impl Into<String>) -> Self {
        Self::new(message, "server_error", "selection_exhausted")
    }

    /// 500
    pub fn internal(message: impl Into<String>, code: &str) -> Self {
        Self::new(message, "server_error", code)
    }

    pub fn status_code(&self) -> StatusCode {
        match self.error.code.as_str() {
            "invalid_request_error" => StatusCode::BAD_REQUEST,
            "server_not_found" | "not_found" => StatusCode::NOT_FOUND,
            "server_disabled" | "port_in_use" => StatusCode::CONFLICT,
            "selection_exhausted" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}

impl From<RegistryError> for ApiError {
    fn from(error: RegistryError) -> Self {
        match error {
            RegistryError::UnknownServer(name) => Self::server_not_found(&name),
            other => Self::internal(other.to_string(), "configuration_error"),
        }
    }
}

impl From<SupervisorError> for ApiError {
    fn from(error: SupervisorError) -> Self {
        match error {
            SupervisorError::Configuration(inner) => inner.into(),
            SupervisorError::ServerDisabled(_) => {
                Self::conflict(error.to_string(), "server_disabled")
            }
            SupervisorError::Launch(LaunchError::PortInUse { .. }) => {
                Self::conflict(error.to_string(), "port_in_use")
            }
            SupervisorError::Launch(_) => Self::internal(error.to_string(), "launch_failed"),
        }
    }
}

impl From<RoutingError> for ApiError {
    fn from(error: RoutingError) -> Self {
        match error {
            RoutingError::SelectionExhausted { .. } => Self::selection_exhausted(error.to_string()),
            RoutingError::UnknownServer(name) => Self::server_not_found(&name),
        }
    }
}

impl From<MonitoringError> for ApiError {
    fn from(error: MonitoringError) -> Self {
        match error {
            MonitoringError::Configuration(_) => Self::bad_request(error.to_string()),
            MonitoringError::Store(_) => Self::internal(error.to_string(), "store_error"),
        }
    }
}
