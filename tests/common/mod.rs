//! Shared test utilities for fleetgate integration tests.
//!
//! Provides builders for server descriptors, fleet configurations and
//! wiremock backends that speak the vLLM OpenAI-compatible surface.

#![allow(dead_code)]

use fleetgate::api::{create_router, AppState};
use fleetgate::config::FleetConfig;
use fleetgate::fleet::FleetController;
use fleetgate::registry::{LaunchParams, ServerDescriptor};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// =============================================================================
// Well-Known Test Constants
// =============================================================================

pub const TEST_MODEL: &str = "llama3-8b";

/// vLLM exposition sample: 3 running, 1 waiting, 412.5 tok/s, 42% cache.
pub const VLLM_METRICS: &str = r#"# HELP vllm:num_requests_running Number of requests currently running on GPU.
# TYPE vllm:num_requests_running gauge
vllm:num_requests_running{model_name="llama3-8b"} 3.0
vllm:num_requests_waiting{model_name="llama3-8b"} 1.0
vllm:avg_generation_throughput_toks_per_s{model_name="llama3-8b"} 412.5
vllm:gpu_cache_usage_perc{model_name="llama3-8b"} 0.42
"#;

// =============================================================================
// Server Builders
// =============================================================================

/// Enabled, non-autostart server on 127.0.0.1.
pub fn make_server(name: &str, port: u16, model: &str) -> ServerDescriptor {
    ServerDescriptor {
        name: name.to_string(),
        host: "127.0.0.1".to_string(),
        port,
        model: model.to_string(),
        launch: LaunchParams::default(),
        enabled: true,
        autostart: false,
    }
}

/// Server pointing at a wiremock backend.
pub fn server_for(mock: &MockServer, name: &str) -> ServerDescriptor {
    make_server(name, mock.address().port(), TEST_MODEL)
}

/// A port nothing listens on.
pub fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

// =============================================================================
// Mock Backends
// =============================================================================

/// Backend whose model listing returns `status`.
pub async fn mock_backend(status: u16) -> MockServer {
    let mock = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(status).set_body_json(serde_json::json!({
            "object": "list",
            "data": [{"id": TEST_MODEL, "object": "model"}]
        })))
        .mount(&mock)
        .await;

    mock
}

/// Healthy backend that also serves Prometheus metrics.
pub async fn mock_vllm() -> MockServer {
    let mock = mock_backend(200).await;

    Mock::given(method("GET"))
        .and(path("/metrics"))
        .respond_with(ResponseTemplate::new(200).set_body_string(VLLM_METRICS))
        .mount(&mock)
        .await;

    mock
}

// =============================================================================
// Fleet Builders
// =============================================================================

/// Configuration with short probe timeouts and background loops disabled.
pub fn fleet_config(servers: Vec<ServerDescriptor>) -> FleetConfig {
    let mut config = FleetConfig::default();
    config.health_check.enabled = false;
    config.health_check.tcp_timeout_ms = 300;
    config.health_check.http_timeout_seconds = 2;
    config.monitoring.enabled = false;
    config.supervisor.check_port_conflict = false;
    config.servers = servers;
    config
}

pub fn make_fleet(servers: Vec<ServerDescriptor>) -> Arc<FleetController> {
    Arc::new(FleetController::new(fleet_config(servers)).unwrap())
}

pub fn make_app(fleet: Arc<FleetController>) -> axum::Router {
    create_router(Arc::new(AppState::new(fleet)))
}
