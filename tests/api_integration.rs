//! Admin API contract tests driven through the router in-process.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{closed_port, make_app, make_fleet, make_server, mock_backend, mock_vllm, server_for, TEST_MODEL};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn send(app: axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, Value) {
    send(app, "GET", uri, None).await
}

#[tokio::test]
async fn test_gateway_health_reports_fleet_counts() {
    let mock = mock_backend(200).await;
    let fleet = make_fleet(vec![
        server_for(&mock, "up"),
        make_server("down", closed_port(), TEST_MODEL),
    ]);
    fleet.health().check_all().await;

    let (status, body) = get(make_app(fleet), "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["servers"]["total"], 2);
    assert_eq!(body["servers"]["healthy"], 1);
    assert_eq!(body["servers"]["running"], 0);
}

#[tokio::test]
async fn test_gateway_health_empty_fleet_is_unhealthy() {
    let (status, body) = get(make_app(make_fleet(vec![])), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "unhealthy");
}

#[tokio::test]
async fn test_list_servers_in_registry_order() {
    let fleet = make_fleet(vec![
        make_server("b", closed_port(), TEST_MODEL),
        make_server("a", closed_port(), "other"),
    ]);

    let (status, body) = get(make_app(fleet), "/admin/servers").await;

    assert_eq!(status, StatusCode::OK);
    let servers = body.as_array().unwrap();
    assert_eq!(servers.len(), 2);
    assert_eq!(servers[0]["name"], "b");
    assert_eq!(servers[1]["model"], "other");
    assert_eq!(servers[0]["running"], false);
    assert_eq!(servers[0]["health"], "UNKNOWN");
}

#[tokio::test]
async fn test_unknown_server_uses_error_envelope() {
    let app = make_app(make_fleet(vec![]));

    let (status, body) = send(app, "POST", "/admin/servers/ghost/start", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "server_not_found");
    assert!(body["error"]["message"].as_str().unwrap().contains("ghost"));
}

#[tokio::test]
async fn test_start_disabled_server_conflicts() {
    let mut server = make_server("off", closed_port(), TEST_MODEL);
    server.enabled = false;
    let app = make_app(make_fleet(vec![server]));

    let (status, body) = send(app, "POST", "/admin/servers/off/start", None).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "server_disabled");
}

#[tokio::test]
async fn test_stop_idle_server_succeeds() {
    let app = make_app(make_fleet(vec![make_server("a", closed_port(), TEST_MODEL)]));

    let (status, body) = send(app, "POST", "/admin/servers/a/stop", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn test_admin_health_probes_now() {
    let mock = mock_backend(200).await;
    let fleet = make_fleet(vec![server_for(&mock, "a")]);
    let app = make_app(fleet.clone());

    let (status, body) = get(app.clone(), "/admin/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["server_name"], "a");
    assert_eq!(body[0]["status"], "UP");

    let (status, body) = get(app.clone(), "/admin/health/a").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["models"][0], TEST_MODEL);

    let (status, body) = send(app, "DELETE", "/admin/health/cache/a", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(fleet.health().cached("a").is_none());
}

#[tokio::test]
async fn test_route_and_complete() {
    let mock = mock_backend(200).await;
    let fleet = make_fleet(vec![server_for(&mock, "a")]);
    fleet.health().check_all().await;
    let app = make_app(fleet.clone());

    let (status, body) = send(
        app.clone(),
        "POST",
        "/admin/route",
        Some(json!({"model": TEST_MODEL, "strategy": "least-connections"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["server"], "a");
    assert_eq!(body["strategy"], "least_connections");
    assert_eq!(body["in_flight"], 1);

    let (status, body) = send(
        app.clone(),
        "POST",
        "/admin/route/a/complete",
        Some(json!({"latency_ms": 250})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["in_flight"], 0);

    let (status, body) = get(app, "/admin/balancer/a").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_requests"], 1);
    assert_eq!(body["avg_response_ms"], 250.0);
}

#[tokio::test]
async fn test_route_without_healthy_server_is_503() {
    let fleet = make_fleet(vec![make_server("a", closed_port(), TEST_MODEL)]);
    fleet.health().check_all().await;

    let (status, body) = send(
        make_app(fleet),
        "POST",
        "/admin/route",
        Some(json!({"model": TEST_MODEL})),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "selection_exhausted");
}

#[tokio::test]
async fn test_route_unknown_strategy_is_400() {
    let app = make_app(make_fleet(vec![]));

    let (status, body) = send(
        app,
        "POST",
        "/admin/route",
        Some(json!({"model": TEST_MODEL, "strategy": "fastest"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_request_error");
}

#[tokio::test]
async fn test_balancer_reset_zeroes_counters() {
    let mock = mock_backend(200).await;
    let fleet = make_fleet(vec![server_for(&mock, "a")]);
    fleet.health().check_all().await;
    fleet.balancer().select_default(TEST_MODEL).unwrap();
    let app = make_app(fleet.clone());

    let (status, _) = send(app.clone(), "POST", "/admin/balancer/reset", None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = get(app, "/admin/balancer").await;
    assert_eq!(body["total_in_flight"], 0);
    assert_eq!(body["servers"][0]["total_requests"], 0);
}

#[tokio::test]
async fn test_rules_crud() {
    let app = make_app(make_fleet(vec![]));

    let rule = json!({
        "name": "queue_backlog",
        "metric": "requests_waiting",
        "operator": "gt",
        "threshold": 10.0,
        "sustain_seconds": 30,
        "severity": "warning"
    });
    let (status, body) = send(app.clone(), "PUT", "/admin/rules/queue_backlog", Some(rule)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "queue_backlog");

    let (_, body) = get(app.clone(), "/admin/rules").await;
    assert!(body
        .as_array()
        .unwrap()
        .iter()
        .any(|rule| rule["name"] == "queue_backlog"));

    let (status, _) = send(app.clone(), "DELETE", "/admin/rules/queue_backlog", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(app, "DELETE", "/admin/rules/queue_backlog", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn test_put_rule_rejects_bad_input() {
    let app = make_app(make_fleet(vec![]));

    // Name in the path must match the body
    let mismatched = json!({
        "name": "other",
        "metric": "requests_waiting",
        "operator": "gt",
        "threshold": 10.0,
        "severity": "warning"
    });
    let (status, body) = send(app.clone(), "PUT", "/admin/rules/mine", Some(mismatched)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_request_error");

    let malformed = json!({"name": "mine", "operator": "sideways"});
    let (status, body) = send(app, "PUT", "/admin/rules/mine", Some(malformed)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_request_error");
}

#[tokio::test]
async fn test_alerts_filter_unknown_server() {
    let app = make_app(make_fleet(vec![]));

    let (status, body) = get(app.clone(), "/admin/alerts").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    let (status, _) = get(app, "/admin/alerts?server=ghost").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metric_history_after_cycle() {
    let mock = mock_vllm().await;
    let fleet = make_fleet(vec![server_for(&mock, "a")]);
    fleet.monitoring().run_cycle().await;
    let app = make_app(fleet);

    let (status, body) = get(app.clone(), "/admin/metrics/a/performance/requests_running").await;
    assert_eq!(status, StatusCode::OK);
    let samples = body.as_array().unwrap();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0]["value"], 3.0);

    let (status, _) = get(app.clone(), "/admin/metrics/a/bogus/requests_running").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(
        app.clone(),
        "/admin/metrics/a/health/health_status?from=2026-01-02T00:00:00Z&to=2026-01-01T00:00:00Z",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = get(app, "/admin/metrics/ghost/health/health_status").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "server_not_found");
}

#[tokio::test]
async fn test_monitoring_summary_endpoint() {
    let mock = mock_backend(200).await;
    let fleet = make_fleet(vec![server_for(&mock, "a")]);
    fleet.health().check_all().await;

    let (status, body) = get(make_app(fleet), "/admin/monitoring/summary").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_servers"], 1);
    assert_eq!(body["healthy_servers"], 1);
    assert_eq!(body["total_active_alerts"], 0);
}

#[tokio::test]
async fn test_metrics_endpoint_serves_text() {
    let app = make_app(make_fleet(vec![]));
    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
