//! End-to-end selection over probed mock backends.

mod common;

use common::{closed_port, make_fleet, make_server, mock_backend, server_for, TEST_MODEL};
use fleetgate::routing::{RoutingError, RoutingStrategy};
use std::collections::HashMap;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_selection_follows_probe_results() {
    let a = mock_backend(200).await;
    let b = mock_backend(200).await;
    let fleet = make_fleet(vec![
        server_for(&a, "a"),
        server_for(&b, "b"),
        make_server("down", closed_port(), TEST_MODEL),
    ]);
    fleet.health().check_all().await;

    let mut picks: HashMap<String, usize> = HashMap::new();
    for _ in 0..100 {
        let selection = fleet
            .balancer()
            .select_server(TEST_MODEL, RoutingStrategy::RoundRobin)
            .unwrap();
        *picks.entry(selection.server.clone()).or_default() += 1;
        fleet.balancer().complete_request(&selection.server);
    }

    assert_eq!(picks.get("down"), None);
    assert_eq!(picks["a"], 50);
    assert_eq!(picks["b"], 50);
}

#[tokio::test]
async fn test_every_strategy_avoids_degraded_server() {
    let up = mock_backend(200).await;
    let degraded = mock_backend(500).await;
    let fleet = make_fleet(vec![server_for(&up, "up"), server_for(&degraded, "degraded")]);
    fleet.health().check_all().await;

    for strategy in RoutingStrategy::ALL {
        for _ in 0..20 {
            let selection = fleet.balancer().select_server(TEST_MODEL, strategy).unwrap();
            assert_eq!(selection.server, "up", "{} picked a degraded server", strategy);
        }
    }
}

#[tokio::test]
async fn test_all_down_is_selection_exhausted() {
    let fleet = make_fleet(vec![
        make_server("a", closed_port(), TEST_MODEL),
        make_server("b", closed_port(), TEST_MODEL),
    ]);
    fleet.health().check_all().await;

    let err = fleet
        .balancer()
        .select_server(TEST_MODEL, RoutingStrategy::LeastConnections)
        .unwrap_err();
    assert!(matches!(err, RoutingError::SelectionExhausted { .. }));
    assert!(err.to_string().contains("None of 2 configured servers is healthy"));
}

#[tokio::test]
async fn test_least_connections_spreads_outstanding_load() {
    let a = mock_backend(200).await;
    let b = mock_backend(200).await;
    let fleet = make_fleet(vec![server_for(&a, "a"), server_for(&b, "b")]);
    fleet.health().check_all().await;

    for _ in 0..10 {
        fleet
            .balancer()
            .select_server(TEST_MODEL, RoutingStrategy::LeastConnections)
            .unwrap();
    }

    assert_eq!(fleet.balancer().in_flight("a"), 5);
    assert_eq!(fleet.balancer().in_flight("b"), 5);

    fleet
        .balancer()
        .complete_request_with_latency("a", Duration::from_millis(120));
    let stats = fleet.balancer().get_server_statistics("a").unwrap();
    assert_eq!(stats.in_flight, 4);
    assert_eq!(stats.total_requests, 5);
    assert!(stats.avg_response_ms.is_some());

    let status = fleet.balancer().get_status();
    assert_eq!(status.total_in_flight, 9);
    assert_eq!(status.healthy_servers, 2);
}

#[tokio::test]
async fn test_recovered_server_rejoins_rotation() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock)
        .await;
    let fleet = make_fleet(vec![server_for(&mock, "flaky")]);

    fleet.health().check_all().await;
    assert!(fleet.balancer().select_default(TEST_MODEL).is_err());

    mock.reset().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
        .mount(&mock)
        .await;

    fleet.health().check_all().await;
    assert_eq!(fleet.balancer().select_default(TEST_MODEL).unwrap().server, "flaky");
}
