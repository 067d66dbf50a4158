// @critical: Status endpoint tests, driven through the router without a socket
use super::test_utils::config_with;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use crankshaft::handlers::status_router;
use crankshaft::pipeline::PipelineMetrics;
use crankshaft::state::AppState;
use crankshaft::turbine::{StreamError, SupervisorState};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt;

/// Reasonable body size limit for tests (1MB)
const TEST_BODY_LIMIT: usize = 1024 * 1024;

async fn state() -> AppState {
    let config = config_with(8080, &["api", "web"], "stdout", 8125);
    let metrics = Arc::new(PipelineMetrics::new());
    metrics.register_cluster("api").await;
    metrics.register_cluster("web").await;

    AppState {
        config: Arc::new(config),
        metrics,
        backend: "stdout",
    }
}

async fn get(state: AppState, uri: &str) -> (StatusCode, String) {
    let response = status_router(state)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), TEST_BODY_LIMIT)
        .await
        .expect("Failed to read response body");
    (status, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn test_health_is_degraded_until_every_cluster_streams() {
    let state = state().await;
    state
        .metrics
        .record_state("api", SupervisorState::Streaming)
        .await;

    let (status, body) = get(state.clone(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["backend"], "stdout");
    assert_eq!(json["upstream"], "127.0.0.1:8080");
    assert_eq!(json["clusters"]["api"]["state"], "streaming");
    assert_eq!(json["clusters"]["web"]["state"], "connecting");
    assert!(json.get("version").is_some());

    state
        .metrics
        .record_state("web", SupervisorState::Streaming)
        .await;
    let (_, body) = get(state, "/health").await;
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_metrics_reports_counters_as_json() {
    let state = state().await;
    state.metrics.record_attempt("api").await;
    state.metrics.record_event("api").await;
    state.metrics.record_dispatch(true).await;
    state
        .metrics
        .record_failure("web", &StreamError::Timeout(Duration::from_secs(10)))
        .await;

    let (status, body) = get(state, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["events_dispatched"], 1);
    assert_eq!(json["clusters"]["api"]["events_received"], 1);
    assert_eq!(json["clusters"]["api"]["connect_attempts"], 1);
    assert_eq!(json["clusters"]["web"]["timeouts"], 1);
    assert!(json["clusters"]["web"]["last_error"]
        .as_str()
        .unwrap()
        .contains("10s"));
}

#[tokio::test]
async fn test_prometheus_exposition_lists_every_cluster() {
    let state = state().await;
    state.metrics.record_event("web").await;

    let (status, body) = get(state, "/metrics/prometheus").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("crankshaft_cluster_events_received_total{cluster=\"api\"} 0\n"));
    assert!(body.contains("crankshaft_cluster_events_received_total{cluster=\"web\"} 1\n"));
    assert!(body.contains("crankshaft_cluster_streaming{cluster=\"api\"} 0\n"));
}
