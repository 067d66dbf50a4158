// @critical: InfluxDB sink tests - series write API
use crankshaft::config::InfluxDbConfig;
use crankshaft::models::Event;
use crankshaft::sinks::{InfluxDbSink, MetricSink, SinkError};
use serde_json::Value;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer) -> InfluxDbConfig {
    InfluxDbConfig {
        host: "127.0.0.1".to_string(),
        port: server.address().port(),
        username: "root".to_string(),
        password: "secret".to_string(),
        database: "hystrix".to_string(),
        tls_enabled: false,
    }
}

#[tokio::test]
async fn test_posts_one_series_per_gauge() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/db/hystrix/series"))
        .and(query_param("u", "root"))
        .and(query_param("p", "secret"))
        .and(query_param("time_precision", "ms"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let sink = InfluxDbSink::new(&config(&server)).unwrap();
    let event = Event::from_payload(
        "api",
        r#"{"name":"GetUser","type":"HystrixCommand","reportingHosts":4,
            "rollingCountSuccess":12,"isCircuitBreakerOpen":true,"errorPercentage":50}"#,
    )
    .unwrap();
    sink.write_event(&event).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let series = body.as_array().unwrap();
    assert_eq!(series.len(), 2, "{body}");

    assert_eq!(series[0]["name"], "api.command.GetUser.isCircuitBreakerOpen");
    assert_eq!(series[0]["columns"], serde_json::json!(["time", "value"]));
    assert_eq!(series[0]["points"][0][1], 1.0);

    assert_eq!(series[1]["name"], "api.command.GetUser.rollingCountSuccess");
    assert_eq!(series[1]["points"][0][1], 12.0);
    assert!(series[1]["points"][0][0].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn test_events_without_gauges_are_not_posted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let sink = InfluxDbSink::new(&config(&server)).unwrap();
    let event = Event::from_payload(
        "api",
        r#"{"name":"GetUser","type":"HystrixCommand","errorPercentage":50}"#,
    )
    .unwrap();
    sink.write_event(&event).await.unwrap();
}

#[tokio::test]
async fn test_rejected_write_is_a_backend_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/db/hystrix/series"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid credentials"))
        .mount(&server)
        .await;

    let sink = InfluxDbSink::new(&config(&server)).unwrap();
    let event = Event::from_payload(
        "api",
        r#"{"name":"GetUser","type":"HystrixCommand","rollingCountSuccess":1}"#,
    )
    .unwrap();

    match sink.write_event(&event).await {
        Err(SinkError::Backend(message)) => {
            assert!(message.contains("401"), "{message}");
            assert!(message.contains("invalid credentials"), "{message}");
        }
        other => panic!("expected backend error, got {other:?}"),
    }
}
