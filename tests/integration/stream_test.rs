// @critical: Turbine stream reader tests - framing, decode errors and read deadlines
use super::test_utils::{
    config_for, config_with, mount_stream, scripted_upstream, sse_response, GET_USER, STREAM_PATH,
    USERS_POOL,
};
use crankshaft::turbine::frame::MAX_FRAME_LEN;
use crankshaft::turbine::{FeedConnector, FeedSession, StreamError, TurbineReader};
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_yields_data_frames_in_order_and_skips_keepalives() {
    let server = MockServer::start().await;
    mount_stream(&server, "api", &[GET_USER, USERS_POOL]).await;

    let config = config_for(&server, &["api"], "stdout");
    let reader = TurbineReader::new(&config.turbine).unwrap();
    let mut session = reader.open("api").await.unwrap();

    let first = session.next_event().await.unwrap().expect("first event");
    assert_eq!(first.cluster_name(), "api");
    assert_eq!(first.name().unwrap(), "GetUser");

    let second = session.next_event().await.unwrap().expect("second event");
    assert_eq!(second.name().unwrap(), "UsersPool");
    assert_eq!(second.resource_type().unwrap(), "HystrixThreadPool");

    assert!(
        session.next_event().await.unwrap().is_none(),
        "closed body should end the session cleanly"
    );
}

#[tokio::test]
async fn test_sends_cluster_query_and_host_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(STREAM_PATH))
        .and(query_param("cluster", "edge api"))
        .and(header("host", "127.0.0.1"))
        .respond_with(sse_response(format!("data: {GET_USER}\n\n")))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server, &["edge api"], "stdout");
    let reader = TurbineReader::new(&config.turbine).unwrap();
    let mut session = reader.open("edge api").await.unwrap();

    let event = session.next_event().await.unwrap().expect("event");
    assert_eq!(event.cluster_name(), "edge api");
}

#[tokio::test]
async fn test_undecodable_data_frame_ends_the_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(STREAM_PATH))
        .respond_with(sse_response(format!(
            ": ping\n\ndata: {{not json\n\ndata: {GET_USER}\n\n"
        )))
        .mount(&server)
        .await;

    let config = config_for(&server, &["api"], "stdout");
    let reader = TurbineReader::new(&config.turbine).unwrap();
    let mut session = reader.open("api").await.unwrap();

    let err = session.next_event().await.unwrap_err();
    assert!(err.is_decode(), "expected decode error, got {err:?}");
}

#[tokio::test]
async fn test_non_object_payload_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(STREAM_PATH))
        .respond_with(sse_response("data: [1, 2, 3]\n\n".to_string()))
        .mount(&server)
        .await;

    let config = config_for(&server, &["api"], "stdout");
    let reader = TurbineReader::new(&config.turbine).unwrap();
    let mut session = reader.open("api").await.unwrap();

    assert!(matches!(
        session.next_event().await,
        Err(StreamError::Decode(_))
    ));
}

#[tokio::test]
async fn test_error_status_fails_the_open() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(STREAM_PATH))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let config = config_for(&server, &["api"], "stdout");
    let reader = TurbineReader::new(&config.turbine).unwrap();

    match reader.open("api").await {
        Err(StreamError::Status { status, url }) => {
            assert_eq!(status, 404);
            assert!(url.contains("cluster=api"), "{url}");
        }
        Err(other) => panic!("expected status error, got {other:?}"),
        Ok(_) => panic!("expected status error, got a session"),
    }
}

#[tokio::test]
async fn test_slow_response_headers_hit_the_deadline() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(STREAM_PATH))
        .respond_with(sse_response(String::new()).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let mut config = config_for(&server, &["api"], "stdout");
    config.turbine.read_timeout_secs = 1;
    let reader = TurbineReader::new(&config.turbine).unwrap();

    match reader.open("api").await {
        Err(StreamError::Connect(message)) => {
            assert!(message.contains("No response headers"), "{message}")
        }
        Err(other) => panic!("expected connect error, got {other:?}"),
        Ok(_) => panic!("expected connect error, got a session"),
    }
}

fn reader_for(port: u16) -> TurbineReader {
    let mut config = config_with(port, &["api"], "stdout", 9);
    config.turbine.read_timeout_secs = 1;
    TurbineReader::new(&config.turbine).unwrap()
}

fn data_frame(payload: &str) -> Vec<u8> {
    format!("data: {payload}\n").into_bytes()
}

#[tokio::test]
async fn test_stall_after_a_frame_times_out() {
    let port = scripted_upstream(vec![(Duration::ZERO, data_frame(GET_USER))]).await;
    let mut session = reader_for(port).open("api").await.unwrap();

    let event = session.next_event().await.unwrap().expect("event");
    assert_eq!(event.name().unwrap(), "GetUser");

    let started = std::time::Instant::now();
    let err = session.next_event().await.unwrap_err();
    assert!(
        matches!(err, StreamError::Timeout(limit) if limit == Duration::from_secs(1)),
        "got {err:?}"
    );
    assert!(err.is_io());
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_keepalives_refresh_the_read_deadline() {
    let ping = b": ping\n".to_vec();
    let gap = Duration::from_millis(700);
    // keep-alives span twice the read timeout
    let port = scripted_upstream(vec![
        (Duration::ZERO, ping.clone()),
        (gap, ping.clone()),
        (gap, ping.clone()),
        (gap, data_frame(USERS_POOL)),
    ])
    .await;
    let mut session = reader_for(port).open("api").await.unwrap();

    let event = session.next_event().await.unwrap().expect("event");
    assert_eq!(event.name().unwrap(), "UsersPool");
}

#[tokio::test]
async fn test_unterminated_oversized_frame_ends_the_session() {
    let mut frame = b"data: ".to_vec();
    frame.resize(MAX_FRAME_LEN + 64, b'x');
    let port = scripted_upstream(vec![(Duration::ZERO, frame)]).await;
    let mut session = reader_for(port).open("api").await.unwrap();

    let err = session.next_event().await.unwrap_err();
    assert!(matches!(err, StreamError::Io(_)), "got {err:?}");
    assert!(err.is_io());
}
