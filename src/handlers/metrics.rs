use crate::pipeline::{ClusterStats, PipelineStats};
use crate::state::AppState;
use crate::turbine::SupervisorState;
use axum::{
    extract::State,
    http::HeaderValue,
    response::{IntoResponse, Response},
    Json,
};

const CACHE_CONTROL_NO_CACHE: &str = "no-cache, no-store, must-revalidate";
const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";
const METRIC_NAMESPACE: &str = "crankshaft";

type ClusterField = fn(&ClusterStats) -> u64;

const CLUSTER_COUNTERS: &[(&str, &str, ClusterField)] = &[
    (
        "connect_attempts_total",
        "Connection attempts per cluster",
        |c| c.connect_attempts,
    ),
    (
        "sessions_opened_total",
        "Sessions that reached the streaming state",
        |c| c.sessions_opened,
    ),
    (
        "session_failures_total",
        "Sessions that ended and were restarted",
        |c| c.session_failures,
    ),
    (
        "read_timeouts_total",
        "Sessions dropped because no frame arrived in time",
        |c| c.timeouts,
    ),
    (
        "decode_errors_total",
        "Sessions dropped because of an undecodable data frame",
        |c| c.decode_errors,
    ),
    (
        "events_received_total",
        "Events decoded from the stream",
        |c| c.events_received,
    ),
];

fn validate_metric_name(name: &str) -> String {
    // Prometheus metric names must match [a-zA-Z_:][a-zA-Z0-9_:]*
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == ':' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn write_header(out: &mut String, name: &str, help: &str, metric_type: &str) {
    out.push_str(&format!(
        "# HELP {name} {help}\n# TYPE {name} {metric_type}\n"
    ));
}

pub fn render_prometheus(stats: &PipelineStats) -> String {
    let mut out = String::with_capacity(2048);

    let events = validate_metric_name(&format!("{METRIC_NAMESPACE}_events_dispatched_total"));
    write_header(&mut out, &events, "Events handed to the sink", "counter");
    out.push_str(&format!("{events} {}\n", stats.events_dispatched));

    let failures = validate_metric_name(&format!("{METRIC_NAMESPACE}_sink_failures_total"));
    write_header(&mut out, &failures, "Events the sink failed to write", "counter");
    out.push_str(&format!("{failures} {}\n", stats.sink_failures));

    for (suffix, help, field) in CLUSTER_COUNTERS {
        let name = validate_metric_name(&format!("{METRIC_NAMESPACE}_cluster_{suffix}"));
        write_header(&mut out, &name, help, "counter");
        for (cluster, cluster_stats) in &stats.clusters {
            out.push_str(&format!(
                "{name}{{cluster=\"{}\"}} {}\n",
                escape_label_value(cluster),
                field(cluster_stats)
            ));
        }
    }

    let streaming = validate_metric_name(&format!("{METRIC_NAMESPACE}_cluster_streaming"));
    write_header(
        &mut out,
        &streaming,
        "1 while the cluster stream is attached",
        "gauge",
    );
    for (cluster, cluster_stats) in &stats.clusters {
        let value = u8::from(cluster_stats.state == SupervisorState::Streaming);
        out.push_str(&format!(
            "{streaming}{{cluster=\"{}\"}} {value}\n",
            escape_label_value(cluster)
        ));
    }

    out
}

pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.metrics.get_stats().await;
    (
        [(
            axum::http::header::CACHE_CONTROL,
            HeaderValue::from_static(CACHE_CONTROL_NO_CACHE),
        )],
        Json(stats),
    )
}

pub async fn prometheus_metrics_handler(State(state): State<AppState>) -> Response {
    let stats = state.metrics.get_stats().await;
    (
        [
            (
                axum::http::header::CONTENT_TYPE,
                HeaderValue::from_static(PROMETHEUS_CONTENT_TYPE),
            ),
            (
                axum::http::header::CACHE_CONTROL,
                HeaderValue::from_static(CACHE_CONTROL_NO_CACHE),
            ),
        ],
        render_prometheus(&stats),
    )
        .into_response()
}
