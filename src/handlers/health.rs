use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;

use crate::state::AppState;
use crate::turbine::SupervisorState;

const CACHE_CONTROL_NO_CACHE: &str = "no-cache, no-store, must-revalidate";

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.metrics.get_stats().await;

    let clusters: serde_json::Map<String, serde_json::Value> = stats
        .clusters
        .iter()
        .map(|(name, cluster)| {
            (
                name.clone(),
                json!({
                    "state": cluster.state,
                    "connect_attempts": cluster.connect_attempts,
                    "last_error": cluster.last_error,
                    "last_event_at": cluster.last_event_at,
                }),
            )
        })
        .collect();

    let all_streaming = stats
        .clusters
        .values()
        .all(|c| c.state == SupervisorState::Streaming);

    (
        [(
            axum::http::header::CACHE_CONTROL,
            axum::http::HeaderValue::from_static(CACHE_CONTROL_NO_CACHE),
        )],
        Json(json!({
            "status": if all_streaming { "ok" } else { "degraded" },
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "backend": state.backend,
            "upstream": format!("{}:{}", state.config.turbine.host, state.config.turbine.port),
            "clusters": clusters,
        })),
    )
}
