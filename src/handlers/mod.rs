use axum::{routing::get, Router};

use crate::state::AppState;

pub mod health;
pub mod metrics;

/// Read-only status endpoints.
pub fn status_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(metrics::metrics_handler))
        .route(
            "/metrics/prometheus",
            get(metrics::prometheus_metrics_handler),
        )
        .with_state(state)
}
