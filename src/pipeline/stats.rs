use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::turbine::{StreamError, SupervisorState};

const MAX_ERROR_LEN: usize = 500;

#[derive(Clone, Debug, Default, Serialize)]
pub struct ClusterStats {
    pub state: SupervisorState,
    pub connect_attempts: u64,
    pub sessions_opened: u64,
    pub session_failures: u64,
    pub timeouts: u64,
    pub decode_errors: u64,
    pub events_received: u64,
    pub last_error: Option<String>,
    pub last_event_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct PipelineStats {
    pub events_dispatched: u64,
    pub sink_failures: u64,
    pub clusters: BTreeMap<String, ClusterStats>,
}

impl PipelineStats {
    pub fn events_received(&self) -> u64 {
        self.clusters.values().map(|c| c.events_received).sum()
    }
}

/// Counters shared by the supervisors and the dispatch loop.
///
/// Read-only for everything else; nothing in the pipeline branches on them.
pub struct PipelineMetrics {
    clusters: Arc<RwLock<BTreeMap<String, ClusterStats>>>,
    events_dispatched: Arc<RwLock<u64>>,
    sink_failures: Arc<RwLock<u64>>,
}

impl PipelineMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self {
            clusters: Arc::new(RwLock::new(BTreeMap::new())),
            events_dispatched: Arc::new(RwLock::new(0)),
            sink_failures: Arc::new(RwLock::new(0)),
        }
    }

    pub async fn register_cluster(&self, cluster: &str) {
        self.clusters
            .write()
            .await
            .entry(cluster.to_string())
            .or_default();
    }

    pub async fn record_state(&self, cluster: &str, state: SupervisorState) {
        let mut clusters = self.clusters.write().await;
        let stats = clusters.entry(cluster.to_string()).or_default();
        if state == SupervisorState::Streaming && stats.state != SupervisorState::Streaming {
            stats.sessions_opened += 1;
        }
        stats.state = state;
    }

    pub async fn record_attempt(&self, cluster: &str) {
        let mut clusters = self.clusters.write().await;
        clusters.entry(cluster.to_string()).or_default().connect_attempts += 1;
    }

    pub async fn record_event(&self, cluster: &str) {
        let mut clusters = self.clusters.write().await;
        let stats = clusters.entry(cluster.to_string()).or_default();
        stats.events_received += 1;
        stats.last_event_at = Some(Utc::now());
    }

    pub async fn record_failure(&self, cluster: &str, error: &StreamError) {
        let mut clusters = self.clusters.write().await;
        let stats = clusters.entry(cluster.to_string()).or_default();
        stats.session_failures += 1;
        match error {
            StreamError::Timeout(_) => stats.timeouts += 1,
            StreamError::Decode(_) => stats.decode_errors += 1,
            _ => {}
        }
        stats.last_error = Some(error.to_string().chars().take(MAX_ERROR_LEN).collect());
    }

    pub async fn record_session_end(&self, cluster: &str, reason: &str) {
        let mut clusters = self.clusters.write().await;
        let stats = clusters.entry(cluster.to_string()).or_default();
        stats.session_failures += 1;
        stats.last_error = Some(reason.to_string());
    }

    pub async fn record_dispatch(&self, success: bool) {
        *self.events_dispatched.write().await += 1;
        if !success {
            *self.sink_failures.write().await += 1;
        }
    }

    #[must_use]
    pub async fn get_stats(&self) -> PipelineStats {
        PipelineStats {
            events_dispatched: *self.events_dispatched.read().await,
            sink_failures: *self.sink_failures.read().await,
            clusters: self.clusters.read().await.clone(),
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}
