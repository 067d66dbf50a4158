use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::models::event::Event;
use crate::pipeline::stats::PipelineMetrics;
use crate::turbine::{FeedConnector, FeedSession, StreamError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SupervisorState {
    #[default]
    Connecting,
    Streaming,
}

enum SessionEnd {
    Failed(StreamError),
    EndOfStream,
    ChannelClosed,
}

/// Keeps one cluster's stream attached, reconnecting forever.
///
/// Every failure, clean end of stream included, is followed by the same fixed
/// delay before the next attempt. There is no retry ceiling. The loop only
/// returns once the event receiver has been dropped.
pub struct ClusterSupervisor<C: FeedConnector> {
    cluster: String,
    connector: Arc<C>,
    reconnect_delay: Duration,
    metrics: Arc<PipelineMetrics>,
}

impl<C: FeedConnector> ClusterSupervisor<C> {
    pub fn new(
        cluster: impl Into<String>,
        connector: Arc<C>,
        reconnect_delay: Duration,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            cluster: cluster.into(),
            connector,
            reconnect_delay,
            metrics,
        }
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    pub async fn run(self, tx: mpsc::Sender<Event>) {
        loop {
            self.metrics
                .record_state(&self.cluster, SupervisorState::Connecting)
                .await;
            self.metrics.record_attempt(&self.cluster).await;

            match self.run_session(&tx).await {
                SessionEnd::ChannelClosed => {
                    info!(
                        "Event channel closed, stopping Turbine supervisor for {}",
                        self.cluster
                    );
                    return;
                }
                SessionEnd::EndOfStream => {
                    self.metrics
                        .record_session_end(&self.cluster, "stream ended")
                        .await;
                    warn!(
                        "Turbine stream for {} ended, restarting in {:?}",
                        self.cluster, self.reconnect_delay
                    );
                }
                SessionEnd::Failed(e) => {
                    self.metrics.record_failure(&self.cluster, &e).await;
                    warn!(
                        "Turbine session for {} ended with error: {}, restarting in {:?}",
                        self.cluster, e, self.reconnect_delay
                    );
                }
            }

            if tx.is_closed() {
                return;
            }
            tokio::time::sleep(self.reconnect_delay).await;
        }
    }

    async fn run_session(&self, tx: &mpsc::Sender<Event>) -> SessionEnd {
        let mut session = match self.connector.open(&self.cluster).await {
            Ok(session) => session,
            Err(e) => return SessionEnd::Failed(e),
        };

        self.metrics
            .record_state(&self.cluster, SupervisorState::Streaming)
            .await;

        loop {
            match session.next_event().await {
                Ok(Some(event)) => {
                    self.metrics.record_event(&self.cluster).await;
                    if tx.send(event).await.is_err() {
                        return SessionEnd::ChannelClosed;
                    }
                }
                Ok(None) => return SessionEnd::EndOfStream,
                Err(e) => return SessionEnd::Failed(e),
            }
        }
    }
}
