use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

use crate::config::AppConfig;
use crate::sinks::MetricSink;
use crate::turbine::{ClusterSupervisor, FeedConnector, StreamError, TurbineReader};

pub mod dispatch;
pub mod stats;

pub use dispatch::Dispatcher;
pub use stats::{ClusterStats, PipelineMetrics, PipelineStats};

/// Attaches to every configured cluster and feeds the sink until the process
/// stops. Only returns early if the stream reader cannot be built.
pub async fn monitor_clusters(
    config: Arc<AppConfig>,
    sink: Arc<dyn MetricSink>,
    metrics: Arc<PipelineMetrics>,
) -> Result<u64, StreamError> {
    let reader = Arc::new(TurbineReader::new(&config.turbine)?);
    Ok(run_pipeline(&config, reader, sink, metrics).await)
}

/// Spawns one supervisor per cluster over `connector` and runs the dispatch
/// loop on the current task.
pub async fn run_pipeline<C: FeedConnector>(
    config: &AppConfig,
    connector: Arc<C>,
    sink: Arc<dyn MetricSink>,
    metrics: Arc<PipelineMetrics>,
) -> u64 {
    let (tx, rx) = mpsc::channel(config.pipeline.channel_capacity.max(1));
    let reconnect_delay = Duration::from_secs(config.turbine.reconnect_delay_secs);

    for cluster in &config.turbine.clusters {
        metrics.register_cluster(cluster).await;
        let supervisor =
            ClusterSupervisor::new(cluster.clone(), connector.clone(), reconnect_delay, metrics.clone());
        info!("Monitoring cluster {}", supervisor.cluster());
        tokio::spawn(supervisor.run(tx.clone()));
    }
    drop(tx);

    Dispatcher::new(sink, metrics).run(rx).await
}
