use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::models::event::Event;
use crate::pipeline::stats::PipelineMetrics;
use crate::sinks::MetricSink;

/// Drains the merged event channel into the configured sink, one event at a
/// time.
pub struct Dispatcher {
    sink: Arc<dyn MetricSink>,
    metrics: Arc<PipelineMetrics>,
}

impl Dispatcher {
    pub fn new(sink: Arc<dyn MetricSink>, metrics: Arc<PipelineMetrics>) -> Self {
        Self { sink, metrics }
    }

    /// Runs until every sender is gone and returns the number of events seen.
    pub async fn run(&self, mut rx: mpsc::Receiver<Event>) -> u64 {
        info!("Dispatching events to {} backend", self.sink.name());
        let mut dispatched = 0u64;

        while let Some(event) = rx.recv().await {
            let result = self.sink.write_event(&event).await;
            if let Err(e) = &result {
                warn!("{} failed to write {}: {}", self.sink.name(), event, e);
            }
            self.metrics.record_dispatch(result.is_ok()).await;
            dispatched += 1;
        }

        info!("Event channel closed after {} events", dispatched);
        dispatched
    }
}
