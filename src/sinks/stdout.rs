use async_trait::async_trait;
use tracing::info;

use crate::metrics::{ClassifierPolicy, FieldClassifier};
use crate::models::event::Event;
use crate::sinks::{log_unexpected, MetricSink, SinkResult};

pub const BACKEND_NAME: &str = "stdout";

/// Logs gauges instead of shipping them. Useful to check a live upstream.
pub struct StdoutSink {
    classifier: FieldClassifier,
}

impl StdoutSink {
    pub fn new() -> Self {
        Self {
            classifier: FieldClassifier::new(ClassifierPolicy::raw()),
        }
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricSink for StdoutSink {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    async fn write_event(&self, event: &Event) -> SinkResult<()> {
        let classified = self.classifier.classify(event)?;
        log_unexpected(BACKEND_NAME, event, &classified);

        for emission in &classified.emissions {
            info!(target: "crankshaft::gauge", "{} = {}", emission.key, emission.value);
        }
        Ok(())
    }
}
