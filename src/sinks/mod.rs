//! Metric sinks.
//!
//! A sink receives whole [`Event`]s from the dispatch loop and decides how
//! they are classified and where the resulting gauges go. Sinks are built
//! once at startup through the [`SinkRegistry`].

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

use crate::config::AppConfig;
use crate::metrics::{Classified, ClassifyError};
use crate::models::event::Event;

pub mod influxdb;
pub mod statsd;
pub mod stdout;

pub use influxdb::InfluxDbSink;
pub use statsd::StatsdSink;
pub use stdout::StdoutSink;

pub type SinkResult<T> = Result<T, SinkError>;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Skipping event: {0}")]
    Classify(#[from] ClassifyError),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Backend rejected write: {0}")]
    Backend(String),
    #[error("Invalid sink configuration: {0}")]
    Config(String),
    #[error("{0} is not a valid backend type")]
    UnknownBackend(String),
}

#[async_trait]
pub trait MetricSink: Send + Sync {
    /// Backend name, as selected by `backend.type`.
    fn name(&self) -> &'static str;

    /// Classifies and forwards one event.
    ///
    /// Called by a single dispatch loop, never concurrently.
    async fn write_event(&self, event: &Event) -> SinkResult<()>;
}

pub type SinkFactory = fn(&AppConfig) -> SinkResult<Arc<dyn MetricSink>>;

/// Maps `backend.type` values to sink constructors.
pub struct SinkRegistry {
    factories: BTreeMap<&'static str, SinkFactory>,
}

impl SinkRegistry {
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(statsd::BACKEND_NAME, |config| {
            Ok(Arc::new(StatsdSink::new(&config.statsd)?) as Arc<dyn MetricSink>)
        });
        registry.register(influxdb::BACKEND_NAME, |config| {
            Ok(Arc::new(InfluxDbSink::new(&config.influxdb)?) as Arc<dyn MetricSink>)
        });
        registry.register(stdout::BACKEND_NAME, |_| {
            Ok(Arc::new(StdoutSink::new()) as Arc<dyn MetricSink>)
        });
        registry
    }

    pub fn register(&mut self, name: &'static str, factory: SinkFactory) {
        self.factories.insert(name, factory);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }

    pub fn build(&self, name: &str, config: &AppConfig) -> SinkResult<Arc<dyn MetricSink>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| SinkError::UnknownBackend(name.to_string()))?;
        factory(config)
    }
}

impl Default for SinkRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn log_unexpected(sink: &str, event: &Event, classified: &Classified) {
    for unexpected in &classified.unexpected {
        warn!(
            "{}: unexpected data element {} of type {} in {}",
            sink, unexpected.field, unexpected.shape, event
        );
    }
}
