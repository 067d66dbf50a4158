use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::InfluxDbConfig;
use crate::metrics::{ClassifierPolicy, Emission, FieldClassifier, Gauge};
use crate::models::event::Event;
use crate::sinks::{log_unexpected, MetricSink, SinkError, SinkResult};

pub const BACKEND_NAME: &str = "influxdb";

const WRITE_TIMEOUT_SECS: u64 = 10;
const SERIES_COLUMNS: [&str; 2] = ["time", "value"];

#[derive(Debug, Serialize)]
struct Series<'a> {
    name: &'a str,
    columns: [&'static str; 2],
    points: [(i64, Gauge); 1],
}

/// Writes every event as one batch of series to the InfluxDB HTTP API.
pub struct InfluxDbSink {
    client: Client,
    write_url: String,
    username: String,
    password: String,
    classifier: FieldClassifier,
}

impl InfluxDbSink {
    pub fn new(config: &InfluxDbConfig) -> SinkResult<Self> {
        if config.host.is_empty() || config.database.is_empty() {
            return Err(SinkError::Config(
                "influxdb.host and influxdb.database must be set".into(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(WRITE_TIMEOUT_SECS))
            .build()
            .map_err(|e| SinkError::Config(format!("Failed to create HTTP client: {e}")))?;

        let scheme = if config.tls_enabled { "https" } else { "http" };
        let write_url = format!(
            "{scheme}://{}:{}/db/{}/series",
            config.host, config.port, config.database
        );

        info!(
            "Opening InfluxDB backend to {}:{} user: {} database: {}",
            config.host, config.port, config.username, config.database
        );

        Ok(Self {
            client,
            write_url,
            username: config.username.clone(),
            password: config.password.clone(),
            classifier: FieldClassifier::new(ClassifierPolicy::series()),
        })
    }

    pub fn write_url(&self) -> &str {
        &self.write_url
    }

    fn series<'a>(emissions: &'a [Emission], now_ms: i64) -> Vec<Series<'a>> {
        emissions
            .iter()
            .map(|emission| Series {
                name: &emission.key,
                columns: SERIES_COLUMNS,
                points: [(now_ms, emission.value)],
            })
            .collect()
    }
}

#[async_trait]
impl MetricSink for InfluxDbSink {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    async fn write_event(&self, event: &Event) -> SinkResult<()> {
        let classified = self.classifier.classify(event)?;
        log_unexpected(BACKEND_NAME, event, &classified);

        if classified.is_empty() {
            return Ok(());
        }

        let now_ms = chrono::Utc::now().timestamp_millis();
        let body = Self::series(&classified.emissions, now_ms);

        let response = self
            .client
            .post(&self.write_url)
            .query(&[
                ("u", self.username.as_str()),
                ("p", self.password.as_str()),
                ("time_precision", "ms"),
            ])
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                SinkError::Transport(format!("Failed to reach InfluxDB at {}: {e}", self.write_url))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(SinkError::Backend(format!("HTTP {status}: {text}")));
        }

        debug!("Wrote {} series for {}", body.len(), event);
        Ok(())
    }
}
