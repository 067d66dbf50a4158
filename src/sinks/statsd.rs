use async_trait::async_trait;
use std::future::Future;
use std::io;
use tokio::net::UdpSocket;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::config::StatsdConfig;
use crate::metrics::{ClassifierPolicy, FieldClassifier, Gauge};
use crate::models::event::Event;
use crate::sinks::{log_unexpected, MetricSink, SinkError, SinkResult};

pub const BACKEND_NAME: &str = "statsd";

/// Pushes gauges to a StatsD daemon, one UDP datagram per gauge.
pub struct StatsdSink {
    address: String,
    prefix: String,
    classifier: FieldClassifier,
    socket: OnceCell<UdpSocket>,
}

impl StatsdSink {
    pub fn new(config: &StatsdConfig) -> SinkResult<Self> {
        if config.host.is_empty() {
            return Err(SinkError::Config("statsd.host must be set".into()));
        }

        let policy = if config.normalize_per_host {
            ClassifierPolicy::per_host()
        } else {
            ClassifierPolicy::raw()
        };

        let address = format!("{}:{}", config.host, config.port);
        info!(
            "Opening StatsD backend to {} prefix: {:?} per-host: {}",
            address, config.prefix, config.normalize_per_host
        );

        Ok(Self {
            address,
            prefix: config.prefix.trim_end_matches('.').to_string(),
            classifier: FieldClassifier::new(policy),
            socket: OnceCell::new(),
        })
    }

    pub fn format_gauge(&self, key: &str, value: Gauge) -> String {
        if self.prefix.is_empty() {
            format!("{key}:{value}|g")
        } else {
            format!("{}.{key}:{value}|g", self.prefix)
        }
    }

    async fn socket(&self) -> SinkResult<&UdpSocket> {
        self.socket
            .get_or_try_init(|| async {
                let socket = UdpSocket::bind("0.0.0.0:0")
                    .await
                    .map_err(|e| SinkError::Transport(format!("Failed to bind UDP socket: {e}")))?;
                socket.connect(&self.address).await.map_err(|e| {
                    SinkError::Transport(format!(
                        "Failed to resolve StatsD address {}: {e}",
                        self.address
                    ))
                })?;
                debug!("StatsD socket ready for {}", self.address);
                Ok::<UdpSocket, SinkError>(socket)
            })
            .await
    }
}

#[async_trait]
impl MetricSink for StatsdSink {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    async fn write_event(&self, event: &Event) -> SinkResult<()> {
        let classified = self.classifier.classify(event)?;
        log_unexpected(BACKEND_NAME, event, &classified);

        if classified.is_empty() {
            return Ok(());
        }

        let socket = self.socket().await?;
        let lines: Vec<String> = classified
            .emissions
            .iter()
            .map(|emission| self.format_gauge(&emission.key, emission.value))
            .collect();

        send_each(lines.iter().map(String::as_str), |line| {
            socket.send(line.as_bytes())
        })
        .await
    }
}

/// Sends every line, even past a failed one, and reports the first failure.
async fn send_each<'a, I, F, Fut>(lines: I, mut send: F) -> SinkResult<()>
where
    I: IntoIterator<Item = &'a str>,
    F: FnMut(&'a str) -> Fut,
    Fut: Future<Output = io::Result<usize>>,
{
    let mut first_error = None;
    for line in lines {
        if let Err(e) = send(line).await {
            debug!("StatsD send of {:?} failed: {}", line, e);
            first_error.get_or_insert(SinkError::Transport(format!(
                "Failed to send gauge {line:?}: {e}"
            )));
        }
    }
    first_error.map_or(Ok(()), Err)
}
