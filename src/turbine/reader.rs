use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use reqwest::{header::HOST, Client};
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, trace};

use crate::config::TurbineConfig;
use crate::models::event::Event;
use crate::turbine::frame::{data_payload, FrameBuffer, MAX_FRAME_LEN};
use crate::turbine::{FeedConnector, FeedSession, StreamError};

/// Opens `turbine.stream` connections for one upstream endpoint.
pub struct TurbineReader {
    client: Client,
    stream_url: String,
    host: String,
    read_timeout: Duration,
}

impl TurbineReader {
    pub fn new(config: &TurbineConfig) -> Result<Self, StreamError> {
        let scheme = if config.tls_enabled { "https" } else { "http" };
        let read_timeout = Duration::from_secs(config.read_timeout_secs);

        // No overall request timeout: the body never ends on its own.
        let client = Client::builder()
            .connect_timeout(read_timeout)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| StreamError::Connect(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            stream_url: format!(
                "{scheme}://{}:{}{}",
                config.host, config.port, config.stream_path
            ),
            host: config.host.clone(),
            read_timeout,
        })
    }

    pub fn stream_url(&self) -> &str {
        &self.stream_url
    }
}

#[async_trait]
impl FeedConnector for TurbineReader {
    type Session = TurbineSession;

    async fn open(&self, cluster: &str) -> Result<TurbineSession, StreamError> {
        info!("Opening Turbine connection for {} at {}", cluster, self.stream_url);

        let deadline = Instant::now() + self.read_timeout;
        let request = self
            .client
            .get(&self.stream_url)
            .query(&[("cluster", cluster)])
            .header(HOST, &self.host);

        let response = timeout_at(deadline, request.send())
            .await
            .map_err(|_| {
                StreamError::Connect(format!(
                    "No response headers from {} within {:?}",
                    self.stream_url, self.read_timeout
                ))
            })?
            .map_err(|e| {
                StreamError::Connect(format!(
                    "Failed to reach {} (cluster: {}): {}",
                    self.stream_url, cluster, e
                ))
            })?;

        if !response.status().is_success() {
            return Err(StreamError::Status {
                status: response.status().as_u16(),
                url: response.url().to_string(),
            });
        }

        debug!("Turbine stream for {} answered {}", cluster, response.status());

        let chunks = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed();

        Ok(TurbineSession {
            cluster: cluster.to_string(),
            chunks,
            frames: FrameBuffer::new(),
            read_timeout: self.read_timeout,
            deadline: Instant::now() + self.read_timeout,
        })
    }
}

/// One open `turbine.stream` response body.
pub struct TurbineSession {
    cluster: String,
    chunks: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    frames: FrameBuffer,
    read_timeout: Duration,
    deadline: Instant,
}

#[async_trait]
impl FeedSession for TurbineSession {
    async fn next_event(&mut self) -> Result<Option<Event>, StreamError> {
        loop {
            while let Some(frame) = self.frames.next_frame() {
                self.deadline = Instant::now() + self.read_timeout;

                match data_payload(&frame) {
                    Some(payload) => {
                        let event = Event::from_payload(&self.cluster, payload)?;
                        return Ok(Some(event));
                    }
                    None => trace!("Skipping non-data frame from {}", self.cluster),
                }
            }

            // only an unterminated line is left here
            if self.frames.is_oversized() {
                return Err(StreamError::Io(format!(
                    "{} buffered bytes from {} without a line break (limit {})",
                    self.frames.pending(),
                    self.cluster,
                    MAX_FRAME_LEN
                )));
            }

            match timeout_at(self.deadline, self.chunks.next()).await {
                Err(_) => return Err(StreamError::Timeout(self.read_timeout)),
                Ok(None) => {
                    if self.frames.pending() > 0 {
                        debug!(
                            "Discarding {} unterminated bytes from {}",
                            self.frames.pending(),
                            self.cluster
                        );
                    }
                    return Ok(None);
                }
                Ok(Some(Err(e))) => return Err(StreamError::Io(e.to_string())),
                Ok(Some(Ok(bytes))) => self.frames.push(&bytes),
            }
        }
    }
}
