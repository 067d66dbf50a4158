use async_trait::async_trait;
use std::time::Duration;

use crate::models::event::Event;

pub mod frame;
pub mod reader;
pub mod supervisor;

pub use reader::{TurbineReader, TurbineSession};
pub use supervisor::{ClusterSupervisor, SupervisorState};

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("Connect error: {0}")]
    Connect(String),
    #[error("Upstream returned HTTP {status} for {url}")]
    Status { status: u16, url: String },
    #[error("I/O error: {0}")]
    Io(String),
    #[error("No frame received within {0:?}")]
    Timeout(Duration),
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl StreamError {
    /// Transport read failures, including deadline expiry.
    pub fn is_io(&self) -> bool {
        matches!(self, StreamError::Io(_) | StreamError::Timeout(_))
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, StreamError::Decode(_))
    }
}

/// Opens one streaming session per call for a named cluster.
#[async_trait]
pub trait FeedConnector: Send + Sync + 'static {
    type Session: FeedSession;

    async fn open(&self, cluster: &str) -> Result<Self::Session, StreamError>;
}

/// A live upstream session yielding decoded events in arrival order.
///
/// `Ok(None)` means the upstream closed the body. Any `Err` ends the
/// session; callers must not read from it again.
#[async_trait]
pub trait FeedSession: Send {
    async fn next_event(&mut self) -> Result<Option<Event>, StreamError>;
}
