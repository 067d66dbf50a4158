use crate::config::AppConfig;
use crate::pipeline::PipelineMetrics;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub metrics: Arc<PipelineMetrics>,
    pub backend: &'static str,
}
