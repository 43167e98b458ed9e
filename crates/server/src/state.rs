use crate::config::ServerConfig;
use crate::error::ServerResult;
use metrics_exporter_prometheus::PrometheusHandle;
use ragchat::{AppConfig, ChatPipeline};
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct ServerState {
    /// Server configuration
    pub config: Arc<ServerConfig>,

    /// Chat pipeline (shared across requests)
    pub pipeline: ChatPipeline,

    /// Renders `/metrics`; `None` when metrics are disabled
    pub prometheus: Option<PrometheusHandle>,
}

impl ServerState {
    /// Wrap an already-built pipeline.
    pub fn new(config: ServerConfig, pipeline: ChatPipeline) -> Self {
        Self {
            config: Arc::new(config),
            pipeline,
            prometheus: None,
        }
    }

    /// Load the pipeline YAML named by the server config (or the built-in
    /// defaults) and start the pipeline from it.
    pub async fn from_config(config: ServerConfig) -> ServerResult<Self> {
        let app_config = match config.pipeline_config.as_deref() {
            Some(path) => AppConfig::from_file(path)?,
            None => AppConfig::default(),
        };
        let pipeline = ChatPipeline::from_config(&app_config).await?;
        Ok(Self::new(config, pipeline))
    }

    pub fn with_prometheus(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }
}
