//! Retrieval-augmented storefront chat.
//!
//! This crate wires the member crates into one request pipeline:
//! intent classification, query embedding, vector search, intent-aware
//! filtering, context assembly and grounded generation. [`ChatPipeline`] is
//! the entry point; [`AppConfig`] loads its YAML configuration.
//!
//! The pipeline never returns an error to its caller. Stage failures are
//! logged and turned into a friendly reply, generation failures degrade to
//! an advisory plus the best matching titles.

pub mod config;
mod pipeline;
mod reply;

pub use config::{AppConfig, ConfigLoadError};
pub use pipeline::{ChatPipeline, PipelineSettings};
pub use reply::{
    ChatReply, ChatTurn, ReplyOutcome, Role, StageTimings, FAILURE_REPLY, HANDOFF_REPLY,
    NO_CONTEXT_REPLY,
};

pub use generator::{AnswerGenerator, GenerationError, GeneratorConfig, OpenAiGenerator};
pub use grounding::{AssembledContext, TypeRule};
pub use index::{AnnConfig, Document, DocumentMetadata, Hit, IndexError, VectorSearch, VectorStore};
pub use intent::{default_intents, IntentClassifier, IntentDefinition, IntentError, IntentResult};
pub use semantic::{build_embedder, Embedder, SemanticConfig, SemanticError};

use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use std::time::Duration;

use thiserror::Error;

/// A step of the per-request pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Intent,
    Embedding,
    Search,
    Filter,
    Context,
    Generation,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Intent,
        Stage::Embedding,
        Stage::Search,
        Stage::Filter,
        Stage::Context,
        Stage::Generation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Intent => "intent",
            Stage::Embedding => "q_embed",
            Stage::Search => "search",
            Stage::Filter => "filter",
            Stage::Context => "context",
            Stage::Generation => "generate",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures that abort a single request. Never surfaced to users verbatim.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("intent classification failed: {0}")]
    Intent(#[from] IntentError),
    #[error("query embedding failed: {0}")]
    Embedding(#[from] SemanticError),
    #[error("vector search failed: {0}")]
    Index(#[from] IndexError),
    #[error("{stage} stage exceeded {timeout:?}")]
    Timeout { stage: Stage, timeout: Duration },
    #[error("search task failed: {0}")]
    Join(String),
}

/// Failures while wiring the pipeline at startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigLoadError),
    #[error("embedding provider: {0}")]
    Embedding(#[from] SemanticError),
    #[error("vector index: {0}")]
    Index(#[from] IndexError),
    #[error("intent classifier: {0}")]
    Intent(#[from] IntentError),
    #[error("answer generator: {0}")]
    Generator(#[from] GenerationError),
    #[error("embedding dimension {embedder} does not match index dimension {index}")]
    DimensionMismatch { embedder: usize, index: usize },
}

/// Metrics observer for pipeline stages and finished replies.
pub trait PipelineMetrics: Send + Sync {
    fn record_stage(&self, stage: Stage, latency: Duration, ok: bool);
    fn record_reply(&self, outcome: &ReplyOutcome, latency: Duration);
}

/// Install or clear the global pipeline metrics recorder.
pub fn set_pipeline_metrics(recorder: Option<Arc<dyn PipelineMetrics>>) {
    let mut guard = metrics_lock()
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    *guard = recorder;
}

fn metrics_lock() -> &'static RwLock<Option<Arc<dyn PipelineMetrics>>> {
    static METRICS: OnceLock<RwLock<Option<Arc<dyn PipelineMetrics>>>> = OnceLock::new();
    METRICS.get_or_init(|| RwLock::new(None))
}

pub(crate) fn metrics_recorder() -> Option<Arc<dyn PipelineMetrics>> {
    let guard = metrics_lock()
        .read()
        .unwrap_or_else(PoisonError::into_inner);
    guard.clone()
}
