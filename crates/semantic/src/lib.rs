//! Embedding providers for ragchat.
//!
//! Everything that turns text into vectors sits behind the [`Embedder`] trait
//! so the intent classifier and the retriever can share one provider (and one
//! query cache). Three implementations ship with the crate:
//!
//! - [`StubEmbedder`] - deterministic feature hashing, no network. Used in
//!   tests and offline demos.
//! - [`ApiEmbedder`] - HTTP endpoint (Hugging Face, OpenAI or a custom JSON
//!   shape), wrapped in retry with backoff and a per-provider circuit breaker.
//! - [`CachedEmbedder`] - LRU in front of any other provider.
//!
//! All providers return unit-length vectors, so a dot product is a cosine
//! similarity.
//!
//! ```no_run
//! use semantic::{build_embedder, SemanticConfig};
//!
//! # async fn demo() -> Result<(), semantic::SemanticError> {
//! let embedder = build_embedder(&SemanticConfig::default())?;
//! let q = embedder.encode_one("do you ship to Canada?").await?;
//! assert_eq!(q.len(), embedder.dimension());
//! # Ok(())
//! # }
//! ```
//!
//! ## Env vars
//!
//! - `RAGCHAT_EMBED_API_TOKEN` - bearer token for api mode when
//!   `api_auth_header` is not set in config.

pub mod config;
pub mod error;
pub mod resilience;

mod api;
mod cache;
mod normalize;
mod serde_millis;
mod stub;

use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;

pub use crate::api::{is_provider_healthy, reset_circuit_breakers, ApiEmbedder};
pub use crate::cache::CachedEmbedder;
pub use crate::config::SemanticConfig;
pub use crate::error::SemanticError;
pub use crate::normalize::{dot, is_unit_length, l2_normalize_in_place};
pub use crate::stub::StubEmbedder;

/// Text to unit-length vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch. The output has one vector per input, in input order.
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SemanticError>;

    /// Vector length produced by this provider.
    fn dimension(&self) -> usize;

    fn model_name(&self) -> &str;

    /// Embed a single text.
    async fn encode_one(&self, text: &str) -> Result<Vec<f32>, SemanticError> {
        let mut out = self.encode(&[text.to_string()]).await?;
        out.pop()
            .ok_or_else(|| SemanticError::Inference("provider returned no embedding".into()))
    }
}

/// Build the provider selected by `cfg.mode`, wrapped in a query cache when
/// `cfg.cache_capacity > 0`.
pub fn build_embedder(cfg: &SemanticConfig) -> Result<Arc<dyn Embedder>, SemanticError> {
    let base: Arc<dyn Embedder> = match cfg.mode.as_str() {
        "stub" => Arc::new(StubEmbedder::new(cfg.dimension, cfg.model_name.clone())?),
        "api" => Arc::new(ApiEmbedder::from_config(&cfg.clone().with_env_token())?),
        other => {
            return Err(SemanticError::InvalidConfig(format!(
                "unknown embedding mode '{other}' (expected \"stub\" or \"api\")"
            )))
        }
    };

    tracing::info!(
        mode = %cfg.mode,
        model = %cfg.model_name,
        dimension = base.dimension(),
        cache_capacity = cfg.cache_capacity,
        "embedding provider ready"
    );

    Ok(match NonZeroUsize::new(cfg.cache_capacity) {
        Some(capacity) => Arc::new(CachedEmbedder::new(base, capacity)),
        None => base,
    })
}
