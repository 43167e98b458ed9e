use serde::{Deserialize, Serialize};

use crate::resilience::{CircuitBreakerConfig, RetryConfig};

/// Runtime configuration selecting the embedding provider and how it is called.
///
/// # Example
/// ```no_run
/// use semantic::{build_embedder, SemanticConfig};
///
/// let cfg = SemanticConfig {
///     mode: "api".into(),
///     api_url: Some("https://api.openai.com/v1/embeddings".into()),
///     api_auth_header: Some("Bearer sk-xxx".into()),
///     api_provider: Some("openai".into()),
///     model_name: "text-embedding-3-small".into(),
///     dimension: 1536,
///     ..Default::default()
/// };
///
/// let _embedder = build_embedder(&cfg).unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SemanticConfig {
    /// Provider selector: `"stub"` (deterministic, offline) or `"api"` (remote HTTP).
    pub mode: String,
    /// Model label. Sent to OpenAI-style endpoints and surfaced in logs.
    pub model_name: String,
    /// Vector length. The stub produces vectors of this size; for `"api"` a
    /// non-zero value is checked against every returned vector.
    pub dimension: usize,
    /// Embedding endpoint when [`mode`](Self::mode) is `"api"`.
    pub api_url: Option<String>,
    /// Authorization header (e.g., `"Bearer hf_xxx"`).
    pub api_auth_header: Option<String>,
    /// Remote provider hint: `"hf"`, `"openai"`, or `"custom"` (default).
    pub api_provider: Option<String>,
    /// Overall API timeout in seconds.
    pub api_timeout_secs: Option<u64>,
    /// Number of query embeddings kept in the LRU cache. `0` disables caching.
    pub cache_capacity: usize,
    /// Retry configuration for API calls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_config: Option<RetryConfig>,
    /// Circuit breaker configuration for API calls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circuit_breaker_config: Option<CircuitBreakerConfig>,
    /// Whether retry and circuit breaking wrap API calls.
    pub enable_resilience: bool,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            mode: "stub".into(),
            model_name: "bge-small-en-v1.5".into(),
            dimension: 384,
            api_url: None,
            api_auth_header: None,
            api_provider: None,
            api_timeout_secs: Some(30),
            cache_capacity: 256,
            retry_config: None,           // Uses defaults when None
            circuit_breaker_config: None, // Uses defaults when None
            enable_resilience: true,
        }
    }
}

impl SemanticConfig {
    /// Provider name used to key circuit breakers and log lines.
    pub fn provider_name(&self) -> String {
        self.api_provider
            .as_deref()
            .unwrap_or("custom")
            .to_ascii_lowercase()
    }

    /// Fill the auth header from `RAGCHAT_EMBED_API_TOKEN` when none is configured.
    pub fn with_env_token(mut self) -> Self {
        if self.api_auth_header.is_none() {
            if let Ok(token) = std::env::var("RAGCHAT_EMBED_API_TOKEN") {
                if !token.trim().is_empty() {
                    self.api_auth_header = Some(format!("Bearer {}", token.trim()));
                }
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_default_values() {
        let cfg = SemanticConfig::default();
        assert_eq!(cfg.mode, "stub");
        assert_eq!(cfg.model_name, "bge-small-en-v1.5");
        assert_eq!(cfg.dimension, 384);
        assert!(cfg.api_url.is_none());
        assert_eq!(cfg.api_timeout_secs, Some(30));
        assert_eq!(cfg.cache_capacity, 256);
        assert!(cfg.enable_resilience);
    }

    #[test]
    fn provider_name_defaults_to_custom() {
        let cfg = SemanticConfig {
            api_provider: Some("OpenAI".into()),
            ..SemanticConfig::default()
        };
        assert_eq!(cfg.provider_name(), "openai");
        assert_eq!(SemanticConfig::default().provider_name(), "custom");
    }

    #[test]
    fn config_deserializes_with_missing_fields() {
        let cfg: SemanticConfig =
            serde_json::from_str(r#"{ "mode": "api", "api_url": "http://localhost/embed" }"#)
                .unwrap();
        assert_eq!(cfg.mode, "api");
        assert_eq!(cfg.api_url.as_deref(), Some("http://localhost/embed"));
        assert_eq!(cfg.dimension, 384);
    }

    #[test]
    fn config_serde_roundtrip() {
        let cfg = SemanticConfig {
            mode: "api".into(),
            api_url: Some("https://api.example.com/embed".into()),
            api_provider: Some("hf".into()),
            retry_config: Some(RetryConfig::default().with_max_retries(1)),
            ..SemanticConfig::default()
        };
        let serialized = serde_json::to_string(&cfg).unwrap();
        let deserialized: SemanticConfig = serde_json::from_str(&serialized).unwrap();
        assert_eq!(cfg, deserialized);
    }
}
