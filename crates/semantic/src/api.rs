use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde_json::{json, Value};

use crate::normalize::l2_normalize_in_place;
use crate::resilience::{
    execute_with_retry_async, CircuitBreakerConfig, CircuitBreakerManager, RetryConfig,
};
use crate::{Embedder, SemanticConfig, SemanticError};

static CIRCUIT_BREAKERS: Lazy<CircuitBreakerManager> = Lazy::new(CircuitBreakerManager::default);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ApiProviderKind {
    HuggingFace,
    OpenAI,
    Custom,
}

impl ApiProviderKind {
    fn from_name(name: &str) -> Self {
        match name {
            "hf" | "huggingface" => ApiProviderKind::HuggingFace,
            "openai" | "gpt" => ApiProviderKind::OpenAI,
            _ => ApiProviderKind::Custom,
        }
    }
}

/// Remote embedding provider speaking Hugging Face, OpenAI or a plain
/// `{"texts": [...]}` JSON dialect.
#[derive(Debug, Clone)]
pub struct ApiEmbedder {
    client: reqwest::Client,
    url: String,
    auth_header: Option<String>,
    provider: ApiProviderKind,
    provider_name: String,
    model_name: String,
    dimension: usize,
    retry: Option<RetryConfig>,
    breaker: Option<CircuitBreakerConfig>,
}

impl ApiEmbedder {
    pub fn from_config(cfg: &SemanticConfig) -> Result<Self, SemanticError> {
        let url = cfg
            .api_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| SemanticError::InvalidConfig("api_url is required for api mode".into()))?
            .to_string();

        let timeout = Duration::from_secs(cfg.api_timeout_secs.unwrap_or(30).max(1));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .pool_max_idle_per_host(16)
            .build()
            .map_err(|e| SemanticError::InvalidConfig(format!("http client: {e}")))?;

        let provider_name = cfg.provider_name();
        let (retry, breaker) = if cfg.enable_resilience {
            (
                Some(cfg.retry_config.unwrap_or_default()),
                Some(cfg.circuit_breaker_config.unwrap_or_default()),
            )
        } else {
            (None, None)
        };

        Ok(Self {
            client,
            url,
            auth_header: cfg.api_auth_header.clone(),
            provider: ApiProviderKind::from_name(&provider_name),
            provider_name,
            model_name: cfg.model_name.clone(),
            dimension: cfg.dimension,
            retry,
            breaker,
        })
    }

    async fn send(&self, payload: &Value) -> Result<Value, SemanticError> {
        let mut request = self.client.post(&self.url).json(payload);
        if let Some(header) = self.auth_header.as_deref() {
            request = request.header(reqwest::header::AUTHORIZATION, header);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SemanticError::Request(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SemanticError::Request(format!("HTTP error {status}: {body}")));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| SemanticError::Inference(format!("invalid JSON response: {e}")))
    }

    async fn send_with_resilience(&self, payload: Value) -> Result<Value, SemanticError> {
        let (Some(retry), Some(breaker_cfg)) = (self.retry, self.breaker) else {
            return self.send(&payload).await;
        };

        let breaker = CIRCUIT_BREAKERS.get_or_create_with_config(&self.provider_name, breaker_cfg);
        if !breaker.allow_request() {
            return Err(SemanticError::CircuitOpen(self.provider_name.clone()));
        }

        let outcome = execute_with_retry_async(&retry, |attempt| {
            let payload = &payload;
            async move {
                if attempt > 0 {
                    tracing::warn!(provider = %self.provider_name, attempt, "retrying embedding request");
                }
                self.send(payload).await.map_err(|e| match e {
                    SemanticError::Request(message) => message,
                    other => other.to_string(),
                })
            }
        })
        .await;

        match outcome.result {
            Ok(value) => {
                breaker.record_success();
                Ok(value)
            }
            Err(message) => {
                breaker.record_failure();
                tracing::error!(
                    provider = %self.provider_name,
                    attempts = outcome.attempts,
                    error = %message,
                    "embedding request failed"
                );
                Err(SemanticError::Request(message))
            }
        }
    }

    fn finish(&self, mut vector: Vec<f32>) -> Result<Vec<f32>, SemanticError> {
        if self.dimension != 0 && vector.len() != self.dimension {
            return Err(SemanticError::DimensionMismatch {
                expected: self.dimension,
                got: vector.len(),
            });
        }
        l2_normalize_in_place(&mut vector);
        Ok(vector)
    }
}

#[async_trait]
impl Embedder for ApiEmbedder {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SemanticError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let payload = build_api_payload(self.provider, texts, &self.model_name);
        let response = self.send_with_resilience(payload).await?;
        let vectors = parse_embeddings_from_value(response)?;

        if vectors.len() != texts.len() {
            return Err(SemanticError::Inference(format!(
                "API returned {} embeddings for {} inputs",
                vectors.len(),
                texts.len()
            )));
        }

        vectors.into_iter().map(|v| self.finish(v)).collect()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Whether the breaker for `provider` is closed (or was never used).
pub fn is_provider_healthy(provider: &str) -> bool {
    CIRCUIT_BREAKERS.is_healthy(provider)
}

/// Drop all breaker state, e.g. after an operator fixes credentials.
pub fn reset_circuit_breakers() {
    CIRCUIT_BREAKERS.reset_all();
}

fn build_api_payload(provider: ApiProviderKind, texts: &[String], model: &str) -> Value {
    match provider {
        ApiProviderKind::HuggingFace => json!({ "inputs": texts }),
        ApiProviderKind::OpenAI => json!({ "input": texts, "model": model }),
        ApiProviderKind::Custom => json!({ "texts": texts }),
    }
}

fn parse_embeddings_from_value(value: Value) -> Result<Vec<Vec<f32>>, SemanticError> {
    match value {
        Value::Object(mut map) => {
            if let Some(embeddings) = map.remove("embeddings") {
                return parse_embedding_collection(embeddings);
            }

            if let Some(Value::Array(items)) = map.remove("data") {
                // OpenAI may reorder; `index` restores input order when present.
                let mut indexed = Vec::with_capacity(items.len());
                for (pos, item) in items.into_iter().enumerate() {
                    let Value::Object(mut obj) = item else {
                        return Err(SemanticError::Inference(
                            "unexpected entry inside `data` array".into(),
                        ));
                    };
                    let index = obj
                        .get("index")
                        .and_then(Value::as_u64)
                        .map(|i| i as usize)
                        .unwrap_or(pos);
                    let embedding = obj.remove("embedding").ok_or_else(|| {
                        SemanticError::Inference("missing `embedding` field in data item".into())
                    })?;
                    indexed.push((index, parse_embedding_vector(embedding)?));
                }
                indexed.sort_by_key(|(index, _)| *index);
                return Ok(indexed.into_iter().map(|(_, v)| v).collect());
            }

            Err(SemanticError::Inference("unsupported API response shape".into()))
        }
        other => parse_embedding_collection(other),
    }
}

fn parse_embedding_collection(value: Value) -> Result<Vec<Vec<f32>>, SemanticError> {
    match value {
        Value::Array(items) if items.is_empty() => Ok(Vec::new()),
        Value::Array(items) if items.iter().all(Value::is_array) => {
            items.into_iter().map(parse_embedding_vector).collect()
        }
        other => parse_embedding_vector(other).map(|v| vec![v]),
    }
}

fn parse_embedding_vector(value: Value) -> Result<Vec<f32>, SemanticError> {
    let values = match value {
        Value::Array(values) => values,
        other => {
            return Err(SemanticError::Inference(format!(
                "embedding vector must be an array, got {other}"
            )))
        }
    };
    values
        .into_iter()
        .map(|entry| {
            entry
                .as_f64()
                .filter(|f| f.is_finite())
                .map(|f| f as f32)
                .ok_or_else(|| {
                    SemanticError::Inference(format!("embedding entries must be numbers, got {entry}"))
                })
        })
        .collect()
}
