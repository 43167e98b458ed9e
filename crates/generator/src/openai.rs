use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{AnswerGenerator, GenerationError};

pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/responses";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Returned when the provider answers successfully but with no text.
pub const EMPTY_REPLY: &str =
    "Sorry, I couldn't put an answer together this time. Could you rephrase the question?";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Responses API endpoint.
    pub api_url: String,
    pub model: String,
    /// Whole-request timeout in seconds.
    pub timeout_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.into(),
            model: DEFAULT_MODEL.into(),
            timeout_secs: 20,
            max_output_tokens: None,
            temperature: None,
        }
    }
}

impl GeneratorConfig {
    /// Apply the `GPT_MODEL` override when set.
    pub fn with_env_model(mut self) -> Self {
        if let Ok(model) = std::env::var("GPT_MODEL") {
            if !model.trim().is_empty() {
                self.model = model.trim().to_string();
            }
        }
        self
    }
}

/// Client for the OpenAI Responses API.
#[derive(Debug, Clone)]
pub struct OpenAiGenerator {
    client: reqwest::Client,
    config: GeneratorConfig,
    api_key: String,
}

impl OpenAiGenerator {
    /// Fails with [`GenerationError::InvalidCredentials`] unless `api_key`
    /// is present and looks like an OpenAI secret key (`sk-...`).
    pub fn new(config: GeneratorConfig, api_key: Option<&str>) -> Result<Self, GenerationError> {
        let api_key = api_key
            .map(str::trim)
            .filter(|k| k.starts_with("sk-"))
            .ok_or(GenerationError::InvalidCredentials)?
            .to_string();

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| GenerationError::Other(format!("http client: {e}")))?;

        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    /// Build from `OPENAI_API_KEY`, honouring `GPT_MODEL`.
    pub fn from_env(config: GeneratorConfig) -> Result<Self, GenerationError> {
        let key = std::env::var("OPENAI_API_KEY").ok();
        Self::new(config.with_env_model(), key.as_deref())
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn request_body(&self, system: &str, user: &str) -> Value {
        let mut body = json!({
            "model": self.config.model,
            "input": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
        });
        if let Some(max) = self.config.max_output_tokens {
            body["max_output_tokens"] = json!(max);
        }
        if let Some(t) = self.config.temperature {
            body["temperature"] = json!(t);
        }
        body
    }
}

#[async_trait]
impl AnswerGenerator for OpenAiGenerator {
    async fn generate(&self, system: &str, user: &str) -> Result<String, GenerationError> {
        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(system, user))
            .send()
            .await
            .map_err(categorize_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = categorize_error_body(status.as_u16(), &body);
            tracing::warn!(status = status.as_u16(), kind = err.kind(), "generation request rejected");
            return Err(err);
        }

        let value: Value = response.json().await.map_err(categorize_transport)?;
        let text = extract_output_text(&value);
        if text.trim().is_empty() {
            tracing::warn!(model = %self.config.model, "provider returned an empty answer");
            return Ok(EMPTY_REPLY.to_string());
        }
        Ok(text)
    }
}

fn categorize_transport(err: reqwest::Error) -> GenerationError {
    if err.is_timeout() || err.is_connect() {
        GenerationError::Timeout
    } else {
        GenerationError::Other(err.to_string())
    }
}

/// Map an error response body (`{"error": {"message", "type", "code"}}`).
fn categorize_error_body(status: u16, body: &str) -> GenerationError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let error = parsed.as_ref().and_then(|v| v.get("error"));
    let field = |name: &str| error.and_then(|e| e.get(name)).and_then(Value::as_str);

    let message = field("message").unwrap_or(body);
    GenerationError::from_response(status, field("code"), field("type"), message)
}

/// `output_text` when present, else every `output[].content[].text` joined.
fn extract_output_text(value: &Value) -> String {
    if let Some(text) = value.get("output_text").and_then(Value::as_str) {
        if !text.is_empty() {
            return text.to_string();
        }
    }

    value
        .get("output")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|item| item.get("content").and_then(Value::as_array))
        .flatten()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("")
}
