//! YAML configuration for the chat pipeline.
//!
//! Every section and field has a default, so an empty document (or just a
//! `version`) yields a runnable stub setup. Secrets never live in this file:
//! the generator key comes from `OPENAI_API_KEY` and the embedding API token
//! from `RAGCHAT_EMBED_API_TOKEN`.
//!
//! ## Example
//!
//! ```yaml
//! version: "1.0"
//! name: "storefront"
//!
//! semantic:
//!   mode: "stub"
//!   model_name: "bge-small-en-v1.5"
//!   dimension: 384
//!   cache_capacity: 256
//!
//! index:
//!   index_path: "data/rag.index"
//!   metadata_path: "data/rag_meta.json"
//!   ann:
//!     min_vectors_for_ann: 1000
//!
//! retrieval:
//!   top_k: 6
//!   candidates: 24
//!   max_sources: 6
//!   max_chars_per_doc: 1500
//!
//! generator:
//!   model: "gpt-4o-mini"
//!   timeout_secs: 20
//!
//! chat:
//!   show_debug: false
//!   fallback_preview: 3
//!   generate_without_context: true
//!   stage_timeout_secs: 30
//!   request_timeout_secs: 40
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use generator::GeneratorConfig;
use index::AnnConfig;
use intent::{default_intents, IntentDefinition};
use semantic::SemanticConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::PipelineSettings;

/// Errors that can occur when loading YAML configuration files
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AppConfig {
    #[serde(default = "default_config_version")]
    pub version: String,

    #[serde(default)]
    pub name: Option<String>,

    /// Embedding provider.
    #[serde(default)]
    pub semantic: SemanticConfig,

    /// Persisted vector index and ANN tuning.
    #[serde(default)]
    pub index: IndexSection,

    /// Intent categories, in tie-break order.
    #[serde(default)]
    pub intent: IntentSection,

    #[serde(default)]
    pub retrieval: RetrievalSection,

    /// Answer generator (key and model override come from the environment).
    #[serde(default)]
    pub generator: GeneratorConfig,

    #[serde(default)]
    pub chat: ChatSection,
}

impl AppConfig {
    /// Load a YAML configuration file from the given path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate YAML configuration from a string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: AppConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => Ok(()),
            v => Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }?;

        validate_semantic(&self.semantic)?;
        self.index.validate()?;
        self.intent.validate()?;
        self.retrieval.validate()?;
        validate_generator(&self.generator)?;
        self.chat.validate()?;

        Ok(())
    }

    /// Per-request knobs for [`ChatPipeline`](crate::ChatPipeline).
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            top_k: self.retrieval.top_k,
            candidates: self.retrieval.candidates,
            max_sources: self.retrieval.max_sources,
            max_chars_per_doc: self.retrieval.max_chars_per_doc,
            fallback_preview: self.chat.fallback_preview,
            show_debug: self.chat.show_debug,
            generate_without_context: self.chat.generate_without_context,
            stage_timeout: Duration::from_secs(self.chat.stage_timeout_secs),
            request_timeout: Duration::from_secs(self.chat.request_timeout_secs),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: default_config_version(),
            name: None,
            semantic: SemanticConfig::default(),
            index: IndexSection::default(),
            intent: IntentSection::default(),
            retrieval: RetrievalSection::default(),
            generator: GeneratorConfig::default(),
            chat: ChatSection::default(),
        }
    }
}

fn validate_semantic(cfg: &SemanticConfig) -> Result<(), ConfigLoadError> {
    let valid_modes = ["stub", "api"];
    if !valid_modes.contains(&cfg.mode.as_str()) {
        return Err(ConfigLoadError::Validation(format!(
            "semantic.mode must be one of: {valid_modes:?}"
        )));
    }
    if cfg.mode == "api" && cfg.api_url.as_deref().map_or(true, str::is_empty) {
        return Err(ConfigLoadError::Validation(
            "semantic.api_url is required when mode is 'api'".to_string(),
        ));
    }
    if cfg.mode != "api" && cfg.dimension == 0 {
        return Err(ConfigLoadError::Validation(
            "semantic.dimension must be >= 1".to_string(),
        ));
    }
    Ok(())
}

fn validate_generator(cfg: &GeneratorConfig) -> Result<(), ConfigLoadError> {
    if cfg.api_url.trim().is_empty() {
        return Err(ConfigLoadError::Validation(
            "generator.api_url must not be empty".to_string(),
        ));
    }
    if cfg.model.trim().is_empty() {
        return Err(ConfigLoadError::Validation(
            "generator.model must not be empty".to_string(),
        ));
    }
    if cfg.timeout_secs == 0 {
        return Err(ConfigLoadError::Validation(
            "generator.timeout_secs must be >= 1".to_string(),
        ));
    }
    Ok(())
}

/// Index files and ANN tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSection {
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,

    #[serde(default = "default_metadata_path")]
    pub metadata_path: PathBuf,

    #[serde(default)]
    pub ann: AnnConfig,
}

impl IndexSection {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.index_path.as_os_str().is_empty() || self.metadata_path.as_os_str().is_empty() {
            return Err(ConfigLoadError::Validation(
                "index.index_path and index.metadata_path are required".to_string(),
            ));
        }
        if self.ann.m == 0 || self.ann.ef_search == 0 {
            return Err(ConfigLoadError::Validation(
                "index.ann.m and index.ann.ef_search must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for IndexSection {
    fn default() -> Self {
        Self {
            index_path: default_index_path(),
            metadata_path: default_metadata_path(),
            ann: AnnConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentSection {
    #[serde(default = "default_intents")]
    pub categories: Vec<IntentDefinition>,
}

impl IntentSection {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.categories.is_empty() {
            return Err(ConfigLoadError::Validation(
                "intent.categories must list at least one category".to_string(),
            ));
        }
        if let Some(def) = self
            .categories
            .iter()
            .find(|d| d.exemplars.iter().all(|p| p.trim().is_empty()))
        {
            return Err(ConfigLoadError::Validation(format!(
                "intent category '{}' has no exemplar phrases",
                def.name
            )));
        }
        Ok(())
    }
}

impl Default for IntentSection {
    fn default() -> Self {
        Self {
            categories: default_intents(),
        }
    }
}

/// How many hits are fetched, kept and rendered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalSection {
    /// Hits kept after filtering.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Nearest neighbours requested from the index.
    #[serde(default = "default_candidates")]
    pub candidates: usize,

    #[serde(default = "default_max_sources")]
    pub max_sources: usize,

    #[serde(default = "default_max_chars_per_doc")]
    pub max_chars_per_doc: usize,
}

impl RetrievalSection {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.top_k == 0 {
            return Err(ConfigLoadError::Validation(
                "retrieval.top_k must be >= 1".to_string(),
            ));
        }
        if self.candidates < self.top_k {
            return Err(ConfigLoadError::Validation(format!(
                "retrieval.candidates ({}) must be >= retrieval.top_k ({})",
                self.candidates, self.top_k
            )));
        }
        if self.max_chars_per_doc == 0 {
            return Err(ConfigLoadError::Validation(
                "retrieval.max_chars_per_doc must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for RetrievalSection {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            candidates: default_candidates(),
            max_sources: default_max_sources(),
            max_chars_per_doc: default_max_chars_per_doc(),
        }
    }
}

/// Reply presentation and stage budgets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSection {
    /// Titles listed under "Top matches" when generation fails.
    #[serde(default = "default_fallback_preview")]
    pub fallback_preview: usize,

    /// Append intent, score and stage latencies to every reply.
    #[serde(default)]
    pub show_debug: bool,

    /// Call the generator even when the context is empty (smalltalk).
    #[serde(default = "true_value")]
    pub generate_without_context: bool,

    /// Upper bound for each external call (embedding, search, generation).
    #[serde(default = "default_stage_timeout_secs")]
    pub stage_timeout_secs: u64,

    /// Upper bound for a whole request; later stages get what is left.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl ChatSection {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.stage_timeout_secs == 0 {
            return Err(ConfigLoadError::Validation(
                "chat.stage_timeout_secs must be >= 1".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigLoadError::Validation(
                "chat.request_timeout_secs must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ChatSection {
    fn default() -> Self {
        Self {
            fallback_preview: default_fallback_preview(),
            show_debug: false,
            generate_without_context: true,
            stage_timeout_secs: default_stage_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_config_version() -> String {
    "1.0".to_string()
}
fn default_index_path() -> PathBuf {
    PathBuf::from("data/rag.index")
}
fn default_metadata_path() -> PathBuf {
    PathBuf::from("data/rag_meta.json")
}
fn default_top_k() -> usize {
    6
}
fn default_candidates() -> usize {
    24
}
fn default_max_sources() -> usize {
    grounding::DEFAULT_MAX_SOURCES
}
fn default_max_chars_per_doc() -> usize {
    grounding::DEFAULT_MAX_CHARS_PER_DOC
}
fn default_fallback_preview() -> usize {
    3
}
fn default_stage_timeout_secs() -> u64 {
    30
}
fn default_request_timeout_secs() -> u64 {
    40
}
fn true_value() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = AppConfig::from_yaml("version: \"1.0\"\n").unwrap();
        assert_eq!(config.retrieval.top_k, 6);
        assert_eq!(config.retrieval.candidates, 24);
        assert_eq!(config.retrieval.max_sources, 6);
        assert_eq!(config.retrieval.max_chars_per_doc, 1500);
        assert_eq!(config.chat.fallback_preview, 3);
        assert!(!config.chat.show_debug);
        assert!(config.chat.generate_without_context);
        assert_eq!(config.generator.model, "gpt-4o-mini");
        assert_eq!(config.semantic.model_name, "bge-small-en-v1.5");
        assert_eq!(config.intent.categories.len(), 7);
        assert_eq!(config.intent.categories[0].name, "product_search");
    }

    #[test]
    fn test_load_from_file() {
        let yaml = r#"
version: "1.0"
name: "storefront"
retrieval:
  top_k: 4
  candidates: 12
chat:
  show_debug: true
"#;
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml.as_bytes()).unwrap();

        let config = AppConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.name.as_deref(), Some("storefront"));
        assert_eq!(config.retrieval.top_k, 4);
        assert_eq!(config.retrieval.max_chars_per_doc, 1500);
        assert!(config.chat.show_debug);
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = AppConfig::from_file("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, ConfigLoadError::FileRead(_)));
    }

    #[test]
    fn test_version_is_checked() {
        let err = AppConfig::from_yaml("version: \"2.0\"\n").unwrap_err();
        assert!(matches!(err, ConfigLoadError::UnsupportedVersion(v) if v == "2.0"));
    }

    #[test]
    fn test_retrieval_validation() {
        let zero = AppConfig::from_yaml("retrieval:\n  top_k: 0\n").unwrap_err();
        assert!(zero.to_string().contains("top_k must be >= 1"));

        let few = AppConfig::from_yaml("retrieval:\n  top_k: 8\n  candidates: 4\n").unwrap_err();
        assert!(few.to_string().contains("candidates"));

        let chars = AppConfig::from_yaml("retrieval:\n  max_chars_per_doc: 0\n").unwrap_err();
        assert!(chars.to_string().contains("max_chars_per_doc"));
    }

    #[test]
    fn test_semantic_validation() {
        let mode = AppConfig::from_yaml("semantic:\n  mode: \"onnx\"\n").unwrap_err();
        assert!(mode.to_string().contains("semantic.mode"));

        let fast = AppConfig::from_yaml("semantic:\n  mode: \"fast\"\n").unwrap_err();
        assert!(fast.to_string().contains("semantic.mode"));

        let api = AppConfig::from_yaml("semantic:\n  mode: \"api\"\n").unwrap_err();
        assert!(api.to_string().contains("api_url"));
    }

    #[test]
    fn test_custom_intents_keep_order() {
        let yaml = r#"
intent:
  categories:
    - name: "greeting"
      exemplars: ["hello", "hi"]
    - name: "handoff"
      exemplars: ["talk to a human"]
"#;
        let config = AppConfig::from_yaml(yaml).unwrap();
        let names: Vec<_> = config.intent.categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["greeting", "handoff"]);

        let empty = AppConfig::from_yaml("intent:\n  categories:\n    - name: x\n      exemplars: []\n")
            .unwrap_err();
        assert!(empty.to_string().contains("'x'"));
    }

    #[test]
    fn test_pipeline_settings_follow_sections() {
        let config = AppConfig::from_yaml("chat:\n  stage_timeout_secs: 5\n").unwrap();
        let settings = config.pipeline_settings();
        assert_eq!(settings.top_k, 6);
        assert_eq!(settings.candidates, 24);
        assert_eq!(settings.stage_timeout, Duration::from_secs(5));
        assert_eq!(settings.request_timeout, Duration::from_secs(40));
    }

    #[test]
    fn test_request_timeout_validation() {
        let err = AppConfig::from_yaml("chat:\n  request_timeout_secs: 0\n").unwrap_err();
        assert!(err.to_string().contains("request_timeout_secs"));
    }
}
