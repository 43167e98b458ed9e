//! Intent classification by nearest centroid.
//!
//! Every category is represented by one embedding: its exemplar phrases
//! joined with [`EXEMPLAR_SEPARATOR`] and embedded once at startup. A query
//! is embedded with the same provider and assigned to the centroid with the
//! highest cosine similarity. The centroid matrix is immutable after
//! construction, so a classifier can be shared across requests behind an
//! `Arc` without locking.

use std::collections::HashSet;
use std::sync::Arc;

use ndarray::{Array2, ArrayView1};
use semantic::{Embedder, SemanticError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Joins exemplar phrases into a category's representative text.
pub const EXEMPLAR_SEPARATOR: &str = " | ";

/// Category names with special handling downstream.
pub mod names {
    pub const PRODUCT_SEARCH: &str = "product_search";
    pub const PRODUCT_QA: &str = "product_qa";
    pub const POLICY_SHIPPING: &str = "policy_shipping";
    pub const POLICY_RETURNS: &str = "policy_returns";
    pub const PROMO_PRICE: &str = "promo_price";
    pub const SMALLTALK: &str = "smalltalk";
    pub const HANDOFF: &str = "handoff";

    /// Prefix shared by all store-policy intents.
    pub const POLICY_PREFIX: &str = "policy_";
}

/// A category name and its exemplar phrases, as found in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentDefinition {
    pub name: String,
    pub exemplars: Vec<String>,
}

impl IntentDefinition {
    pub fn new<I, S>(name: impl Into<String>, exemplars: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            exemplars: exemplars.into_iter().map(Into::into).collect(),
        }
    }

    /// The text embedded to obtain this category's centroid.
    pub fn representative_text(&self) -> String {
        self.exemplars.join(EXEMPLAR_SEPARATOR)
    }
}

/// The built-in storefront categories, in tie-break order.
pub fn default_intents() -> Vec<IntentDefinition> {
    vec![
        IntentDefinition::new(
            names::PRODUCT_SEARCH,
            [
                "recommend me a product",
                "I am looking for",
                "suggest alternatives",
                "best option for",
                "which one should I buy",
                "help me choose",
            ],
        ),
        IntentDefinition::new(
            names::PRODUCT_QA,
            [
                "does this product have",
                "what are the specs",
                "is it compatible",
                "how does it work",
                "what is the capacity",
                "what comes in the box",
            ],
        ),
        IntentDefinition::new(
            names::POLICY_SHIPPING,
            [
                "shipping time",
                "delivery details",
                "how long does shipping take",
                "shipping cost",
                "when will it arrive",
            ],
        ),
        IntentDefinition::new(
            names::POLICY_RETURNS,
            [
                "return policy",
                "refund",
                "can I return",
                "exchange policy",
                "how to return",
            ],
        ),
        IntentDefinition::new(
            names::PROMO_PRICE,
            ["discount", "coupon", "promotion", "price", "price drop", "deal"],
        ),
        IntentDefinition::new(
            names::SMALLTALK,
            ["hello", "hi", "how are you", "thanks", "good morning"],
        ),
        IntentDefinition::new(
            names::HANDOFF,
            [
                "talk to an agent",
                "customer support",
                "representative",
                "human help",
            ],
        ),
    ]
}

/// A category together with its centroid embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct IntentCategory {
    pub name: String,
    pub exemplar_phrases: Vec<String>,
    pub centroid: Vec<f32>,
}

/// Winning category and its cosine similarity (not a probability).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntentResult {
    pub category: String,
    pub score: f32,
}

#[derive(Debug, Error)]
pub enum IntentError {
    #[error("intent classifier needs at least one category")]
    NoCategories,
    #[error("intent category '{0}' has no exemplar phrases")]
    EmptyExemplars(String),
    #[error("intent category '{0}' is defined more than once")]
    DuplicateCategory(String),
    #[error("query embedding has dimension {got}, centroids have {expected}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("embedding failed: {0}")]
    Embedding(#[from] SemanticError),
}

pub struct IntentClassifier {
    embedder: Arc<dyn Embedder>,
    names: Vec<String>,
    exemplars: Vec<Vec<String>>,
    /// One row per category, in definition order.
    centroids: Array2<f32>,
}

impl std::fmt::Debug for IntentClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntentClassifier")
            .field("categories", &self.names)
            .field("dimension", &self.centroids.ncols())
            .finish()
    }
}

impl IntentClassifier {
    /// Embed every category's representative text in one batch.
    pub async fn new(
        embedder: Arc<dyn Embedder>,
        definitions: Vec<IntentDefinition>,
    ) -> Result<Self, IntentError> {
        if definitions.is_empty() {
            return Err(IntentError::NoCategories);
        }
        let mut seen = HashSet::new();
        for def in &definitions {
            if def.exemplars.iter().all(|p| p.trim().is_empty()) {
                return Err(IntentError::EmptyExemplars(def.name.clone()));
            }
            if !seen.insert(def.name.as_str()) {
                return Err(IntentError::DuplicateCategory(def.name.clone()));
            }
        }

        let texts: Vec<String> = definitions
            .iter()
            .map(IntentDefinition::representative_text)
            .collect();
        let vectors = embedder.encode(&texts).await?;
        if vectors.len() != texts.len() {
            return Err(IntentError::Embedding(SemanticError::Inference(format!(
                "expected {} centroid embeddings, got {}",
                texts.len(),
                vectors.len()
            ))));
        }

        let dim = vectors.first().map(Vec::len).unwrap_or(0);
        if let Some(v) = vectors.iter().find(|v| v.len() != dim) {
            return Err(IntentError::DimensionMismatch {
                expected: dim,
                got: v.len(),
            });
        }
        let flat: Vec<f32> = vectors.into_iter().flatten().collect();
        let centroids = Array2::from_shape_vec((texts.len(), dim), flat).map_err(|e| {
            IntentError::Embedding(SemanticError::Inference(format!("centroid matrix: {e}")))
        })?;

        let (names, exemplars) = definitions
            .into_iter()
            .map(|d| (d.name, d.exemplars))
            .unzip();

        let classifier = Self {
            embedder,
            names,
            exemplars,
            centroids,
        };
        tracing::info!(
            categories = classifier.names.len(),
            dimension = dim,
            "intent centroids ready"
        );
        Ok(classifier)
    }

    /// Classify `query`: embed it, then pick the nearest centroid.
    pub async fn detect(&self, query: &str) -> Result<IntentResult, IntentError> {
        let q = self.embedder.encode_one(query).await?;
        self.classify_vector(&q)
    }

    /// Nearest centroid for an already embedded query. On exact ties the
    /// category defined first wins.
    pub fn classify_vector(&self, query: &[f32]) -> Result<IntentResult, IntentError> {
        if query.len() != self.centroids.ncols() {
            return Err(IntentError::DimensionMismatch {
                expected: self.centroids.ncols(),
                got: query.len(),
            });
        }

        let sims = self.centroids.dot(&ArrayView1::from(query));
        let mut best = 0;
        for (i, sim) in sims.iter().enumerate().skip(1) {
            if *sim > sims[best] {
                best = i;
            }
        }

        Ok(IntentResult {
            category: self.names[best].clone(),
            score: sims[best],
        })
    }

    pub fn category_names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.centroids.ncols()
    }

    /// Snapshot of the categories with their centroids.
    pub fn categories(&self) -> Vec<IntentCategory> {
        self.names
            .iter()
            .zip(self.exemplars.iter())
            .zip(self.centroids.rows())
            .map(|((name, phrases), row)| IntentCategory {
                name: name.clone(),
                exemplar_phrases: phrases.clone(),
                centroid: row.to_vec(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use semantic::StubEmbedder;

    /// Exact bag-of-words over a fixed vocabulary, L2-normalized.
    struct Vocabulary {
        words: Vec<String>,
    }

    impl Vocabulary {
        fn from_definitions(defs: &[IntentDefinition]) -> Self {
            let mut words: Vec<String> = Vec::new();
            for phrase in defs.iter().flat_map(|d| d.exemplars.iter()) {
                for w in tokens(phrase) {
                    if !words.contains(&w) {
                        words.push(w);
                    }
                }
            }
            Self { words }
        }
    }

    fn tokens(text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .collect()
    }

    #[async_trait]
    impl Embedder for Vocabulary {
        async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SemanticError> {
            Ok(texts
                .iter()
                .map(|t| {
                    let mut v = vec![0.0f32; self.words.len()];
                    for w in tokens(t) {
                        if let Some(i) = self.words.iter().position(|x| *x == w) {
                            v[i] += 1.0;
                        }
                    }
                    semantic::l2_normalize_in_place(&mut v);
                    v
                })
                .collect())
        }
        fn dimension(&self) -> usize {
            self.words.len()
        }
        fn model_name(&self) -> &str {
            "vocabulary"
        }
    }

    async fn default_classifier() -> IntentClassifier {
        let defs = default_intents();
        let embedder = Arc::new(Vocabulary::from_definitions(&defs));
        IntentClassifier::new(embedder, defs).await.unwrap()
    }

    #[test]
    fn default_intents_are_ordered() {
        let names: Vec<String> = default_intents().into_iter().map(|d| d.name).collect();
        assert_eq!(
            names,
            vec![
                "product_search",
                "product_qa",
                "policy_shipping",
                "policy_returns",
                "promo_price",
                "smalltalk",
                "handoff"
            ]
        );
    }

    #[test]
    fn representative_text_uses_separator() {
        let def = IntentDefinition::new("x", ["a", "b c"]);
        assert_eq!(def.representative_text(), "a | b c");
    }

    #[tokio::test]
    async fn every_exemplar_maps_to_its_category() {
        let classifier = default_classifier().await;
        for def in default_intents() {
            for phrase in &def.exemplars {
                let result = classifier.detect(phrase).await.unwrap();
                assert_eq!(result.category, def.name, "phrase {phrase:?}");
            }
        }
    }

    #[tokio::test]
    async fn spot_checks() {
        let classifier = default_classifier().await;
        assert_eq!(classifier.detect("hi").await.unwrap().category, "smalltalk");
        assert_eq!(
            classifier.detect("talk to an agent").await.unwrap().category,
            "handoff"
        );
        let returns = classifier
            .detect("what is your return policy")
            .await
            .unwrap();
        assert_eq!(returns.category, "policy_returns");
        assert!(returns.score > 0.0 && returns.score <= 1.0);
    }

    #[tokio::test]
    async fn exact_tie_picks_first_category() {
        let defs = vec![
            IntentDefinition::new("first", ["alpha"]),
            IntentDefinition::new("second", ["alpha"]),
        ];
        let embedder = Arc::new(Vocabulary::from_definitions(&defs));
        let classifier = IntentClassifier::new(embedder, defs).await.unwrap();

        let result = classifier.detect("alpha").await.unwrap();
        assert_eq!(result.category, "first");
        assert!((result.score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn unrelated_query_falls_back_to_first() {
        let classifier = default_classifier().await;
        let result = classifier.detect("zzz qqq").await.unwrap();
        assert_eq!(result.category, "product_search");
        assert_eq!(result.score, 0.0);
    }

    #[tokio::test]
    async fn construction_errors() {
        let embedder: Arc<dyn Embedder> = Arc::new(StubEmbedder::new(8, "stub").unwrap());

        assert!(matches!(
            IntentClassifier::new(embedder.clone(), Vec::new()).await,
            Err(IntentError::NoCategories)
        ));
        assert!(matches!(
            IntentClassifier::new(
                embedder.clone(),
                vec![IntentDefinition::new("empty", Vec::<String>::new())]
            )
            .await,
            Err(IntentError::EmptyExemplars(name)) if name == "empty"
        ));
        assert!(matches!(
            IntentClassifier::new(
                embedder,
                vec![
                    IntentDefinition::new("a", ["x"]),
                    IntentDefinition::new("a", ["y"])
                ]
            )
            .await,
            Err(IntentError::DuplicateCategory(_))
        ));
    }

    #[tokio::test]
    async fn wrong_query_dimension_is_rejected() {
        let classifier = default_classifier().await;
        assert!(matches!(
            classifier.classify_vector(&[1.0, 0.0]),
            Err(IntentError::DimensionMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn categories_expose_unit_centroids() {
        let classifier = default_classifier().await;
        let cats = classifier.categories();
        assert_eq!(cats.len(), 7);
        assert_eq!(classifier.len(), 7);
        for cat in cats {
            assert!(semantic::is_unit_length(&cat.centroid, 1e-4));
            assert!(!cat.exemplar_phrases.is_empty());
        }
    }
}
