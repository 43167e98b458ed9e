use async_trait::async_trait;
use fxhash::hash64;

use crate::normalize::l2_normalize_in_place;
use crate::{Embedder, SemanticError};

/// Deterministic offline embedder.
///
/// Lowercased word tokens (and adjacent word pairs) are hashed into
/// `dimension` signed buckets, so texts sharing vocabulary land close to each
/// other. Identical text always yields the identical unit vector.
#[derive(Debug, Clone)]
pub struct StubEmbedder {
    dimension: usize,
    model_name: String,
}

impl StubEmbedder {
    pub fn new(dimension: usize, model_name: impl Into<String>) -> Result<Self, SemanticError> {
        if dimension == 0 {
            return Err(SemanticError::InvalidConfig(
                "stub embedder needs a non-zero dimension".into(),
            ));
        }
        Ok(Self {
            dimension,
            model_name: model_name.into(),
        })
    }

    /// Embed a single text synchronously.
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dimension];
        let tokens: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .collect();

        for token in &tokens {
            self.add_feature(&mut v, token.as_bytes(), 1.0);
        }
        for pair in tokens.windows(2) {
            let joined = format!("{} {}", pair[0], pair[1]);
            self.add_feature(&mut v, joined.as_bytes(), 0.5);
        }

        if v.iter().all(|x| *x == 0.0) {
            // No word tokens (empty or punctuation only): derive a stable
            // pattern from the raw bytes so the output is still unit length.
            let h = hash64(text.as_bytes());
            for (idx, value) in v.iter_mut().enumerate() {
                *value = ((h >> (idx % 32)) as f32 * 0.0001).sin() + 1e-3;
            }
        }

        l2_normalize_in_place(&mut v);
        v
    }

    fn add_feature(&self, v: &mut [f32], feature: &[u8], weight: f32) {
        let h = hash64(feature);
        let bucket = (h % self.dimension as u64) as usize;
        let sign = if (h >> 63) & 1 == 0 { 1.0 } else { -1.0 };
        v[bucket] += sign * weight;
    }
}

#[async_trait]
impl Embedder for StubEmbedder {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SemanticError> {
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
