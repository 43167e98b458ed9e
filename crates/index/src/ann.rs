//! Nearest-neighbour search over the document embeddings.
//!
//! Small corpora (below [`AnnConfig::min_vectors_for_ann`]) are searched with
//! an exact linear scan; larger ones go through an HNSW graph built once at
//! load time. Either way the result has the shape of a classic
//! `(scores, ids)` pair padded to `k` with [`NO_MATCH`].

use hnsw_rs::prelude::*;
use serde::{Deserialize, Serialize};

/// Id used for empty result slots.
pub const NO_MATCH: i64 = -1;

/// Configuration for ANN index construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnConfig {
    /// Neighbours per node (higher = better recall, slower build).
    pub m: usize,
    /// Candidate list size during construction.
    pub ef_construction: usize,
    /// Candidate list size during search.
    pub ef_search: usize,
    /// Whether HNSW may be used at all.
    pub enabled: bool,
    /// Below this many vectors the exact scan is used even if `enabled`.
    pub min_vectors_for_ann: usize,
}

impl Default for AnnConfig {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 200,
            ef_search: 64,
            enabled: true,
            min_vectors_for_ann: 1000,
        }
    }
}

impl AnnConfig {
    pub fn with_m(mut self, m: usize) -> Self {
        self.m = m;
        self
    }

    pub fn with_ef_construction(mut self, ef: usize) -> Self {
        self.ef_construction = ef;
        self
    }

    pub fn with_ef_search(mut self, ef: usize) -> Self {
        self.ef_search = ef;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_min_vectors_for_ann(mut self, min: usize) -> Self {
        self.min_vectors_for_ann = min;
        self
    }

    pub fn should_use_ann(&self, num_vectors: usize) -> bool {
        self.enabled && num_vectors >= self.min_vectors_for_ann
    }
}

/// Raw search output: parallel arrays of exactly `k` slots, best first.
///
/// `scores` are cosine similarities. Slots past the available results carry
/// id [`NO_MATCH`] and score `f32::NEG_INFINITY`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSearch {
    pub scores: Vec<f32>,
    pub ids: Vec<i64>,
}

impl RawSearch {
    fn padded(mut matches: Vec<(usize, f32)>, k: usize) -> Self {
        matches.truncate(k);
        let mut scores = Vec::with_capacity(k);
        let mut ids = Vec::with_capacity(k);
        for (ordinal, score) in matches {
            ids.push(ordinal as i64);
            scores.push(score);
        }
        scores.resize(k, f32::NEG_INFINITY);
        ids.resize(k, NO_MATCH);
        Self { scores, ids }
    }

    /// Iterate over filled slots as `(ordinal, score)`.
    pub fn matches(&self) -> impl Iterator<Item = (usize, f32)> + '_ {
        self.ids
            .iter()
            .zip(self.scores.iter())
            .filter(|(id, _)| **id != NO_MATCH && **id >= 0)
            .map(|(id, score)| (*id as usize, *score))
    }
}

/// Immutable vector index addressed by ordinal position.
pub struct AnnIndex {
    config: AnnConfig,
    dimension: usize,
    vectors: Vec<Vec<f32>>,
    hnsw: Option<Hnsw<'static, f32, DistCosine>>,
}

impl std::fmt::Debug for AnnIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnnIndex")
            .field("config", &self.config)
            .field("dimension", &self.dimension)
            .field("len", &self.vectors.len())
            .field("hnsw", &self.hnsw.is_some())
            .finish()
    }
}

impl AnnIndex {
    /// Build an index over `vectors`; ordinal `i` refers to `vectors[i]`.
    pub fn build(
        dimension: usize,
        vectors: Vec<Vec<f32>>,
        config: AnnConfig,
    ) -> Result<Self, AnnError> {
        if dimension == 0 {
            return Err(AnnError::ZeroDimension);
        }
        if let Some((ordinal, v)) = vectors.iter().enumerate().find(|(_, v)| v.len() != dimension)
        {
            return Err(AnnError::VectorDimension {
                ordinal,
                expected: dimension,
                got: v.len(),
            });
        }

        let mut index = Self {
            config,
            dimension,
            vectors,
            hnsw: None,
        };
        if !index.vectors.is_empty() && config.should_use_ann(index.vectors.len()) {
            index.hnsw = Some(index.build_hnsw());
            log::info!(
                "built HNSW graph over {} vectors (m={}, ef_construction={})",
                index.vectors.len(),
                config.m,
                config.ef_construction
            );
        } else {
            log::debug!("using exact scan over {} vectors", index.vectors.len());
        }
        Ok(index)
    }

    fn build_hnsw(&self) -> Hnsw<'static, f32, DistCosine> {
        let nb_elem = self.vectors.len();
        let nb_layer = 16usize.min((nb_elem as f32).ln().trunc() as usize).max(1);
        let hnsw = Hnsw::<f32, DistCosine>::new(
            self.config.m,
            nb_elem,
            nb_layer,
            self.config.ef_construction,
            DistCosine {},
        );

        let data: Vec<(&Vec<f32>, usize)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(ordinal, v)| (v, ordinal))
            .collect();
        hnsw.parallel_insert(&data);
        hnsw
    }

    /// Return the `k` best ordinals for `query`, padded with [`NO_MATCH`].
    pub fn search_raw(&self, query: &[f32], k: usize) -> Result<RawSearch, AnnError> {
        if query.len() != self.dimension {
            return Err(AnnError::DimensionMismatch {
                expected: self.dimension,
                got: query.len(),
            });
        }
        if k == 0 {
            return Ok(RawSearch::padded(Vec::new(), 0));
        }

        let matches = match &self.hnsw {
            Some(hnsw) => {
                let ef = self.config.ef_search.max(k);
                hnsw.search(query, k, ef)
                    .into_iter()
                    .map(|n| (n.get_origin_id(), 1.0 - n.distance))
                    .collect()
            }
            None => self.linear_search(query, k),
        };
        Ok(RawSearch::padded(matches, k))
    }

    fn linear_search(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(ordinal, v)| (ordinal, cosine_similarity(query, v)))
            .collect();
        // Stable sort keeps lower ordinals first on ties.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn uses_hnsw(&self) -> bool {
        self.hnsw.is_some()
    }

    pub fn config(&self) -> &AnnConfig {
        &self.config
    }

    pub(crate) fn vectors(&self) -> &[Vec<f32>] {
        &self.vectors
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnnError {
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("vector {ordinal} has dimension {got}, expected {expected}")]
    VectorDimension {
        ordinal: usize,
        expected: usize,
        got: usize,
    },
    #[error("index dimension must be non-zero")]
    ZeroDimension,
}

/// Cosine similarity; `0.0` when either side is a zero vector.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}
