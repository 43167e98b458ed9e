use std::fs;
use std::path::Path;
use std::sync::Arc;

use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};
use serde::{Deserialize, Serialize};
use zstd::{decode_all, encode_all};

use crate::ann::{AnnConfig, AnnIndex};
use crate::{Document, IndexError, VectorSearch, INDEX_SCHEMA_VERSION};

const ZSTD_LEVEL: i32 = 3;
const UNIT_TOLERANCE: f32 = 1e-3;

/// A document reference plus its relevance score (cosine similarity).
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub document: Arc<Document>,
    pub score: f32,
}

impl Hit {
    pub fn new(document: Arc<Document>, score: f32) -> Self {
        Self { document, score }
    }
}

/// On-disk layout of the vector file.
#[derive(Serialize, Deserialize)]
struct IndexFile {
    schema_version: u16,
    dimension: u32,
    ids: Vec<String>,
    vectors: Vec<Vec<f32>>,
}

/// Documents and their embeddings, loaded once and read-only afterwards.
#[derive(Debug)]
pub struct VectorStore {
    documents: Vec<Arc<Document>>,
    ann: AnnIndex,
}

impl VectorStore {
    /// Pair documents with their embeddings; `vectors[i]` belongs to `documents[i]`.
    ///
    /// Vectors are L2-normalized so scores are cosine similarities.
    pub fn from_parts(
        documents: Vec<Document>,
        mut vectors: Vec<Vec<f32>>,
        dimension: usize,
        ann: AnnConfig,
    ) -> Result<Self, IndexError> {
        if vectors.len() != documents.len() {
            return Err(IndexError::CountMismatch {
                vectors: vectors.len(),
                documents: documents.len(),
            });
        }

        let mut renormalized = 0usize;
        for v in vectors.iter_mut() {
            let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 && (norm - 1.0).abs() > UNIT_TOLERANCE {
                v.iter_mut().for_each(|x| *x /= norm);
                renormalized += 1;
            }
        }
        if renormalized > 0 {
            log::warn!("{renormalized} stored vectors were not unit length and were normalized");
        }

        let ann = AnnIndex::build(dimension, vectors, ann)?;
        Ok(Self {
            documents: documents.into_iter().map(Arc::new).collect(),
            ann,
        })
    }

    /// Load the vector file and its metadata file.
    ///
    /// Fails on a missing file, an unsupported schema version, a dimension
    /// that disagrees with the stored vectors, a count mismatch, or an id
    /// mismatch at any ordinal.
    pub fn load(
        index_path: impl AsRef<Path>,
        meta_path: impl AsRef<Path>,
        ann: AnnConfig,
    ) -> Result<Self, IndexError> {
        let index_path = index_path.as_ref();
        let meta_path = meta_path.as_ref();
        for path in [index_path, meta_path] {
            if !path.is_file() {
                return Err(IndexError::MissingFile(path.to_path_buf()));
            }
        }

        let compressed = fs::read(index_path)?;
        let decompressed = decode_all(compressed.as_slice())?;
        let (file, _): (IndexFile, usize) = decode_from_slice(&decompressed, standard())?;

        if file.schema_version != INDEX_SCHEMA_VERSION {
            return Err(IndexError::SchemaVersion {
                expected: INDEX_SCHEMA_VERSION,
                found: file.schema_version,
            });
        }
        if file.ids.len() != file.vectors.len() {
            return Err(IndexError::Decode(format!(
                "index file lists {} ids for {} vectors",
                file.ids.len(),
                file.vectors.len()
            )));
        }

        let documents: Vec<Document> = serde_json::from_slice(&fs::read(meta_path)?)?;
        if documents.len() != file.vectors.len() {
            return Err(IndexError::CountMismatch {
                vectors: file.vectors.len(),
                documents: documents.len(),
            });
        }
        for (ordinal, (index_id, doc)) in file.ids.iter().zip(documents.iter()).enumerate() {
            if *index_id != doc.id {
                return Err(IndexError::IdMismatch {
                    ordinal,
                    index_id: index_id.clone(),
                    metadata_id: doc.id.clone(),
                });
            }
        }

        let dimension = file.dimension as usize;
        if let Some(v) = file.vectors.iter().find(|v| v.len() != dimension) {
            return Err(IndexError::DimensionMismatch {
                expected: dimension,
                got: v.len(),
            });
        }

        let store = Self::from_parts(documents, file.vectors, dimension, ann)?;
        log::info!(
            "loaded {} documents (dim {}) from {} and {}",
            store.len(),
            dimension,
            index_path.display(),
            meta_path.display()
        );
        Ok(store)
    }

    /// Write the vector file (zstd-compressed bincode) and the metadata file
    /// (JSON array of documents).
    pub fn save(
        &self,
        index_path: impl AsRef<Path>,
        meta_path: impl AsRef<Path>,
    ) -> Result<(), IndexError> {
        let file = IndexFile {
            schema_version: INDEX_SCHEMA_VERSION,
            dimension: self.ann.dimension() as u32,
            ids: self.documents.iter().map(|d| d.id.clone()).collect(),
            vectors: self.ann.vectors().to_vec(),
        };
        let encoded = encode_to_vec(&file, standard())?;
        fs::write(index_path.as_ref(), encode_all(encoded.as_slice(), ZSTD_LEVEL)?)?;

        let docs: Vec<&Document> = self.documents.iter().map(Arc::as_ref).collect();
        fs::write(meta_path.as_ref(), serde_json::to_vec_pretty(&docs)?)?;
        Ok(())
    }

    pub fn documents(&self) -> &[Arc<Document>] {
        &self.documents
    }

    pub fn document(&self, ordinal: usize) -> Option<&Arc<Document>> {
        self.documents.get(ordinal)
    }

    pub fn ann(&self) -> &AnnIndex {
        &self.ann
    }
}

impl VectorSearch for VectorStore {
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Hit>, IndexError> {
        let raw = self.ann.search_raw(query, k)?;
        let hits: Vec<Hit> = raw
            .matches()
            .filter_map(|(ordinal, score)| {
                self.documents
                    .get(ordinal)
                    .map(|doc| Hit::new(Arc::clone(doc), score))
            })
            .collect();
        log::trace!("search k={k} returned {} hits", hits.len());
        Ok(hits)
    }

    fn len(&self) -> usize {
        self.documents.len()
    }

    fn dimension(&self) -> usize {
        self.ann.dimension()
    }
}
