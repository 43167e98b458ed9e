//! # ragchat index
//!
//! Read-only document store backing retrieval. It pairs a list of
//! [`Document`]s with their embeddings and answers nearest-neighbour queries
//! through the [`VectorSearch`] trait.
//!
//! ## Pieces
//!
//! - [`AnnIndex`] - exact cosine scan for small corpora, HNSW (`hnsw_rs`)
//!   once the corpus crosses [`AnnConfig::min_vectors_for_ann`]. Its raw
//!   output is a `(scores, ids)` pair padded with [`NO_MATCH`].
//! - [`VectorStore`] - documents plus the ANN index. Padding slots and
//!   out-of-range ids never leave [`VectorStore::search`](VectorSearch::search).
//! - Persistence: a zstd-compressed bincode vector file and a JSON metadata
//!   file, checked against each other at load time so inconsistencies surface
//!   at startup instead of mid-request.
//!
//! ## Example
//!
//! ```
//! use index::{AnnConfig, Document, VectorSearch, VectorStore};
//!
//! let docs = vec![
//!     Document::new("faq-1", "Returns are accepted within 30 days.").with_type("faq"),
//!     Document::new("p-1", "Waterproof trail shoe.").with_type("product"),
//! ];
//! let vectors = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
//! let store = VectorStore::from_parts(docs, vectors, 2, AnnConfig::default()).unwrap();
//!
//! let hits = store.search(&[1.0, 0.0], 5).unwrap();
//! assert_eq!(hits.len(), 2);
//! assert_eq!(hits[0].document.id, "faq-1");
//! ```

pub mod ann;
mod document;
mod error;
mod store;

pub use ann::{AnnConfig, AnnError, AnnIndex, RawSearch, NO_MATCH};
pub use document::{Document, DocumentMetadata, DEFAULT_TYPE_LABEL};
pub use error::IndexError;
pub use store::{Hit, VectorStore};

/// Bump this value whenever the on-disk vector file layout changes.
pub const INDEX_SCHEMA_VERSION: u16 = 1;

/// Nearest-neighbour lookup over stored documents.
///
/// Implementations are read-only after construction and shared across
/// concurrent requests.
pub trait VectorSearch: Send + Sync {
    /// Up to `k` hits, best first. Never contains "no match" slots.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Hit>, IndexError>;

    /// Number of stored documents.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Embedding length expected by [`search`](Self::search).
    fn dimension(&self) -> usize;
}
