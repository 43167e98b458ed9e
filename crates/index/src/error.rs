use std::path::PathBuf;

use bincode::error::{DecodeError, EncodeError};
use thiserror::Error;

use crate::ann::AnnError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndexError {
    #[error("required file not found: {}", .0.display())]
    MissingFile(PathBuf),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("serialization encode error: {0}")]
    Encode(String),
    #[error("serialization decode error: {0}")]
    Decode(String),
    #[error("metadata file is not a valid document list: {0}")]
    Metadata(String),
    #[error("index schema version {found} is not supported (expected {expected})")]
    SchemaVersion { expected: u16, found: u16 },
    #[error("index holds {vectors} vectors but metadata lists {documents} documents")]
    CountMismatch { vectors: usize, documents: usize },
    #[error("ordinal {ordinal}: index id '{index_id}' does not match metadata id '{metadata_id}'")]
    IdMismatch {
        ordinal: usize,
        index_id: String,
        metadata_id: String,
    },
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error(transparent)]
    Ann(#[from] AnnError),
}

impl From<EncodeError> for IndexError {
    fn from(e: EncodeError) -> Self {
        IndexError::Encode(e.to_string())
    }
}

impl From<DecodeError> for IndexError {
    fn from(e: DecodeError) -> Self {
        IndexError::Decode(e.to_string())
    }
}

impl From<std::io::Error> for IndexError {
    fn from(e: std::io::Error) -> Self {
        IndexError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for IndexError {
    fn from(e: serde_json::Error) -> Self {
        IndexError::Metadata(e.to_string())
    }
}
