//! Error taxonomy for the retrieval and chat pipeline.
//!
//! Per-file extraction problems are absorbed by the knowledge base and
//! reported in its [`LoadSummary`](crate::models::LoadSummary); every other
//! variant propagates to the caller unchanged so the CLI or HTTP layer can
//! map it to its own responses.

use std::path::PathBuf;

use thiserror::Error;

use crate::extract::ExtractError;

/// Errors produced by the library.
#[derive(Debug, Error)]
pub enum Error {
    /// A single corpus file could not be turned into text.
    #[error("could not extract {path}: {source}")]
    Extraction {
        /// File that failed.
        path: PathBuf,
        /// Underlying extractor failure.
        #[source]
        source: ExtractError,
    },

    /// Invalid chunking, retrieval or backend parameters.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The embedding backend failed or is not available.
    #[error("embedding backend error: {0}")]
    EmbeddingBackend(String),

    /// The index was built with a different embedding model than the active one.
    #[error("index was built with model '{indexed}' but the active model is '{active}'; rebuild the index")]
    ModelMismatch {
        /// Model recorded alongside the index.
        indexed: String,
        /// Model of the current embedding provider.
        active: String,
    },

    /// A vector did not have the dimension the index expects.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension fixed by the index or provider.
        expected: usize,
        /// Dimension that was supplied.
        actual: usize,
    },

    /// The vector index storage could not be reached or is corrupt.
    #[error("vector index unavailable: {0}")]
    IndexUnavailable(String),

    /// The completion backend failed (after the single retry, when surfaced by the orchestrator).
    #[error("completion backend error: {0}")]
    CompletionBackend(String),

    /// A corpus load found no usable documents.
    #[error("no usable documents found under {}", root.display())]
    CorpusEmpty {
        /// Corpus root that was scanned.
        root: PathBuf,
    },

    /// Filesystem failure outside per-file extraction (e.g. unreadable corpus root).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Self::IndexUnavailable(err.to_string())
    }
}

/// Result alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;
