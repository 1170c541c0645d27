//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait is the storage seam of the retrieval pipeline:
//! it maps `chunk_id → (vector, text, metadata)` and answers k-nearest
//! neighbour queries.
//!
//! # Ranking
//!
//! Scores are **cosine similarity, sorted descending** (higher is closer).
//! Entries with equal scores keep their insertion order, and overwriting an
//! existing `chunk_id` keeps the entry's original position, so results are
//! reproducible for identical inputs.
//!
//! # Backends
//!
//! | Backend | Storage | Module |
//! |---------|---------|--------|
//! | [`MemoryIndex`] | `RwLock<Vec>` | [`memory`] |
//! | [`SqliteIndex`] | SQLite file (WAL) | [`sqlite`] |

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::error::{Error, Result};
use crate::models::{IndexEntry, IndexModel, ScoredEntry};

pub use memory::MemoryIndex;
pub use sqlite::SqliteIndex;

/// Abstract vector store.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert`](VectorIndex::upsert) | Insert or overwrite entries by `chunk_id` |
/// | [`query`](VectorIndex::query) | Top-`k` entries by cosine similarity |
/// | [`reset`](VectorIndex::reset) | Remove every entry and the recorded model |
/// | [`replace_all`](VectorIndex::replace_all) | Atomically swap in a complete new entry set |
/// | [`entries`](VectorIndex::entries) | Snapshot in insertion order |
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert entries; an existing `chunk_id` is overwritten (last write wins).
    ///
    /// Fails with [`Error::DimensionMismatch`] if an embedding's length
    /// differs from the recorded model's dimension or from the rest of the batch.
    async fn upsert(&self, entries: &[IndexEntry]) -> Result<()>;

    /// Return up to `k` entries ordered by descending cosine similarity.
    ///
    /// `k` is capped at [`count`](VectorIndex::count); an empty index
    /// yields an empty result.
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredEntry>>;

    /// Remove all entries and forget the recorded model.
    async fn reset(&self) -> Result<()>;

    async fn count(&self) -> Result<usize>;

    /// All entries in insertion order.
    async fn entries(&self) -> Result<Vec<IndexEntry>>;

    /// The embedding model the current entries were produced by, if recorded.
    async fn model(&self) -> Result<Option<IndexModel>>;

    /// Record the embedding model alongside the index.
    async fn set_model(&self, model: &IndexModel) -> Result<()>;

    /// Replace the whole index with `entries` built by `model`.
    ///
    /// Readers observe either the previous contents or the new ones,
    /// never a partially populated index.
    async fn replace_all(&self, entries: Vec<IndexEntry>, model: &IndexModel) -> Result<()>;
}

/// Check every embedding has `dims` components.
pub(crate) fn check_dims(entries: &[IndexEntry], dims: usize) -> Result<()> {
    match entries.iter().find(|e| e.embedding.len() != dims) {
        Some(bad) => Err(Error::DimensionMismatch {
            expected: dims,
            actual: bad.embedding.len(),
        }),
        None => Ok(()),
    }
}

/// Score `entries` (given in insertion order) against `vector` and keep the best `k`.
///
/// `sort_by` is stable, so equal scores stay in insertion order.
pub(crate) fn rank(entries: Vec<IndexEntry>, vector: &[f32], k: usize) -> Vec<ScoredEntry> {
    let mut scored: Vec<ScoredEntry> = entries
        .into_iter()
        .map(|entry| {
            let score = cosine_similarity(vector, &entry.embedding);
            ScoredEntry { entry, score }
        })
        .collect();
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(k);
    scored
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::models::{EntryMetadata, IndexEntry};

    pub fn entry(id: &str, text: &str, embedding: Vec<f32>) -> IndexEntry {
        IndexEntry {
            chunk_id: id.to_string(),
            embedding,
            text: text.to_string(),
            content_hash: format!("hash-{}", text),
            metadata: EntryMetadata {
                document_id: "doc.md".to_string(),
                source_path: "/corpus/doc.md".to_string(),
                sequence_index: 0,
            },
        }
    }
}
