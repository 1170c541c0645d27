//! In-memory [`VectorIndex`] for tests and ephemeral use.
//!
//! Entries live in a `Vec` (insertion order) with a `HashMap` from
//! `chunk_id` to position, behind a single `std::sync::RwLock`. Vector
//! search is brute-force cosine similarity over all stored vectors.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::models::{IndexEntry, IndexModel, ScoredEntry};

use super::{check_dims, rank, VectorIndex};

#[derive(Default)]
struct State {
    entries: Vec<IndexEntry>,
    positions: HashMap<String, usize>,
    model: Option<IndexModel>,
}

impl State {
    fn expected_dims(&self) -> Option<usize> {
        self.model
            .as_ref()
            .map(|m| m.dims)
            .or_else(|| self.entries.first().map(|e| e.embedding.len()))
    }

    fn upsert_one(&mut self, entry: IndexEntry) {
        match self.positions.get(&entry.chunk_id) {
            Some(&pos) => self.entries[pos] = entry,
            None => {
                self.positions
                    .insert(entry.chunk_id.clone(), self.entries.len());
                self.entries.push(entry);
            }
        }
    }
}

/// In-memory vector index.
#[derive(Default)]
pub struct MemoryIndex {
    state: RwLock<State>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| Error::IndexUnavailable("memory index lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| Error::IndexUnavailable("memory index lock poisoned".to_string()))
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn upsert(&self, entries: &[IndexEntry]) -> Result<()> {
        let mut state = self.write()?;
        let dims = state
            .expected_dims()
            .or_else(|| entries.first().map(|e| e.embedding.len()));
        if let Some(dims) = dims {
            check_dims(entries, dims)?;
        }
        for entry in entries {
            state.upsert_one(entry.clone());
        }
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredEntry>> {
        let entries = self.read()?.entries.clone();
        Ok(rank(entries, vector, k))
    }

    async fn reset(&self) -> Result<()> {
        *self.write()? = State::default();
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.read()?.entries.len())
    }

    async fn entries(&self) -> Result<Vec<IndexEntry>> {
        Ok(self.read()?.entries.clone())
    }

    async fn model(&self) -> Result<Option<IndexModel>> {
        Ok(self.read()?.model.clone())
    }

    async fn set_model(&self, model: &IndexModel) -> Result<()> {
        self.write()?.model = Some(model.clone());
        Ok(())
    }

    async fn replace_all(&self, entries: Vec<IndexEntry>, model: &IndexModel) -> Result<()> {
        check_dims(&entries, model.dims)?;
        let mut next = State {
            model: Some(model.clone()),
            ..State::default()
        };
        for entry in entries {
            next.upsert_one(entry);
        }
        *self.write()? = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::test_support::entry;

    #[tokio::test]
    async fn test_upsert_is_idempotent_last_write_wins() {
        let index = MemoryIndex::new();
        index
            .upsert(&[entry("c1", "old text", vec![1.0, 0.0])])
            .await
            .unwrap();
        index
            .upsert(&[entry("c1", "new text", vec![0.0, 1.0])])
            .await
            .unwrap();

        assert_eq!(index.count().await.unwrap(), 1);
        let all = index.entries().await.unwrap();
        assert_eq!(all[0].text, "new text");
    }

    #[tokio::test]
    async fn test_overwrite_keeps_insertion_position() {
        let index = MemoryIndex::new();
        index
            .upsert(&[
                entry("a", "a", vec![1.0, 0.0]),
                entry("b", "b", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();
        index.upsert(&[entry("a", "a2", vec![1.0, 0.0])]).await.unwrap();

        let hits = index.query(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(hits[0].entry.chunk_id, "a");
        assert_eq!(hits[0].entry.text, "a2");
        assert_eq!(hits[1].entry.chunk_id, "b");
    }

    #[tokio::test]
    async fn test_query_caps_k_at_count() {
        let index = MemoryIndex::new();
        index
            .upsert(&[
                entry("a", "a", vec![1.0, 0.0]),
                entry("b", "b", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let hits = index.query(&[1.0, 0.0], 10).await.unwrap();
        assert_eq!(hits.len(), index.count().await.unwrap());
        assert_eq!(hits[0].entry.chunk_id, "a");
    }

    #[tokio::test]
    async fn test_reset_clears_entries_and_model() {
        let index = MemoryIndex::new();
        let model = IndexModel {
            name: "m".to_string(),
            dims: 2,
        };
        index
            .replace_all(vec![entry("a", "a", vec![1.0, 0.0])], &model)
            .await
            .unwrap();
        assert_eq!(index.model().await.unwrap(), Some(model));

        index.reset().await.unwrap();
        assert_eq!(index.count().await.unwrap(), 0);
        assert_eq!(index.model().await.unwrap(), None);
        assert!(index.query(&[1.0, 0.0], 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let index = MemoryIndex::new();
        index.upsert(&[entry("a", "a", vec![1.0, 0.0])]).await.unwrap();
        let err = index
            .upsert(&[entry("b", "b", vec![1.0, 0.0, 0.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
        assert_eq!(index.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_replace_all_drops_stale_entries() {
        let index = MemoryIndex::new();
        let model = IndexModel {
            name: "m".to_string(),
            dims: 2,
        };
        index
            .upsert(&[
                entry("gone", "gone", vec![1.0, 0.0]),
                entry("kept", "kept", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();
        index
            .replace_all(vec![entry("kept", "kept", vec![0.0, 1.0])], &model)
            .await
            .unwrap();

        let ids: Vec<String> = index
            .entries()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.chunk_id)
            .collect();
        assert_eq!(ids, vec!["kept"]);
    }
}
