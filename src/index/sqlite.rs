//! SQLite-backed [`VectorIndex`].
//!
//! Vectors are stored as little-endian `f32` BLOBs in `index_entries` and
//! scored in Rust with brute-force cosine similarity. The embedding model
//! is recorded in `index_meta` under the `model` and `dims` keys.

use std::path::Path;

use async_trait::async_trait;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use crate::db;
use crate::embedding::{blob_to_vec, vec_to_blob};
use crate::error::{Error, Result};
use crate::migrate;
use crate::models::{EntryMetadata, IndexEntry, IndexModel, ScoredEntry};

use super::{check_dims, rank, VectorIndex};

/// SQLite implementation of the [`VectorIndex`] trait.
pub struct SqliteIndex {
    pool: SqlitePool,
}

impl SqliteIndex {
    /// Open the index file at `path`, creating it and its schema if needed.
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = db::connect(path).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn expected_dims(&self) -> Result<Option<usize>> {
        if let Some(model) = self.model().await? {
            return Ok(Some(model.dims));
        }
        let row = sqlx::query("SELECT length(embedding) AS bytes FROM index_entries LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<i64, _>("bytes") as usize / 4))
    }
}

async fn write_entry(tx: &mut Transaction<'_, Sqlite>, entry: &IndexEntry) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO index_entries (chunk_id, document_id, source_path, sequence_index,
                                   text, content_hash, embedding)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(chunk_id) DO UPDATE SET
            document_id = excluded.document_id,
            source_path = excluded.source_path,
            sequence_index = excluded.sequence_index,
            text = excluded.text,
            content_hash = excluded.content_hash,
            embedding = excluded.embedding
        "#,
    )
    .bind(&entry.chunk_id)
    .bind(&entry.metadata.document_id)
    .bind(&entry.metadata.source_path)
    .bind(entry.metadata.sequence_index as i64)
    .bind(&entry.text)
    .bind(&entry.content_hash)
    .bind(vec_to_blob(&entry.embedding))
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn write_model(tx: &mut Transaction<'_, Sqlite>, model: &IndexModel) -> Result<()> {
    for (key, value) in [("model", model.name.clone()), ("dims", model.dims.to_string())] {
        sqlx::query(
            "INSERT INTO index_meta (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn upsert(&self, entries: &[IndexEntry]) -> Result<()> {
        let dims = match self.expected_dims().await? {
            Some(d) => Some(d),
            None => entries.first().map(|e| e.embedding.len()),
        };
        if let Some(dims) = dims {
            check_dims(entries, dims)?;
        }

        let mut tx = self.pool.begin().await?;
        for entry in entries {
            write_entry(&mut tx, entry).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredEntry>> {
        let entries = self.entries().await?;
        Ok(rank(entries, vector, k))
    }

    async fn reset(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM index_entries")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM index_meta").execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM index_entries")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    async fn entries(&self) -> Result<Vec<IndexEntry>> {
        let rows = sqlx::query(
            "SELECT chunk_id, document_id, source_path, sequence_index, text, content_hash, embedding
             FROM index_entries ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                IndexEntry {
                    chunk_id: row.get("chunk_id"),
                    embedding: blob_to_vec(&blob),
                    text: row.get("text"),
                    content_hash: row.get("content_hash"),
                    metadata: EntryMetadata {
                        document_id: row.get("document_id"),
                        source_path: row.get("source_path"),
                        sequence_index: row.get::<i64, _>("sequence_index") as usize,
                    },
                }
            })
            .collect())
    }

    async fn model(&self) -> Result<Option<IndexModel>> {
        let rows = sqlx::query("SELECT key, value FROM index_meta WHERE key IN ('model', 'dims')")
            .fetch_all(&self.pool)
            .await?;

        let mut name = None;
        let mut dims = None;
        for row in &rows {
            let key: String = row.get("key");
            let value: String = row.get("value");
            match key.as_str() {
                "model" => name = Some(value),
                "dims" => {
                    dims = Some(value.parse::<usize>().map_err(|_| {
                        Error::IndexUnavailable(format!("corrupt dims in index_meta: {}", value))
                    })?)
                }
                _ => {}
            }
        }

        Ok(match (name, dims) {
            (Some(name), Some(dims)) => Some(IndexModel { name, dims }),
            _ => None,
        })
    }

    async fn set_model(&self, model: &IndexModel) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        write_model(&mut tx, model).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn replace_all(&self, entries: Vec<IndexEntry>, model: &IndexModel) -> Result<()> {
        check_dims(&entries, model.dims)?;

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM index_entries")
            .execute(&mut *tx)
            .await?;
        for entry in &entries {
            write_entry(&mut tx, entry).await?;
        }
        write_model(&mut tx, model).await?;
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::test_support::entry;
    use tempfile::TempDir;

    async fn open_temp() -> (TempDir, SqliteIndex) {
        let tmp = TempDir::new().unwrap();
        let index = SqliteIndex::open(&tmp.path().join("data/index.sqlite"))
            .await
            .unwrap();
        (tmp, index)
    }

    #[tokio::test]
    async fn test_upsert_overwrites_by_chunk_id() {
        let (_tmp, index) = open_temp().await;
        index
            .upsert(&[entry("c1", "first", vec![1.0, 0.0])])
            .await
            .unwrap();
        index
            .upsert(&[entry("c1", "second", vec![0.0, 1.0])])
            .await
            .unwrap();

        assert_eq!(index.count().await.unwrap(), 1);
        let hits = index.query(&[0.0, 1.0], 3).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].entry.text, "second");
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_vectors_and_metadata_round_trip() {
        let (_tmp, index) = open_temp().await;
        let original = entry("c1", "text", vec![0.25, -0.5, 1.5]);
        index.upsert(std::slice::from_ref(&original)).await.unwrap();

        let stored = index.entries().await.unwrap();
        assert_eq!(stored, vec![original]);
    }

    #[tokio::test]
    async fn test_ties_follow_insertion_order() {
        let (_tmp, index) = open_temp().await;
        index
            .upsert(&[
                entry("z", "z", vec![1.0, 0.0]),
                entry("a", "a", vec![1.0, 0.0]),
                entry("m", "m", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();
        index.upsert(&[entry("z", "z2", vec![1.0, 0.0])]).await.unwrap();

        let ids: Vec<String> = index
            .query(&[1.0, 0.0], 3)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.entry.chunk_id)
            .collect();
        assert_eq!(ids, vec!["z", "a", "m"]);
    }

    #[tokio::test]
    async fn test_model_persists_across_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("index.sqlite");
        let model = IndexModel {
            name: "hashing-2".to_string(),
            dims: 2,
        };
        {
            let index = SqliteIndex::open(&path).await.unwrap();
            index
                .replace_all(vec![entry("a", "a", vec![1.0, 0.0])], &model)
                .await
                .unwrap();
        }

        let reopened = SqliteIndex::open(&path).await.unwrap();
        assert_eq!(reopened.model().await.unwrap(), Some(model));
        assert_eq!(reopened.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_replace_all_and_reset() {
        let (_tmp, index) = open_temp().await;
        let model = IndexModel {
            name: "m".to_string(),
            dims: 2,
        };
        index
            .upsert(&[
                entry("old", "old", vec![1.0, 0.0]),
                entry("keep", "keep", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();
        index
            .replace_all(vec![entry("keep", "keep", vec![0.0, 1.0])], &model)
            .await
            .unwrap();
        assert_eq!(index.count().await.unwrap(), 1);

        let err = index
            .upsert(&[entry("bad", "bad", vec![1.0, 0.0, 0.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 2, actual: 3 }));

        index.reset().await.unwrap();
        assert_eq!(index.count().await.unwrap(), 0);
        assert_eq!(index.model().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_replace_all_with_wrong_dims_leaves_index_untouched() {
        let (_tmp, index) = open_temp().await;
        let model = IndexModel {
            name: "m".to_string(),
            dims: 2,
        };
        index
            .replace_all(vec![entry("a", "a", vec![1.0, 0.0])], &model)
            .await
            .unwrap();

        let result = index
            .replace_all(vec![entry("b", "b", vec![1.0])], &model)
            .await;
        assert!(result.is_err());
        assert_eq!(index.entries().await.unwrap()[0].chunk_id, "a");
    }
}
