//! Knowledge base: corpus ingestion and query-time retrieval.
//!
//! Ties the pipeline together:
//!
//! ```text
//! scan_corpus → TextExtractor → chunk_words → EmbeddingProvider → VectorIndex
//! ```
//!
//! # Reloads
//!
//! [`KnowledgeBase::load_corpus`] builds the complete new entry set first
//! and swaps it in with [`VectorIndex::replace_all`], so concurrent
//! [`retrieve`](KnowledgeBase::retrieve) calls see either the old index or
//! the new one. Chunks whose id and content hash are unchanged keep their
//! stored vector when the index was built by the active model; everything
//! else is embedded in `batch_size` batches. Reloads are serialised.
//!
//! Per-file extraction failures and blank documents are logged and listed
//! in the returned [`LoadSummary`]; they never abort the load.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::chunk::{self, chunk_words};
use crate::config::{ChunkingConfig, CorpusConfig};
use crate::corpus::scan_corpus;
use crate::embedding::{check_vectors, EmbeddingProvider};
use crate::error::{Error, Result};
use crate::extract::{ExtractError, TextExtractor};
use crate::index::VectorIndex;
use crate::models::{Document, IndexEntry, IndexModel, LoadSummary, ScoredEntry, SkippedFile};

pub struct KnowledgeBase {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    extractor: Arc<dyn TextExtractor>,
    corpus: CorpusConfig,
    chunking: ChunkingConfig,
    batch_size: usize,
    min_score: Option<f32>,
    reload: Mutex<()>,
}

impl KnowledgeBase {
    /// Fails with [`Error::Configuration`] for invalid chunking parameters.
    pub fn new(
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        extractor: Arc<dyn TextExtractor>,
        corpus: CorpusConfig,
        chunking: ChunkingConfig,
    ) -> Result<Self> {
        chunk::validate(chunking.chunk_size, chunking.overlap)?;
        Ok(Self {
            index,
            embedder,
            extractor,
            corpus,
            chunking,
            batch_size: 64,
            min_score: None,
            reload: Mutex::new(()),
        })
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Drop retrieval hits scoring below `min_score`.
    pub fn with_min_score(mut self, min_score: Option<f32>) -> Self {
        self.min_score = min_score;
        self
    }

    /// Model identity the current embedding provider produces.
    pub fn active_model(&self) -> IndexModel {
        IndexModel {
            name: self.embedder.model_name().to_string(),
            dims: self.embedder.dims(),
        }
    }

    /// Model recorded alongside the index, if any.
    pub async fn indexed_model(&self) -> Result<Option<IndexModel>> {
        self.index.model().await
    }

    pub async fn index_size(&self) -> Result<usize> {
        self.index.count().await
    }

    /// Reload from the configured corpus root.
    pub async fn refresh(&self) -> Result<LoadSummary> {
        let root = self.corpus.root.clone();
        self.load_corpus(&root).await
    }

    /// Rebuild the index from every recognised file under `root`.
    ///
    /// # Errors
    ///
    /// - [`Error::CorpusEmpty`] when no file yields text; the index is
    ///   cleared first so it matches the (empty) corpus.
    /// - [`Error::EmbeddingBackend`] if embedding fails; the previous index
    ///   is left in place.
    pub async fn load_corpus(&self, root: &Path) -> Result<LoadSummary> {
        let _guard = self.reload.lock().await;

        let scan = scan_corpus(root, &self.corpus)?;
        let model = self.active_model();
        let previous = self.reusable_entries(&model).await?;

        let mut summary = LoadSummary {
            documents_skipped: scan.skipped.len(),
            skipped: scan.skipped,
            ..LoadSummary::default()
        };
        // (chunk, source_path, reused vector)
        let mut planned = Vec::new();

        for file in scan.files {
            let extractor = self.extractor.clone();
            let path = file.path.clone();
            let extracted = tokio::task::spawn_blocking(move || extractor.extract(&path))
                .await
                .unwrap_or_else(|e| Err(ExtractError::Crashed(e.to_string())));

            let raw_text = match extracted {
                Ok(text) => text,
                Err(source) => {
                    let err = Error::Extraction {
                        path: file.path.clone(),
                        source,
                    };
                    warn!(path = %file.path.display(), error = %err, "skipping file");
                    summary.documents_skipped += 1;
                    summary.skipped.push(SkippedFile {
                        path: file.document_id,
                        reason: err.to_string(),
                    });
                    continue;
                }
            };

            if raw_text.trim().is_empty() {
                warn!(path = %file.path.display(), "skipping file with no text");
                summary.documents_skipped += 1;
                summary.skipped.push(SkippedFile {
                    path: file.document_id,
                    reason: "empty".to_string(),
                });
                continue;
            }

            let doc = Document {
                id: file.document_id,
                source_path: file.path.display().to_string(),
                raw_text,
                last_modified: file.last_modified,
            };
            let chunks = chunk_words(
                &doc.id,
                &doc.raw_text,
                self.chunking.chunk_size,
                self.chunking.overlap,
            )?;
            debug!(document = %doc.id, chunks = chunks.len(), "chunked document");

            for chunk in chunks {
                let reused = previous
                    .get(&chunk.chunk_id)
                    .filter(|e| e.content_hash == chunk.hash)
                    .map(|e| e.embedding.clone());
                planned.push((chunk, doc.source_path.clone(), reused));
            }
            summary.documents_loaded += 1;
        }

        if summary.documents_loaded == 0 {
            self.index.reset().await?;
            warn!(root = %root.display(), skipped = summary.documents_skipped, "corpus is empty");
            return Err(Error::CorpusEmpty {
                root: root.to_path_buf(),
            });
        }

        let pending: Vec<usize> = planned
            .iter()
            .enumerate()
            .filter(|(_, (_, _, reused))| reused.is_none())
            .map(|(i, _)| i)
            .collect();

        let mut fresh: HashMap<usize, Vec<f32>> = HashMap::with_capacity(pending.len());
        for batch in pending.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|&i| planned[i].0.text.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts).await?;
            check_vectors(&vectors, texts.len(), model.dims)?;
            fresh.extend(batch.iter().copied().zip(vectors));
        }

        summary.chunks_embedded = pending.len();
        summary.chunks_reused = planned.len() - pending.len();
        summary.chunks_indexed = planned.len();

        let entries: Vec<IndexEntry> = planned
            .into_iter()
            .enumerate()
            .filter_map(|(i, (chunk, source_path, reused))| {
                let vector = reused.or_else(|| fresh.remove(&i))?;
                Some(IndexEntry::from_chunk(&chunk, vector, &source_path))
            })
            .collect();

        self.index.replace_all(entries, &model).await?;

        info!(
            loaded = summary.documents_loaded,
            skipped = summary.documents_skipped,
            chunks = summary.chunks_indexed,
            embedded = summary.chunks_embedded,
            reused = summary.chunks_reused,
            model = %model.name,
            "corpus loaded"
        );
        Ok(summary)
    }

    /// Texts of the `k` chunks most similar to `query`, best first.
    ///
    /// An empty index yields an empty result, not an error.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<String>> {
        Ok(self
            .retrieve_scored(query, k)
            .await?
            .into_iter()
            .map(|hit| hit.entry.text)
            .collect())
    }

    /// Like [`retrieve`](Self::retrieve) but keeps scores and metadata.
    ///
    /// # Errors
    ///
    /// [`Error::ModelMismatch`] if the index was built by another model.
    pub async fn retrieve_scored(&self, query: &str, k: usize) -> Result<Vec<ScoredEntry>> {
        if k == 0 || self.index.count().await? == 0 {
            return Ok(Vec::new());
        }

        let active = self.active_model();
        if let Some(indexed) = self.index.model().await? {
            if indexed != active {
                return Err(Error::ModelMismatch {
                    indexed: indexed.name,
                    active: active.name,
                });
            }
        }

        let vector = self.embedder.embed(query).await?;
        let hits = self.index.query(&vector, k).await?;
        Ok(match self.min_score {
            Some(floor) => hits.into_iter().filter(|h| h.score >= floor).collect(),
            None => hits,
        })
    }

    /// Stored entries keyed by chunk id, when they were built by `model`.
    async fn reusable_entries(&self, model: &IndexModel) -> Result<HashMap<String, IndexEntry>> {
        match self.index.model().await? {
            Some(indexed) if &indexed == model => Ok(self
                .index
                .entries()
                .await?
                .into_iter()
                .map(|e| (e.chunk_id.clone(), e))
                .collect()),
            _ => Ok(HashMap::new()),
        }
    }
}
