//! Core data models used throughout the pipeline.
//!
//! These types represent the documents, chunks, index entries and chat
//! messages that flow from corpus ingestion through retrieval to the
//! conversation sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A source file loaded from the corpus. Identity is the source path.
#[derive(Debug, Clone)]
pub struct Document {
    /// Path relative to the corpus root, with `/` separators.
    pub id: String,
    /// Absolute or root-joined path the text was extracted from.
    pub source_path: String,
    pub raw_text: String,
    pub last_modified: DateTime<Utc>,
}

/// A contiguous word window of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Stable id derived from `(document_id, sequence_index)`.
    pub chunk_id: String,
    pub document_id: String,
    pub sequence_index: usize,
    pub text: String,
    /// First word of the window (inclusive).
    pub word_start: usize,
    /// End of the window (exclusive).
    pub word_end: usize,
    /// SHA-256 of `text`, used to skip re-embedding unchanged chunks.
    pub hash: String,
}

/// Metadata stored with every index entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub document_id: String,
    pub source_path: String,
    pub sequence_index: usize,
}

/// A chunk together with its embedding, as persisted in the vector index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub chunk_id: String,
    pub embedding: Vec<f32>,
    pub text: String,
    pub content_hash: String,
    pub metadata: EntryMetadata,
}

impl IndexEntry {
    /// Builds an entry from a chunk, its vector and the file it came from.
    pub fn from_chunk(chunk: &Chunk, embedding: Vec<f32>, source_path: &str) -> Self {
        Self {
            chunk_id: chunk.chunk_id.clone(),
            embedding,
            text: chunk.text.clone(),
            content_hash: chunk.hash.clone(),
            metadata: EntryMetadata {
                document_id: chunk.document_id.clone(),
                source_path: source_path.to_string(),
                sequence_index: chunk.sequence_index,
            },
        }
    }
}

/// An index entry returned from a similarity query.
#[derive(Debug, Clone)]
pub struct ScoredEntry {
    pub entry: IndexEntry,
    /// Cosine similarity to the query vector; higher is closer.
    pub score: f32,
}

/// The embedding model an index was built with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexModel {
    pub name: String,
    pub dims: usize,
}

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One message in a conversation session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A corpus file that was skipped during a load, with the reason.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
    pub path: String,
    pub reason: String,
}

/// Outcome of a full corpus load.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadSummary {
    pub documents_loaded: usize,
    pub documents_skipped: usize,
    pub chunks_indexed: usize,
    /// Chunks sent to the embedding backend during this load.
    pub chunks_embedded: usize,
    /// Chunks whose stored vector was unchanged and kept.
    pub chunks_reused: usize,
    pub skipped: Vec<SkippedFile>,
}
