//! Word-window text chunker.
//!
//! Splits document text into overlapping windows of whitespace-separated
//! words. Overlap is measured in words, not model tokens, so chunk
//! boundaries never depend on a particular tokenizer.
//!
//! Each chunk receives a deterministic UUID derived from its document ID
//! and sequence index, plus a SHA-256 hash of its text so unchanged chunks
//! can keep their embeddings across corpus reloads.
//!
//! # Algorithm
//!
//! 1. Split the text on whitespace into `W` words.
//! 2. Emit windows `[start, min(start + chunk_size, W))` for
//!    `start = 0, step, 2·step, …` where `step = chunk_size − overlap`.
//! 3. Stop after the first window that reaches word `W`; only that last
//!    window may be shorter than `chunk_size`.
//!
//! The number of chunks is therefore `ceil((W − overlap) / step)`, at least
//! one for non-empty text, and none for text without words.
//!
//! # Example
//!
//! ```rust
//! use portfolio_chat::chunk::chunk_words;
//!
//! let chunks = chunk_words("about.md", "one two three four five", 3, 1).unwrap();
//! assert_eq!(chunks.len(), 2);
//! assert_eq!(chunks[1].text, "three four five");
//! ```

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::Chunk;

/// Split `text` into overlapping word windows.
///
/// # Errors
///
/// Returns [`Error::Configuration`] when `chunk_size` is zero or
/// `overlap >= chunk_size`, since the window would never advance.
pub fn chunk_words(
    document_id: &str,
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>> {
    validate(chunk_size, overlap)?;

    let words: Vec<&str> = text.split_whitespace().collect();
    let step = chunk_size - overlap;
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < words.len() {
        let end = (start + chunk_size).min(words.len());
        chunks.push(make_chunk(
            document_id,
            chunks.len(),
            &words[start..end],
            start,
            end,
        ));
        if end == words.len() {
            break;
        }
        start += step;
    }

    Ok(chunks)
}

/// Check chunking parameters without chunking anything.
pub fn validate(chunk_size: usize, overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(Error::Configuration(
            "chunking.chunk_size must be > 0".to_string(),
        ));
    }
    if overlap >= chunk_size {
        return Err(Error::Configuration(format!(
            "chunking.overlap ({}) must be less than chunking.chunk_size ({})",
            overlap, chunk_size
        )));
    }
    Ok(())
}

/// Stable chunk id for a `(document_id, sequence_index)` pair.
pub fn chunk_id(document_id: &str, sequence_index: usize) -> String {
    let name = format!("{}#{}", document_id, sequence_index);
    Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes()).to_string()
}

fn make_chunk(
    document_id: &str,
    index: usize,
    words: &[&str],
    word_start: usize,
    word_end: usize,
) -> Chunk {
    let text = words.join(" ");
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        chunk_id: chunk_id(document_id, index),
        document_id: document_id.to_string(),
        sequence_index: index,
        text,
        word_start,
        word_end,
        hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered_words(n: usize) -> String {
        (0..n)
            .map(|i| format!("w{}", i))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn expected_count(w: usize, c: usize, o: usize) -> usize {
        if w == 0 {
            return 0;
        }
        let step = c - o;
        (w.saturating_sub(o)).div_ceil(step).max(1)
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = chunk_words("doc1", "Hello, world!", 500, 50).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].sequence_index, 0);
        assert_eq!(chunks[0].text, "Hello, world!");
        assert_eq!((chunks[0].word_start, chunks[0].word_end), (0, 2));
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        assert!(chunk_words("doc1", "", 10, 2).unwrap().is_empty());
        assert!(chunk_words("doc1", "  \n\t ", 10, 2).unwrap().is_empty());
    }

    #[test]
    fn test_whitespace_is_normalized() {
        let chunks = chunk_words("doc1", "alpha\n\n beta\tgamma", 10, 0).unwrap();
        assert_eq!(chunks[0].text, "alpha beta gamma");
    }

    #[test]
    fn test_chunk_count_matches_formula() {
        for &(w, c, o) in &[
            (1, 4, 1),
            (4, 4, 1),
            (5, 4, 1),
            (10, 4, 1),
            (10, 4, 0),
            (100, 10, 3),
            (1, 5, 3),
            (1000, 500, 50),
        ] {
            let chunks = chunk_words("doc", &numbered_words(w), c, o).unwrap();
            assert_eq!(
                chunks.len(),
                expected_count(w, c, o),
                "W={} c={} o={}",
                w,
                c,
                o
            );
        }
    }

    #[test]
    fn test_consecutive_chunks_overlap_exactly() {
        let chunks = chunk_words("doc", &numbered_words(23), 6, 2).unwrap();
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].word_end - pair[1].word_start, 2);
            let prev: Vec<&str> = pair[0].text.split(' ').collect();
            let next: Vec<&str> = pair[1].text.split(' ').collect();
            assert_eq!(&prev[prev.len() - 2..], &next[..2]);
        }
        for c in &chunks {
            assert!(c.word_end - c.word_start <= 6);
        }
        assert_eq!(chunks.last().unwrap().word_end, 23);
    }

    #[test]
    fn test_last_chunk_may_be_shorter() {
        let chunks = chunk_words("doc", &numbered_words(10), 4, 1).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].text, "w6 w7 w8 w9");
        let chunks = chunk_words("doc", &numbered_words(11), 4, 1).unwrap();
        assert_eq!(chunks.last().unwrap().text, "w9 w10");
    }

    #[test]
    fn test_invalid_configuration() {
        assert!(matches!(
            chunk_words("doc", "a b c", 0, 0),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            chunk_words("doc", "a b c", 5, 5),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            chunk_words("doc", "a b c", 5, 9),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_chunk_ids_stable_and_distinct() {
        let a = chunk_words("doc1", &numbered_words(30), 10, 2).unwrap();
        let b = chunk_words("doc1", &numbered_words(30), 10, 2).unwrap();
        let other = chunk_words("doc2", &numbered_words(30), 10, 2).unwrap();
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.chunk_id, y.chunk_id);
            assert_eq!(x.hash, y.hash);
        }
        assert_ne!(a[0].chunk_id, a[1].chunk_id);
        assert_ne!(a[0].chunk_id, other[0].chunk_id);
    }
}
