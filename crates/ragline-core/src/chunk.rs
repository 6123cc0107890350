//! Sliding-window text chunker.
//!
//! Splits document text into overlapping [`Chunk`]s sized for the
//! embedding and generation context windows.
//!
//! # Algorithm
//!
//! 1. Validate `chunk_size > 0` and `overlap < chunk_size`.
//! 2. Index the text by `char` so windows never split a UTF-8 sequence.
//! 3. Emit a window `[start, start + chunk_size)`, truncated at the end of
//!    the text (never padded).
//! 4. Advance `start` by `chunk_size - overlap` and repeat until a window
//!    reaches the end of the text.
//!
//! Adjacent chunks therefore share exactly `overlap` characters and the
//! chunks cover the whole text with no gaps. Empty text yields no chunks.
//!
//! Each chunk receives a deterministic id (UUIDv5 over
//! `"<document_id>#<index>"`) and a SHA-256 hash of its text, so chunking
//! the same text twice yields identical sequences.
//!
//! # Example
//!
//! ```rust
//! use ragline_core::chunk::chunk_text;
//!
//! let text = "a".repeat(2500);
//! let chunks = chunk_text("doc-1", &text, 1000, 100).unwrap();
//! let spans: Vec<(usize, usize)> = chunks
//!     .iter()
//!     .map(|c| (c.start_offset, c.end_offset()))
//!     .collect();
//! assert_eq!(spans, vec![(0, 1000), (900, 1900), (1800, 2500)]);
//! ```

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::Chunk;

/// Validate chunking parameters without chunking anything.
pub fn validate_params(chunk_size: usize, overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(Error::configuration("chunk_size must be > 0"));
    }
    if overlap >= chunk_size {
        return Err(Error::configuration(format!(
            "chunk_overlap ({}) must be smaller than chunk_size ({})",
            overlap, chunk_size
        )));
    }
    Ok(())
}

/// Split `text` into overlapping windows of `chunk_size` characters.
///
/// # Errors
///
/// [`Error::Configuration`] when `chunk_size == 0` or
/// `overlap >= chunk_size`.
pub fn chunk_text(
    document_id: &str,
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>> {
    validate_params(chunk_size, overlap)?;

    // Byte offset of every char, plus the end of the string.
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_len = boundaries.len() - 1;

    let stride = chunk_size - overlap;
    let mut chunks = Vec::with_capacity(char_len.div_ceil(stride));
    let mut start = 0usize;

    while start < char_len {
        let end = (start + chunk_size).min(char_len);
        let piece = &text[boundaries[start]..boundaries[end]];
        chunks.push(make_chunk(document_id, chunks.len(), start, end - start, piece));
        if end == char_len {
            break;
        }
        start += stride;
    }

    Ok(chunks)
}

/// Deterministic chunk id: UUIDv5 of `"<document_id>#<index>"`.
pub fn chunk_id(document_id: &str, index: usize) -> String {
    let name = format!("{}#{}", document_id, index);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}

fn make_chunk(document_id: &str, index: usize, start: usize, length: usize, text: &str) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: chunk_id(document_id, index),
        document_id: document_id.to_string(),
        chunk_index: index,
        start_offset: start,
        length,
        text: text.to_string(),
        hash,
    }
}
