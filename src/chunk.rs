//! Fixed-size sliding-window chunker.
//!
//! Splits extracted document text into overlapping windows of `size`
//! characters. Each window starts `size - overlap` characters after the
//! previous one; the last window may be shorter. Sizes are counted in
//! Unicode scalar values, never bytes, so windows never split a character.

use crate::error::{RagError, Result};

/// Characters removed from every chunk before it is embedded.
pub const STRIPPED_CHARS: [char; 2] = ['-', '.'];

/// Split `text` into overlapping windows. Deterministic for a given input.
pub fn split(text: &str, size: usize, overlap: usize) -> Result<Vec<String>> {
    if size == 0 {
        return Err(RagError::InvalidConfig("chunk size must be > 0".into()));
    }
    if overlap >= size {
        return Err(RagError::InvalidConfig(format!(
            "chunk overlap ({}) must be smaller than chunk size ({})",
            overlap, size
        )));
    }

    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();
    let step = size - overlap;

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < total {
        let end = (start + size).min(total);
        chunks.push(chars[start..end].iter().collect());
        if end == total {
            break;
        }
        start += step;
    }

    Ok(chunks)
}

/// Normalize a chunk for embedding: newlines become spaces and every
/// character of [`STRIPPED_CHARS`] is dropped.
///
/// Lossy: `3.14` becomes `314`. Existing vectors were embedded from this
/// form, so changing it changes retrieval.
pub fn clean(chunk: &str) -> String {
    chunk
        .chars()
        .filter(|c| !STRIPPED_CHARS.contains(c))
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}
