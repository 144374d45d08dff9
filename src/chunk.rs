//! Fixed-window text chunker with overlap.
//!
//! Splits each [`SourceDocument`] into [`Chunk`]s of at most `chunk_size`
//! characters, where consecutive chunks of the same source share exactly
//! `chunk_overlap` characters. Windows are measured in Unicode scalar values
//! so a chunk never ends inside a multi-byte character.
//!
//! Dropping the first `chunk_overlap` characters of every chunk after the
//! first and concatenating the rest reconstructs the source text exactly.

use crate::config::ChunkingConfig;
use crate::models::{Chunk, SourceDocument};

/// Split every document; chunks keep document order, then position order.
pub fn split(documents: &[SourceDocument], config: &ChunkingConfig) -> Vec<Chunk> {
    documents
        .iter()
        .flat_map(|doc| chunk_text(&doc.name, &doc.text, config.chunk_size, config.chunk_overlap))
        .collect()
}

/// Split one text. Expects `chunk_overlap < chunk_size` (checked at config load).
pub fn chunk_text(source: &str, text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<Chunk> {
    if text.is_empty() || chunk_size == 0 {
        return Vec::new();
    }
    let overlap = chunk_overlap.min(chunk_size - 1);

    // Byte offset of every char boundary, plus the end of the text.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_count = bounds.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + chunk_size).min(char_count);
        chunks.push(Chunk {
            source: source.to_string(),
            index: chunks.len(),
            text: text[bounds[start]..bounds[end]].to_string(),
        });
        if end == char_count {
            break;
        }
        start = end - overlap;
    }
    chunks
}
