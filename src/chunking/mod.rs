
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::extract::PageText;

/// Separators tried in order when a span is too large for one chunk.
/// Paragraph first, then line, then sentence, then word; a character-level
/// split is the last resort.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// Configuration for text chunking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters
    pub chunk_size: usize,
    /// Number of trailing characters repeated at the start of the next chunk
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 600,
            chunk_overlap: 150,
        }
    }
}

/// A contiguous span of extracted text, the atomic retrieval unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentChunk {
    /// The chunk text, verbatim from the source page
    pub content: String,
    /// 1-based page number the text was extracted from
    pub page: u32,
    /// Position of this chunk within the whole document
    pub chunk_index: usize,
}

/// Chunk extracted pages into embedding-ready pieces.
///
/// Pages are chunked independently so every chunk carries an unambiguous
/// page number; the chunk index runs across the whole document.
#[inline]
pub fn chunk_pages(pages: &[PageText], config: &ChunkingConfig) -> Vec<DocumentChunk> {
    let mut chunks = Vec::new();

    for page in pages {
        for content in split_text(&page.text, config) {
            chunks.push(DocumentChunk {
                content,
                page: page.page,
                chunk_index: chunks.len(),
            });
        }
    }

    debug!(
        "Chunked {} pages into {} chunks (max {} chars, overlap {})",
        pages.len(),
        chunks.len(),
        config.chunk_size,
        config.chunk_overlap
    );

    chunks
}

/// Split text into overlapping windows of at most `chunk_size` characters,
/// preferring natural boundaries.
///
/// Pieces are kept verbatim (separators attached), so concatenating the
/// chunks with their overlap prefixes removed reproduces the input exactly.
#[inline]
pub fn split_text(text: &str, config: &ChunkingConfig) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let pieces = decompose(text, config.chunk_size, 0);
    merge_pieces(pieces, config.chunk_size, config.chunk_overlap)
}

/// Break text into pieces no larger than `max`, descending the separator
/// hierarchy only as far as needed.
fn decompose(text: &str, max: usize, level: usize) -> Vec<String> {
    if text.len() <= max {
        return vec![text.to_string()];
    }

    if level >= SEPARATORS.len() {
        return split_chars(text, max);
    }

    let mut pieces = Vec::new();
    for part in split_keep_separator(text, SEPARATORS[level]) {
        if part.len() > max {
            pieces.extend(decompose(&part, max, level + 1));
        } else {
            pieces.push(part);
        }
    }
    pieces
}

/// Split on `sep`, keeping the separator attached to the end of each piece
/// so that the pieces concatenate back to the input.
fn split_keep_separator(text: &str, sep: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut start = 0;

    for (idx, _) in text.match_indices(sep) {
        let end = idx + sep.len();
        pieces.push(text[start..end].to_string());
        start = end;
    }

    if start < text.len() {
        pieces.push(text[start..].to_string());
    }

    pieces
}

/// Character-level fallback: windows of at most `max` bytes on char boundaries.
fn split_chars(text: &str, max: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        if current.len() + ch.len_utf8() > max && !current.is_empty() {
            pieces.push(std::mem::take(&mut current));
        }
        current.push(ch);
    }

    if !current.is_empty() {
        pieces.push(current);
    }

    pieces
}

/// Merge pieces into chunks of at most `size` characters, carrying the last
/// `overlap` characters' worth of pieces into the start of the next chunk.
fn merge_pieces(pieces: Vec<String>, size: usize, overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut window: std::collections::VecDeque<String> = std::collections::VecDeque::new();
    let mut window_len = 0;

    for piece in pieces {
        if window_len + piece.len() > size && window_len > 0 {
            chunks.push(window.iter().map(String::as_str).collect::<String>());

            // Drop leading pieces until what remains fits the overlap budget
            // and leaves room for the incoming piece.
            while window_len > overlap
                || (window_len + piece.len() > size && window_len > 0)
            {
                match window.pop_front() {
                    Some(front) => window_len -= front.len(),
                    None => break,
                }
            }
        }

        window_len += piece.len();
        window.push_back(piece);
    }

    // The window always holds at least one piece that has not been emitted
    // yet, so the remainder is a real chunk.
    if window_len > 0 {
        chunks.push(window.iter().map(String::as_str).collect::<String>());
    }

    chunks
}
