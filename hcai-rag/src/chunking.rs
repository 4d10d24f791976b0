//! Document chunking.
//!
//! This module provides the [`Chunker`] trait and [`RecursiveChunker`], which
//! splits text on the most semantic boundary available (paragraph, then line,
//! then word, then character) and stitches neighbouring pieces back together
//! with a character overlap.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::config::validate_chunking;
use crate::document::{CHUNK_INDEX_KEY, Chunk, Document, START_INDEX_KEY};
use crate::error::Result;

/// Separators tried in priority order. The empty separator splits into characters.
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// A strategy for splitting documents into chunks.
///
/// Implementations produce [`Chunk`]s with text and metadata but no embeddings.
/// Embeddings are attached later by the pipeline.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if the document has empty text.
    /// Each returned chunk has an empty embedding vector.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;
}

/// Splits text recursively by paragraph, line, word, then character.
///
/// Lengths are measured in characters (Unicode scalar values). Pieces shorter
/// than `chunk_size` are merged greedily; when a chunk is emitted, the tail of
/// it that fits within `chunk_overlap` becomes the head of the next one. A
/// piece that is itself too long is split again with the next separator.
/// Emitted chunks are whitespace-trimmed, so every chunk is a verbatim slice
/// of the document no longer than `chunk_size`.
///
/// Chunk IDs are generated as `{document_id}_{chunk_index}`. Each chunk
/// inherits the parent document's metadata plus `chunk_index` and
/// `start_index` (byte offset of the chunk in the document text).
///
/// # Example
///
/// ```rust,ignore
/// use hcai_rag::RecursiveChunker;
///
/// let chunker = RecursiveChunker::new(500, 100)?;
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

#[derive(Debug, Clone, Copy)]
struct Piece {
    start: usize,
    end: usize,
    len: usize,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`](crate::RagError::ConfigError) if
    /// `chunk_size` is zero or `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate_chunking(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }

    /// Target chunk size in characters.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Overlap between consecutive chunks in characters.
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split `text` and return the byte ranges of the resulting chunks.
    pub fn split_ranges(&self, text: &str) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        if !text.is_empty() {
            self.split_recursive(text, 0, text.len(), &DEFAULT_SEPARATORS, &mut out);
        }
        out
    }

    fn split_recursive(
        &self,
        text: &str,
        start: usize,
        end: usize,
        separators: &[&str],
        out: &mut Vec<(usize, usize)>,
    ) {
        let (separator, remaining) = pick_separator(&text[start..end], separators);

        let mut pending: Vec<Piece> = Vec::new();
        for piece in split_keeping_separator(text, start, end, separator) {
            if piece.len < self.chunk_size {
                pending.push(piece);
                continue;
            }
            if !pending.is_empty() {
                self.merge(text, &pending, out);
                pending.clear();
            }
            if remaining.is_empty() {
                push_trimmed(text, piece.start, piece.end, out);
            } else {
                self.split_recursive(text, piece.start, piece.end, remaining, out);
            }
        }
        if !pending.is_empty() {
            self.merge(text, &pending, out);
        }
    }

    /// Merge consecutive small pieces into chunks of at most `chunk_size`.
    fn merge(&self, text: &str, pieces: &[Piece], out: &mut Vec<(usize, usize)>) {
        let mut window: VecDeque<Piece> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            if total + piece.len > self.chunk_size {
                if let (Some(first), Some(last)) = (window.front(), window.back()) {
                    push_trimmed(text, first.start, last.end, out);
                }
                // Keep a tail no longer than the overlap that still leaves room for `piece`.
                while total > self.chunk_overlap
                    || (total > 0 && total + piece.len > self.chunk_size)
                {
                    match window.pop_front() {
                        Some(dropped) => total -= dropped.len,
                        None => break,
                    }
                }
            }
            window.push_back(piece);
            total += piece.len;
        }

        if let (Some(first), Some(last)) = (window.front(), window.back()) {
            push_trimmed(text, first.start, last.end, out);
        }
    }
}

/// Pick the first separator present in `segment`, returning it together with
/// the separators to fall back on for oversized pieces.
fn pick_separator<'s>(segment: &str, separators: &'s [&'s str]) -> (&'s str, &'s [&'s str]) {
    for (i, separator) in separators.iter().enumerate() {
        if separator.is_empty() {
            return (separator, &[]);
        }
        if segment.contains(separator) {
            return (separator, &separators[i + 1..]);
        }
    }
    (separators.last().copied().unwrap_or(""), &[])
}

/// Split `text[start..end]` at a separator, keeping each separator attached to
/// the start of the piece that follows it. Empty pieces are dropped.
fn split_keeping_separator(text: &str, start: usize, end: usize, separator: &str) -> Vec<Piece> {
    let segment = &text[start..end];

    if separator.is_empty() {
        return segment
            .char_indices()
            .map(|(i, c)| Piece { start: start + i, end: start + i + c.len_utf8(), len: 1 })
            .collect();
    }

    let mut cuts = vec![0];
    let mut pos = 0;
    while let Some(found) = segment[pos..].find(separator) {
        let at = pos + found;
        if at > 0 {
            cuts.push(at);
        }
        pos = at + separator.len();
    }
    cuts.push(segment.len());

    cuts.windows(2)
        .filter(|w| w[1] > w[0])
        .map(|w| Piece {
            start: start + w[0],
            end: start + w[1],
            len: segment[w[0]..w[1]].chars().count(),
        })
        .collect()
}

/// Record the whitespace-trimmed range of `text[start..end]`, if non-empty.
fn push_trimmed(text: &str, start: usize, end: usize, out: &mut Vec<(usize, usize)>) {
    let slice = &text[start..end];
    let trimmed = slice.trim();
    if trimmed.is_empty() {
        return;
    }
    let trimmed_start = start + (slice.len() - slice.trim_start().len());
    out.push((trimmed_start, trimmed_start + trimmed.len()));
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        if document.text.is_empty() {
            return Vec::new();
        }

        self.split_ranges(&document.text)
            .into_iter()
            .enumerate()
            .map(|(i, (start, end))| {
                let mut metadata = document.metadata.clone();
                metadata.insert(CHUNK_INDEX_KEY.to_string(), i.to_string());
                metadata.insert(START_INDEX_KEY.to_string(), start.to_string());
                Chunk {
                    id: format!("{}_{i}", document.id),
                    text: document.text[start..end].to_string(),
                    embedding: Vec::new(),
                    metadata,
                    document_id: document.id.clone(),
                }
            })
            .collect()
    }
}

/// Size statistics over a set of chunks, in characters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ChunkStats {
    /// Number of chunks.
    pub count: usize,
    /// Length of the shortest chunk.
    pub smallest: usize,
    /// Length of the longest chunk.
    pub largest: usize,
    /// Mean chunk length.
    pub average: f64,
}

impl ChunkStats {
    /// Compute statistics, or `None` for an empty slice.
    pub fn from_chunks(chunks: &[Chunk]) -> Option<Self> {
        let lengths: Vec<usize> = chunks.iter().map(|c| c.text.chars().count()).collect();
        let smallest = *lengths.iter().min()?;
        let largest = *lengths.iter().max()?;
        let total: usize = lengths.iter().sum();
        Some(Self {
            count: lengths.len(),
            smallest,
            largest,
            average: total as f64 / lengths.len() as f64,
        })
    }
}
