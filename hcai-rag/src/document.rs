//! Data types for documents, chunks, and retrieval results.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Metadata key holding the URL or other origin of a document.
pub const SOURCE_KEY: &str = "source";
/// Metadata key holding a document's human-readable title.
pub const TITLE_KEY: &str = "title";
/// Metadata key holding a chunk's position within its document.
pub const CHUNK_INDEX_KEY: &str = "chunk_index";
/// Metadata key holding a chunk's byte offset within its document text.
pub const START_INDEX_KEY: &str = "start_index";

/// A source document containing text content and metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the document.
    pub id: String,
    /// The text content of the document.
    pub text: String,
    /// Key-value metadata associated with the document.
    pub metadata: HashMap<String, String>,
    /// Optional URI pointing to the original source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_uri: Option<String>,
}

impl Document {
    /// Construct a document by hand rather than fetching it.
    ///
    /// If `metadata` carries a `source` entry it doubles as the source URI.
    pub fn manual(
        id: impl Into<String>,
        text: impl Into<String>,
        metadata: HashMap<String, String>,
    ) -> Self {
        let source_uri = metadata.get(SOURCE_KEY).cloned();
        Self { id: id.into(), text: text.into(), metadata, source_uri }
    }

    /// The document's `source` metadata, if any.
    pub fn source(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).map(String::as_str)
    }
}

/// A segment of a [`Document`], the unit of embedding and retrieval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Identifier, unique within a collection.
    pub id: String,
    /// The text content of the chunk.
    pub text: String,
    /// The vector embedding for this chunk's text; empty until embedded.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embedding: Vec<f32>,
    /// Key-value metadata inherited from the parent document plus chunk-specific fields.
    pub metadata: HashMap<String, String>,
    /// The ID of the parent [`Document`].
    pub document_id: String,
}

impl Chunk {
    /// The chunk's `source` metadata, if any.
    pub fn source(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).map(String::as_str)
    }

    /// The byte offset of this chunk within its document, when recorded.
    pub fn start_index(&self) -> Option<usize> {
        self.metadata.get(START_INDEX_KEY).and_then(|v| v.parse().ok())
    }
}

/// A retrieved [`Chunk`] with its distance to the query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// Distance to the query vector under the collection's metric (lower is nearer).
    pub distance: f32,
    /// Similarity derived from `distance` for the collection's metric (higher is nearer).
    pub similarity: f32,
    /// Zero-based position in the result list.
    pub rank: usize,
}
