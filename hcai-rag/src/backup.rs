//! Local JSON backup of embedded chunks.
//!
//! An [`EmbeddingBackup`] holds everything needed to rebuild a collection
//! without calling the embedding provider again.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::document::Chunk;
use crate::error::{RagError, Result};
use crate::vectorstore::{CollectionMetadata, DistanceMetric};

/// Serialized snapshot of an ingested collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingBackup {
    /// When the backup was written.
    pub created_at: DateTime<Utc>,
    /// Model that produced the embeddings.
    pub embedding_model: String,
    /// Dimensionality of every embedding.
    pub dimensions: usize,
    /// Chunk size used when splitting.
    pub chunk_size: usize,
    /// Chunk overlap used when splitting.
    pub chunk_overlap: usize,
    /// Distance metric the collection was built for.
    #[serde(default)]
    pub metric: DistanceMetric,
    /// Embedded chunks with their text and metadata.
    pub chunks: Vec<Chunk>,
}

impl EmbeddingBackup {
    /// Snapshot `chunks` under the given collection metadata.
    pub fn new(metadata: &CollectionMetadata, chunks: Vec<Chunk>) -> Self {
        Self {
            created_at: Utc::now(),
            embedding_model: metadata.embedding_model.clone(),
            dimensions: metadata.dimensions,
            chunk_size: metadata.chunk_size,
            chunk_overlap: metadata.chunk_overlap,
            metric: metadata.metric,
            chunks,
        }
    }

    /// Collection metadata equivalent to the one the backup was taken from.
    pub fn collection_metadata(&self, description: impl Into<String>) -> CollectionMetadata {
        CollectionMetadata {
            description: description.into(),
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            embedding_model: self.embedding_model.clone(),
            dimensions: self.dimensions,
            metric: self.metric,
        }
    }

    /// Write the backup as JSON, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::BackupError`] if serialization or any file
    /// operation fails.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                RagError::BackupError(format!("failed to create {}: {e}", parent.display()))
            })?;
        }

        let json = serde_json::to_vec(self)
            .map_err(|e| RagError::BackupError(format!("failed to serialize backup: {e}")))?;
        tokio::fs::write(path, &json).await.map_err(|e| {
            RagError::BackupError(format!("failed to write {}: {e}", path.display()))
        })?;

        info!(
            path = %path.display(),
            chunk_count = self.chunks.len(),
            bytes = json.len(),
            "saved embedding backup"
        );
        Ok(())
    }

    /// Read a backup written by [`save`](EmbeddingBackup::save).
    ///
    /// Every chunk's embedding must have the recorded dimensionality.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::BackupError`] if the file cannot be read, is not a
    /// valid backup, or contains embeddings of the wrong length.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            RagError::BackupError(format!("failed to read {}: {e}", path.display()))
        })?;
        let backup: Self = serde_json::from_slice(&bytes).map_err(|e| {
            RagError::BackupError(format!("invalid backup {}: {e}", path.display()))
        })?;

        if let Some(bad) = backup.chunks.iter().find(|c| c.embedding.len() != backup.dimensions) {
            return Err(RagError::BackupError(format!(
                "chunk '{}' has {} dimensions, backup records {}",
                bad.id,
                bad.embedding.len(),
                backup.dimensions
            )));
        }

        debug!(
            path = %path.display(),
            chunk_count = backup.chunks.len(),
            "loaded embedding backup"
        );
        Ok(backup)
    }
}
