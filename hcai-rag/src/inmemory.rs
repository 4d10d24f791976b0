//! In-memory vector index.
//!
//! This module provides [`InMemoryVectorStore`], a zero-dependency vector index
//! backed by maps protected by a `tokio::sync::RwLock`. It performs exact
//! (brute-force) nearest-neighbor search, which is plenty for a corpus of a
//! few hundred chunks, and is the index the CLI rebuilds from an embedding
//! backup.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::document::{Chunk, SearchResult};
use crate::error::{RagError, Result};
use crate::vectorstore::{CollectionMetadata, VectorStore};

const BACKEND: &str = "InMemory";

#[derive(Debug)]
struct Collection {
    metadata: CollectionMetadata,
    chunks: BTreeMap<String, Chunk>,
}

/// An in-memory vector index with exact nearest-neighbor search.
///
/// Collections are stored as: collection name → (metadata, chunk ID → chunk).
/// Each collection uses the distance metric recorded in its metadata.
///
/// # Example
///
/// ```rust,ignore
/// use hcai_rag::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.create_collection("docs", metadata).await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn missing(collection: &str) -> RagError {
    RagError::index(BACKEND, format!("collection '{collection}' does not exist"))
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn backend(&self) -> &str {
        BACKEND
    }

    async fn create_collection(&self, name: &str, metadata: CollectionMetadata) -> Result<()> {
        let mut collections = self.collections.write().await;
        if collections.contains_key(name) {
            return Err(RagError::index(BACKEND, format!("collection '{name}' already exists")));
        }
        debug!(collection = name, dimensions = metadata.dimensions, "created collection");
        collections.insert(name.to_string(), Collection { metadata, chunks: BTreeMap::new() });
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        if collections.remove(name).is_some() {
            debug!(collection = name, "deleted collection");
        }
        Ok(())
    }

    async fn collection_metadata(&self, name: &str) -> Result<Option<CollectionMetadata>> {
        let collections = self.collections.read().await;
        Ok(collections.get(name).map(|c| c.metadata.clone()))
    }

    async fn upsert(&self, collection: &str, chunks: &[Chunk]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let store = collections.get_mut(collection).ok_or_else(|| missing(collection))?;

        // Validate the whole batch before touching the collection.
        let expected = store.metadata.dimensions;
        if let Some(bad) = chunks.iter().find(|c| c.embedding.len() != expected) {
            return Err(RagError::DimensionMismatch {
                collection: collection.to_string(),
                expected,
                actual: bad.embedding.len(),
            });
        }

        for chunk in chunks {
            store.chunks.insert(chunk.id.clone(), chunk.clone());
        }
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        let collections = self.collections.read().await;
        let store = collections.get(collection).ok_or_else(|| missing(collection))?;

        if embedding.len() != store.metadata.dimensions {
            return Err(RagError::DimensionMismatch {
                collection: collection.to_string(),
                expected: store.metadata.dimensions,
                actual: embedding.len(),
            });
        }

        let metric = store.metadata.metric;
        let mut scored: Vec<(f32, &Chunk)> = store
            .chunks
            .values()
            .map(|chunk| (metric.distance(&chunk.embedding, embedding), chunk))
            .collect();

        scored.sort_by(|a, b| match a.0.total_cmp(&b.0) {
            Ordering::Equal => a.1.id.cmp(&b.1.id),
            other => other,
        });
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .enumerate()
            .map(|(rank, (distance, chunk))| SearchResult {
                chunk: chunk.clone(),
                distance,
                similarity: metric.similarity(distance),
                rank,
            })
            .collect())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.collections.read().await;
        collections.get(collection).map(|c| c.chunks.len()).ok_or_else(|| missing(collection))
    }
}
