//! Query-time retrieval.
//!
//! A [`Retriever`] is bound to one collection. It embeds the query with the
//! same model the collection was built with and asks the vector index for the
//! nearest chunks.

use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::document::{Chunk, SearchResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::retry::CallPolicy;
use crate::vectorstore::{CollectionHandle, VectorStore};

/// Ranked chunks for one query, nearest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// Hits ordered by ascending distance, ranked from zero.
    pub hits: Vec<SearchResult>,
}

impl RetrievalResult {
    /// Number of hits.
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Whether nothing was retrieved.
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// The retrieved chunks in rank order.
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.hits.iter().map(|hit| &hit.chunk)
    }

    /// Iterate over the hits in rank order.
    pub fn iter(&self) -> std::slice::Iter<'_, SearchResult> {
        self.hits.iter()
    }
}

impl IntoIterator for RetrievalResult {
    type Item = SearchResult;
    type IntoIter = std::vec::IntoIter<SearchResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.hits.into_iter()
    }
}

/// Embeds queries and fetches the nearest chunks from one collection.
///
/// Obtain one from [`RagPipeline::retriever`](crate::RagPipeline::retriever)
/// or construct it directly with explicit dependencies.
///
/// # Example
///
/// ```rust,ignore
/// let handle = pipeline.open_collection("healthcare_ai_docs").await?;
/// let retriever = pipeline.retriever(handle);
/// let result = retriever.retrieve("How are payers using AI?", 5).await?;
/// for hit in result.iter() {
///     println!("{} {:.3}", hit.rank, hit.similarity);
/// }
/// ```
pub struct Retriever {
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    collection: CollectionHandle,
    policy: CallPolicy,
}

impl Retriever {
    /// Bind a retriever to `collection`.
    pub fn new(
        embedding_provider: Arc<dyn EmbeddingProvider>,
        vector_store: Arc<dyn VectorStore>,
        collection: CollectionHandle,
        policy: CallPolicy,
    ) -> Self {
        Self { embedding_provider, vector_store, collection, policy }
    }

    /// The collection this retriever reads from.
    pub fn collection(&self) -> &CollectionHandle {
        &self.collection
    }

    /// Embed `query` and return up to `k` nearest chunks.
    ///
    /// A collection holding fewer than `k` chunks yields all of them.
    ///
    /// # Errors
    ///
    /// - [`RagError::ConfigError`] if `k` is zero.
    /// - [`RagError::DimensionMismatch`] if the provider's dimensionality
    ///   differs from the collection's. This is checked before any call.
    /// - Embedding errors after retries are exhausted, and index errors.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<RetrievalResult> {
        check_k(k)?;

        let metadata = &self.collection.metadata;
        let expected = metadata.dimensions;
        let actual = self.embedding_provider.dimensions();
        if actual != expected {
            error!(
                collection = %self.collection.name,
                expected,
                actual,
                "embedding provider does not match collection"
            );
            return Err(self.mismatch(actual));
        }
        if self.embedding_provider.model() != metadata.embedding_model {
            warn!(
                collection = %self.collection.name,
                collection_model = %metadata.embedding_model,
                provider_model = %self.embedding_provider.model(),
                "querying with a different embedding model than the collection was built with"
            );
        }

        let provider = self.embedding_provider.as_ref();
        let embedding = self.policy.run("embed query", || provider.embed(query)).await?;
        debug!(collection = %self.collection.name, query_len = query.len(), "embedded query");

        self.retrieve_by_vector(&embedding, k).await
    }

    /// Return up to `k` chunks nearest to a precomputed query vector.
    ///
    /// Ties in distance are broken by chunk id, so the same vector against the
    /// same collection always yields the same ordering.
    ///
    /// # Errors
    ///
    /// [`RagError::ConfigError`] if `k` is zero, [`RagError::DimensionMismatch`]
    /// if the vector length differs from the collection's, and index errors.
    pub async fn retrieve_by_vector(&self, embedding: &[f32], k: usize) -> Result<RetrievalResult> {
        check_k(k)?;
        if embedding.len() != self.collection.metadata.dimensions {
            return Err(self.mismatch(embedding.len()));
        }

        let name = &self.collection.name;
        let mut hits = self.vector_store.search(name, embedding, k).await.map_err(|e| {
            error!(collection = %name, error = %e, "vector search failed");
            e
        })?;

        hits.sort_by(|a, b| match a.distance.total_cmp(&b.distance) {
            Ordering::Equal => a.chunk.id.cmp(&b.chunk.id),
            other => other,
        });
        hits.truncate(k);
        let metric = self.collection.metadata.metric;
        for (rank, hit) in hits.iter_mut().enumerate() {
            hit.rank = rank;
            hit.similarity = metric.similarity(hit.distance);
        }

        debug!(collection = %name, k, hits = hits.len(), "retrieved chunks");
        Ok(RetrievalResult { hits })
    }

    fn mismatch(&self, actual: usize) -> RagError {
        RagError::DimensionMismatch {
            collection: self.collection.name.clone(),
            expected: self.collection.metadata.dimensions,
            actual,
        }
    }
}

fn check_k(k: usize) -> Result<()> {
    if k == 0 {
        return Err(RagError::ConfigError("k must be greater than zero".to_string()));
    }
    Ok(())
}
