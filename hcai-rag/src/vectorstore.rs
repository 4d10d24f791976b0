//! Vector index trait, collection metadata, and distance metrics.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::{Chunk, SearchResult};
use crate::error::Result;

/// How distances between embedding vectors are measured.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// `1 - cos(a, b)`; range `[0, 2]`.
    #[default]
    Cosine,
    /// `sum((a_i - b_i)^2)`; range `[0, inf)`.
    SquaredEuclidean,
    /// `1 - dot(a, b)`; only meaningful for unit-norm vectors.
    InnerProduct,
}

impl DistanceMetric {
    /// Compute the distance between two vectors of equal length.
    pub fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::Cosine => 1.0 - cosine_similarity(a, b),
            DistanceMetric::SquaredEuclidean => {
                a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
            }
            DistanceMetric::InnerProduct => {
                1.0 - a.iter().zip(b.iter()).map(|(x, y)| x * y).sum::<f32>()
            }
        }
    }

    /// Convert a distance under this metric into a similarity score.
    ///
    /// For cosine and inner-product distances this is `1 - distance`. For
    /// squared Euclidean distance it is `1 - distance / 2`, which equals the
    /// cosine similarity when both vectors are unit-norm and is only an
    /// approximation otherwise.
    pub fn similarity(self, distance: f32) -> f32 {
        match self {
            DistanceMetric::Cosine | DistanceMetric::InnerProduct => 1.0 - distance,
            DistanceMetric::SquaredEuclidean => 1.0 - distance / 2.0,
        }
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Collection-level metadata recorded at ingestion time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectionMetadata {
    /// Free-text description of the collection.
    pub description: String,
    /// Chunk size used to build the collection.
    pub chunk_size: usize,
    /// Chunk overlap used to build the collection.
    pub chunk_overlap: usize,
    /// Name of the embedding model that produced the stored vectors.
    pub embedding_model: String,
    /// Dimensionality of every stored vector.
    pub dimensions: usize,
    /// Distance metric used for queries.
    pub metric: DistanceMetric,
}

/// A populated collection: its name, metadata, and chunk count at open time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectionHandle {
    /// Collection name in the vector index.
    pub name: String,
    /// Metadata recorded when the collection was built.
    pub metadata: CollectionMetadata,
    /// Number of chunks stored.
    pub chunk_count: usize,
}

/// A storage backend for embedded chunks with nearest-neighbor search.
///
/// Implementations manage named collections of [`Chunk`]s. The pipeline
/// never assumes atomicity across multiple calls.
///
/// # Example
///
/// ```rust,ignore
/// use hcai_rag::{VectorStore, InMemoryVectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.create_collection("docs", metadata).await?;
/// store.upsert("docs", &chunks).await?;
/// let results = store.search("docs", &query_embedding, 5).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Short backend name used in errors and logs.
    fn backend(&self) -> &str;

    /// Create a named collection. Fails if it already exists.
    async fn create_collection(&self, name: &str, metadata: CollectionMetadata) -> Result<()>;

    /// Delete a named collection and all its data. No-op if it does not exist.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Return the metadata of a collection, or `None` if it does not exist.
    async fn collection_metadata(&self, name: &str) -> Result<Option<CollectionMetadata>>;

    /// Upsert chunks into a collection. Chunks must have embeddings set.
    async fn upsert(&self, collection: &str, chunks: &[Chunk]) -> Result<()>;

    /// Return up to `top_k` chunks nearest to `embedding`.
    ///
    /// Results are ordered by ascending distance with ties broken by chunk id.
    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>>;

    /// Number of chunks stored in a collection.
    async fn count(&self, collection: &str) -> Result<usize>;
}
