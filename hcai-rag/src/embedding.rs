//! Turning article chunks and user questions into vectors.

use async_trait::async_trait;

use crate::error::{RagError, Result};

/// Embeds chunk text at ingestion time and questions at query time.
///
/// A collection is only searchable with vectors from the model that built it,
/// so [`model`](EmbeddingProvider::model) and
/// [`dimensions`](EmbeddingProvider::dimensions) are recorded in the
/// collection metadata and the embedding backup, and checked again when
/// either is reopened.
///
/// [`embed_batch`](EmbeddingProvider::embed_batch) returns one vector per
/// input, in input order. The pipeline rejects a batch that breaks this before
/// anything reaches the index.
///
/// # Example
///
/// ```rust,ignore
/// use hcai_rag::{EmbeddingProvider, OpenAIEmbeddingProvider};
///
/// let provider = OpenAIEmbeddingProvider::from_env()?;
/// let vector = provider.embed("How are payers using AI in 2025?").await?;
/// assert_eq!(vector.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed one question or chunk.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of chunks.
    ///
    /// Falls back to one [`embed`](EmbeddingProvider::embed) call per text.
    /// Remote backends should send the whole batch in one request.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    /// Length of every vector this provider returns.
    fn dimensions(&self) -> usize;

    /// Model name stored with each collection built from this provider.
    fn model(&self) -> &str;
}

/// Reject a batch response with the wrong vector count or a vector of the
/// wrong length. Neither is retried.
pub(crate) fn check_embeddings(
    provider: &dyn EmbeddingProvider,
    expected_len: usize,
    vectors: Vec<Vec<f32>>,
) -> Result<Vec<Vec<f32>>> {
    let invalid = |message: String| RagError::EmbeddingError {
        provider: provider.model().to_string(),
        message,
        retryable: false,
    };
    if vectors.len() != expected_len {
        return Err(invalid(format!("expected {expected_len} embeddings, got {}", vectors.len())));
    }
    let dimensions = provider.dimensions();
    if let Some(bad) = vectors.iter().find(|v| v.len() != dimensions) {
        return Err(invalid(format!(
            "expected {dimensions}-dimensional embeddings, got {}",
            bad.len()
        )));
    }
    Ok(vectors)
}
