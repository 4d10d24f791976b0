//! Error types for the `hcai-rag` crate.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur in RAG operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// A configuration validation error, including missing credentials.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A single document could not be fetched.
    #[error("Fetch error ({url}): {message}")]
    FetchError {
        /// The URL that failed.
        url: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
        /// Whether repeating the same request may succeed.
        retryable: bool,
    },

    /// An error occurred in the vector index backend.
    #[error("Index error ({backend}): {message}")]
    IndexError {
        /// The vector index backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A vector did not have the dimensionality of the target collection.
    #[error(
        "Dimension mismatch in collection '{collection}': expected {expected}, got {actual}"
    )]
    DimensionMismatch {
        /// The collection being written or queried.
        collection: String,
        /// The dimensionality recorded for the collection.
        expected: usize,
        /// The dimensionality of the offending vector.
        actual: usize,
    },

    /// The chat-completion call failed.
    #[error("Generation error ({provider}): {message}")]
    GenerationError {
        /// The chat-completion provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
        /// Whether repeating the same request may succeed.
        retryable: bool,
    },

    /// An external call did not complete in time.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout that elapsed.
        after: Duration,
    },

    /// Reading or writing the embedding backup failed.
    #[error("Backup error: {0}")]
    BackupError(String),

    /// An error in the RAG pipeline orchestration.
    #[error("Pipeline error: {0}")]
    PipelineError(String),
}

impl RagError {
    /// Whether the failed operation may succeed if attempted again.
    ///
    /// Timeouts are always retryable. Embedding and generation errors carry
    /// their own classification, set by the provider from the transport error
    /// or HTTP status. Everything else is fatal for the current operation.
    pub fn is_retryable(&self) -> bool {
        match self {
            RagError::Timeout { .. } => true,
            RagError::EmbeddingError { retryable, .. }
            | RagError::GenerationError { retryable, .. } => *retryable,
            _ => false,
        }
    }

    pub(crate) fn index(backend: &str, message: impl Into<String>) -> Self {
        RagError::IndexError { backend: backend.to_string(), message: message.into() }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_retryable_errors() {
        let timeout =
            RagError::Timeout { operation: "embed".into(), after: Duration::from_secs(1) };
        assert!(timeout.is_retryable());

        let transient = RagError::EmbeddingError {
            provider: "OpenAI".into(),
            message: "API returned 429".into(),
            retryable: true,
        };
        assert!(transient.is_retryable());

        let rejected = RagError::GenerationError {
            provider: "OpenAI".into(),
            message: "API returned 400".into(),
            retryable: false,
        };
        assert!(!rejected.is_retryable());

        assert!(!RagError::ConfigError("bad".into()).is_retryable());
        assert!(
            !RagError::DimensionMismatch { collection: "c".into(), expected: 3, actual: 2 }
                .is_retryable()
        );
    }
}
