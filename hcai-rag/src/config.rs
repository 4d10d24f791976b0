//! Configuration for the RAG pipeline and its evaluators.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::vectorstore::DistanceMetric;

/// Configuration parameters for the RAG pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Target chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of nearest chunks to retrieve per query.
    pub top_k: usize,
    /// Number of chunk texts sent in one embedding request.
    pub embed_batch_size: usize,
    /// Number of chunks written to the vector index per upsert call.
    pub upsert_batch_size: usize,
    /// Maximum number of embedding batches in flight at once.
    pub embed_concurrency: usize,
    /// Upper bound on the concatenated context handed to the answer generator.
    pub max_context_chars: usize,
    /// Timeout applied to each embedding or chat-completion call.
    pub request_timeout_secs: u64,
    /// Retries after the first attempt for retryable failures.
    pub max_retries: u32,
    /// Backoff before the first retry; doubled on each further attempt.
    pub retry_backoff_ms: u64,
    /// Distance metric for newly created collections.
    pub distance_metric: DistanceMetric,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 100,
            top_k: 5,
            embed_batch_size: 100,
            upsert_batch_size: 50,
            embed_concurrency: 1,
            max_context_chars: 12_000,
            request_timeout_secs: 60,
            max_retries: 2,
            retry_backoff_ms: 500,
            distance_metric: DistanceMetric::Cosine,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// The per-call timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// The initial retry backoff as a [`Duration`].
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Check that the parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `chunk_size == 0` or `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    /// - any batch size, the embedding concurrency or the timeout is zero
    /// - `max_context_chars < chunk_size`, which could leave no room for
    ///   even the best-ranked chunk
    pub fn validate(&self) -> Result<()> {
        validate_chunking(self.chunk_size, self.chunk_overlap)?;
        if self.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if self.embed_batch_size == 0 || self.upsert_batch_size == 0 {
            return Err(RagError::ConfigError("batch sizes must be greater than zero".to_string()));
        }
        if self.embed_concurrency == 0 {
            return Err(RagError::ConfigError(
                "embed_concurrency must be greater than zero".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(RagError::ConfigError(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.max_context_chars < self.chunk_size {
            return Err(RagError::ConfigError(format!(
                "max_context_chars ({}) must be at least chunk_size ({})",
                self.max_context_chars, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the target chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of nearest chunks to retrieve.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set how many chunk texts go into one embedding request.
    pub fn embed_batch_size(mut self, size: usize) -> Self {
        self.config.embed_batch_size = size;
        self
    }

    /// Set how many chunks go into one upsert call.
    pub fn upsert_batch_size(mut self, size: usize) -> Self {
        self.config.upsert_batch_size = size;
        self
    }

    /// Set the number of embedding batches that may run concurrently.
    pub fn embed_concurrency(mut self, workers: usize) -> Self {
        self.config.embed_concurrency = workers;
        self
    }

    /// Set the maximum context length handed to the answer generator.
    pub fn max_context_chars(mut self, chars: usize) -> Self {
        self.config.max_context_chars = chars;
        self
    }

    /// Set the timeout for each external call, in seconds.
    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    /// Set the number of retries for retryable failures.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set the initial retry backoff in milliseconds.
    pub fn retry_backoff_ms(mut self, millis: u64) -> Self {
        self.config.retry_backoff_ms = millis;
        self
    }

    /// Set the distance metric used when creating collections.
    pub fn distance_metric(mut self, metric: DistanceMetric) -> Self {
        self.config.distance_metric = metric;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] under the conditions listed on
    /// [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Check a chunk size / overlap pair.
pub(crate) fn validate_chunking(chunk_size: usize, chunk_overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(RagError::ConfigError("chunk_size must be greater than zero".to_string()));
    }
    if chunk_overlap >= chunk_size {
        return Err(RagError::ConfigError(format!(
            "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
        )));
    }
    Ok(())
}

/// Pass/fail thresholds for the heuristic evaluators.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct EvalThresholds {
    /// Minimum overall retrieval score to pass.
    pub retrieval: f32,
    /// Minimum fraction of considered sentences that must be grounded.
    pub faithfulness: f32,
    /// Minimum fraction of expected keywords the answer must contain.
    pub correctness: f32,
}

impl Default for EvalThresholds {
    fn default() -> Self {
        Self { retrieval: 0.5, faithfulness: 0.7, correctness: 0.4 }
    }
}

impl EvalThresholds {
    /// Create a new builder for constructing [`EvalThresholds`].
    pub fn builder() -> EvalThresholdsBuilder {
        EvalThresholdsBuilder::default()
    }
}

/// Builder for constructing validated [`EvalThresholds`].
#[derive(Debug, Clone, Default)]
pub struct EvalThresholdsBuilder {
    thresholds: EvalThresholds,
}

impl EvalThresholdsBuilder {
    /// Set the retrieval pass threshold.
    pub fn retrieval(mut self, threshold: f32) -> Self {
        self.thresholds.retrieval = threshold;
        self
    }

    /// Set the grounded-sentence ratio required for faithfulness.
    pub fn faithfulness(mut self, ratio: f32) -> Self {
        self.thresholds.faithfulness = ratio;
        self
    }

    /// Set the correctness pass threshold.
    pub fn correctness(mut self, threshold: f32) -> Self {
        self.thresholds.correctness = threshold;
        self
    }

    /// Build the thresholds.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if any threshold lies outside `[0, 1]`.
    pub fn build(self) -> Result<EvalThresholds> {
        let t = self.thresholds;
        let named = [
            ("retrieval", t.retrieval),
            ("faithfulness", t.faithfulness),
            ("correctness", t.correctness),
        ];
        for (name, value) in named {
            if !(0.0..=1.0).contains(&value) {
                return Err(RagError::ConfigError(format!(
                    "{name} threshold must be within [0, 1], got {value}"
                )));
            }
        }
        Ok(t)
    }
}
