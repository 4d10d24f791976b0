//! RAG pipeline orchestrator.
//!
//! The [`RagPipeline`] owns the ingestion workflow (chunk, embed, back up,
//! replace the collection, upsert) and hands out [`Retriever`]s for
//! query-time use. All collaborators are injected, so tests substitute fakes
//! for the embedding provider and the vector index.
//!
//! # Example
//!
//! ```rust,ignore
//! use hcai_rag::{RagPipeline, RagConfig, InMemoryVectorStore};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(embedder))
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .backup_path("data/embeddings_backup.json")
//!     .build()?;
//!
//! let report = pipeline.ingest("healthcare_ai_docs", &documents).await?;
//! let retriever = pipeline.retriever(report.handle.clone());
//! let results = retriever.retrieve("How are payers using AI?", 5).await?;
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, warn};

use crate::answer::{Answer, PromptTemplate, answer};
use crate::backup::EmbeddingBackup;
use crate::chunking::{ChunkStats, Chunker, RecursiveChunker};
use crate::config::RagConfig;
use crate::document::{Chunk, Document};
use crate::embedding::{EmbeddingProvider, check_embeddings};
use crate::error::{RagError, Result};
use crate::generator::AnswerGenerator;
use crate::retriever::Retriever;
use crate::retry::CallPolicy;
use crate::vectorstore::{CollectionHandle, CollectionMetadata, VectorStore};

/// A batch of chunks that could not be embedded or stored.
#[derive(Debug)]
pub struct BatchFailure {
    /// Zero-based batch index within its phase.
    pub batch: usize,
    /// IDs of the chunks in the batch, so the batch can be retried alone.
    pub chunk_ids: Vec<String>,
    /// Why the batch failed.
    pub error: RagError,
}

/// Outcome of [`RagPipeline::ingest`].
#[derive(Debug)]
pub struct IngestReport {
    /// The rebuilt collection.
    pub handle: CollectionHandle,
    /// Chunks produced by the chunker.
    pub total_chunks: usize,
    /// Chunks that received an embedding.
    pub embedded_chunks: usize,
    /// Chunks written to the index.
    pub stored_chunks: usize,
    /// Size statistics over all produced chunks.
    pub stats: Option<ChunkStats>,
    /// Embedding batches that failed.
    pub embedding_failures: Vec<BatchFailure>,
    /// Upsert batches that failed.
    pub upsert_failures: Vec<BatchFailure>,
    /// Where the embedding backup was written, if it was.
    pub backup_path: Option<PathBuf>,
    /// Why the backup could not be written, if it was attempted and failed.
    pub backup_error: Option<RagError>,
}

impl IngestReport {
    /// Whether every chunk was embedded and stored.
    pub fn is_complete(&self) -> bool {
        self.embedding_failures.is_empty()
            && self.upsert_failures.is_empty()
            && self.stored_chunks == self.total_chunks
    }
}

/// The RAG pipeline orchestrator.
///
/// Construct one via [`RagPipeline::builder()`].
pub struct RagPipeline {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    chunker: Arc<dyn Chunker>,
    backup_path: Option<PathBuf>,
    description: Option<String>,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// Return a reference to the vector store.
    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        &self.vector_store
    }

    /// Timeout and retry policy applied to external calls.
    pub fn call_policy(&self) -> CallPolicy {
        CallPolicy::from_config(&self.config)
    }

    /// Split every document into chunks.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if two chunks share an id, which
    /// happens when documents share an id.
    pub fn chunk_documents(&self, documents: &[Document]) -> Result<Vec<Chunk>> {
        let mut chunks = Vec::new();
        let mut seen = HashSet::new();
        for document in documents {
            let produced = self.chunker.chunk(document);
            debug!(document.id = %document.id, chunk_count = produced.len(), "chunked document");
            for chunk in produced {
                if !seen.insert(chunk.id.clone()) {
                    return Err(RagError::ConfigError(format!(
                        "duplicate chunk id '{}'; document ids must be unique",
                        chunk.id
                    )));
                }
                chunks.push(chunk);
            }
        }
        Ok(chunks)
    }

    /// Ingest documents into `collection`, replacing whatever it held.
    ///
    /// Steps: chunk every document, embed in batches (up to
    /// `embed_concurrency` batches in flight), write the optional backup,
    /// delete and recreate the collection, then upsert in batches. Failed
    /// embedding and upsert batches are reported rather than aborting the run.
    ///
    /// Re-ingesting a subset of documents drops the others from the collection.
    ///
    /// # Errors
    ///
    /// - [`RagError::ConfigError`] if chunking fails.
    /// - [`RagError::PipelineError`] if every embedding batch fails; the
    ///   existing collection is left untouched in that case.
    /// - Index errors from replacing the collection or counting it.
    pub async fn ingest(&self, collection: &str, documents: &[Document]) -> Result<IngestReport> {
        let chunks = self.chunk_documents(documents)?;
        let stats = ChunkStats::from_chunks(&chunks);
        info!(
            collection,
            documents = documents.len(),
            chunk_count = chunks.len(),
            "chunked documents"
        );

        let (embedded, embedding_failures) = self.embed_chunks(&chunks).await;
        if embedded.is_empty() && !chunks.is_empty() {
            let first = embedding_failures.first().map(|f| f.error.to_string()).unwrap_or_default();
            error!(collection, batches = embedding_failures.len(), "every embedding batch failed");
            return Err(RagError::PipelineError(format!(
                "all {} embedding batches failed; \
                 collection '{collection}' left unchanged: {first}",
                embedding_failures.len()
            )));
        }

        let metadata = self.collection_metadata();

        let mut backup_path = None;
        let mut backup_error = None;
        if let Some(path) = &self.backup_path {
            match EmbeddingBackup::new(&metadata, embedded.clone()).save(path).await {
                Ok(()) => backup_path = Some(path.clone()),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to write embedding backup");
                    backup_error = Some(e);
                }
            }
        }

        self.replace_collection(collection, metadata).await?;
        let (stored_chunks, upsert_failures) = self.upsert_batches(collection, &embedded).await;
        let handle = self.open_collection(collection).await?;

        info!(
            collection,
            chunk_count = chunks.len(),
            stored = stored_chunks,
            embedding_failures = embedding_failures.len(),
            upsert_failures = upsert_failures.len(),
            "ingested documents"
        );

        Ok(IngestReport {
            handle,
            total_chunks: chunks.len(),
            embedded_chunks: embedded.len(),
            stored_chunks,
            stats,
            embedding_failures,
            upsert_failures,
            backup_path,
            backup_error,
        })
    }

    /// Rebuild `collection` from a backup without calling the embedding provider.
    ///
    /// # Errors
    ///
    /// - [`RagError::BackupError`] if the backup cannot be read.
    /// - [`RagError::ConfigError`] if the backup was made with a different
    ///   embedding model or dimensionality than the configured provider.
    /// - [`RagError::PipelineError`] if any upsert batch fails.
    pub async fn restore_backup(
        &self,
        collection: &str,
        path: impl AsRef<Path>,
    ) -> Result<CollectionHandle> {
        let path = path.as_ref();
        let backup = EmbeddingBackup::load(path).await?;

        let model = self.embedding_provider.model();
        let dimensions = self.embedding_provider.dimensions();
        if backup.embedding_model != model || backup.dimensions != dimensions {
            return Err(RagError::ConfigError(format!(
                "backup {} was built with {} ({} dims) \
                 but the configured provider is {model} ({dimensions} dims)",
                path.display(),
                backup.embedding_model,
                backup.dimensions
            )));
        }

        let metadata = backup.collection_metadata(self.description(model));
        self.replace_collection(collection, metadata).await?;
        let (stored, failures) = self.upsert_batches(collection, &backup.chunks).await;
        if let Some(failure) = failures.first() {
            return Err(RagError::PipelineError(format!(
                "restored {stored} of {} chunks into '{collection}'; {} batches failed: {}",
                backup.chunks.len(),
                failures.len(),
                failure.error
            )));
        }

        info!(
            collection,
            path = %path.display(),
            chunk_count = stored,
            "restored collection from backup"
        );
        self.open_collection(collection).await
    }

    /// Look up an existing collection.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IndexError`] if the collection does not exist.
    pub async fn open_collection(&self, name: &str) -> Result<CollectionHandle> {
        let backend = self.vector_store.backend();
        let metadata = self
            .vector_store
            .collection_metadata(name)
            .await?
            .ok_or_else(|| {
                RagError::index(backend, format!("collection '{name}' does not exist"))
            })?;
        let chunk_count = self.vector_store.count(name).await?;
        Ok(CollectionHandle { name: name.to_string(), metadata, chunk_count })
    }

    /// Delete a named collection from the vector store.
    ///
    /// # Errors
    ///
    /// Returns the vector store's error.
    pub async fn delete_collection(&self, name: &str) -> Result<()> {
        self.vector_store.delete_collection(name).await.map_err(|e| {
            error!(collection = name, error = %e, "failed to delete collection");
            e
        })
    }

    /// A retriever bound to `collection`, sharing this pipeline's collaborators.
    pub fn retriever(&self, collection: CollectionHandle) -> Retriever {
        Retriever::new(
            self.embedding_provider.clone(),
            self.vector_store.clone(),
            collection,
            self.call_policy(),
        )
    }

    /// Answer `question` from `collection` with the configured `top_k` and
    /// context bound.
    ///
    /// # Errors
    ///
    /// Propagates retrieval and generation errors.
    pub async fn answer(
        &self,
        collection: CollectionHandle,
        question: &str,
        generator: &dyn AnswerGenerator,
        template: &PromptTemplate,
    ) -> Result<Answer> {
        let retriever = self.retriever(collection);
        answer(
            question,
            self.config.top_k,
            &retriever,
            generator,
            template,
            self.config.max_context_chars,
            &self.call_policy(),
        )
        .await
    }

    fn description(&self, model: &str) -> String {
        self.description.clone().unwrap_or_else(|| format!("Healthcare AI documents - {model}"))
    }

    fn collection_metadata(&self) -> CollectionMetadata {
        let model = self.embedding_provider.model();
        CollectionMetadata {
            description: self.description(model),
            chunk_size: self.config.chunk_size,
            chunk_overlap: self.config.chunk_overlap,
            embedding_model: model.to_string(),
            dimensions: self.embedding_provider.dimensions(),
            metric: self.config.distance_metric,
        }
    }

    async fn replace_collection(&self, name: &str, metadata: CollectionMetadata) -> Result<()> {
        self.delete_collection(name).await?;
        self.vector_store.create_collection(name, metadata).await.map_err(|e| {
            error!(collection = name, error = %e, "failed to create collection");
            e
        })
    }

    /// Embed chunks batch by batch, returning embedded chunks in input order
    /// and the batches that failed.
    async fn embed_chunks(&self, chunks: &[Chunk]) -> (Vec<Chunk>, Vec<BatchFailure>) {
        let provider = self.embedding_provider.as_ref();
        let policy = self.call_policy();
        let policy = &policy;

        let outcomes: Vec<(usize, &[Chunk], Result<Vec<Vec<f32>>>)> =
            stream::iter(chunks.chunks(self.config.embed_batch_size).enumerate())
                .map(|(index, batch)| async move {
                    let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
                    let result = policy
                        .run("embed batch", || provider.embed_batch(&texts))
                        .await
                        .and_then(|vectors| check_embeddings(provider, batch.len(), vectors));
                    debug!(
                        batch = index,
                        size = batch.len(),
                        ok = result.is_ok(),
                        "embedded batch"
                    );
                    (index, batch, result)
                })
                .buffered(self.config.embed_concurrency)
                .collect()
                .await;

        let mut embedded = Vec::with_capacity(chunks.len());
        let mut failures = Vec::new();
        for (index, batch, result) in outcomes {
            match result {
                Ok(vectors) => {
                    embedded.extend(batch.iter().zip(vectors).map(|(chunk, embedding)| Chunk {
                        embedding,
                        ..chunk.clone()
                    }));
                }
                Err(e) => {
                    warn!(batch = index, size = batch.len(), error = %e, "embedding batch failed");
                    failures.push(BatchFailure {
                        batch: index,
                        chunk_ids: batch.iter().map(|c| c.id.clone()).collect(),
                        error: e,
                    });
                }
            }
        }
        (embedded, failures)
    }

    /// Upsert chunks batch by batch, returning how many were stored and the
    /// batches that failed.
    async fn upsert_batches(
        &self,
        collection: &str,
        chunks: &[Chunk],
    ) -> (usize, Vec<BatchFailure>) {
        let mut stored = 0usize;
        let mut failures = Vec::new();
        for (index, batch) in chunks.chunks(self.config.upsert_batch_size).enumerate() {
            match self.vector_store.upsert(collection, batch).await {
                Ok(()) => {
                    stored += batch.len();
                    debug!(collection, batch = index, size = batch.len(), "upserted batch");
                }
                Err(e) => {
                    warn!(
                        collection,
                        batch = index,
                        size = batch.len(),
                        error = %e,
                        "upsert batch failed"
                    );
                    failures.push(BatchFailure {
                        batch: index,
                        chunk_ids: batch.iter().map(|c| c.id.clone()).collect(),
                        error: e,
                    });
                }
            }
        }
        (stored, failures)
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// `config`, `embedding_provider`, and `vector_store` are required. Without
/// an explicit chunker, a [`RecursiveChunker`] is built from the config.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = RagPipeline::builder()
///     .config(RagConfig::default())
///     .embedding_provider(Arc::new(embedder))
///     .vector_store(Arc::new(store))
///     .backup_path("data/embeddings_backup.json")  // optional
///     .build()?;
/// ```
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    chunker: Option<Arc<dyn Chunker>>,
    backup_path: Option<PathBuf>,
    description: Option<String>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Replace the default recursive chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Write an embedding backup to `path` on every ingestion.
    pub fn backup_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.backup_path = Some(path.into());
        self
    }

    /// Set the description recorded on collections.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Build the [`RagPipeline`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if any required field is missing or
    /// the config fails [`RagConfig::validate`].
    pub fn build(self) -> Result<RagPipeline> {
        let config =
            self.config.ok_or_else(|| RagError::ConfigError("config is required".to_string()))?;
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::ConfigError("vector_store is required".to_string()))?;
        let chunker = match self.chunker {
            Some(chunker) => chunker,
            None => Arc::new(RecursiveChunker::new(config.chunk_size, config.chunk_overlap)?),
        };

        Ok(RagPipeline {
            config,
            embedding_provider,
            vector_store,
            chunker,
            backup_path: self.backup_path,
            description: self.description,
        })
    }
}
