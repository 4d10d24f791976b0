//! Deterministic fakes shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use hcai_rag::document::{Chunk, SearchResult};
use hcai_rag::embedding::EmbeddingProvider;
use hcai_rag::error::{RagError, Result};
use hcai_rag::generator::AnswerGenerator;
use hcai_rag::inmemory::InMemoryVectorStore;
use hcai_rag::vectorstore::{CollectionMetadata, DistanceMetric, VectorStore};

pub const DIMS: usize = 8;
pub const MODEL: &str = "fake-embed";

/// Letter histogram folded into `DIMS` buckets, L2-normalized.
pub fn histogram(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIMS];
    for c in text.chars().filter(|c| c.is_alphanumeric()) {
        v[c as usize % DIMS] += 1.0;
    }
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    } else {
        v[0] = 1.0;
    }
    v
}

/// Embeds text by lookup in a fixed table, falling back to [`histogram`].
///
/// Batches containing a text listed in `fail_on` fail with a non-retryable error.
pub struct FakeEmbedder {
    pub model: String,
    pub dims: usize,
    pub table: HashMap<String, Vec<f32>>,
    pub fail_on: HashSet<String>,
    pub calls: AtomicUsize,
}

impl FakeEmbedder {
    pub fn new() -> Self {
        Self {
            model: MODEL.to_string(),
            dims: DIMS,
            table: HashMap::new(),
            fail_on: HashSet::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_vector(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.table.insert(text.to_string(), vector);
        self
    }

    pub fn failing_on(mut self, text: &str) -> Self {
        self.fail_on.insert(text.to_string());
        self
    }

    pub fn with_model(mut self, model: &str, dims: usize) -> Self {
        self.model = model.to_string();
        self.dims = dims;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut v = self.table.get(text).cloned().unwrap_or_else(|| histogram(text));
        v.resize(self.dims, 0.0);
        v
    }
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.vector_for(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if texts.iter().any(|t| self.fail_on.contains(*t)) {
            return Err(RagError::EmbeddingError {
                provider: "fake".into(),
                message: "rejected input".into(),
                retryable: false,
            });
        }
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// An in-memory store whose upserts fail for batches holding a listed chunk id.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: InMemoryVectorStore,
    pub reject_ids: HashSet<String>,
}

impl FlakyStore {
    pub fn rejecting(ids: &[&str]) -> Self {
        Self {
            inner: InMemoryVectorStore::new(),
            reject_ids: ids.iter().map(|id| id.to_string()).collect(),
        }
    }
}

#[async_trait]
impl VectorStore for FlakyStore {
    fn backend(&self) -> &str {
        "Flaky"
    }

    async fn create_collection(&self, name: &str, metadata: CollectionMetadata) -> Result<()> {
        self.inner.create_collection(name, metadata).await
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.inner.delete_collection(name).await
    }

    async fn collection_metadata(&self, name: &str) -> Result<Option<CollectionMetadata>> {
        self.inner.collection_metadata(name).await
    }

    async fn upsert(&self, collection: &str, chunks: &[Chunk]) -> Result<()> {
        if chunks.iter().any(|c| self.reject_ids.contains(&c.id)) {
            return Err(RagError::IndexError {
                backend: "Flaky".into(),
                message: "payload rejected".into(),
            });
        }
        self.inner.upsert(collection, chunks).await
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        self.inner.search(collection, embedding, top_k).await
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        self.inner.count(collection).await
    }
}

/// Returns a canned answer and records every prompt it receives.
pub struct FakeGenerator {
    pub answer: String,
    pub fail: bool,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeGenerator {
    pub fn answering(answer: &str) -> Self {
        Self { answer: answer.to_string(), fail: false, prompts: Mutex::new(Vec::new()) }
    }

    pub fn failing() -> Self {
        Self { answer: String::new(), fail: true, prompts: Mutex::new(Vec::new()) }
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl AnswerGenerator for FakeGenerator {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if self.fail {
            return Err(RagError::GenerationError {
                provider: "fake".into(),
                message: "model unavailable".into(),
                retryable: false,
            });
        }
        Ok(self.answer.clone())
    }

    fn model(&self) -> &str {
        "fake-chat"
    }
}

pub fn metadata(dimensions: usize, metric: DistanceMetric) -> CollectionMetadata {
    CollectionMetadata {
        description: "test".into(),
        chunk_size: 500,
        chunk_overlap: 100,
        embedding_model: MODEL.into(),
        dimensions,
        metric,
    }
}

pub fn chunk(id: &str, text: &str, source: &str, embedding: Vec<f32>) -> Chunk {
    Chunk {
        id: id.to_string(),
        text: text.to_string(),
        embedding,
        metadata: HashMap::from([("source".to_string(), source.to_string())]),
        document_id: "doc".to_string(),
    }
}
