//! End-to-end tests for ingestion, retrieval, backup restore, and answering
//! with fake collaborators.

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use common::{DIMS, FakeEmbedder, FakeGenerator, FlakyStore, chunk};
use hcai_rag::answer::{PromptTemplate, answer_with_context};
use hcai_rag::config::RagConfig;
use hcai_rag::document::{Document, SearchResult};
use hcai_rag::error::{RagError, Result};
use hcai_rag::fetch::{DocumentFetcher, document_from_html, fetch_all};
use hcai_rag::inmemory::InMemoryVectorStore;
use hcai_rag::pipeline::RagPipeline;
use hcai_rag::retriever::RetrievalResult;
use hcai_rag::retry::CallPolicy;
use hcai_rag::vectorstore::VectorStore;

fn config() -> RagConfig {
    RagConfig::builder()
        .chunk_size(500)
        .chunk_overlap(100)
        .embed_batch_size(1)
        .upsert_batch_size(1)
        .max_retries(0)
        .retry_backoff_ms(1)
        .build()
        .unwrap()
}

fn doc(id: &str, text: &str) -> Document {
    let source = format!("https://{id}.example/article");
    Document::manual(id, text, HashMap::from([("source".to_string(), source)]))
}

fn unit(values: &[f32]) -> Vec<f32> {
    let mut v = values.to_vec();
    v.resize(DIMS, 0.0);
    v
}

fn pipeline(embedder: Arc<FakeEmbedder>, store: Arc<dyn VectorStore>) -> RagPipeline {
    RagPipeline::builder()
        .config(config())
        .embedding_provider(embedder)
        .vector_store(store)
        .build()
        .unwrap()
}

fn three_chunk_corpus() -> Vec<Document> {
    vec![
        doc("payers", "AI in payers 2025"),
        doc("elevance", "Elevance Health strategy"),
        doc("norc", "NORC utilization study"),
    ]
}

fn three_chunk_embedder() -> FakeEmbedder {
    FakeEmbedder::new()
        .with_vector("AI in payers 2025", unit(&[1.0, 0.0]))
        .with_vector("Elevance Health strategy", unit(&[0.0, 1.0]))
        .with_vector("NORC utilization study", unit(&[0.6, 0.8]))
        .with_vector("What is Elevance doing?", unit(&[0.1, 1.0]))
}

#[tokio::test]
async fn nearest_chunk_ranks_first() {
    let embedder = Arc::new(three_chunk_embedder());
    let pipeline = pipeline(embedder, Arc::new(InMemoryVectorStore::new()));

    let report = pipeline.ingest("docs", &three_chunk_corpus()).await.unwrap();
    assert!(report.is_complete());
    assert_eq!(report.handle.chunk_count, 3);

    let retriever = pipeline.retriever(report.handle);
    let result = retriever.retrieve_by_vector(&unit(&[0.1, 1.0]), 2).await.unwrap();

    let ids: Vec<&str> = result.chunks().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["elevance_0", "norc_0"]);
    let ranks: Vec<usize> = result.iter().map(|h| h.rank).collect();
    assert_eq!(ranks, vec![0, 1]);
    assert!(result.hits[0].distance <= result.hits[1].distance);

    let by_text = retriever.retrieve("What is Elevance doing?", 2).await.unwrap();
    let text_ids: Vec<&str> = by_text.chunks().map(|c| c.id.as_str()).collect();
    assert_eq!(text_ids, ids);
}

#[tokio::test]
async fn k_larger_than_collection_returns_everything() {
    let pipeline = pipeline(Arc::new(three_chunk_embedder()), Arc::new(InMemoryVectorStore::new()));
    let report = pipeline.ingest("docs", &three_chunk_corpus()).await.unwrap();
    let retriever = pipeline.retriever(report.handle);

    let result = retriever.retrieve("What is Elevance doing?", 10).await.unwrap();
    assert_eq!(result.len(), 3);
    for pair in result.hits.windows(2) {
        assert!(pair[0].distance <= pair[1].distance);
    }

    let again = retriever.retrieve("What is Elevance doing?", 10).await.unwrap();
    let first: Vec<&str> = result.chunks().map(|c| c.id.as_str()).collect();
    let second: Vec<&str> = again.chunks().map(|c| c.id.as_str()).collect();
    assert_eq!(first, second);
}

#[tokio::test]
async fn zero_k_is_a_config_error() {
    let pipeline = pipeline(Arc::new(three_chunk_embedder()), Arc::new(InMemoryVectorStore::new()));
    let report = pipeline.ingest("docs", &three_chunk_corpus()).await.unwrap();
    let retriever = pipeline.retriever(report.handle);

    assert!(matches!(retriever.retrieve("anything", 0).await, Err(RagError::ConfigError(_))));
}

#[tokio::test]
async fn long_document_ingests_with_overlap() {
    let mut text = "abcde ".repeat(200);
    text.pop();
    text.push('x');
    assert_eq!(text.chars().count(), 1200);

    let pipeline = pipeline(Arc::new(FakeEmbedder::new()), Arc::new(InMemoryVectorStore::new()));
    let report = pipeline.ingest("docs", &[doc("long", &text)]).await.unwrap();

    assert!(report.is_complete());
    assert_eq!(report.handle.chunk_count, report.total_chunks);
    let stats = report.stats.unwrap();
    assert!(stats.largest <= 500);
    assert!(stats.count >= 3);
    assert!(stats.count as f64 * stats.average >= 1200.0);
}

#[tokio::test]
async fn reingestion_replaces_the_collection() {
    let store = Arc::new(InMemoryVectorStore::new());
    let pipeline = pipeline(Arc::new(three_chunk_embedder()), store.clone());

    pipeline.ingest("docs", &three_chunk_corpus()).await.unwrap();
    let report = pipeline.ingest("docs", &[doc("payers", "AI in payers 2025")]).await.unwrap();

    assert_eq!(report.handle.chunk_count, 1);
    assert_eq!(store.count("docs").await.unwrap(), 1);
    let retriever = pipeline.retriever(report.handle);
    let result = retriever.retrieve_by_vector(&unit(&[0.0, 1.0]), 5).await.unwrap();
    let ids: Vec<&str> = result.chunks().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["payers_0"]);
}

#[tokio::test]
async fn failed_embedding_batches_are_reported() {
    let embedder = Arc::new(three_chunk_embedder().failing_on("Elevance Health strategy"));
    let pipeline = pipeline(embedder, Arc::new(InMemoryVectorStore::new()));

    let report = pipeline.ingest("docs", &three_chunk_corpus()).await.unwrap();

    assert!(!report.is_complete());
    assert_eq!(report.total_chunks, 3);
    assert_eq!(report.embedded_chunks, 2);
    assert_eq!(report.stored_chunks, 2);
    assert_eq!(report.handle.chunk_count, 2);
    assert_eq!(report.embedding_failures.len(), 1);
    let failure = &report.embedding_failures[0];
    assert_eq!(failure.batch, 1);
    assert_eq!(failure.chunk_ids, vec!["elevance_0".to_string()]);
    assert!(matches!(failure.error, RagError::EmbeddingError { .. }));
}

#[tokio::test]
async fn failed_upsert_batches_do_not_stop_the_rest() {
    let store = Arc::new(FlakyStore::rejecting(&["elevance_0"]));
    let pipeline = pipeline(Arc::new(three_chunk_embedder()), store);

    let report = pipeline.ingest("docs", &three_chunk_corpus()).await.unwrap();

    assert_eq!(report.stored_chunks, 2);
    assert_eq!(report.handle.chunk_count, 2);
    assert_eq!(report.upsert_failures.len(), 1);
    assert_eq!(report.upsert_failures[0].batch, 1);
    assert_eq!(report.upsert_failures[0].chunk_ids, vec!["elevance_0".to_string()]);
}

#[tokio::test]
async fn total_embedding_failure_leaves_existing_collection_alone() {
    let store: Arc<InMemoryVectorStore> = Arc::new(InMemoryVectorStore::new());
    pipeline(Arc::new(three_chunk_embedder()), store.clone())
        .ingest("docs", &three_chunk_corpus())
        .await
        .unwrap();

    let broken = Arc::new(
        three_chunk_embedder()
            .failing_on("AI in payers 2025")
            .failing_on("Elevance Health strategy")
            .failing_on("NORC utilization study"),
    );
    let err =
        pipeline(broken, store.clone()).ingest("docs", &three_chunk_corpus()).await.unwrap_err();

    assert!(matches!(err, RagError::PipelineError(_)));
    assert_eq!(store.count("docs").await.unwrap(), 3);
}

#[tokio::test]
async fn duplicate_document_ids_are_rejected() {
    let pipeline = pipeline(Arc::new(FakeEmbedder::new()), Arc::new(InMemoryVectorStore::new()));
    let docs = [doc("same", "first text"), doc("same", "second text")];
    assert!(matches!(pipeline.ingest("docs", &docs).await, Err(RagError::ConfigError(_))));
}

#[tokio::test]
async fn mismatched_provider_fails_fast() {
    let store = Arc::new(InMemoryVectorStore::new());
    let report = pipeline(Arc::new(three_chunk_embedder()), store.clone())
        .ingest("docs", &three_chunk_corpus())
        .await
        .unwrap();

    let narrow = Arc::new(FakeEmbedder::new().with_model("fake-embed-small", 4));
    let retriever = pipeline(narrow.clone(), store).retriever(report.handle);

    let err = retriever.retrieve("What is Elevance doing?", 2).await.unwrap_err();
    assert!(matches!(err, RagError::DimensionMismatch { expected: 8, actual: 4, .. }));
    assert_eq!(narrow.calls(), 0);

    let err = retriever.retrieve_by_vector(&[1.0, 0.0], 2).await.unwrap_err();
    assert!(matches!(err, RagError::DimensionMismatch { expected: 8, actual: 2, .. }));
}

#[tokio::test]
async fn missing_collection_cannot_be_opened() {
    let pipeline = pipeline(Arc::new(FakeEmbedder::new()), Arc::new(InMemoryVectorStore::new()));
    assert!(matches!(pipeline.open_collection("nope").await, Err(RagError::IndexError { .. })));
}

#[tokio::test]
async fn backup_restores_without_reembedding() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("embeddings_backup.json");

    let ingesting = RagPipeline::builder()
        .config(config())
        .embedding_provider(Arc::new(three_chunk_embedder()))
        .vector_store(Arc::new(InMemoryVectorStore::new()))
        .backup_path(&path)
        .build()
        .unwrap();
    let report = ingesting.ingest("docs", &three_chunk_corpus()).await.unwrap();
    assert_eq!(report.backup_path.as_deref(), Some(path.as_path()));
    assert!(report.backup_error.is_none());

    let embedder = Arc::new(three_chunk_embedder());
    let restoring = pipeline(embedder.clone(), Arc::new(InMemoryVectorStore::new()));
    let handle = restoring.restore_backup("restored", &path).await.unwrap();

    assert_eq!(handle.chunk_count, 3);
    assert_eq!(handle.metadata.embedding_model, "fake-embed");
    assert_eq!(embedder.calls(), 0);

    let retriever = restoring.retriever(handle);
    let result = retriever.retrieve_by_vector(&unit(&[0.1, 1.0]), 1).await.unwrap();
    assert_eq!(result.hits[0].chunk.id, "elevance_0");
    assert_eq!(result.hits[0].chunk.source(), Some("https://elevance.example/article"));
}

#[tokio::test]
async fn backup_from_another_model_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("backup.json");
    RagPipeline::builder()
        .config(config())
        .embedding_provider(Arc::new(three_chunk_embedder()))
        .vector_store(Arc::new(InMemoryVectorStore::new()))
        .backup_path(&path)
        .build()
        .unwrap()
        .ingest("docs", &three_chunk_corpus())
        .await
        .unwrap();

    let other = Arc::new(FakeEmbedder::new().with_model("other-embed", DIMS));
    let mismatched = pipeline(other, Arc::new(InMemoryVectorStore::new()));
    let err = mismatched.restore_backup("docs", &path).await;
    assert!(matches!(err, Err(RagError::ConfigError(_))));
}

#[tokio::test]
async fn unwritable_backup_does_not_fail_ingestion() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"not a directory").unwrap();

    let pipeline = RagPipeline::builder()
        .config(config())
        .embedding_provider(Arc::new(three_chunk_embedder()))
        .vector_store(Arc::new(InMemoryVectorStore::new()))
        .backup_path(blocker.join("backup.json"))
        .build()
        .unwrap();
    let report = pipeline.ingest("docs", &three_chunk_corpus()).await.unwrap();

    assert_eq!(report.handle.chunk_count, 3);
    assert!(report.backup_path.is_none());
    assert!(matches!(report.backup_error, Some(RagError::BackupError(_))));
}

#[tokio::test]
async fn answers_cite_the_chunks_they_used() {
    let pipeline = pipeline(Arc::new(three_chunk_embedder()), Arc::new(InMemoryVectorStore::new()));
    let report = pipeline.ingest("docs", &three_chunk_corpus()).await.unwrap();
    let generator = FakeGenerator::answering("Elevance Health has an AI strategy.");

    let answer = pipeline
        .answer(
            report.handle.clone(),
            "What is Elevance doing?",
            &generator,
            &PromptTemplate::default(),
        )
        .await
        .unwrap();

    assert_eq!(answer.text, "Elevance Health has an AI strategy.");
    assert_eq!(answer.source_chunks.len(), 3);
    assert_eq!(answer.source_chunks[0].chunk.id, "elevance_0");

    let prompt = generator.last_prompt().unwrap();
    assert!(prompt.contains("Question: What is Elevance doing?"));
    assert!(prompt.contains("Elevance Health strategy\n\nNORC utilization study"));

    let failing = FakeGenerator::failing();
    let err = pipeline
        .answer(report.handle, "What is Elevance doing?", &failing, &PromptTemplate::default())
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::GenerationError { .. }));
}

#[test]
fn context_bound_smaller_than_a_chunk_is_rejected() {
    let err = RagConfig::builder().max_context_chars(10).build().unwrap_err();
    assert!(matches!(err, RagError::ConfigError(_)));
}

#[tokio::test]
async fn oversized_best_chunk_still_reaches_the_prompt() {
    let long = "Elevance Health strategy ".repeat(40);
    let best = chunk("elevance_0", &long, "https://elevance.example/article", unit(&[0.0, 1.0]));
    let runner_up =
        chunk("norc_0", "NORC utilization study", "https://norc.example/article", unit(&[1.0]));
    let retrieved = RetrievalResult {
        hits: vec![
            SearchResult { chunk: best, distance: 0.0, similarity: 1.0, rank: 0 },
            SearchResult { chunk: runner_up, distance: 0.5, similarity: 0.5, rank: 1 },
        ],
    };
    let generator = FakeGenerator::answering("Elevance keeps the member at the center.");

    let answer = answer_with_context(
        "What is Elevance doing?",
        retrieved,
        &generator,
        &PromptTemplate::default(),
        100,
        &CallPolicy::from_config(&config()),
    )
    .await
    .unwrap();

    assert_eq!(answer.source_chunks.len(), 1);
    assert_eq!(answer.source_chunks[0].chunk.id, "elevance_0");
    let prompt = generator.last_prompt().unwrap();
    assert!(prompt.contains(&long[..100]));
    assert!(!prompt.contains(&long[..101]));
    assert!(!prompt.contains("NORC utilization study"));
}

struct ArticleFetcher;

#[async_trait]
impl DocumentFetcher for ArticleFetcher {
    async fn fetch(&self, url: &str) -> Result<Document> {
        let host = url.split('/').nth(2).unwrap_or_default();
        document_from_html(url, &format!("<html><body><p>AI news from {host}</p></body></html>"))
    }
}

#[tokio::test]
async fn urls_with_the_same_last_segment_ingest_together() {
    let urls = ["https://a.example/news/index.html", "https://b.example/blog/index.html"];
    let fetched = fetch_all(&ArticleFetcher, &urls).await;
    assert!(fetched.failures.is_empty());

    let pipeline = pipeline(Arc::new(FakeEmbedder::new()), Arc::new(InMemoryVectorStore::new()));
    let report = pipeline.ingest("docs", &fetched.documents).await.unwrap();

    assert!(report.is_complete());
    assert_eq!(report.handle.chunk_count, 2);
    let result = pipeline.retriever(report.handle).retrieve("AI news", 5).await.unwrap();
    let mut ids: Vec<&str> = result.chunks().map(|c| c.id.as_str()).collect();
    ids.sort_unstable();
    assert_eq!(ids, ["index-2_0", "index_0"]);
}
