//! # hcai-rag
//!
//! Retrieval-augmented question answering over a small corpus of healthcare
//! AI articles.
//!
//! ## Overview
//!
//! The crate is organised around three consumed capabilities, each a trait so
//! tests can substitute deterministic fakes:
//!
//! - [`EmbeddingProvider`] - maps text to fixed-length vectors
//! - [`VectorStore`] - stores embedded chunks and answers nearest-neighbour queries
//! - [`AnswerGenerator`] - turns a filled prompt into an answer
//!
//! On top of these sit the core components:
//!
//! - [`RecursiveChunker`] - overlapping, boundary-aware text splitting
//! - [`RagPipeline`] - chunk, embed, back up, and (re)build a collection
//! - [`Retriever`] - deterministic top-k retrieval for a collection
//! - [`answer()`] - bounded context assembly and grounded generation
//! - [`eval`] - keyword heuristics for retrieval, faithfulness and correctness
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use hcai_rag::{InMemoryVectorStore, OpenAIEmbeddingProvider, RagConfig, RagPipeline};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(OpenAIEmbeddingProvider::from_env()?))
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .build()?;
//!
//! let report = pipeline.ingest("healthcare_ai_docs", &documents).await?;
//! let retriever = pipeline.retriever(report.handle);
//! let hits = retriever.retrieve("How is Elevance Health using AI?", 5).await?;
//! ```
//!
//! ## Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `openai` | OpenAI embedding and chat-completion clients |
//! | `web` | HTTP document fetcher |
//! | `full` | Everything above |

pub mod answer;
pub mod backup;
pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod eval;
pub mod fetch;
pub mod generator;
pub mod inmemory;
#[cfg(feature = "openai")]
pub mod openai;
pub mod pipeline;
pub mod retriever;
pub mod retry;
pub mod vectorstore;

pub use answer::{Answer, DEFAULT_PROMPT_TEMPLATE, PromptTemplate, answer, build_context};
pub use backup::EmbeddingBackup;
pub use chunking::{ChunkStats, Chunker, RecursiveChunker};
pub use config::{EvalThresholds, RagConfig, RagConfigBuilder};
pub use document::{Chunk, Document, SearchResult};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use eval::{
    CorrectnessScore, EvalCase, EvalReport, EvalSettings, FaithfulnessScore, RetrievalScore,
    evaluate_correctness, evaluate_faithfulness, evaluate_retrieval, run_evaluation,
};
#[cfg(feature = "web")]
pub use fetch::HttpDocumentFetcher;
pub use fetch::{DocumentFetcher, FetchReport, fetch_all};
pub use generator::AnswerGenerator;
pub use inmemory::InMemoryVectorStore;
#[cfg(feature = "openai")]
pub use openai::{OpenAIChatGenerator, OpenAIEmbeddingProvider};
pub use pipeline::{BatchFailure, IngestReport, RagPipeline, RagPipelineBuilder};
pub use retriever::{RetrievalResult, Retriever};
pub use retry::CallPolicy;
pub use vectorstore::{CollectionHandle, CollectionMetadata, DistanceMetric, VectorStore};
