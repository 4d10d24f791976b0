//! `hcai`: build, query and evaluate the healthcare AI knowledge base.

mod corpus;
mod repl;
mod session;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use hcai_rag::openai::{DEFAULT_CHAT_MODEL, DEFAULT_EMBEDDING_MODEL};
use hcai_rag::{
    AnswerGenerator, CollectionHandle, EvalReport, EvalSettings, EvalThresholds,
    HttpDocumentFetcher, InMemoryVectorStore, IngestReport, OpenAIChatGenerator,
    OpenAIEmbeddingProvider, PromptTemplate, RagConfig, RagPipeline, fetch_all, run_evaluation,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::corpus::{
    DEFAULT_BACKUP_PATH, DEFAULT_COLLECTION, DEFAULT_URLS, DEMO_QUERIES, elevance_document,
    eval_cases,
};
use crate::session::{Session, print_hits};

#[derive(Parser)]
#[command(
    name = "hcai",
    version,
    about = "Healthcare AI knowledge base: ingest articles, ask questions, evaluate answers"
)]
struct Cli {
    /// Log debug output from hcai and its library
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch articles, chunk and embed them, and write the embedding backup
    Ingest(IngestArgs),
    /// Answer questions from the embedded collection
    Query(QueryArgs),
    /// Run the demo queries in retrieval-only mode
    Demo(StoreArgs),
    /// Score answers to the built-in evaluation questions
    Eval(EvalArgs),
}

#[derive(Args)]
struct StoreArgs {
    /// Collection name
    #[arg(long, default_value = DEFAULT_COLLECTION)]
    collection: String,

    /// Embedding backup file
    #[arg(long, default_value = DEFAULT_BACKUP_PATH)]
    backup: PathBuf,

    /// Embedding model
    #[arg(long, env = "HCAI_EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL)]
    embedding_model: String,
}

#[derive(Args)]
struct IngestArgs {
    #[command(flatten)]
    store: StoreArgs,

    /// Article to fetch; repeat for several. Defaults to the built-in list
    #[arg(long = "url")]
    urls: Vec<String>,

    /// Target chunk size in characters
    #[arg(long, default_value_t = 500)]
    chunk_size: usize,

    /// Overlap between consecutive chunks in characters
    #[arg(long, default_value_t = 100)]
    chunk_overlap: usize,

    /// Skip the bundled Elevance Health article
    #[arg(long)]
    no_manual_doc: bool,
}

#[derive(Args)]
struct QueryArgs {
    #[command(flatten)]
    store: StoreArgs,

    /// Chat model used to write answers
    #[arg(long, env = "HCAI_CHAT_MODEL", default_value = DEFAULT_CHAT_MODEL)]
    chat_model: String,

    /// Chunks retrieved per question
    #[arg(short = 'k', long, default_value_t = 5)]
    top_k: usize,

    /// Show retrieved chunks without generating an answer
    #[arg(long)]
    retrieval_only: bool,

    /// Answer this question and exit instead of starting the prompt
    #[arg(short, long)]
    question: Option<String>,
}

#[derive(Args)]
struct EvalArgs {
    #[command(flatten)]
    store: StoreArgs,

    /// Chat model used to write answers
    #[arg(long, env = "HCAI_CHAT_MODEL", default_value = DEFAULT_CHAT_MODEL)]
    chat_model: String,

    /// Chunks retrieved per question
    #[arg(short = 'k', long, default_value_t = 5)]
    top_k: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Ingest(args) => ingest(args).await,
        Commands::Query(args) => query(args).await,
        Commands::Demo(args) => demo(args).await,
        Commands::Eval(args) => eval(args).await,
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("info,hcai=debug,hcai_rag=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn pipeline(
    config: RagConfig,
    embedding_model: &str,
    backup: Option<&Path>,
) -> Result<RagPipeline> {
    let provider = OpenAIEmbeddingProvider::from_env()?
        .with_model(embedding_model)
        .with_timeout(config.request_timeout())?;

    let mut builder = RagPipeline::builder()
        .config(config)
        .embedding_provider(Arc::new(provider))
        .vector_store(Arc::new(InMemoryVectorStore::new()));
    if let Some(path) = backup {
        builder = builder.backup_path(path);
    }
    Ok(builder.build()?)
}

fn chat_generator(model: &str, config: &RagConfig) -> Result<OpenAIChatGenerator> {
    let generator = OpenAIChatGenerator::from_env()?
        .with_model(model)
        .with_timeout(config.request_timeout())?;
    Ok(generator)
}

async fn load(pipeline: &RagPipeline, store: &StoreArgs) -> Result<CollectionHandle> {
    let handle = pipeline.restore_backup(&store.collection, &store.backup).await.with_context(|| {
        format!("failed to load {}; run `hcai ingest` first", store.backup.display())
    })?;
    println!(
        "Loaded '{}' with {} chunks ({})",
        handle.name, handle.chunk_count, handle.metadata.embedding_model
    );
    Ok(handle)
}

async fn ingest(args: IngestArgs) -> Result<()> {
    let config = RagConfig::builder()
        .chunk_size(args.chunk_size)
        .chunk_overlap(args.chunk_overlap)
        .build()?;
    let fetcher = HttpDocumentFetcher::new(config.request_timeout())?;

    let urls: Vec<String> = if args.urls.is_empty() {
        DEFAULT_URLS.iter().map(ToString::to_string).collect()
    } else {
        args.urls
    };
    println!("Loading {} document(s)...", urls.len());
    let fetched = fetch_all(&fetcher, &urls).await;
    println!(
        "Loaded {} of {} ({} chars)",
        fetched.documents.len(),
        urls.len(),
        fetched.total_chars()
    );
    for failure in &fetched.failures {
        println!("  skipped {}: {}", failure.url, failure.error);
    }

    let mut documents = fetched.documents;
    if !args.no_manual_doc {
        documents.push(elevance_document());
    }
    if documents.is_empty() {
        bail!("no documents to ingest");
    }

    let backup = Some(args.store.backup.as_path());
    let pipeline = pipeline(config, &args.store.embedding_model, backup)?;
    let report = pipeline.ingest(&args.store.collection, &documents).await?;
    print_ingest_report(&report);
    Ok(())
}

fn print_ingest_report(report: &IngestReport) {
    println!("\nCollection '{}'", report.handle.name);
    if let Some(stats) = &report.stats {
        println!(
            "  chunks: {} (smallest {}, largest {}, average {:.0} chars)",
            stats.count, stats.smallest, stats.largest, stats.average
        );
    }
    println!(
        "  embedded {} / stored {} of {} chunks",
        report.embedded_chunks, report.stored_chunks, report.total_chunks
    );
    let failures = report
        .embedding_failures
        .iter()
        .map(|f| ("embedding", f))
        .chain(report.upsert_failures.iter().map(|f| ("upsert", f)));
    for (stage, failure) in failures {
        println!(
            "  {stage} batch {} failed ({} chunks): {}",
            failure.batch,
            failure.chunk_ids.len(),
            failure.error
        );
    }
    match (&report.backup_path, &report.backup_error) {
        (Some(path), _) => println!("  backup: {}", path.display()),
        (None, Some(e)) => println!("  backup not written: {e}"),
        (None, None) => {}
    }
}

async fn query(args: QueryArgs) -> Result<()> {
    let config = RagConfig::builder().top_k(args.top_k).build()?;
    let generator = if args.retrieval_only {
        None
    } else {
        Some(Box::new(chat_generator(&args.chat_model, &config)?) as Box<dyn AnswerGenerator>)
    };

    let pipeline = pipeline(config, &args.store.embedding_model, None)?;
    let handle = load(&pipeline, &args.store).await?;
    let session = Session {
        retriever: pipeline.retriever(handle),
        generator,
        template: PromptTemplate::healthcare(),
        top_k: pipeline.config().top_k,
        max_context_chars: pipeline.config().max_context_chars,
        policy: pipeline.call_policy(),
    };

    match args.question {
        Some(question) => session.ask(&question).await,
        None => repl::run(&session).await,
    }
}

async fn demo(args: StoreArgs) -> Result<()> {
    let pipeline = pipeline(RagConfig::default(), &args.embedding_model, None)?;
    let handle = load(&pipeline, &args).await?;
    let retriever = pipeline.retriever(handle);

    for (i, (question, description)) in DEMO_QUERIES.iter().enumerate() {
        println!("\nQuery {}/{}: {description}", i + 1, DEMO_QUERIES.len());
        println!("Question: \"{question}\"");
        let retrieved = retriever.retrieve(question, 3).await?;
        print_hits(&retrieved.hits);
    }
    info!(queries = DEMO_QUERIES.len(), "demo complete");
    Ok(())
}

async fn eval(args: EvalArgs) -> Result<()> {
    let config = RagConfig::builder().top_k(args.top_k).build()?;
    let generator = chat_generator(&args.chat_model, &config)?;
    let pipeline = pipeline(config, &args.store.embedding_model, None)?;
    let handle = load(&pipeline, &args.store).await?;
    let retriever = pipeline.retriever(handle);

    let settings = EvalSettings::from_config(pipeline.config(), EvalThresholds::default());
    let template = PromptTemplate::healthcare();
    let report = run_evaluation(&eval_cases(), &retriever, &generator, &template, &settings).await;
    print_eval_report(&report);
    Ok(())
}

fn mark(passed: bool) -> &'static str {
    if passed { "PASS" } else { "FAIL" }
}

fn print_eval_report(report: &EvalReport) {
    for result in &report.results {
        println!("\nTest {}: {}", result.id, result.question);
        if let Some(e) = &result.error {
            println!("  ERROR: {e}");
        }
        if let Some(score) = &result.retrieval {
            println!(
                "  retrieval     {} | score {:.1}% | keywords {}/{} | sources {}/{}",
                mark(score.passed),
                score.overall_score * 100.0,
                score.keyword_matches,
                score.total_keywords,
                score.source_matches,
                score.total_sources
            );
        }
        if let Some(score) = &result.faithfulness {
            println!("  faithfulness  {} | {}", mark(score.passed), score.reason);
        }
        if let Some(score) = &result.correctness {
            println!("  correctness   {} | {}", mark(score.passed), score.reason);
        }
    }

    let summary = &report.summary;
    let line = |name: &str, passed: usize| {
        println!(
            "  {name:<13} {passed}/{} ({:.1}%)",
            summary.total_cases,
            summary.rate(passed) * 100.0
        );
    };
    println!("\nSummary");
    line("retrieval", summary.retrieval_passed);
    line("faithfulness", summary.faithfulness_passed);
    line("correctness", summary.correctness_passed);
    println!("  overall       {:.1}%", summary.overall_score * 100.0);
    if summary.errored_cases > 0 {
        println!("  {} case(s) errored", summary.errored_cases);
    }
}
