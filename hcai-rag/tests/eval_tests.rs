//! Tests for the heuristic evaluators and the evaluation runner.

mod common;

use std::sync::Arc;

use common::{FakeEmbedder, FakeGenerator, chunk, histogram};
use hcai_rag::answer::PromptTemplate;
use hcai_rag::config::{EvalThresholds, RagConfig};
use hcai_rag::document::{Chunk, Document};
use hcai_rag::eval::{
    EvalCase, EvalSettings, evaluate_correctness, evaluate_faithfulness, evaluate_retrieval,
    run_evaluation,
};
use hcai_rag::inmemory::InMemoryVectorStore;
use hcai_rag::pipeline::RagPipeline;

fn retrieved() -> Vec<Chunk> {
    vec![
        chunk(
            "elevance_0",
            "Elevance Health uses AI for prior authorization and claims processing.",
            "https://www.fiercehealthcare.com/payers/look-inside-elevance-healths-artificial-intelligence-strategy",
            histogram("elevance"),
        ),
        chunk(
            "becker_0",
            "Payers announced 14 AI moves in 2025 including member engagement tools.",
            "https://www.beckerspayer.com/virtual-care/14-payer-ai-moves-in-2025/",
            histogram("becker"),
        ),
    ]
}

#[test]
fn all_expectations_present_scores_one() {
    let score = evaluate_retrieval(
        &retrieved(),
        &["Elevance", "prior authorization", "CLAIMS"],
        &["fiercehealthcare", "beckerspayer"],
        &EvalThresholds::default(),
    );
    assert_eq!(score.keyword_score, 1.0);
    assert_eq!(score.source_score, 1.0);
    assert_eq!(score.overall_score, 1.0);
    assert!(score.passed);
    assert_eq!(score.keyword_matches, 3);
    assert_eq!(score.total_sources, 2);
}

#[test]
fn sources_match_metadata_not_text() {
    let score = evaluate_retrieval(
        &retrieved(),
        &["elevance"],
        &["deloitte", "norc"],
        &EvalThresholds::default(),
    );
    assert_eq!(score.keyword_score, 1.0);
    assert_eq!(score.source_score, 0.0);
    assert_eq!(score.overall_score, 0.5);
    assert!(score.passed);

    let strict = EvalThresholds::builder().retrieval(0.75).build().unwrap();
    let score = evaluate_retrieval(&retrieved(), &["elevance"], &["deloitte"], &strict);
    assert!(!score.passed);
}

#[test]
fn abstention_is_faithful_regardless_of_context() {
    let score = evaluate_faithfulness(
        "I don't have specific information on that",
        &Vec::<Chunk>::new(),
        &EvalThresholds::default(),
    );
    assert!(score.passed);
    assert!(score.abstained);

    let score = evaluate_faithfulness(
        "Sorry, the context does not contain enough information to answer.",
        &retrieved(),
        &EvalThresholds::default(),
    );
    assert!(score.abstained);
}

#[test]
fn grounded_answer_is_faithful() {
    let answer = "Elevance Health applies automation to prior authorization. \
                  Payers announced several moves. Ok.";
    let score = evaluate_faithfulness(answer, &retrieved(), &EvalThresholds::default());
    assert!(!score.abstained);
    assert_eq!(score.considered_sentences, 2);
    assert_eq!(score.grounded_sentences, 2);
    assert!(score.passed);
}

#[test]
fn invented_answer_is_not_faithful() {
    let answer = "Quantum blockchains revolutionize hospitals. \
                  Robots perform surgeries autonomously. Elevance uses AI.";
    let score = evaluate_faithfulness(answer, &retrieved(), &EvalThresholds::default());
    assert_eq!(score.considered_sentences, 3);
    assert_eq!(score.grounded_sentences, 1);
    assert!(!score.passed);
}

#[test]
fn correctness_needs_forty_percent_of_keywords() {
    let keywords = ["prior authorization", "claims", "member", "engagement", "fraud"];
    let thresholds = EvalThresholds::default();

    let answer = "They automate prior authorization and claims.";
    let passing = evaluate_correctness(answer, &keywords, &thresholds);
    assert_eq!(passing.keyword_matches, 2);
    assert!((passing.keyword_score - 0.4).abs() < 1e-6);
    assert!(passing.passed);

    let failing = evaluate_correctness("They automate claims.", &keywords, &thresholds);
    assert_eq!(failing.keyword_matches, 1);
    assert!(!failing.passed);
    assert_eq!(failing.reason, "contains 1/5 key concepts");
}

#[tokio::test]
async fn evaluation_run_scores_every_case() {
    let pipeline = RagPipeline::builder()
        .config(RagConfig::default())
        .embedding_provider(Arc::new(FakeEmbedder::new()))
        .vector_store(Arc::new(InMemoryVectorStore::new()))
        .build()
        .unwrap();
    let docs: Vec<Document> = retrieved()
        .into_iter()
        .map(|c| Document::manual(c.id.trim_end_matches("_0"), c.text, c.metadata))
        .collect();
    let report = pipeline.ingest("docs", &docs).await.unwrap();
    let retriever = pipeline.retriever(report.handle);

    let cases = vec![
        EvalCase {
            id: "elevance".into(),
            question: "How does Elevance Health use AI?".into(),
            expected_answer: "Prior authorization and claims.".into(),
            expected_keywords: vec!["Elevance".into(), "prior authorization".into()],
            expected_sources: vec!["fiercehealthcare".into()],
        },
        EvalCase {
            id: "payers".into(),
            question: "What AI moves did payers make?".into(),
            expected_answer: "Fourteen moves.".into(),
            expected_keywords: vec!["member engagement".into()],
            expected_sources: vec!["beckerspayer".into()],
        },
    ];
    let generator = FakeGenerator::answering("Elevance Health uses AI for prior authorization.");
    let settings = EvalSettings::from_config(pipeline.config(), EvalThresholds::default());

    let report =
        run_evaluation(&cases, &retriever, &generator, &PromptTemplate::default(), &settings).await;

    assert_eq!(report.summary.total_cases, 2);
    assert_eq!(report.summary.errored_cases, 0);
    // Both documents are retrieved for every question, so retrieval passes twice.
    assert_eq!(report.summary.retrieval_passed, 2);
    assert_eq!(report.summary.faithfulness_passed, 2);
    // Only the first case's keywords appear in the canned answer.
    assert_eq!(report.summary.correctness_passed, 1);
    assert!((report.summary.overall_score - 5.0 / 6.0).abs() < 1e-6);
    assert_eq!(report.results[0].sources.len(), 2);
    assert!(report.results[1].answer.is_some());
}

#[tokio::test]
async fn generation_failure_is_recorded_per_case() {
    let pipeline = RagPipeline::builder()
        .config(RagConfig::builder().max_retries(0).build().unwrap())
        .embedding_provider(Arc::new(FakeEmbedder::new()))
        .vector_store(Arc::new(InMemoryVectorStore::new()))
        .build()
        .unwrap();
    let docs: Vec<Document> = retrieved()
        .into_iter()
        .map(|c| Document::manual(c.id.trim_end_matches("_0"), c.text, c.metadata))
        .collect();
    let report = pipeline.ingest("docs", &docs).await.unwrap();
    let retriever = pipeline.retriever(report.handle);

    let case = EvalCase {
        id: "elevance".into(),
        question: "How does Elevance Health use AI?".into(),
        expected_answer: String::new(),
        expected_keywords: vec!["Elevance".into()],
        expected_sources: vec!["fiercehealthcare".into()],
    };
    let settings = EvalSettings::from_config(pipeline.config(), EvalThresholds::default());
    let report = run_evaluation(
        &[case],
        &retriever,
        &FakeGenerator::failing(),
        &PromptTemplate::default(),
        &settings,
    )
    .await;

    let result = &report.results[0];
    assert!(result.retrieval.is_some());
    assert!(result.faithfulness.is_none());
    assert!(result.error.as_deref().unwrap().contains("model unavailable"));
    assert_eq!(report.summary.errored_cases, 1);
    assert_eq!(report.summary.retrieval_passed, 1);
}
