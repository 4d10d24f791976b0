//! Heuristic quality checks for retrieval and answers.
//!
//! These scorers are keyword and substring heuristics. They are cheap,
//! deterministic proxies for relevance, grounding, and correctness, and are
//! not a semantic judgement of the answer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::answer::{PromptTemplate, answer_with_context};
use crate::config::{EvalThresholds, RagConfig};
use crate::document::Chunk;
use crate::generator::AnswerGenerator;
use crate::retriever::Retriever;
use crate::retry::CallPolicy;

/// Phrases by which an answer admits the context was insufficient.
pub const ABSTENTION_PHRASES: [&str; 5] = [
    "i don't have specific information",
    "the context doesn't mention",
    "not provided in the context",
    "doesn't contain enough information",
    "does not contain enough information",
];

/// Sentences considered by the faithfulness check.
const FAITHFULNESS_SENTENCES: usize = 3;
/// Sentences shorter than this are ignored by the faithfulness check.
const MIN_SENTENCE_CHARS: usize = 10;
/// Words per sentence looked up in the context.
const SAMPLE_WORDS: usize = 3;
/// Only words longer than this are looked up.
const MIN_SAMPLE_WORD_CHARS: usize = 4;

/// A question with what a good answer should contain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalCase {
    /// Short identifier used in reports.
    pub id: String,
    /// The question to ask.
    pub question: String,
    /// Human-written summary of the expected answer.
    pub expected_answer: String,
    /// Concepts the retrieved context and the answer should mention.
    pub expected_keywords: Vec<String>,
    /// Fragments expected in the `source` metadata of retrieved chunks.
    pub expected_sources: Vec<String>,
}

/// Keyword and source coverage of retrieved chunks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetrievalScore {
    /// Expected keywords found in the retrieved text.
    pub keyword_matches: usize,
    /// Distinct expected keywords.
    pub total_keywords: usize,
    /// `keyword_matches / total_keywords`, or 0 with no keywords.
    pub keyword_score: f32,
    /// Expected sources found among the chunks' `source` metadata.
    pub source_matches: usize,
    /// Distinct expected sources.
    pub total_sources: usize,
    /// `source_matches / total_sources`, or 0 with no sources.
    pub source_score: f32,
    /// Mean of the keyword and source scores.
    pub overall_score: f32,
    /// Whether `overall_score` met the retrieval threshold.
    pub passed: bool,
}

/// Whether an answer stays within the retrieved context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaithfulnessScore {
    /// Whether the answer was judged grounded.
    pub passed: bool,
    /// The answer admitted the context was insufficient.
    pub abstained: bool,
    /// Considered sentences with at least one sample word in the context.
    pub grounded_sentences: usize,
    /// Sentences long enough to be considered.
    pub considered_sentences: usize,
    /// Human-readable explanation.
    pub reason: String,
}

/// Keyword coverage of the answer text itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectnessScore {
    /// Expected keywords found in the answer.
    pub keyword_matches: usize,
    /// Distinct expected keywords.
    pub total_keywords: usize,
    /// `keyword_matches / total_keywords`, or 0 with no keywords.
    pub keyword_score: f32,
    /// Whether `keyword_score` met the correctness threshold.
    pub passed: bool,
    /// Human-readable explanation.
    pub reason: String,
}

/// Lower-cased chunk texts joined with spaces.
fn joined_text<'a>(chunks: impl IntoIterator<Item = &'a Chunk>) -> String {
    chunks.into_iter().map(|c| c.text.to_lowercase()).collect::<Vec<_>>().join(" ")
}

/// Distinct, lower-cased, non-blank expectations in input order.
fn normalized<S: AsRef<str>>(expected: &[S]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(expected.len());
    for item in expected {
        let item = item.as_ref().trim().to_lowercase();
        if !item.is_empty() && !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

/// Count expectations matched by `is_present` and the resulting fraction.
fn coverage(expected: &[String], is_present: impl Fn(&str) -> bool) -> (usize, f32) {
    if expected.is_empty() {
        return (0, 0.0);
    }
    let matches = expected.iter().filter(|item| is_present(item)).count();
    (matches, matches as f32 / expected.len() as f32)
}

/// Score retrieved chunks against expected keywords and sources.
///
/// Keywords are matched case-insensitively as substrings of the chunk texts;
/// sources as substrings of each chunk's `source` metadata. An empty
/// expectation set scores 0.
pub fn evaluate_retrieval<'a, K, S>(
    chunks: impl IntoIterator<Item = &'a Chunk>,
    expected_keywords: &[K],
    expected_sources: &[S],
    thresholds: &EvalThresholds,
) -> RetrievalScore
where
    K: AsRef<str>,
    S: AsRef<str>,
{
    let chunks: Vec<&Chunk> = chunks.into_iter().collect();
    let text = joined_text(chunks.iter().copied());
    let sources: Vec<String> =
        chunks.iter().filter_map(|c| c.source()).map(str::to_lowercase).collect();

    let keywords = normalized(expected_keywords);
    let expected_sources = normalized(expected_sources);
    let (keyword_matches, keyword_score) = coverage(&keywords, |k| text.contains(k));
    let (source_matches, source_score) =
        coverage(&expected_sources, |s| sources.iter().any(|source| source.contains(s)));

    let overall_score = (keyword_score + source_score) / 2.0;
    RetrievalScore {
        keyword_matches,
        total_keywords: keywords.len(),
        keyword_score,
        source_matches,
        total_sources: expected_sources.len(),
        source_score,
        overall_score,
        passed: overall_score >= thresholds.retrieval,
    }
}

/// Judge whether `answer` is grounded in the retrieved chunks.
///
/// An answer that admits the context is insufficient is faithful. Otherwise
/// the first three `.`-separated sentences of at least ten characters are
/// sampled for up to three of their words longer than four characters; a
/// sentence is grounded when any sample word occurs in the retrieved text.
pub fn evaluate_faithfulness<'a>(
    answer: &str,
    chunks: impl IntoIterator<Item = &'a Chunk>,
    thresholds: &EvalThresholds,
) -> FaithfulnessScore {
    let answer_lower = answer.to_lowercase().replace('\u{2019}', "'");
    if ABSTENTION_PHRASES.iter().any(|phrase| answer_lower.contains(phrase)) {
        return FaithfulnessScore {
            passed: true,
            abstained: true,
            grounded_sentences: 0,
            considered_sentences: 0,
            reason: "answer acknowledges the context is insufficient".to_string(),
        };
    }

    let text = joined_text(chunks);
    let mut considered = 0usize;
    let mut grounded = 0usize;
    for sentence in answer.split('.').take(FAITHFULNESS_SENTENCES) {
        if sentence.trim().chars().count() < MIN_SENTENCE_CHARS {
            continue;
        }
        considered += 1;
        let lower = sentence.to_lowercase();
        let mut samples = lower
            .split_whitespace()
            .filter(|w| w.chars().count() > MIN_SAMPLE_WORD_CHARS)
            .take(SAMPLE_WORDS);
        if samples.any(|word| text.contains(word)) {
            grounded += 1;
        }
    }

    FaithfulnessScore {
        passed: grounded as f32 >= thresholds.faithfulness * considered as f32,
        abstained: false,
        grounded_sentences: grounded,
        considered_sentences: considered,
        reason: format!("grounded sentences: {grounded}/{considered}"),
    }
}

/// Score the answer text against expected keywords.
pub fn evaluate_correctness<K: AsRef<str>>(
    answer: &str,
    expected_keywords: &[K],
    thresholds: &EvalThresholds,
) -> CorrectnessScore {
    let answer_lower = answer.to_lowercase();
    let keywords = normalized(expected_keywords);
    let (keyword_matches, keyword_score) = coverage(&keywords, |k| answer_lower.contains(k));
    CorrectnessScore {
        keyword_matches,
        total_keywords: keywords.len(),
        keyword_score,
        passed: keyword_score >= thresholds.correctness,
        reason: format!("contains {keyword_matches}/{} key concepts", keywords.len()),
    }
}

/// Knobs for an evaluation run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalSettings {
    /// Chunks retrieved per question.
    pub top_k: usize,
    /// Bound on the context passed to the generator.
    pub max_context_chars: usize,
    /// Pass thresholds for the three scorers.
    pub thresholds: EvalThresholds,
    /// Timeout and retry policy for generator calls.
    pub policy: CallPolicy,
}

impl EvalSettings {
    /// Settings derived from a pipeline configuration.
    pub fn from_config(config: &RagConfig, thresholds: EvalThresholds) -> Self {
        Self {
            top_k: config.top_k,
            max_context_chars: config.max_context_chars,
            thresholds,
            policy: CallPolicy::from_config(config),
        }
    }
}

/// Scores for one evaluation case.
///
/// Scorers that could not run because an earlier step failed are `None`, and
/// `error` says why.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseResult {
    /// The case's identifier.
    pub id: String,
    /// The question asked.
    pub question: String,
    /// The generated answer, if generation succeeded.
    pub answer: Option<String>,
    /// Sources of the retrieved chunks, in rank order.
    pub sources: Vec<String>,
    /// Retrieval score, if retrieval succeeded.
    pub retrieval: Option<RetrievalScore>,
    /// Faithfulness score, if an answer was generated.
    pub faithfulness: Option<FaithfulnessScore>,
    /// Correctness score, if an answer was generated.
    pub correctness: Option<CorrectnessScore>,
    /// The failure that stopped this case early.
    pub error: Option<String>,
}

impl CaseResult {
    fn passes(&self) -> usize {
        usize::from(self.retrieval.is_some_and(|s| s.passed))
            + usize::from(self.faithfulness.as_ref().is_some_and(|s| s.passed))
            + usize::from(self.correctness.as_ref().is_some_and(|s| s.passed))
    }
}

/// Aggregate pass counts over a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvalSummary {
    /// Number of cases run.
    pub total_cases: usize,
    /// Cases that stopped with an error.
    pub errored_cases: usize,
    /// Cases passing the retrieval check.
    pub retrieval_passed: usize,
    /// Cases passing the faithfulness check.
    pub faithfulness_passed: usize,
    /// Cases passing the correctness check.
    pub correctness_passed: usize,
    /// All passes divided by three checks per case.
    pub overall_score: f32,
}

impl EvalSummary {
    fn from_results(results: &[CaseResult]) -> Self {
        let count = |f: fn(&CaseResult) -> bool| results.iter().filter(|r| f(r)).count();
        let retrieval_passed = count(|r| r.retrieval.is_some_and(|s| s.passed));
        let faithfulness_passed = count(|r| r.faithfulness.as_ref().is_some_and(|s| s.passed));
        let correctness_passed = count(|r| r.correctness.as_ref().is_some_and(|s| s.passed));
        let total_passes: usize = results.iter().map(CaseResult::passes).sum();
        let overall_score = if results.is_empty() {
            0.0
        } else {
            total_passes as f32 / (3 * results.len()) as f32
        };
        Self {
            total_cases: results.len(),
            errored_cases: count(|r| r.error.is_some()),
            retrieval_passed,
            faithfulness_passed,
            correctness_passed,
            overall_score,
        }
    }

    /// Fraction of cases passing `passed` checks.
    pub fn rate(&self, passed: usize) -> f32 {
        if self.total_cases == 0 { 0.0 } else { passed as f32 / self.total_cases as f32 }
    }
}

/// Results of [`run_evaluation`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalReport {
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Per-case results in input order.
    pub results: Vec<CaseResult>,
    /// Aggregate counts.
    pub summary: EvalSummary,
}

/// Run every case through retrieval, answering, and the three scorers.
///
/// Each case retrieves once and answers from that same retrieval. A failing
/// case records its error and the run moves on.
pub async fn run_evaluation(
    cases: &[EvalCase],
    retriever: &Retriever,
    generator: &dyn AnswerGenerator,
    template: &PromptTemplate,
    settings: &EvalSettings,
) -> EvalReport {
    let started_at = Utc::now();
    let mut results = Vec::with_capacity(cases.len());

    for (i, case) in cases.iter().enumerate() {
        info!(case = %case.id, index = i + 1, total = cases.len(), "evaluating case");
        let mut result = CaseResult {
            id: case.id.clone(),
            question: case.question.clone(),
            answer: None,
            sources: Vec::new(),
            retrieval: None,
            faithfulness: None,
            correctness: None,
            error: None,
        };

        let retrieved = match retriever.retrieve(&case.question, settings.top_k).await {
            Ok(retrieved) => retrieved,
            Err(e) => {
                warn!(case = %case.id, error = %e, "retrieval failed");
                result.error = Some(e.to_string());
                results.push(result);
                continue;
            }
        };

        let thresholds = &settings.thresholds;
        result.sources = retrieved.chunks().filter_map(Chunk::source).map(str::to_string).collect();
        result.retrieval = Some(evaluate_retrieval(
            retrieved.chunks(),
            &case.expected_keywords,
            &case.expected_sources,
            thresholds,
        ));

        match answer_with_context(
            &case.question,
            retrieved.clone(),
            generator,
            template,
            settings.max_context_chars,
            &settings.policy,
        )
        .await
        {
            Ok(answer) => {
                result.faithfulness =
                    Some(evaluate_faithfulness(&answer.text, retrieved.chunks(), thresholds));
                result.correctness =
                    Some(evaluate_correctness(&answer.text, &case.expected_keywords, thresholds));
                result.answer = Some(answer.text);
            }
            Err(e) => {
                warn!(case = %case.id, error = %e, "answer generation failed");
                result.error = Some(e.to_string());
            }
        }
        results.push(result);
    }

    let summary = EvalSummary::from_results(&results);
    info!(
        cases = summary.total_cases,
        errored = summary.errored_cases,
        overall_score = summary.overall_score,
        "evaluation finished"
    );
    EvalReport { started_at, results, summary }
}
