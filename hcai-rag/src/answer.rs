//! Grounded answering: retrieve, build a bounded context, fill a prompt, and
//! delegate to an [`AnswerGenerator`].

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::document::{Chunk, SearchResult};
use crate::error::{RagError, Result};
use crate::generator::AnswerGenerator;
use crate::retriever::{RetrievalResult, Retriever};
use crate::retry::CallPolicy;

/// Placeholder replaced by the retrieved context.
pub const CONTEXT_PLACEHOLDER: &str = "{context}";
/// Placeholder replaced by the user's question.
pub const QUESTION_PLACEHOLDER: &str = "{question}";

/// Separator between chunk texts in the context block.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// The healthcare-expert prompt used when no template is supplied.
pub const DEFAULT_PROMPT_TEMPLATE: &str = "You are a healthcare AI expert assistant. \
Use the following pieces of context to answer the question at the end.

Context from healthcare AI knowledge base:
{context}

Guidelines:
- Provide accurate, detailed answers based on the context
- If the context doesn't contain enough information, say so
- Cite specific details from the context when possible
- Focus on healthcare AI, payers, and health systems
- Be concise but comprehensive

Question: {question}

Answer:";

/// A prompt with `{context}` and `{question}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    /// Create a template.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if either placeholder is missing.
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        for placeholder in [CONTEXT_PLACEHOLDER, QUESTION_PLACEHOLDER] {
            if !template.contains(placeholder) {
                return Err(RagError::ConfigError(format!(
                    "prompt template is missing the {placeholder} placeholder"
                )));
            }
        }
        Ok(Self { template })
    }

    /// The default healthcare-expert template.
    pub fn healthcare() -> Self {
        Self { template: DEFAULT_PROMPT_TEMPLATE.to_string() }
    }

    /// The raw template text.
    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Fill both placeholders in a single pass.
    ///
    /// Placeholder-like text inside `context` or `question` is left as is.
    pub fn render(&self, context: &str, question: &str) -> String {
        let mut out = String::with_capacity(self.template.len() + context.len() + question.len());
        let mut rest = self.template.as_str();
        while let Some(pos) = rest.find('{') {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];
            if let Some(after) = tail.strip_prefix(CONTEXT_PLACEHOLDER) {
                out.push_str(context);
                rest = after;
            } else if let Some(after) = tail.strip_prefix(QUESTION_PLACEHOLDER) {
                out.push_str(question);
                rest = after;
            } else {
                out.push('{');
                rest = &tail[1..];
            }
        }
        out.push_str(rest);
        out
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::healthcare()
    }
}

/// A generated answer with the chunks it was conditioned on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    /// The generated text.
    pub text: String,
    /// Chunks whose text made it into the prompt, in rank order.
    pub source_chunks: Vec<SearchResult>,
}

/// Join hit texts in rank order with [`CONTEXT_SEPARATOR`], bounded by
/// `max_chars` characters.
///
/// Hits are taken best-first until the next one would exceed the bound, so
/// the lowest-ranked chunks are the ones dropped. The top hit is always kept:
/// when it alone exceeds the bound it is cut to `max_chars` characters.
/// Returns the context and the number of hits it includes.
pub fn build_context(hits: &[SearchResult], max_chars: usize) -> (String, usize) {
    let separator_len = CONTEXT_SEPARATOR.chars().count();
    let mut context = String::new();
    let mut used_chars = 0usize;
    let mut used = 0usize;

    for hit in hits {
        let len = hit.chunk.text.chars().count();
        let extra = if used == 0 { len } else { separator_len + len };
        if used_chars + extra > max_chars {
            if used == 0 && max_chars > 0 {
                context.extend(hit.chunk.text.chars().take(max_chars));
                used = 1;
            }
            break;
        }
        if used > 0 {
            context.push_str(CONTEXT_SEPARATOR);
        }
        context.push_str(&hit.chunk.text);
        used_chars += extra;
        used += 1;
    }
    (context, used)
}

/// Answer `question` from chunks already retrieved for it.
///
/// The generator call is bounded and retried according to `policy`.
///
/// # Errors
///
/// Returns the generator's error once retries are exhausted.
pub async fn answer_with_context(
    question: &str,
    retrieved: RetrievalResult,
    generator: &dyn AnswerGenerator,
    template: &PromptTemplate,
    max_context_chars: usize,
    policy: &CallPolicy,
) -> Result<Answer> {
    let (context, used) = build_context(&retrieved.hits, max_context_chars);
    if used < retrieved.len() {
        debug!(
            retrieved = retrieved.len(),
            used,
            max_context_chars,
            "dropped lowest-ranked chunks from context"
        );
    }
    let prompt = template.render(&context, question);

    let text = policy.run("chat completion", || generator.complete(&prompt)).await?;
    info!(
        model = %generator.model(),
        source_chunks = used,
        answer_chars = text.len(),
        "generated answer"
    );

    let mut source_chunks = retrieved.hits;
    source_chunks.truncate(used);
    Ok(Answer { text, source_chunks })
}

/// Retrieve `k` chunks for `question` and generate a grounded answer.
///
/// # Errors
///
/// Propagates retrieval errors and the generator's error.
pub async fn answer(
    question: &str,
    k: usize,
    retriever: &Retriever,
    generator: &dyn AnswerGenerator,
    template: &PromptTemplate,
    max_context_chars: usize,
    policy: &CallPolicy,
) -> Result<Answer> {
    let retrieved = retriever.retrieve(question, k).await?;
    answer_with_context(question, retrieved, generator, template, max_context_chars, policy).await
}

/// Shorten chunk text for display, appending `...` when cut.
pub fn preview(chunk: &Chunk, max_chars: usize) -> String {
    let mut chars = chunk.text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() { format!("{head}...") } else { head }
}
