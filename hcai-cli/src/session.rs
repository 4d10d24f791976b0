//! A loaded collection plus everything needed to answer questions about it.

use anyhow::Result;
use hcai_rag::answer::{PromptTemplate, answer_with_context, preview};
use hcai_rag::{AnswerGenerator, CallPolicy, Retriever, SearchResult};

use crate::corpus::source_label;

/// Characters of chunk text shown under each source.
pub const PREVIEW_CHARS: usize = 200;

pub struct Session {
    pub retriever: Retriever,
    /// `None` runs retrieval only.
    pub generator: Option<Box<dyn AnswerGenerator>>,
    pub template: PromptTemplate,
    pub top_k: usize,
    pub max_context_chars: usize,
    pub policy: CallPolicy,
}

impl Session {
    /// Answer one question and print the answer with its sources.
    pub async fn ask(&self, question: &str) -> Result<()> {
        let retrieved = self.retriever.retrieve(question, self.top_k).await?;

        let Some(generator) = &self.generator else {
            println!("\nTop {} chunks:", retrieved.len());
            print_hits(&retrieved.hits);
            return Ok(());
        };

        let answer = answer_with_context(
            question,
            retrieved,
            generator.as_ref(),
            &self.template,
            self.max_context_chars,
            &self.policy,
        )
        .await?;

        println!("\nAnswer:\n{}\n", answer.text);
        println!("Sources ({}):", answer.source_chunks.len());
        print_hits(&answer.source_chunks);
        Ok(())
    }
}

pub fn print_hits(hits: &[SearchResult]) {
    for hit in hits {
        println!("{}", format_hit(hit));
    }
}

/// Two-line rendering: numbered label with relevance, then a text preview.
pub fn format_hit(hit: &SearchResult) -> String {
    format!(
        "[{}] {} | relevance {:.3} ({:.1}%)\n    {}",
        hit.rank + 1,
        source_label(hit.chunk.source()),
        hit.similarity,
        hit.similarity * 100.0,
        preview(&hit.chunk, PREVIEW_CHARS).replace('\n', " "),
    )
}
