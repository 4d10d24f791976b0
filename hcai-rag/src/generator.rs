//! Answer generator trait for chat-completion backends.

use async_trait::async_trait;

use crate::error::Result;

/// A chat-completion backend that turns a filled prompt into an answer.
///
/// This is the only non-deterministic step of the pipeline. Callers should
/// treat it as a slow, fallible external call.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Complete the given prompt and return the generated text.
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Return the name of the model behind this generator.
    fn model(&self) -> &str;
}
