//! Timeout and retry policy for external calls.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::config::RagConfig;
use crate::error::{RagError, Result};

/// How external calls (embedding, chat completion) are bounded and retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicy {
    /// Timeout for a single attempt.
    pub timeout: Duration,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Backoff before the first retry; doubled each further retry.
    pub backoff: Duration,
}

impl CallPolicy {
    /// Derive the policy from a pipeline configuration.
    pub fn from_config(config: &RagConfig) -> Self {
        Self {
            timeout: config.request_timeout(),
            max_retries: config.max_retries,
            backoff: config.retry_backoff(),
        }
    }

    /// Run `call`, applying the timeout to every attempt and retrying
    /// retryable failures with exponential backoff.
    ///
    /// Non-retryable errors are returned immediately. After the last attempt
    /// the most recent error is returned.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut backoff = self.backoff;
        let mut attempt = 0u32;
        loop {
            let outcome = match tokio::time::timeout(self.timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(RagError::Timeout {
                    operation: operation.to_string(),
                    after: self.timeout,
                }),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(operation, attempt, error = %e, "retrying after transient failure");
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                }
                Err(e) => return Err(e),
            }
        }
    }
}
