use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use tracing::warn;

use playflow_core::config::RetryConfig;
use playflow_core::error::{PlayflowError, Result};
use playflow_core::traits::{ChatCompletionClient, ChatCompletionRequest, ChatDelta};
use playflow_core::types::ChatGptMessage;

/// A chat client that retries transient failures with jittered exponential
/// backoff. Streams are only retried before the first delta arrives.
pub struct RetryingClient {
    inner: Arc<dyn ChatCompletionClient>,
    retry_config: RetryConfig,
}

impl RetryingClient {
    pub fn new(inner: Arc<dyn ChatCompletionClient>, retry_config: RetryConfig) -> Self {
        Self {
            inner,
            retry_config,
        }
    }

    async fn with_retries<'a, T, F>(&'a self, mut attempt_fn: F) -> Result<T>
    where
        F: FnMut() -> BoxFuture<'a, Result<T>>,
    {
        let max_retries = self.retry_config.max_retries;
        let mut attempt = 0;
        loop {
            match attempt_fn().await {
                Ok(value) => return Ok(value),
                Err(e) if is_retryable(&e) && attempt < max_retries => {
                    let backoff = calculate_backoff(attempt, &self.retry_config);
                    warn!(
                        attempt = attempt + 1,
                        max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Retrying chat completion request"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn is_retryable(e: &PlayflowError) -> bool {
    match e {
        PlayflowError::LlmRequest(msg) => {
            msg.contains("429")
                || msg.contains("500")
                || msg.contains("502")
                || msg.contains("503")
                || msg.contains("timed out")
                || msg.contains("timeout")
                || msg.contains("connection")
        }
        PlayflowError::LlmStream(_) => true,
        _ => false,
    }
}

fn calculate_backoff(attempt: u32, config: &RetryConfig) -> Duration {
    let ms = config
        .initial_backoff_ms
        .saturating_mul(2u64.saturating_pow(attempt))
        .min(config.max_backoff_ms);
    // 0.8x to 1.2x
    let jitter = 0.8 + rand::random::<f64>() * 0.4;
    Duration::from_millis((ms as f64 * jitter) as u64)
}

impl ChatCompletionClient for RetryingClient {
    fn complete(&self, request: ChatCompletionRequest) -> BoxFuture<'_, Result<ChatGptMessage>> {
        Box::pin(async move {
            self.with_retries(|| self.inner.complete(request.clone()))
                .await
        })
    }

    fn complete_stream(
        &self,
        request: ChatCompletionRequest,
    ) -> BoxFuture<'_, Result<BoxStream<'static, Result<ChatDelta>>>> {
        Box::pin(async move {
            self.with_retries(|| self.inner.complete_stream(request.clone()))
                .await
        })
    }
}
