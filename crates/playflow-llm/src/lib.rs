pub mod providers;
pub mod retry;
pub mod streaming;

use std::sync::Arc;

use playflow_core::config::OpenAiConfig;
use playflow_core::error::Result;
use playflow_core::traits::ChatCompletionClient;

pub use providers::{ElevenLabsClient, HuggingFaceClient, OpenAiClient};
pub use retry::RetryingClient;

/// OpenAI client wrapped in the configured retry policy.
pub fn create_chat_client(config: &OpenAiConfig) -> Result<Arc<dyn ChatCompletionClient>> {
    let client = OpenAiClient::new(config)?;
    Ok(Arc::new(RetryingClient::new(
        Arc::new(client),
        config.retry.clone(),
    )))
}
