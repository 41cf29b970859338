use futures::future::BoxFuture;
use futures::stream::BoxStream;

use crate::error::Result;
use crate::types::*;

/// Parameters of one chat completion call.
#[derive(Debug, Clone)]
pub struct ChatCompletionRequest {
    pub api_key: String,
    pub model: String,
    pub messages: Vec<ChatGptMessage>,
    pub temperature: f32,
    pub seed: Option<i64>,
    pub response_format_type: Option<ResponseFormatType>,
    pub stop: Vec<String>,
}

/// A streamed piece of an assistant message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatDelta {
    pub role: Option<ChatMessageRole>,
    pub content: Option<String>,
}

/// OpenAI-style chat completion.
pub trait ChatCompletionClient: Send + Sync + 'static {
    /// Single request, whole message back.
    fn complete(&self, request: ChatCompletionRequest) -> BoxFuture<'_, Result<ChatGptMessage>>;

    /// Streamed request, deltas back.
    fn complete_stream(
        &self,
        request: ChatCompletionRequest,
    ) -> BoxFuture<'_, Result<BoxStream<'static, Result<ChatDelta>>>>;
}

/// HuggingFace hosted inference.
pub trait InferenceClient: Send + Sync + 'static {
    fn infer(
        &self,
        api_token: &str,
        model: &str,
        parameters: serde_json::Value,
    ) -> BoxFuture<'_, Result<serde_json::Value>>;
}

/// Text-to-speech.
pub trait SpeechClient: Send + Sync + 'static {
    /// Returns the encoded audio bytes.
    fn text_to_speech(
        &self,
        api_key: &str,
        voice_id: &str,
        text: &str,
    ) -> BoxFuture<'_, Result<Vec<u8>>>;
}
