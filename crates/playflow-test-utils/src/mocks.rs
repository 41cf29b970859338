use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::{json, Value};

use playflow_core::traits::{
    ChatCompletionClient, ChatCompletionRequest, ChatDelta, InferenceClient, SpeechClient,
};
use playflow_core::{ChatGptMessage, ChatMessageRole, Result};

/// Chat client that answers every request with the same reply. Streamed
/// replies arrive one word at a time.
pub struct MockChatClient {
    reply: String,
    delay: Option<Duration>,
    requests: Mutex<Vec<ChatCompletionRequest>>,
}

impl MockChatClient {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Wait this long before answering a non-streamed request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<ChatCompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn record(&self, request: ChatCompletionRequest) {
        self.requests.lock().unwrap().push(request);
    }
}

impl ChatCompletionClient for MockChatClient {
    fn complete(&self, request: ChatCompletionRequest) -> BoxFuture<'_, Result<ChatGptMessage>> {
        self.record(request);
        let content = self.reply.clone();
        let delay = self.delay;
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            Ok(ChatGptMessage {
                role: ChatMessageRole::Assistant,
                content,
            })
        })
    }

    fn complete_stream(
        &self,
        request: ChatCompletionRequest,
    ) -> BoxFuture<'_, Result<BoxStream<'static, Result<ChatDelta>>>> {
        self.record(request);
        let mut deltas = vec![Ok(ChatDelta {
            role: Some(ChatMessageRole::Assistant),
            content: None,
        })];
        deltas.extend(self.reply.split_inclusive(' ').map(|word| {
            Ok(ChatDelta {
                role: None,
                content: Some(word.to_string()),
            })
        }));
        Box::pin(async move { Ok(stream::iter(deltas).boxed()) })
    }
}

/// Inference client that echoes its model and parameters.
#[derive(Default)]
pub struct MockInferenceClient {
    calls: AtomicUsize,
}

impl MockInferenceClient {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl InferenceClient for MockInferenceClient {
    fn infer(
        &self,
        _api_token: &str,
        model: &str,
        parameters: Value,
    ) -> BoxFuture<'_, Result<Value>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let echo = json!({ "model": model, "inputs": parameters });
        Box::pin(async move { Ok(echo) })
    }
}

/// Speech client whose "audio" is the UTF-8 text itself.
pub struct MockSpeechClient;

impl SpeechClient for MockSpeechClient {
    fn text_to_speech(
        &self,
        _api_key: &str,
        _voice_id: &str,
        text: &str,
    ) -> BoxFuture<'_, Result<Vec<u8>>> {
        let audio = text.as_bytes().to_vec();
        Box::pin(async move { Ok(audio) })
    }
}
