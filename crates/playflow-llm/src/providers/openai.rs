use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::{BoxStream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use playflow_core::config::OpenAiConfig;
use playflow_core::error::{PlayflowError, Result};
use playflow_core::traits::{ChatCompletionClient, ChatCompletionRequest, ChatDelta};
use playflow_core::types::{ChatGptMessage, ChatMessageRole, ResponseFormatType};

use crate::streaming::{SseEvent, SseStream};

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI chat completions client. Any OpenAI-compatible endpoint works via
/// `base_url`.
pub struct OpenAiClient {
    http: Client,
    url: String,
}

impl OpenAiClient {
    pub fn new(config: &OpenAiConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| PlayflowError::LlmRequest(e.to_string()))?;
        Ok(Self {
            http,
            url: config
                .base_url
                .clone()
                .unwrap_or_else(|| OPENAI_API_URL.to_string()),
        })
    }

    async fn send(&self, request: &ChatCompletionRequest, stream: bool) -> Result<reqwest::Response> {
        let body = ChatRequest::from_request(request, stream);

        debug!(
            model = %request.model,
            messages = request.messages.len(),
            stream,
            "Sending chat completion request"
        );

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&request.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PlayflowError::LlmRequest(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            return Err(PlayflowError::LlmRequest(format!("HTTP {}: {}", status, body)));
        }

        Ok(response)
    }
}

// Request types
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatGptMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    #[serde(skip_serializing_if = "no_stop_sequences")]
    stop: &'a [String],
    stream: bool,
}

fn no_stop_sequences(stop: &&[String]) -> bool {
    stop.is_empty()
}

#[derive(Serialize)]
struct ResponseFormat {
    r#type: ResponseFormatType,
}

impl<'a> ChatRequest<'a> {
    fn from_request(request: &'a ChatCompletionRequest, stream: bool) -> Self {
        Self {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            seed: request.seed,
            response_format: request
                .response_format_type
                .map(|r#type| ResponseFormat { r#type }),
            stop: &request.stop,
            stream,
        }
    }
}

// Response types
#[derive(Deserialize, Debug)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize, Debug)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize, Debug)]
struct CompletionMessage {
    #[serde(default)]
    role: Option<ChatMessageRole>,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize, Debug)]
struct StreamChoice {
    delta: StreamDeltaContent,
}

#[derive(Deserialize, Debug)]
struct StreamDeltaContent {
    #[serde(default)]
    role: Option<ChatMessageRole>,
    #[serde(default)]
    content: Option<String>,
}

fn parse_completion(body: &str) -> Result<ChatGptMessage> {
    let response: CompletionResponse = serde_json::from_str(body)?;
    let message = response
        .choices
        .into_iter()
        .next()
        .map(|c| c.message)
        .ok_or_else(|| PlayflowError::LlmRequest("response has no choices".into()))?;

    Ok(ChatGptMessage {
        role: message.role.unwrap_or(ChatMessageRole::Assistant),
        content: message.content.unwrap_or_default(),
    })
}

/// `None` for the `[DONE]` sentinel and for chunks without a choice.
pub(crate) fn parse_chunk(event: &SseEvent) -> Option<Result<ChatDelta>> {
    if event.data.trim() == "[DONE]" {
        return None;
    }

    match serde_json::from_str::<StreamChunk>(&event.data) {
        Ok(chunk) => {
            let choice = chunk.choices.into_iter().next()?;
            Some(Ok(ChatDelta {
                role: choice.delta.role,
                content: choice.delta.content,
            }))
        }
        Err(e) => {
            warn!(data = %event.data, error = %e, "Failed to parse OpenAI SSE chunk");
            Some(Err(PlayflowError::LlmStream(e.to_string())))
        }
    }
}

impl ChatCompletionClient for OpenAiClient {
    fn complete(&self, request: ChatCompletionRequest) -> BoxFuture<'_, Result<ChatGptMessage>> {
        Box::pin(async move {
            let response = self.send(&request, false).await?;
            let body = response
                .text()
                .await
                .map_err(|e| PlayflowError::LlmRequest(e.to_string()))?;
            parse_completion(&body)
        })
    }

    fn complete_stream(
        &self,
        request: ChatCompletionRequest,
    ) -> BoxFuture<'_, Result<BoxStream<'static, Result<ChatDelta>>>> {
        Box::pin(async move {
            let response = self.send(&request, true).await?;
            let deltas = SseStream::new(response.bytes_stream()).filter_map(|event| async move {
                match event {
                    Ok(event) => parse_chunk(&event),
                    Err(e) => Some(Err(e)),
                }
            });
            Ok(deltas.boxed())
        })
    }
}
