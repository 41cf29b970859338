use futures::future::BoxFuture;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use playflow_core::config::ElevenLabsConfig;
use playflow_core::error::{PlayflowError, Result};
use playflow_core::traits::SpeechClient;

const ELEVEN_LABS_API_URL: &str = "https://api.elevenlabs.io";

/// ElevenLabs text-to-speech. Returns MPEG audio.
pub struct ElevenLabsClient {
    http: Client,
    base_url: String,
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
}

impl ElevenLabsClient {
    pub fn new(config: &ElevenLabsConfig) -> Self {
        Self {
            http: Client::new(),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| ELEVEN_LABS_API_URL.to_string()),
        }
    }

    fn speech_url(&self, voice_id: &str) -> String {
        format!(
            "{}/v1/text-to-speech/{}",
            self.base_url.trim_end_matches('/'),
            voice_id
        )
    }
}

fn failure(message: impl Into<String>) -> PlayflowError {
    PlayflowError::integration("elevenlabs", message)
}

impl SpeechClient for ElevenLabsClient {
    fn text_to_speech(
        &self,
        api_key: &str,
        voice_id: &str,
        text: &str,
    ) -> BoxFuture<'_, Result<Vec<u8>>> {
        let url = self.speech_url(voice_id);
        let api_key = api_key.to_string();
        let text = text.to_string();

        Box::pin(async move {
            debug!(url = %url, chars = text.len(), "Calling ElevenLabs text to speech");

            let response = self
                .http
                .post(&url)
                .header("xi-api-key", &api_key)
                .header("Accept", "audio/mpeg")
                .json(&SpeechRequest { text: &text })
                .send()
                .await
                .map_err(|e| failure(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unknown".to_string());
                return Err(failure(format!("HTTP {}: {}", status.as_u16(), body)));
            }

            let audio = response.bytes().await.map_err(|e| failure(e.to_string()))?;
            Ok(audio.to_vec())
        })
    }
}
