use futures::future::BoxFuture;
use reqwest::Client;
use tracing::debug;

use playflow_core::config::HuggingFaceConfig;
use playflow_core::error::{PlayflowError, Result};
use playflow_core::traits::InferenceClient;

const HUGGING_FACE_API_URL: &str = "https://api-inference.huggingface.co";

/// HuggingFace hosted inference API.
pub struct HuggingFaceClient {
    http: Client,
    base_url: String,
}

impl HuggingFaceClient {
    pub fn new(config: &HuggingFaceConfig) -> Self {
        Self {
            http: Client::new(),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| HUGGING_FACE_API_URL.to_string()),
        }
    }

    fn model_url(&self, model: &str) -> String {
        format!("{}/models/{}", self.base_url.trim_end_matches('/'), model)
    }
}

fn failure(message: impl Into<String>) -> PlayflowError {
    PlayflowError::integration("huggingface", message)
}

impl InferenceClient for HuggingFaceClient {
    fn infer(
        &self,
        api_token: &str,
        model: &str,
        parameters: serde_json::Value,
    ) -> BoxFuture<'_, Result<serde_json::Value>> {
        let url = self.model_url(model);
        let api_token = api_token.to_string();

        Box::pin(async move {
            debug!(url = %url, "Calling HuggingFace inference");

            let response = self
                .http
                .post(&url)
                .bearer_auth(&api_token)
                .json(&parameters)
                .send()
                .await
                .map_err(|e| failure(e.to_string()))?;

            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| failure(e.to_string()))?;

            if !status.is_success() {
                return Err(failure(format!("HTTP {}: {}", status.as_u16(), body)));
            }

            serde_json::from_str(&body).map_err(|e| failure(e.to_string()))
        })
    }
}
