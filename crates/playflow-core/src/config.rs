use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PlayflowError, Result};

/// Top-level Playflow configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub secrets: AccountSecrets,
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub huggingface: HuggingFaceConfig,
    #[serde(default)]
    pub elevenlabs: ElevenLabsConfig,
}

/// Flow run behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Hard cap on Loop node iterations.
    #[serde(default = "default_loop_max_iterations")]
    pub loop_max_iterations: usize,
    /// Ask integration nodes for streamed partial output.
    #[serde(default)]
    pub prefer_streaming: bool,
    /// Concurrent runs in batch mode.
    #[serde(default = "default_batch_concurrency")]
    pub batch_concurrency: usize,
    /// Capacity of the run event broadcast channel.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            loop_max_iterations: default_loop_max_iterations(),
            prefer_streaming: false,
            batch_concurrency: default_batch_concurrency(),
            event_buffer: default_event_buffer(),
        }
    }
}

fn default_loop_max_iterations() -> usize { 10 }
fn default_batch_concurrency() -> usize { 5 }
fn default_event_buffer() -> usize { 256 }

/// Account-level secrets passed through to integration nodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountSecrets {
    #[serde(default)]
    pub open_ai_api_key: Option<String>,
    #[serde(default)]
    pub hugging_face_api_token: Option<String>,
    #[serde(default)]
    pub eleven_labs_api_key: Option<String>,
}

impl AccountSecrets {
    /// Empty strings count as missing.
    pub fn open_ai_api_key(&self) -> Option<&str> {
        non_empty(&self.open_ai_api_key)
    }

    pub fn hugging_face_api_token(&self) -> Option<&str> {
        non_empty(&self.hugging_face_api_token)
    }

    pub fn eleven_labs_api_key(&self) -> Option<&str> {
        non_empty(&self.eleven_labs_api_key)
    }
}

impl AccountSecrets {
    pub fn get(&self, kind: SecretKind) -> Option<&str> {
        match kind {
            SecretKind::OpenAiApiKey => self.open_ai_api_key(),
            SecretKind::HuggingFaceApiToken => self.hugging_face_api_token(),
            SecretKind::ElevenLabsApiKey => self.eleven_labs_api_key(),
        }
    }
}

/// An account-level secret some node types need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SecretKind {
    OpenAiApiKey,
    HuggingFaceApiToken,
    ElevenLabsApiKey,
}

impl SecretKind {
    /// Node error reported when the secret is absent.
    pub fn missing_message(&self) -> &'static str {
        match self {
            Self::OpenAiApiKey => "OpenAI API key is missing",
            Self::HuggingFaceApiToken => "Hugging Face API token is missing",
            Self::ElevenLabsApiKey => "Eleven Labs API key is missing",
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            request_timeout_secs: default_request_timeout(),
            retry: RetryConfig::default(),
        }
    }
}

fn default_request_timeout() -> u64 { 60 }

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HuggingFaceConfig {
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ElevenLabsConfig {
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Retry configuration for integration requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

fn default_max_retries() -> u32 { 2 }
fn default_initial_backoff() -> u64 { 500 }
fn default_max_backoff() -> u64 { 8000 }

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| PlayflowError::ConfigNotFound(path.display().to_string()))?;

        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(&content);

        toml::from_str(&expanded).map_err(|e| PlayflowError::Config(e.to_string()))
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => {
                    // Keep original if env var not set
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}
