use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlayflowError {
    // Graph errors
    #[error("Flow integrity violation: {0}")]
    Integrity(String),

    #[error("Flow graph contains a cycle: {0}")]
    GraphCycle(String),

    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    // Integration errors
    #[error("LLM request failed: {0}")]
    LlmRequest(String),

    #[error("LLM streaming error: {0}")]
    LlmStream(String),

    #[error("Integration request failed: {service}: {message}")]
    Integration { service: String, message: String },

    // Run errors
    #[error("Flow run cancelled")]
    Cancelled,

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PlayflowError {
    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity(message.into())
    }

    pub fn integration(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Integration {
            service: service.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PlayflowError>;
