//! HuggingFace inference and ElevenLabs text-to-speech.

use std::sync::Arc;

use base64::Engine;
use serde_json::Value;
use tracing::debug;

use playflow_core::traits::{InferenceClient, SpeechClient};
use playflow_core::{
    NodeConfig, NodeId, NodeParams, NodeTemplate, NodeType, RunNodeResult, SecretKind,
    VariableValueType,
};

use crate::definition::{ready, single, NodeDefinition, NodeRunContext, NodeRunStream, TemplateBuilder};

pub struct HuggingFaceInferenceNode {
    client: Arc<dyn InferenceClient>,
}

impl HuggingFaceInferenceNode {
    pub fn new(client: Arc<dyn InferenceClient>) -> Self {
        Self { client }
    }
}

impl NodeDefinition for HuggingFaceInferenceNode {
    fn node_type(&self) -> NodeType {
        NodeType::HuggingFaceInference
    }

    fn label(&self) -> &str {
        "Hugging Face Inference"
    }

    fn required_secret(&self) -> Option<SecretKind> {
        Some(SecretKind::HuggingFaceApiToken)
    }

    fn create_default(&self, node_id: &NodeId) -> NodeTemplate {
        TemplateBuilder::new(node_id)
            .node_input(0, "parameters")
            .node_output(0, "output", VariableValueType::Any)
            .condition(0, "")
            .condition_target(0)
            .build(NodeConfig::new(
                node_id.clone(),
                NodeParams::HuggingFaceInference {
                    model: "gpt2".to_string(),
                },
            ))
    }

    fn run(&self, context: NodeRunContext) -> NodeRunStream {
        let NodeParams::HuggingFaceInference { model } = context.node_config.params.clone() else {
            return ready(RunNodeResult::error("Node config is not a HuggingFace inference"));
        };
        let Some(token) = context.secrets.get(SecretKind::HuggingFaceApiToken) else {
            return ready(RunNodeResult::error(
                SecretKind::HuggingFaceApiToken.missing_message(),
            ));
        };

        let token = token.to_string();
        let parameters = context.first_input();
        let client = Arc::clone(&self.client);

        debug!(node_id = %context.node_id(), model = %model, "Running HuggingFace inference");

        single(async move {
            match client.infer(&token, &model, parameters).await {
                Ok(output) => RunNodeResult::values(vec![output]),
                Err(e) => RunNodeResult::error(e.to_string()),
            }
        })
    }
}

pub struct ElevenLabsNode {
    client: Arc<dyn SpeechClient>,
}

impl ElevenLabsNode {
    pub fn new(client: Arc<dyn SpeechClient>) -> Self {
        Self { client }
    }
}

impl NodeDefinition for ElevenLabsNode {
    fn node_type(&self) -> NodeType {
        NodeType::ElevenLabs
    }

    fn label(&self) -> &str {
        "Eleven Labs Text to Speech"
    }

    fn required_secret(&self) -> Option<SecretKind> {
        Some(SecretKind::ElevenLabsApiKey)
    }

    fn create_default(&self, node_id: &NodeId) -> NodeTemplate {
        TemplateBuilder::new(node_id)
            .node_input(0, "text")
            .node_output(0, "audio", VariableValueType::Audio)
            .condition(0, "")
            .condition_target(0)
            .build(NodeConfig::new(
                node_id.clone(),
                NodeParams::ElevenLabs {
                    voice_id: String::new(),
                },
            ))
    }

    fn run(&self, context: NodeRunContext) -> NodeRunStream {
        let NodeParams::ElevenLabs { voice_id } = context.node_config.params.clone() else {
            return ready(RunNodeResult::error("Node config is not an ElevenLabs node"));
        };
        let Some(api_key) = context.secrets.get(SecretKind::ElevenLabsApiKey) else {
            return ready(RunNodeResult::error(
                SecretKind::ElevenLabsApiKey.missing_message(),
            ));
        };

        let api_key = api_key.to_string();
        let text = match context.first_input() {
            Value::String(s) => s,
            Value::Null => String::new(),
            other => other.to_string(),
        };
        let client = Arc::clone(&self.client);

        debug!(node_id = %context.node_id(), voice_id = %voice_id, "Running text to speech");

        single(async move {
            match client.text_to_speech(&api_key, &voice_id, &text).await {
                Ok(audio) => RunNodeResult::values(vec![Value::String(audio_data_url(&audio))]),
                Err(e) => RunNodeResult::error(e.to_string()),
            }
        })
    }
}

/// `data:audio/mpeg;base64,...`
pub fn audio_data_url(audio: &[u8]) -> String {
    format!(
        "data:audio/mpeg;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(audio)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_data_url() {
        assert_eq!(audio_data_url(b"abc"), "data:audio/mpeg;base64,YWJj");
    }
}
