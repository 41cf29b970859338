use std::borrow::Borrow;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::connector::Connector;

const ID_SUFFIX_LEN: usize = 5;

fn random_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_SUFFIX_LEN)
        .map(char::from)
        .collect()
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Node identifier.
    NodeId
);

string_id!(
    /// Connector identifier, scoped as `${nodeId}/${suffix}`.
    ConnectorId
);

impl NodeId {
    pub fn generate() -> Self {
        Self(random_suffix())
    }
}

impl ConnectorId {
    pub fn generate(node_id: &NodeId) -> Self {
        Self::scoped(node_id, &random_suffix())
    }

    pub fn scoped(node_id: &NodeId, suffix: &str) -> Self {
        Self(format!("{}/{}", node_id, suffix))
    }
}

/// Unique run identifier.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Topological role of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Start,
    SubroutineStart,
    Process,
    Finish,
    Subroutine,
}

impl NodeKind {
    pub fn is_start(&self) -> bool {
        matches!(self, Self::Start | Self::SubroutineStart)
    }
}

/// Closed catalog of node types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeType {
    InputNode,
    OutputNode,
    ConditionNode,
    JSONataCondition,
    JavaScriptFunctionNode,
    JSONataDataBuilder,
    TextTemplate,
    Concat,
    #[serde(alias = "BareboneLoop")]
    Loop,
    LoopStart,
    LoopFinish,
    ChatGPTMessageNode,
    ChatGPTChatCompletionNode,
    HuggingFaceInference,
    ElevenLabs,
}

impl NodeType {
    pub const ALL: [NodeType; 15] = [
        NodeType::InputNode,
        NodeType::OutputNode,
        NodeType::ConditionNode,
        NodeType::JSONataCondition,
        NodeType::JavaScriptFunctionNode,
        NodeType::JSONataDataBuilder,
        NodeType::TextTemplate,
        NodeType::Concat,
        NodeType::Loop,
        NodeType::LoopStart,
        NodeType::LoopFinish,
        NodeType::ChatGPTMessageNode,
        NodeType::ChatGPTChatCompletionNode,
        NodeType::HuggingFaceInference,
        NodeType::ElevenLabs,
    ];

    pub fn kind(&self) -> NodeKind {
        match self {
            Self::InputNode => NodeKind::Start,
            Self::LoopStart => NodeKind::SubroutineStart,
            Self::OutputNode | Self::LoopFinish => NodeKind::Finish,
            Self::Loop => NodeKind::Subroutine,
            _ => NodeKind::Process,
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Role of a ChatGPT message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMessageRole {
    System,
    #[default]
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormatType {
    JsonObject,
}

/// A single chat message as exchanged with the OpenAI API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatGptMessage {
    pub role: ChatMessageRole,
    pub content: String,
}

fn default_true() -> bool { true }
fn default_chat_model() -> String { "gpt-4".to_string() }
fn default_temperature() -> f32 { 1.0 }
fn default_hugging_face_model() -> String { "gpt2".to_string() }

/// Per-type node configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum NodeParams {
    InputNode {
        #[serde(default)]
        node_name: String,
    },
    OutputNode {},
    ConditionNode {
        #[serde(default = "default_true")]
        stop_at_the_first_match: bool,
    },
    JSONataCondition {
        #[serde(default = "default_true")]
        stop_at_the_first_match: bool,
    },
    JavaScriptFunctionNode {
        #[serde(default)]
        java_script_code: String,
    },
    JSONataDataBuilder {
        #[serde(default)]
        expression_string: String,
    },
    TextTemplate {
        #[serde(default)]
        content: String,
    },
    Concat {},
    #[serde(alias = "BareboneLoop")]
    Loop {
        #[serde(default)]
        loop_start_node_id: Option<NodeId>,
    },
    LoopStart {
        #[serde(default)]
        node_name: String,
    },
    LoopFinish {},
    ChatGPTMessageNode {
        #[serde(default)]
        role: ChatMessageRole,
        #[serde(default)]
        content: String,
    },
    ChatGPTChatCompletionNode {
        #[serde(default = "default_chat_model")]
        model: String,
        #[serde(default = "default_temperature")]
        temperature: f32,
        #[serde(default)]
        seed: Option<i64>,
        #[serde(default)]
        response_format_type: Option<ResponseFormatType>,
        #[serde(default)]
        stop: Vec<String>,
    },
    HuggingFaceInference {
        #[serde(default = "default_hugging_face_model")]
        model: String,
    },
    ElevenLabs {
        #[serde(default)]
        voice_id: String,
    },
}

impl NodeParams {
    pub fn node_type(&self) -> NodeType {
        match self {
            Self::InputNode { .. } => NodeType::InputNode,
            Self::OutputNode {} => NodeType::OutputNode,
            Self::ConditionNode { .. } => NodeType::ConditionNode,
            Self::JSONataCondition { .. } => NodeType::JSONataCondition,
            Self::JavaScriptFunctionNode { .. } => NodeType::JavaScriptFunctionNode,
            Self::JSONataDataBuilder { .. } => NodeType::JSONataDataBuilder,
            Self::TextTemplate { .. } => NodeType::TextTemplate,
            Self::Concat {} => NodeType::Concat,
            Self::Loop { .. } => NodeType::Loop,
            Self::LoopStart { .. } => NodeType::LoopStart,
            Self::LoopFinish {} => NodeType::LoopFinish,
            Self::ChatGPTMessageNode { .. } => NodeType::ChatGPTMessageNode,
            Self::ChatGPTChatCompletionNode { .. } => NodeType::ChatGPTChatCompletionNode,
            Self::HuggingFaceInference { .. } => NodeType::HuggingFaceInference,
            Self::ElevenLabs { .. } => NodeType::ElevenLabs,
        }
    }
}

/// A node in a flow: identity plus its type-specific configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfig {
    pub node_id: NodeId,
    #[serde(flatten)]
    pub params: NodeParams,
}

impl NodeConfig {
    pub fn new(node_id: NodeId, params: NodeParams) -> Self {
        Self { node_id, params }
    }

    pub fn node_type(&self) -> NodeType {
        self.params.node_type()
    }

    pub fn kind(&self) -> NodeKind {
        self.node_type().kind()
    }
}

/// Edge between two connectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub source: NodeId,
    pub source_handle: ConnectorId,
    pub target: NodeId,
    pub target_handle: ConnectorId,
}

impl Edge {
    pub fn new(
        source: impl Into<NodeId>,
        source_handle: impl Into<ConnectorId>,
        target: impl Into<NodeId>,
        target_handle: impl Into<ConnectorId>,
    ) -> Self {
        Self {
            id: random_suffix(),
            source: source.into(),
            source_handle: source_handle.into(),
            target: target.into(),
            target_handle: target_handle.into(),
        }
    }
}

/// Output of a node definition's default factory. Some types (e.g. a chatbot
/// start/finish pair) create more than one node.
#[derive(Debug, Clone, Default)]
pub struct NodeTemplate {
    pub node_configs: Vec<NodeConfig>,
    pub connectors: Vec<Connector>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionResult {
    pub is_condition_matched: bool,
}

impl ConditionResult {
    pub fn matched(is_condition_matched: bool) -> Self {
        Self {
            is_condition_matched,
        }
    }
}

/// Result of a node run. Values and condition results are positional: one per
/// output variable and one per outgoing condition respectively.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunNodeResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable_values: Option<Vec<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition_results: Option<Vec<ConditionResult>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl RunNodeResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn values(values: Vec<serde_json::Value>) -> Self {
        Self {
            variable_values: Some(values),
            ..Self::default()
        }
    }

    pub fn conditions(results: Vec<ConditionResult>) -> Self {
        Self {
            condition_results: Some(results),
            ..Self::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            errors: vec![message.into()],
            ..Self::default()
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Fold a later emission into this one. Values and conditions are
    /// replaced; errors accumulate.
    pub fn merge(&mut self, next: RunNodeResult) {
        if next.variable_values.is_some() {
            self.variable_values = next.variable_values;
        }
        if next.condition_results.is_some() {
            self.condition_results = next.condition_results;
        }
        self.errors.extend(next.errors);
    }
}

/// Terminal state of a flow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Finished,
    FinishedWithErrors,
    Aborted,
    Cancelled,
}

/// Lifecycle of a single node execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum NodeExecutionEvent {
    Started,
    /// Intermediate or final output values keyed by connector id.
    PartialValues(HashMap<ConnectorId, serde_json::Value>),
    Errors(Vec<String>),
    Finished,
}

/// Event broadcast to all run subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum RunEvent {
    /// Flow run started.
    RunStarted {
        run_id: RunId,
        started_at: DateTime<Utc>,
    },
    /// A node changed state.
    Node {
        run_id: RunId,
        node_id: NodeId,
        event: NodeExecutionEvent,
    },
    /// Loop node started another pass over its partition.
    LoopIteration {
        run_id: RunId,
        node_id: NodeId,
        iteration: usize,
    },
    /// Flow run reached a terminal state.
    RunFinished { run_id: RunId, status: RunStatus },
}

impl RunEvent {
    pub fn run_id(&self) -> &RunId {
        match self {
            Self::RunStarted { run_id, .. }
            | Self::Node { run_id, .. }
            | Self::LoopIteration { run_id, .. }
            | Self::RunFinished { run_id, .. } => run_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_config_from_json() {
        let json = r#"{
            "kind": "Process",
            "type": "JSONataCondition",
            "nodeId": "PR4rf",
            "inputVariableIds": ["PR4rf/input"],
            "stopAtTheFirstMatch": false
        }"#;
        let config: NodeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.node_id.as_str(), "PR4rf");
        assert_eq!(config.node_type(), NodeType::JSONataCondition);
        assert_eq!(
            config.params,
            NodeParams::JSONataCondition {
                stop_at_the_first_match: false
            }
        );
    }

    #[test]
    fn test_legacy_loop_type_name() {
        let json = r#"{"type": "BareboneLoop", "nodeId": "HLDHJ", "loopStartNodeId": "97TDT"}"#;
        let config: NodeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.kind(), NodeKind::Subroutine);
        assert_eq!(
            config.params,
            NodeParams::Loop {
                loop_start_node_id: Some(NodeId::from("97TDT"))
            }
        );
    }

    #[test]
    fn test_chat_completion_defaults() {
        let json = r#"{"type": "ChatGPTChatCompletionNode", "nodeId": "c1"}"#;
        let config: NodeConfig = serde_json::from_str(json).unwrap();
        match config.params {
            NodeParams::ChatGPTChatCompletionNode {
                model,
                temperature,
                seed,
                stop,
                ..
            } => {
                assert_eq!(model, "gpt-4");
                assert_eq!(temperature, 1.0);
                assert!(seed.is_none());
                assert!(stop.is_empty());
            }
            other => panic!("unexpected params: {:?}", other),
        }
    }

    #[test]
    fn test_kinds() {
        assert_eq!(NodeType::InputNode.kind(), NodeKind::Start);
        assert_eq!(NodeType::LoopStart.kind(), NodeKind::SubroutineStart);
        assert_eq!(NodeType::LoopFinish.kind(), NodeKind::Finish);
        assert_eq!(NodeType::TextTemplate.kind(), NodeKind::Process);
    }

    #[test]
    fn test_run_node_result_merge() {
        let mut acc = RunNodeResult::values(vec![serde_json::json!("He")]);
        acc.merge(RunNodeResult::values(vec![serde_json::json!("Hello")]));
        acc.merge(RunNodeResult::error("boom"));
        assert_eq!(acc.variable_values, Some(vec![serde_json::json!("Hello")]));
        assert_eq!(acc.errors, vec!["boom".to_string()]);
    }

    #[test]
    fn test_generated_node_id_len() {
        assert_eq!(NodeId::generate().as_str().len(), ID_SUFFIX_LEN);
    }
}
