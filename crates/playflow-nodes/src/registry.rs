use std::collections::HashMap;
use std::sync::Arc;

use playflow_core::traits::{ChatCompletionClient, InferenceClient, SpeechClient};
use playflow_core::{
    Connector, NodeId, NodeKind, NodeTemplate, NodeType, PlayflowError, Result,
};

use crate::definition::NodeDefinition;
use crate::nodes;

/// Clients handed to the integration nodes.
#[derive(Clone)]
pub struct IntegrationClients {
    pub chat: Arc<dyn ChatCompletionClient>,
    pub inference: Arc<dyn InferenceClient>,
    pub speech: Arc<dyn SpeechClient>,
}

/// Registry of node definitions, one per node type.
pub struct NodeRegistry {
    definitions: HashMap<NodeType, Arc<dyn NodeDefinition>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self {
            definitions: HashMap::new(),
        }
    }

    /// Register a definition, replacing any previous one for its type.
    pub fn register(&mut self, definition: impl NodeDefinition) {
        self.definitions
            .insert(definition.node_type(), Arc::new(definition));
    }

    pub fn get(&self, node_type: NodeType) -> Result<Arc<dyn NodeDefinition>> {
        self.definitions
            .get(&node_type)
            .cloned()
            .ok_or_else(|| PlayflowError::UnknownNodeType(node_type.to_string()))
    }

    /// Registered types in catalog order.
    pub fn list(&self) -> Vec<NodeType> {
        NodeType::ALL
            .iter()
            .copied()
            .filter(|t| self.definitions.contains_key(t))
            .collect()
    }

    /// Default node plus connectors for `node_type`, checked against the
    /// connector contract of its kind.
    pub fn create_default(&self, node_type: NodeType, node_id: &NodeId) -> Result<NodeTemplate> {
        let definition = self.get(node_type)?;
        let template = definition.create_default(node_id);
        check_connector_contract(&template)?;
        Ok(template)
    }

    /// Create a registry with every built-in node type registered.
    pub fn with_builtins(clients: IntegrationClients) -> Self {
        let mut registry = Self::new();

        // ── Flow boundaries ─────────────────────────────────────
        registry.register(nodes::InputNode);
        registry.register(nodes::OutputNode);

        // ── Branching ───────────────────────────────────────────
        registry.register(nodes::ConditionNode);
        registry.register(nodes::JsonataConditionNode);

        // ── Transforms ──────────────────────────────────────────
        registry.register(nodes::JavaScriptFunctionNode);
        registry.register(nodes::JsonataDataBuilderNode);
        registry.register(nodes::TextTemplateNode);
        registry.register(nodes::ConcatNode);

        // ── Loops ───────────────────────────────────────────────
        registry.register(nodes::LoopNode);
        registry.register(nodes::LoopStartNode);
        registry.register(nodes::LoopFinishNode);

        // ── Integrations ────────────────────────────────────────
        registry.register(nodes::ChatGptMessageNode);
        registry.register(nodes::ChatGptChatCompletionNode::new(clients.chat));
        registry.register(nodes::HuggingFaceInferenceNode::new(clients.inference));
        registry.register(nodes::ElevenLabsNode::new(clients.speech));

        registry
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Check that every node in `template` carries the connectors its kind needs.
///
/// Start nodes have outgoing conditions and no condition target. Process and
/// subroutine nodes have exactly one condition target and at least one
/// outgoing condition. Finish nodes have condition targets and no outgoing
/// conditions.
pub fn check_connector_contract(template: &NodeTemplate) -> Result<()> {
    for connector in &template.connectors {
        if !template
            .node_configs
            .iter()
            .any(|c| &c.node_id == connector.node_id())
        {
            return Err(PlayflowError::integrity(format!(
                "connector '{}' belongs to node '{}' outside the template",
                connector.id(),
                connector.node_id()
            )));
        }
    }

    for config in &template.node_configs {
        let owned: Vec<&Connector> = template
            .connectors
            .iter()
            .filter(|c| c.node_id() == &config.node_id)
            .collect();
        let targets = owned.iter().filter(|c| c.as_condition_target().is_some()).count();
        let conditions = owned.iter().filter(|c| c.as_condition().is_some()).count();

        let ok = match config.kind() {
            NodeKind::Start | NodeKind::SubroutineStart => targets == 0 && conditions >= 1,
            NodeKind::Process | NodeKind::Subroutine => targets == 1 && conditions >= 1,
            NodeKind::Finish => targets >= 1 && conditions == 0,
        };

        if !ok {
            return Err(PlayflowError::integrity(format!(
                "node '{}' ({}) has {} condition target(s) and {} outgoing condition(s)",
                config.node_id,
                config.node_type(),
                targets,
                conditions
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use futures::stream::BoxStream;
    use playflow_core::traits::{ChatCompletionRequest, ChatDelta};
    use playflow_core::{ChatGptMessage, ConditionConnector, NodeConfig, NodeParams};

    struct Unreachable;

    impl ChatCompletionClient for Unreachable {
        fn complete(&self, _: ChatCompletionRequest) -> BoxFuture<'_, Result<ChatGptMessage>> {
            Box::pin(async { Err(PlayflowError::LlmRequest("unreachable".into())) })
        }

        fn complete_stream(
            &self,
            _: ChatCompletionRequest,
        ) -> BoxFuture<'_, Result<BoxStream<'static, Result<ChatDelta>>>> {
            Box::pin(async { Err(PlayflowError::LlmRequest("unreachable".into())) })
        }
    }

    impl InferenceClient for Unreachable {
        fn infer(
            &self,
            _: &str,
            _: &str,
            _: serde_json::Value,
        ) -> BoxFuture<'_, Result<serde_json::Value>> {
            Box::pin(async { Err(PlayflowError::integration("huggingface", "unreachable")) })
        }
    }

    impl SpeechClient for Unreachable {
        fn text_to_speech(&self, _: &str, _: &str, _: &str) -> BoxFuture<'_, Result<Vec<u8>>> {
            Box::pin(async { Err(PlayflowError::integration("elevenlabs", "unreachable")) })
        }
    }

    fn registry() -> NodeRegistry {
        let client = Arc::new(Unreachable);
        NodeRegistry::with_builtins(IntegrationClients {
            chat: client.clone(),
            inference: client.clone(),
            speech: client,
        })
    }

    #[test]
    fn test_every_type_registered() {
        assert_eq!(registry().list(), NodeType::ALL.to_vec());
    }

    #[test]
    fn test_default_templates_satisfy_contract() {
        let registry = registry();
        for node_type in NodeType::ALL {
            let node_id = NodeId::generate();
            let template = registry.create_default(node_type, &node_id).unwrap();
            assert_eq!(template.node_configs[0].node_type(), node_type);
            for connector in &template.connectors {
                assert_eq!(connector.node_id(), &node_id);
                assert!(connector
                    .id()
                    .as_str()
                    .starts_with(&format!("{}/", node_id)));
            }
        }
    }

    #[test]
    fn test_user_addable_inputs() {
        let registry = registry();
        let addable: Vec<NodeType> = registry
            .list()
            .into_iter()
            .filter(|t| registry.get(*t).unwrap().can_user_add_incoming_variables())
            .collect();
        assert_eq!(
            addable,
            vec![
                NodeType::OutputNode,
                NodeType::JavaScriptFunctionNode,
                NodeType::JSONataDataBuilder,
                NodeType::Concat
            ]
        );
    }

    #[test]
    fn test_required_secrets() {
        let registry = registry();
        assert_eq!(
            registry
                .get(NodeType::ChatGPTChatCompletionNode)
                .unwrap()
                .required_secret(),
            Some(playflow_core::SecretKind::OpenAiApiKey)
        );
        assert!(registry.get(NodeType::TextTemplate).unwrap().required_secret().is_none());
    }

    #[test]
    fn test_data_builder_default() {
        let registry = registry();
        let node_id = NodeId::from("d");
        let template = registry
            .create_default(NodeType::JSONataDataBuilder, &node_id)
            .unwrap();
        assert!(matches!(
            &template.node_configs[0].params,
            NodeParams::JSONataDataBuilder { expression_string } if expression_string.contains("$.user_name")
        ));
        let outputs: Vec<_> = template
            .connectors
            .iter()
            .filter_map(|c| match c {
                Connector::NodeOutput(v) => Some(v.name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(outputs, vec!["output"]);
        assert_eq!(
            registry.get(NodeType::JSONataDataBuilder).unwrap().label(),
            "JSONata Data Builder"
        );
    }

    #[test]
    fn test_unknown_type() {
        let empty = NodeRegistry::new();
        assert!(matches!(
            empty.get(NodeType::Concat),
            Err(PlayflowError::UnknownNodeType(_))
        ));
    }

    #[test]
    fn test_contract_rejects_process_without_target() {
        let node_id = NodeId::from("x");
        let template = NodeTemplate {
            node_configs: vec![NodeConfig::new(node_id.clone(), NodeParams::Concat {})],
            connectors: vec![Connector::Condition(ConditionConnector::new(&node_id, 0, ""))],
        };
        assert!(check_connector_contract(&template).is_err());
    }
}
