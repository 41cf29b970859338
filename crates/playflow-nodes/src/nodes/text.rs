//! Text nodes: template rendering and concatenation.

use minijinja::Environment;
use serde_json::Value;

use playflow_core::{
    NodeConfig, NodeId, NodeParams, NodeTemplate, NodeType, RunNodeResult, VariableValueType,
};

use crate::definition::{ready, NodeDefinition, NodeRunContext, NodeRunStream, TemplateBuilder};

pub const DEFAULT_TEMPLATE: &str = "Write a poem about {{topic}} in fewer than 20 words.";

pub struct TextTemplateNode;

impl NodeDefinition for TextTemplateNode {
    fn node_type(&self) -> NodeType {
        NodeType::TextTemplate
    }

    fn label(&self) -> &str {
        "Text"
    }

    fn create_default(&self, node_id: &NodeId) -> NodeTemplate {
        TemplateBuilder::new(node_id)
            .node_input(0, "topic")
            .node_output(0, "content", VariableValueType::String)
            .condition(0, "")
            .condition_target(0)
            .build(NodeConfig::new(
                node_id.clone(),
                NodeParams::TextTemplate {
                    content: DEFAULT_TEMPLATE.to_string(),
                },
            ))
    }

    fn run(&self, context: NodeRunContext) -> NodeRunStream {
        let NodeParams::TextTemplate { content } = &context.node_config.params else {
            return ready(RunNodeResult::error("Node config is not a text template"));
        };
        ready(match render_template(content, &context.named_inputs()) {
            Ok(text) => RunNodeResult::values(vec![Value::String(text)]),
            Err(message) => RunNodeResult::error(message),
        })
    }
}

/// Render `{{name}}` placeholders. Unknown names render as empty.
pub fn render_template(
    template: &str,
    values: &serde_json::Map<String, Value>,
) -> Result<String, String> {
    let env = Environment::new();
    env.render_str(template, minijinja::Value::from_serialize(values))
        .map_err(|e| e.to_string())
}

pub struct ConcatNode;

impl NodeDefinition for ConcatNode {
    fn node_type(&self) -> NodeType {
        NodeType::Concat
    }

    fn label(&self) -> &str {
        "Concatenate"
    }

    fn can_user_add_incoming_variables(&self) -> bool {
        true
    }

    fn create_default(&self, node_id: &NodeId) -> NodeTemplate {
        TemplateBuilder::new(node_id)
            .node_input(0, "input1")
            .node_output(0, "result", VariableValueType::Any)
            .condition(0, "")
            .condition_target(0)
            .build(NodeConfig::new(node_id.clone(), NodeParams::Concat {}))
    }

    fn run(&self, context: NodeRunContext) -> NodeRunStream {
        ready(match concat_values(&context.input_values) {
            Ok(value) => RunNodeResult::values(vec![value]),
            Err(message) => RunNodeResult::error(message),
        })
    }
}

/// Flatten arrays or join strings. Mixed inputs are rejected.
pub fn concat_values(values: &[Value]) -> Result<Value, String> {
    if values.iter().all(Value::is_array) {
        let flat = values
            .iter()
            .filter_map(Value::as_array)
            .flat_map(|items| items.iter().cloned())
            .collect();
        return Ok(Value::Array(flat));
    }
    if values.iter().all(Value::is_string) {
        let joined: String = values.iter().filter_map(Value::as_str).collect();
        return Ok(Value::String(joined));
    }
    Err("All inputs must be either arrays or strings".to_string())
}
