//! Structured data built from a node's inputs.

use serde_json::Value;
use tracing::debug;

use playflow_core::{
    NodeConfig, NodeId, NodeParams, NodeTemplate, NodeType, RunNodeResult, VariableValueType,
};

use crate::definition::{ready, NodeDefinition, NodeRunContext, NodeRunStream, TemplateBuilder};
use crate::expression::Expression;

pub const DEFAULT_EXPRESSION: &str = "{\n  \"name\": $.user_name\n}";

/// Evaluates its expression with the named inputs bound to `$`.
pub struct JsonataDataBuilderNode;

impl NodeDefinition for JsonataDataBuilderNode {
    fn node_type(&self) -> NodeType {
        NodeType::JSONataDataBuilder
    }

    fn label(&self) -> &str {
        "JSONata Data Builder"
    }

    fn can_user_add_incoming_variables(&self) -> bool {
        true
    }

    fn create_default(&self, node_id: &NodeId) -> NodeTemplate {
        TemplateBuilder::new(node_id)
            .node_input(0, "user_name")
            .node_output(0, "output", VariableValueType::Structured)
            .condition(0, "")
            .condition_target(0)
            .build(NodeConfig::new(
                node_id.clone(),
                NodeParams::JSONataDataBuilder {
                    expression_string: DEFAULT_EXPRESSION.to_string(),
                },
            ))
    }

    fn run(&self, context: NodeRunContext) -> NodeRunStream {
        let NodeParams::JSONataDataBuilder { expression_string } = &context.node_config.params
        else {
            return ready(RunNodeResult::error("Node config is not a data builder"));
        };
        let input = Value::Object(context.named_inputs());
        debug!(node_id = %context.node_id(), expression = %expression_string, "Building data");

        ready(match build_data(expression_string, &input) {
            Ok(value) => RunNodeResult::values(vec![value]),
            Err(message) => RunNodeResult::error(message),
        })
    }
}

/// Undefined results become `null`.
pub fn build_data(expression: &str, input: &Value) -> Result<Value, String> {
    Expression::parse(expression)
        .and_then(|e| e.evaluate(input))
        .map(|value| value.unwrap_or(Value::Null))
        .map_err(|e| e.to_string())
}
