//! Flow entry and exit nodes.

use playflow_core::{NodeConfig, NodeId, NodeParams, NodeTemplate, NodeType, RunNodeResult};

use crate::definition::{ready, NodeDefinition, NodeRunContext, NodeRunStream, TemplateBuilder};

/// Start node. Its output variables are seeded with the flow inputs.
pub struct InputNode;

impl NodeDefinition for InputNode {
    fn node_type(&self) -> NodeType {
        NodeType::InputNode
    }

    fn label(&self) -> &str {
        "Input"
    }

    fn create_default(&self, node_id: &NodeId) -> NodeTemplate {
        TemplateBuilder::new(node_id)
            .flow_input(0, "input")
            .condition(0, "")
            .build(NodeConfig::new(
                node_id.clone(),
                NodeParams::InputNode {
                    node_name: "input".to_string(),
                },
            ))
    }

    fn run(&self, context: NodeRunContext) -> NodeRunStream {
        ready(RunNodeResult::values(context.input_values))
    }
}

/// Finish node. Its input values become the run's flow outputs.
pub struct OutputNode;

impl NodeDefinition for OutputNode {
    fn node_type(&self) -> NodeType {
        NodeType::OutputNode
    }

    fn label(&self) -> &str {
        "Output"
    }

    fn can_user_add_incoming_variables(&self) -> bool {
        true
    }

    fn create_default(&self, node_id: &NodeId) -> NodeTemplate {
        TemplateBuilder::new(node_id)
            .flow_output(0, "output")
            .condition_target(0)
            .build(NodeConfig::new(node_id.clone(), NodeParams::OutputNode {}))
    }

    fn run(&self, context: NodeRunContext) -> NodeRunStream {
        ready(RunNodeResult::values(context.input_values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use playflow_core::{AccountSecrets, VariableConnector};
    use serde_json::json;

    #[tokio::test]
    async fn test_output_passes_inputs_through() {
        let node_id = NodeId::from("out");
        let context = NodeRunContext {
            node_config: NodeConfig::new(node_id.clone(), NodeParams::OutputNode {}),
            input_variables: vec![VariableConnector::new(&node_id, 0, "a")],
            input_values: vec![json!("done")],
            output_variables: vec![],
            outgoing_conditions: vec![],
            secrets: AccountSecrets::default(),
            prefer_streaming: false,
        };
        let results: Vec<RunNodeResult> = OutputNode.run(context).collect().await;
        assert_eq!(results, vec![RunNodeResult::values(vec![json!("done")])]);
    }
}
