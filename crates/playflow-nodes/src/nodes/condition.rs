//! Branching nodes. Both types evaluate the same expression language; the
//! two tags exist for documents saved by different editor versions.

use serde_json::Value;
use tracing::debug;

use playflow_core::{
    ConditionConnector, ConditionResult, NodeConfig, NodeId, NodeParams, NodeTemplate, NodeType,
    RunNodeResult,
};

use crate::definition::{ready, NodeDefinition, NodeRunContext, NodeRunStream, TemplateBuilder};
use crate::expression::Expression;

pub struct ConditionNode;

pub struct JsonataConditionNode;

impl NodeDefinition for ConditionNode {
    fn node_type(&self) -> NodeType {
        NodeType::ConditionNode
    }

    fn label(&self) -> &str {
        "Condition"
    }

    fn create_default(&self, node_id: &NodeId) -> NodeTemplate {
        default_template(
            node_id,
            NodeParams::ConditionNode {
                stop_at_the_first_match: true,
            },
        )
    }

    fn run(&self, context: NodeRunContext) -> NodeRunStream {
        ready(run_conditions(&context))
    }
}

impl NodeDefinition for JsonataConditionNode {
    fn node_type(&self) -> NodeType {
        NodeType::JSONataCondition
    }

    fn label(&self) -> &str {
        "JSONata Condition"
    }

    fn create_default(&self, node_id: &NodeId) -> NodeTemplate {
        default_template(
            node_id,
            NodeParams::JSONataCondition {
                stop_at_the_first_match: true,
            },
        )
    }

    fn run(&self, context: NodeRunContext) -> NodeRunStream {
        ready(run_conditions(&context))
    }
}

fn default_template(node_id: &NodeId, params: NodeParams) -> NodeTemplate {
    TemplateBuilder::new(node_id)
        .node_input(0, "input")
        .condition(-1, "")
        .condition(0, r#"$ = "Value A""#)
        .condition(1, r#"$ = "Value B""#)
        .condition_target(0)
        .build(NodeConfig::new(node_id.clone(), params))
}

fn run_conditions(context: &NodeRunContext) -> RunNodeResult {
    let stop_at_the_first_match = match context.node_config.params {
        NodeParams::ConditionNode {
            stop_at_the_first_match,
        }
        | NodeParams::JSONataCondition {
            stop_at_the_first_match,
        } => stop_at_the_first_match,
        _ => true,
    };

    match evaluate_conditions(
        &context.outgoing_conditions,
        &context.first_input(),
        stop_at_the_first_match,
    ) {
        Ok(results) => RunNodeResult::conditions(results),
        Err(message) => RunNodeResult::error(message),
    }
}

/// One result per condition, in the given order. `conditions` must be sorted
/// by index so the default case comes first; it matches only when no custom
/// case does.
pub fn evaluate_conditions(
    conditions: &[ConditionConnector],
    input: &Value,
    stop_at_the_first_match: bool,
) -> Result<Vec<ConditionResult>, String> {
    let Some((default_case, custom_cases)) = conditions.split_first() else {
        return Err("Condition node has no outgoing conditions".to_string());
    };
    if !default_case.is_default_case() {
        return Err("Condition node is missing its default case".to_string());
    }

    let mut results = Vec::with_capacity(conditions.len());
    let mut has_match = false;

    for condition in custom_cases {
        if has_match && stop_at_the_first_match {
            results.push(ConditionResult::matched(false));
            continue;
        }

        let matched = Expression::parse(&condition.expression_string)
            .and_then(|e| e.matches(input))
            .map_err(|e| e.to_string())?;

        debug!(
            condition_id = %condition.id,
            expression = %condition.expression_string,
            matched,
            "Evaluated condition"
        );

        has_match |= matched;
        results.push(ConditionResult::matched(matched));
    }

    results.insert(0, ConditionResult::matched(!has_match));
    Ok(results)
}
