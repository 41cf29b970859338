//! Loop nodes. The executor drives iteration; these definitions only shape
//! the connectors.

use playflow_core::{NodeConfig, NodeId, NodeParams, NodeTemplate, NodeType, RunNodeResult};

use crate::definition::{ready, NodeDefinition, NodeRunContext, NodeRunStream, TemplateBuilder};

pub const LOOP_CONTINUE_TARGET_INDEX: i32 = 0;
pub const LOOP_BREAK_TARGET_INDEX: i32 = 1;

/// Runs the partition seeded by its LoopStart until LoopFinish breaks.
pub struct LoopNode;

impl NodeDefinition for LoopNode {
    fn node_type(&self) -> NodeType {
        NodeType::Loop
    }

    fn label(&self) -> &str {
        "Loop"
    }

    fn create_default(&self, node_id: &NodeId) -> NodeTemplate {
        TemplateBuilder::new(node_id)
            .condition(0, "")
            .condition_target(0)
            .build(NodeConfig::new(
                node_id.clone(),
                NodeParams::Loop {
                    loop_start_node_id: None,
                },
            ))
    }

    fn run(&self, _context: NodeRunContext) -> NodeRunStream {
        ready(RunNodeResult::error(
            "Loop nodes can only run inside a flow executor",
        ))
    }
}

pub struct LoopStartNode;

impl NodeDefinition for LoopStartNode {
    fn node_type(&self) -> NodeType {
        NodeType::LoopStart
    }

    fn label(&self) -> &str {
        "Loop Start"
    }

    fn create_default(&self, node_id: &NodeId) -> NodeTemplate {
        TemplateBuilder::new(node_id)
            .condition(0, "")
            .build(NodeConfig::new(
                node_id.clone(),
                NodeParams::LoopStart {
                    node_name: "loop start 1".to_string(),
                },
            ))
    }

    fn run(&self, context: NodeRunContext) -> NodeRunStream {
        ready(RunNodeResult::values(context.input_values))
    }
}

/// Two condition targets: continue (index 0) and break (index 1).
pub struct LoopFinishNode;

impl NodeDefinition for LoopFinishNode {
    fn node_type(&self) -> NodeType {
        NodeType::LoopFinish
    }

    fn label(&self) -> &str {
        "Loop Finish"
    }

    fn create_default(&self, node_id: &NodeId) -> NodeTemplate {
        TemplateBuilder::new(node_id)
            .condition_target(LOOP_CONTINUE_TARGET_INDEX)
            .condition_target(LOOP_BREAK_TARGET_INDEX)
            .build(NodeConfig::new(node_id.clone(), NodeParams::LoopFinish {}))
    }

    fn run(&self, _context: NodeRunContext) -> NodeRunStream {
        ready(RunNodeResult::empty())
    }
}
