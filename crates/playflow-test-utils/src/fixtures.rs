//! Ready-made flows shared by the runner and end-to-end tests.

use playflow_core::{FlowContent, NodeId, NodeParams};

use crate::builder::FlowBuilder;

/// Input `topic` -> TextTemplate "Hello {{topic}}!" -> Output `C/result`.
pub fn linear_flow() -> FlowContent {
    FlowBuilder::new()
        .node("A", NodeParams::InputNode { node_name: "input".into() })
        .flow_input("A", "topic", "topic")
        .condition("A", "go", 0, "")
        .node("B", NodeParams::TextTemplate { content: "Hello {{topic}}!".into() })
        .input("B", "topic", 0, "topic")
        .output("B", "content", 0, "content")
        .condition("B", "go", 0, "")
        .target("B", "in", 0)
        .node("C", NodeParams::OutputNode {})
        .flow_output("C", "result", "result")
        .target("C", "in", 0)
        .edge("A/topic", "B/topic")
        .edge("A/go", "B/in")
        .edge("B/content", "C/result")
        .edge("B/go", "C/in")
        .build()
}

/// Input `value` -> ConditionNode. `"Value A"` reaches Output X, `"Value B"`
/// reaches Output Y, anything else reaches Output D.
pub fn branch_flow() -> FlowContent {
    FlowBuilder::new()
        .node("A", NodeParams::InputNode { node_name: "input".into() })
        .flow_input("A", "value", "value")
        .condition("A", "go", 0, "")
        .node("K", NodeParams::ConditionNode { stop_at_the_first_match: true })
        .input("K", "input", 0, "input")
        .condition("K", "default", -1, "")
        .condition("K", "a", 0, r#"$ = "Value A""#)
        .condition("K", "b", 1, r#"$ = "Value B""#)
        .target("K", "in", 0)
        .node("X", NodeParams::OutputNode {})
        .flow_output("X", "out", "out")
        .target("X", "in", 0)
        .node("Y", NodeParams::OutputNode {})
        .flow_output("Y", "out", "out")
        .target("Y", "in", 0)
        .node("D", NodeParams::OutputNode {})
        .flow_output("D", "out", "out")
        .target("D", "in", 0)
        .edge("A/value", "K/input")
        .edge("A/go", "K/in")
        .edge("A/value", "X/out")
        .edge("A/value", "Y/out")
        .edge("A/value", "D/out")
        .edge("K/a", "X/in")
        .edge("K/b", "Y/in")
        .edge("K/default", "D/in")
        .build()
}

/// Input -> JavaScript node that throws -> Output `C/result`.
pub fn failing_flow() -> FlowContent {
    FlowBuilder::new()
        .node("A", NodeParams::InputNode { node_name: "input".into() })
        .flow_input("A", "x", "x")
        .condition("A", "go", 0, "")
        .node(
            "J",
            NodeParams::JavaScriptFunctionNode {
                java_script_code: r#"throw new Error("boom")"#.into(),
            },
        )
        .input("J", "x", 0, "x")
        .output("J", "output", 0, "output")
        .condition("J", "go", 0, "")
        .target("J", "in", 0)
        .node("C", NodeParams::OutputNode {})
        .flow_output("C", "result", "result")
        .target("C", "in", 0)
        .edge("A/x", "J/x")
        .edge("A/go", "J/in")
        .edge("J/output", "C/result")
        .edge("J/go", "C/in")
        .build()
}

/// Input `messages` -> ChatGPT chat completion -> Output `O/content`.
pub fn chat_flow() -> FlowContent {
    FlowBuilder::new()
        .node("A", NodeParams::InputNode { node_name: "input".into() })
        .flow_input("A", "messages", "messages")
        .condition("A", "go", 0, "")
        .node(
            "G",
            NodeParams::ChatGPTChatCompletionNode {
                model: "gpt-4".into(),
                temperature: 1.0,
                seed: None,
                response_format_type: None,
                stop: Vec::new(),
            },
        )
        .input("G", "messages_in", 0, "messages_in")
        .output("G", "content", 0, "content")
        .output("G", "message", 1, "message")
        .output("G", "messages_out", 2, "messages_out")
        .condition("G", "go", 0, "")
        .target("G", "in", 0)
        .node("O", NodeParams::OutputNode {})
        .flow_output("O", "content", "content")
        .target("O", "in", 0)
        .edge("A/messages", "G/messages_in")
        .edge("A/go", "G/in")
        .edge("G/content", "O/content")
        .edge("G/go", "O/in")
        .build()
}

/// A Loop node whose body increments the global `vbiQR` until it reaches 3,
/// then an Output node reads the global into `771RQ/tQ7Ul`.
pub fn loop_counter_flow() -> FlowContent {
    FlowBuilder::new()
        .node("OLdFn", NodeParams::InputNode { node_name: "input".into() })
        .condition("OLdFn", "NXJ2v", 0, "")
        .node(
            "HLDHJ",
            NodeParams::Loop {
                loop_start_node_id: Some(NodeId::from("97TDT")),
            },
        )
        .target("HLDHJ", "guI9U", 0)
        .condition("HLDHJ", "WwHBK", 0, "")
        .node("771RQ", NodeParams::OutputNode {})
        .flow_output("771RQ", "tQ7Ul", "count")
        .global("771RQ/tQ7Ul", "vbiQR")
        .target("771RQ", "Jg2y4", 0)
        .node("97TDT", NodeParams::LoopStart { node_name: "loop".into() })
        .condition("97TDT", "QO3qt", 0, "")
        .node(
            "vAG7s",
            NodeParams::JavaScriptFunctionNode {
                java_script_code: "i = i ?? 0\ni++\nreturn i".into(),
            },
        )
        .input("vAG7s", "2c81K", 0, "i")
        .global("vAG7s/2c81K", "vbiQR")
        .output("vAG7s", "output", 0, "output")
        .global("vAG7s/output", "vbiQR")
        .condition("vAG7s", "jopZe", 0, "")
        .target("vAG7s", "n4gXk", 0)
        .node("PR4rf", NodeParams::JSONataCondition { stop_at_the_first_match: true })
        .input("PR4rf", "input", 0, "input")
        .global("PR4rf/input", "vbiQR")
        .condition("PR4rf", "qVd56", -1, "")
        .condition("PR4rf", "nV4jC", 1, "$ < 3")
        .target("PR4rf", "VsMSq", 0)
        .node("G7bsz", NodeParams::LoopFinish {})
        .target("G7bsz", "XSKf8", 0)
        .target("G7bsz", "HJxkW", 1)
        .edge("OLdFn/NXJ2v", "HLDHJ/guI9U")
        .edge("HLDHJ/WwHBK", "771RQ/Jg2y4")
        .edge("97TDT/QO3qt", "vAG7s/n4gXk")
        .edge("vAG7s/jopZe", "PR4rf/VsMSq")
        .edge("PR4rf/nV4jC", "G7bsz/XSKf8")
        .edge("PR4rf/qVd56", "G7bsz/HJxkW")
        .build()
}

/// Two process nodes feeding each other, so the flow has no start node.
pub fn cyclic_flow() -> FlowContent {
    FlowBuilder::new()
        .node("P", NodeParams::TextTemplate { content: "{{q}}".into() })
        .input("P", "q", 0, "q")
        .output("P", "out", 0, "out")
        .condition("P", "go", 0, "")
        .target("P", "in", 0)
        .node("Q", NodeParams::TextTemplate { content: "{{p}}".into() })
        .input("Q", "p", 0, "p")
        .output("Q", "out", 0, "out")
        .condition("Q", "go", 0, "")
        .target("Q", "in", 0)
        .edge("P/out", "Q/p")
        .edge("Q/out", "P/q")
        .build()
}
