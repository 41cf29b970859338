//! Connector model.
//!
//! A connector is a typed attachment point owned by exactly one node. Variable
//! connectors carry values between nodes; condition connectors carry control
//! flow. Edges always run from an output-capable connector to an
//! input-capable one.

use serde::{Deserialize, Serialize};

use crate::types::{ConnectorId, NodeId};

/// Declared value type of a variable connector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariableValueType {
    String,
    Number,
    Boolean,
    Object,
    Array,
    Audio,
    Structured,
    Any,
    #[default]
    Unknown,
}

/// Flow input/output and node input/output variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableConnector {
    pub id: ConnectorId,
    pub node_id: NodeId,
    #[serde(default)]
    pub index: i32,
    pub name: String,
    #[serde(default)]
    pub value_type: VariableValueType,
    /// Shared slot this variable reads and writes instead of its own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_variable_id: Option<String>,
}

impl VariableConnector {
    pub fn new(node_id: &NodeId, index: i32, name: impl Into<String>) -> Self {
        Self {
            id: ConnectorId::generate(node_id),
            node_id: node_id.clone(),
            index,
            name: name.into(),
            value_type: VariableValueType::Unknown,
            global_variable_id: None,
        }
    }

    /// Use a fixed `${nodeId}/${suffix}` id instead of a random one.
    pub fn with_suffix(mut self, suffix: &str) -> Self {
        self.id = ConnectorId::scoped(&self.node_id, suffix);
        self
    }

    pub fn with_value_type(mut self, value_type: VariableValueType) -> Self {
        self.value_type = value_type;
        self
    }
}

/// Outgoing condition. Index `-1` is the reserved default case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionConnector {
    pub id: ConnectorId,
    pub node_id: NodeId,
    #[serde(default)]
    pub index: i32,
    #[serde(default)]
    pub expression_string: String,
}

pub const DEFAULT_CASE_INDEX: i32 = -1;

impl ConditionConnector {
    pub fn new(node_id: &NodeId, index: i32, expression: impl Into<String>) -> Self {
        Self {
            id: ConnectorId::generate(node_id),
            node_id: node_id.clone(),
            index,
            expression_string: expression.into(),
        }
    }

    pub fn is_default_case(&self) -> bool {
        self.index == DEFAULT_CASE_INDEX
    }
}

/// Incoming condition entry point of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionTargetConnector {
    pub id: ConnectorId,
    pub node_id: NodeId,
    /// Only meaningful on nodes with several targets (LoopFinish).
    #[serde(default)]
    pub index: i32,
}

impl ConditionTargetConnector {
    pub fn new(node_id: &NodeId) -> Self {
        Self {
            id: ConnectorId::generate(node_id),
            node_id: node_id.clone(),
            index: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectorType {
    FlowInput,
    FlowOutput,
    NodeInput,
    NodeOutput,
    Condition,
    ConditionTarget,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Connector {
    FlowInput(VariableConnector),
    FlowOutput(VariableConnector),
    NodeInput(VariableConnector),
    NodeOutput(VariableConnector),
    #[serde(alias = "OutCondition")]
    Condition(ConditionConnector),
    #[serde(alias = "InCondition")]
    ConditionTarget(ConditionTargetConnector),
}

impl Connector {
    pub fn id(&self) -> &ConnectorId {
        match self {
            Self::FlowInput(v) | Self::FlowOutput(v) | Self::NodeInput(v) | Self::NodeOutput(v) => {
                &v.id
            }
            Self::Condition(c) => &c.id,
            Self::ConditionTarget(t) => &t.id,
        }
    }

    pub fn node_id(&self) -> &NodeId {
        match self {
            Self::FlowInput(v) | Self::FlowOutput(v) | Self::NodeInput(v) | Self::NodeOutput(v) => {
                &v.node_id
            }
            Self::Condition(c) => &c.node_id,
            Self::ConditionTarget(t) => &t.node_id,
        }
    }

    pub fn index(&self) -> i32 {
        match self {
            Self::FlowInput(v) | Self::FlowOutput(v) | Self::NodeInput(v) | Self::NodeOutput(v) => {
                v.index
            }
            Self::Condition(c) => c.index,
            Self::ConditionTarget(t) => t.index,
        }
    }

    pub fn connector_type(&self) -> ConnectorType {
        match self {
            Self::FlowInput(_) => ConnectorType::FlowInput,
            Self::FlowOutput(_) => ConnectorType::FlowOutput,
            Self::NodeInput(_) => ConnectorType::NodeInput,
            Self::NodeOutput(_) => ConnectorType::NodeOutput,
            Self::Condition(_) => ConnectorType::Condition,
            Self::ConditionTarget(_) => ConnectorType::ConditionTarget,
        }
    }

    pub fn is_variable(&self) -> bool {
        self.as_variable().is_some()
    }

    pub fn is_condition(&self) -> bool {
        matches!(self, Self::Condition(_) | Self::ConditionTarget(_))
    }

    /// Can appear as the `sourceHandle` of an edge.
    pub fn is_output_capable(&self) -> bool {
        matches!(self, Self::FlowInput(_) | Self::NodeOutput(_) | Self::Condition(_))
    }

    /// Can appear as the `targetHandle` of an edge.
    pub fn is_input_capable(&self) -> bool {
        matches!(
            self,
            Self::FlowOutput(_) | Self::NodeInput(_) | Self::ConditionTarget(_)
        )
    }

    pub fn as_variable(&self) -> Option<&VariableConnector> {
        match self {
            Self::FlowInput(v) | Self::FlowOutput(v) | Self::NodeInput(v) | Self::NodeOutput(v) => {
                Some(v)
            }
            _ => None,
        }
    }

    pub fn as_condition(&self) -> Option<&ConditionConnector> {
        match self {
            Self::Condition(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_condition_target(&self) -> Option<&ConditionTargetConnector> {
        match self {
            Self::ConditionTarget(t) => Some(t),
            _ => None,
        }
    }
}

pub fn is_variable_connector(connector: &Connector) -> bool {
    connector.is_variable()
}

pub fn is_condition_connector(connector: &Connector) -> bool {
    connector.is_condition()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_legacy_condition_tags() {
        let json = r#"[
            {"type": "OutCondition", "id": "a/x", "nodeId": "a", "index": -1, "expressionString": ""},
            {"type": "InCondition", "id": "b/y", "nodeId": "b"}
        ]"#;
        let connectors: Vec<Connector> = serde_json::from_str(json).unwrap();
        assert_eq!(connectors[0].connector_type(), ConnectorType::Condition);
        assert!(connectors[0].as_condition().unwrap().is_default_case());
        assert_eq!(connectors[1].connector_type(), ConnectorType::ConditionTarget);
    }

    #[test]
    fn test_deserialize_global_variable() {
        let json = r#"{
            "type": "NodeInput", "id": "n/i", "nodeId": "n", "name": "i",
            "valueType": "Any", "isGlobal": true, "globalVariableId": "g1"
        }"#;
        let connector: Connector = serde_json::from_str(json).unwrap();
        let variable = connector.as_variable().unwrap();
        assert_eq!(variable.global_variable_id.as_deref(), Some("g1"));
        assert_eq!(variable.value_type, VariableValueType::Any);
        assert_eq!(variable.index, 0);
    }

    #[test]
    fn test_capabilities() {
        let node = NodeId::from("n");
        let output = Connector::NodeOutput(VariableConnector::new(&node, 0, "out"));
        let input = Connector::NodeInput(VariableConnector::new(&node, 0, "in"));
        let condition = Connector::Condition(ConditionConnector::new(&node, 0, ""));
        let target = Connector::ConditionTarget(ConditionTargetConnector::new(&node));

        assert!(output.is_output_capable() && !output.is_input_capable());
        assert!(input.is_input_capable() && !input.is_output_capable());
        assert!(condition.is_output_capable() && is_condition_connector(&condition));
        assert!(target.is_input_capable() && !is_variable_connector(&target));
        assert!(is_variable_connector(&output));
    }

    #[test]
    fn test_generated_ids_are_node_scoped() {
        let node = NodeId::from("abc12");
        let variable = VariableConnector::new(&node, 0, "topic");
        assert!(variable.id.as_str().starts_with("abc12/"));
        let fixed = variable.with_suffix("content");
        assert_eq!(fixed.id.as_str(), "abc12/content");
    }
}
