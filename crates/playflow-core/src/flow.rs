use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::connector::{
    ConditionConnector, ConditionTargetConnector, Connector, ConnectorType, VariableConnector,
};
use crate::error::{PlayflowError, Result};
use crate::types::{ConnectorId, Edge, NodeConfig, NodeId, NodeTemplate};

pub type NodeConfigMap = BTreeMap<NodeId, NodeConfig>;
pub type ConnectorMap = HashMap<ConnectorId, Connector>;

/// The node, connector, and edge sets of a flow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowContent {
    #[serde(default)]
    pub node_configs: NodeConfigMap,
    #[serde(default)]
    pub connectors: ConnectorMap,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl FlowContent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert every node and connector from a node template.
    pub fn add_template(&mut self, template: NodeTemplate) {
        for config in template.node_configs {
            self.node_configs.insert(config.node_id.clone(), config);
        }
        for connector in template.connectors {
            self.connectors.insert(connector.id().clone(), connector);
        }
    }

    /// Remove a node with its owned connectors and incident edges.
    pub fn remove_node(&mut self, node_id: &NodeId) -> Option<NodeConfig> {
        let removed = self.node_configs.remove(node_id)?;
        self.connectors.retain(|_, c| c.node_id() != node_id);
        self.edges
            .retain(|e| &e.source != node_id && &e.target != node_id);
        Some(removed)
    }

    pub fn add_edge(&mut self, edge: Edge) {
        self.edges.push(edge);
    }

    pub fn connector(&self, id: &ConnectorId) -> Option<&Connector> {
        self.connectors.get(id)
    }

    pub fn node_connectors<'a>(&'a self, node_id: &NodeId) -> impl Iterator<Item = &'a Connector> + 'a {
        let node_id = node_id.clone();
        self.connectors.values().filter(move |c| c.node_id() == &node_id)
    }

    /// Variables the node reads, ordered by index.
    pub fn input_variables(&self, node_id: &NodeId) -> Vec<&VariableConnector> {
        let mut vars: Vec<&VariableConnector> = self
            .node_connectors(node_id)
            .filter_map(|c| match c {
                Connector::NodeInput(v) | Connector::FlowOutput(v) => Some(v),
                _ => None,
            })
            .collect();
        vars.sort_by(|a, b| a.index.cmp(&b.index).then_with(|| a.id.cmp(&b.id)));
        vars
    }

    /// Variables the node writes, ordered by index.
    pub fn output_variables(&self, node_id: &NodeId) -> Vec<&VariableConnector> {
        let mut vars: Vec<&VariableConnector> = self
            .node_connectors(node_id)
            .filter_map(|c| match c {
                Connector::NodeOutput(v) | Connector::FlowInput(v) => Some(v),
                _ => None,
            })
            .collect();
        vars.sort_by(|a, b| a.index.cmp(&b.index).then_with(|| a.id.cmp(&b.id)));
        vars
    }

    /// Outgoing conditions ordered by index; the default case (-1) comes first.
    pub fn outgoing_conditions(&self, node_id: &NodeId) -> Vec<&ConditionConnector> {
        let mut conditions: Vec<&ConditionConnector> = self
            .node_connectors(node_id)
            .filter_map(|c| c.as_condition())
            .collect();
        conditions.sort_by(|a, b| a.index.cmp(&b.index).then_with(|| a.id.cmp(&b.id)));
        conditions
    }

    pub fn condition_targets(&self, node_id: &NodeId) -> Vec<&ConditionTargetConnector> {
        let mut targets: Vec<&ConditionTargetConnector> = self
            .node_connectors(node_id)
            .filter_map(|c| c.as_condition_target())
            .collect();
        targets.sort_by(|a, b| a.index.cmp(&b.index).then_with(|| a.id.cmp(&b.id)));
        targets
    }

    /// Verify the connector and edge invariants. Any violation means the flow
    /// document is corrupted.
    pub fn check_integrity(&self) -> Result<()> {
        for (id, connector) in &self.connectors {
            if id != connector.id() {
                return Err(PlayflowError::integrity(format!(
                    "connector stored under '{}' has id '{}'",
                    id,
                    connector.id()
                )));
            }
            if !self.node_configs.contains_key(connector.node_id()) {
                return Err(PlayflowError::integrity(format!(
                    "connector '{}' references missing node '{}'",
                    id,
                    connector.node_id()
                )));
            }
        }

        for edge in &self.edges {
            self.check_edge(edge)?;
        }

        Ok(())
    }

    fn check_edge(&self, edge: &Edge) -> Result<()> {
        for node_id in [&edge.source, &edge.target] {
            if !self.node_configs.contains_key(node_id) {
                return Err(PlayflowError::integrity(format!(
                    "edge '{}' references missing node '{}'",
                    edge.id, node_id
                )));
            }
        }

        let source = self.connectors.get(&edge.source_handle).ok_or_else(|| {
            PlayflowError::integrity(format!(
                "edge '{}' references missing source connector '{}'",
                edge.id, edge.source_handle
            ))
        })?;
        let target = self.connectors.get(&edge.target_handle).ok_or_else(|| {
            PlayflowError::integrity(format!(
                "edge '{}' references missing target connector '{}'",
                edge.id, edge.target_handle
            ))
        })?;

        if source.node_id() != &edge.source || !source.is_output_capable() {
            return Err(PlayflowError::integrity(format!(
                "edge '{}' source '{}' is not an output of node '{}'",
                edge.id, edge.source_handle, edge.source
            )));
        }
        if target.node_id() != &edge.target || !target.is_input_capable() {
            return Err(PlayflowError::integrity(format!(
                "edge '{}' target '{}' is not an input of node '{}'",
                edge.id, edge.target_handle, edge.target
            )));
        }

        let compatible = match source.connector_type() {
            ConnectorType::Condition => target.connector_type() == ConnectorType::ConditionTarget,
            _ => target.is_variable(),
        };
        if !compatible {
            return Err(PlayflowError::integrity(format!(
                "edge '{}' connects {:?} to {:?}",
                edge.id,
                source.connector_type(),
                target.connector_type()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeParams;

    fn two_node_flow() -> (FlowContent, ConnectorId, ConnectorId, ConnectorId, ConnectorId) {
        let a = NodeId::from("a");
        let b = NodeId::from("b");
        let mut flow = FlowContent::new();

        let out = VariableConnector::new(&a, 0, "out");
        let cond = ConditionConnector::new(&a, 0, "");
        let input = VariableConnector::new(&b, 0, "in");
        let target = ConditionTargetConnector::new(&b);
        let ids = (
            out.id.clone(),
            cond.id.clone(),
            input.id.clone(),
            target.id.clone(),
        );

        flow.add_template(NodeTemplate {
            node_configs: vec![
                NodeConfig::new(a, NodeParams::InputNode { node_name: "in".into() }),
                NodeConfig::new(b, NodeParams::Concat {}),
            ],
            connectors: vec![
                Connector::FlowInput(out),
                Connector::Condition(cond),
                Connector::NodeInput(input),
                Connector::ConditionTarget(target),
            ],
        });

        (flow, ids.0, ids.1, ids.2, ids.3)
    }

    #[test]
    fn test_valid_edges_pass() {
        let (mut flow, out, cond, input, target) = two_node_flow();
        flow.add_edge(Edge::new("a", out, "b", input));
        flow.add_edge(Edge::new("a", cond, "b", target));
        assert!(flow.check_integrity().is_ok());
    }

    #[test]
    fn test_condition_to_variable_rejected() {
        let (mut flow, _, cond, input, _) = two_node_flow();
        flow.add_edge(Edge::new("a", cond, "b", input));
        let err = flow.check_integrity().unwrap_err();
        assert!(matches!(err, PlayflowError::Integrity(_)));
    }

    #[test]
    fn test_reversed_edge_rejected() {
        let (mut flow, out, _, input, _) = two_node_flow();
        flow.add_edge(Edge::new("b", input, "a", out));
        assert!(flow.check_integrity().is_err());
    }

    #[test]
    fn test_dangling_connector_rejected() {
        let (mut flow, out, _, _, _) = two_node_flow();
        flow.add_edge(Edge::new("a", out, "b", ConnectorId::from("b/missing")));
        assert!(flow.check_integrity().is_err());
    }

    #[test]
    fn test_remove_node_cascades() {
        let (mut flow, out, cond, input, target) = two_node_flow();
        flow.add_edge(Edge::new("a", out, "b", input));
        flow.add_edge(Edge::new("a", cond, "b", target));
        flow.remove_node(&NodeId::from("b"));
        assert!(flow.edges.is_empty());
        assert!(flow.connectors.values().all(|c| c.node_id().as_str() == "a"));
        assert!(flow.check_integrity().is_ok());
    }

    #[test]
    fn test_connector_queries_outlive_node_id() {
        let (flow, out, cond, input, target) = two_node_flow();

        let (inputs, outputs, conditions, targets) = {
            let a = NodeId::from("a");
            let b = NodeId::from("b");
            (
                flow.input_variables(&b),
                flow.output_variables(&a),
                flow.outgoing_conditions(&a),
                flow.condition_targets(&b),
            )
        };

        assert_eq!(inputs.iter().map(|v| &v.id).collect::<Vec<_>>(), vec![&input]);
        assert_eq!(outputs.iter().map(|v| &v.id).collect::<Vec<_>>(), vec![&out]);
        assert_eq!(conditions.iter().map(|c| &c.id).collect::<Vec<_>>(), vec![&cond]);
        assert_eq!(targets.iter().map(|t| &t.id).collect::<Vec<_>>(), vec![&target]);
        assert_eq!(flow.node_connectors(&NodeId::from("b")).count(), 2);
    }

    #[test]
    fn test_default_condition_sorted_first() {
        let a = NodeId::from("a");
        let mut flow = FlowContent::new();
        flow.add_template(NodeTemplate {
            node_configs: vec![NodeConfig::new(
                a.clone(),
                NodeParams::ConditionNode {
                    stop_at_the_first_match: true,
                },
            )],
            connectors: vec![
                Connector::Condition(ConditionConnector::new(&a, 1, "$ = 2")),
                Connector::Condition(ConditionConnector::new(&a, -1, "")),
                Connector::Condition(ConditionConnector::new(&a, 0, "$ = 1")),
            ],
        });
        let indexes: Vec<i32> = flow.outgoing_conditions(&a).iter().map(|c| c.index).collect();
        assert_eq!(indexes, vec![-1, 0, 1]);
    }
}
