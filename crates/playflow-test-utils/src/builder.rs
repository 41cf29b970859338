use playflow_core::{
    ConditionConnector, ConditionTargetConnector, Connector, ConnectorId, Edge, FlowContent,
    NodeConfig, NodeId, NodeParams, VariableConnector,
};

/// Builds flow content with readable `node/suffix` connector ids.
#[derive(Debug, Default)]
pub struct FlowBuilder {
    content: FlowContent,
}

impl FlowBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(mut self, node_id: &str, params: NodeParams) -> Self {
        let node_id = NodeId::from(node_id);
        self.content
            .node_configs
            .insert(node_id.clone(), NodeConfig::new(node_id, params));
        self
    }

    pub fn flow_input(self, node_id: &str, suffix: &str, name: &str) -> Self {
        let variable = variable(node_id, suffix, name);
        self.connector(Connector::FlowInput(variable))
    }

    pub fn flow_output(self, node_id: &str, suffix: &str, name: &str) -> Self {
        let variable = variable(node_id, suffix, name);
        self.connector(Connector::FlowOutput(variable))
    }

    pub fn input(self, node_id: &str, suffix: &str, index: i32, name: &str) -> Self {
        let mut variable = variable(node_id, suffix, name);
        variable.index = index;
        self.connector(Connector::NodeInput(variable))
    }

    pub fn output(self, node_id: &str, suffix: &str, index: i32, name: &str) -> Self {
        let mut variable = variable(node_id, suffix, name);
        variable.index = index;
        self.connector(Connector::NodeOutput(variable))
    }

    pub fn condition(self, node_id: &str, suffix: &str, index: i32, expression: &str) -> Self {
        let node_id = NodeId::from(node_id);
        let mut condition = ConditionConnector::new(&node_id, index, expression);
        condition.id = ConnectorId::scoped(&node_id, suffix);
        self.connector(Connector::Condition(condition))
    }

    pub fn target(self, node_id: &str, suffix: &str, index: i32) -> Self {
        let node_id = NodeId::from(node_id);
        let mut target = ConditionTargetConnector::new(&node_id);
        target.id = ConnectorId::scoped(&node_id, suffix);
        target.index = index;
        self.connector(Connector::ConditionTarget(target))
    }

    /// Bind an existing variable connector to a global slot.
    pub fn global(mut self, connector_id: &str, global_id: &str) -> Self {
        match self.content.connectors.get_mut(connector_id) {
            Some(
                Connector::FlowInput(v)
                | Connector::FlowOutput(v)
                | Connector::NodeInput(v)
                | Connector::NodeOutput(v),
            ) => v.global_variable_id = Some(global_id.to_string()),
            _ => panic!("no variable connector '{}'", connector_id),
        }
        self
    }

    /// Connect two `node/suffix` handles.
    pub fn edge(mut self, source_handle: &str, target_handle: &str) -> Self {
        self.content.add_edge(Edge::new(
            owner(source_handle),
            source_handle,
            owner(target_handle),
            target_handle,
        ));
        self
    }

    pub fn build(self) -> FlowContent {
        self.content
    }

    fn connector(mut self, connector: Connector) -> Self {
        self.content
            .connectors
            .insert(connector.id().clone(), connector);
        self
    }
}

fn variable(node_id: &str, suffix: &str, name: &str) -> VariableConnector {
    VariableConnector::new(&NodeId::from(node_id), 0, name).with_suffix(suffix)
}

fn owner(handle: &str) -> &str {
    handle.split('/').next().unwrap_or(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_ids_and_edges() {
        let content = FlowBuilder::new()
            .node("A", NodeParams::InputNode { node_name: "in".into() })
            .flow_input("A", "x", "x")
            .condition("A", "go", 0, "")
            .node("B", NodeParams::OutputNode {})
            .flow_output("B", "y", "y")
            .target("B", "in", 0)
            .global("B/y", "shared")
            .edge("A/x", "B/y")
            .edge("A/go", "B/in")
            .build();

        assert!(content.check_integrity().is_ok());
        assert_eq!(content.edges[0].source, NodeId::from("A"));
        assert_eq!(content.edges[0].target, NodeId::from("B"));
        let y = content.connector(&ConnectorId::from("B/y")).unwrap();
        assert_eq!(
            y.as_variable().unwrap().global_variable_id.as_deref(),
            Some("shared")
        );
    }
}
