//! Pre-run checks. Validation never stops a run by itself; the executor
//! aborts only on cycles.

use std::collections::BTreeSet;

use serde::Serialize;

use playflow_core::{AccountSecrets, FlowContent, NodeId, NodeType, SecretKind};
use playflow_graph::{compute_graphs, ComputedGraphs, GraphTraverseError, ROOT_GRAPH_ID};
use playflow_nodes::NodeRegistry;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ValidationError {
    /// A node type in the flow needs an account secret that is not set.
    AccountLevel {
        node_type: NodeType,
        secret: SecretKind,
        message: String,
    },
    FlowLevel { message: String },
    NodeLevel { node_id: NodeId, message: String },
}

impl ValidationError {
    pub fn message(&self) -> &str {
        match self {
            Self::AccountLevel { message, .. }
            | Self::FlowLevel { message }
            | Self::NodeLevel { message, .. } => message,
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AccountLevel { node_type, message, .. } => write!(f, "[{}] {}", node_type, message),
            Self::FlowLevel { message } => write!(f, "{}", message),
            Self::NodeLevel { node_id, message } => write!(f, "[{}] {}", node_id, message),
        }
    }
}

/// Check a flow before running it: connector and edge integrity, required
/// account secrets, and partition cycles and overlaps.
pub fn validate_flow(
    content: &FlowContent,
    registry: &NodeRegistry,
    secrets: &AccountSecrets,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Err(e) = content.check_integrity() {
        errors.push(ValidationError::FlowLevel {
            message: e.to_string(),
        });
    }

    errors.extend(secret_errors(content, registry, secrets));
    errors.extend(graph_errors(&compute_graphs(&content.edges, &content.node_configs)));
    errors
}

pub(crate) fn secret_errors(
    content: &FlowContent,
    registry: &NodeRegistry,
    secrets: &AccountSecrets,
) -> Vec<ValidationError> {
    let node_types: BTreeSet<NodeType> = content
        .node_configs
        .values()
        .map(|c| c.node_type())
        .collect();

    let mut errors = Vec::new();
    for node_type in node_types {
        let definition = match registry.get(node_type) {
            Ok(definition) => definition,
            Err(e) => {
                errors.push(ValidationError::FlowLevel {
                    message: e.to_string(),
                });
                continue;
            }
        };
        if let Some(secret) = definition.required_secret() {
            if secrets.get(secret).is_none() {
                errors.push(ValidationError::AccountLevel {
                    node_type,
                    secret,
                    message: secret.missing_message().to_string(),
                });
            }
        }
    }
    errors
}

pub(crate) fn graph_errors(graphs: &ComputedGraphs) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if graphs.is_root_aborted() {
        errors.push(ValidationError::FlowLevel {
            message: "Flow has no start node; every node is on a cycle".to_string(),
        });
        return errors;
    }

    for (kind, message) in [
        (GraphTraverseError::Circle, "Flow contains a cycle"),
        (GraphTraverseError::Overlap, "Flow contains overlapping loop graphs"),
    ] {
        let nodes: Vec<&NodeId> = graphs
            .nodes_with(kind)
            .into_iter()
            .filter(|id| id.as_str() != ROOT_GRAPH_ID)
            .collect();
        if nodes.is_empty() {
            continue;
        }

        errors.push(ValidationError::FlowLevel {
            message: message.to_string(),
        });
        for node_id in nodes {
            errors.push(ValidationError::NodeLevel {
                node_id: node_id.clone(),
                message: node_message(kind).to_string(),
            });
        }
    }

    errors
}

fn node_message(kind: GraphTraverseError) -> &'static str {
    match kind {
        GraphTraverseError::Circle => "Node is part of a cycle",
        GraphTraverseError::Overlap => "Node belongs to more than one graph",
    }
}
