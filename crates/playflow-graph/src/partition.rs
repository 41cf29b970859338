//! Splits a flow into the root graph plus one graph per `LoopStart` node and
//! flags cycles and nodes claimed by more than one graph.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use playflow_core::{Edge, NodeConfigMap, NodeId, NodeType};

pub const ROOT_GRAPH_ID: &str = "ROOT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GraphTraverseError {
    Circle,
    /// The node is reachable from more than one partition, or reachable from
    /// a LoopFinish without its LoopStart.
    Overlap,
}

pub type SourceConnectors = HashMap<playflow_core::ConnectorId, bool>;
pub type IncomingConnectors = HashMap<playflow_core::ConnectorId, SourceConnectors>;

/// `node -> target connector -> source connector -> fired`.
pub type Graph = HashMap<NodeId, IncomingConnectors>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComputedGraphs {
    /// Keyed by [`ROOT_GRAPH_ID`] or a LoopStart node id.
    pub graph_records: HashMap<NodeId, Graph>,
    pub errors: HashMap<NodeId, Vec<GraphTraverseError>>,
}

impl ComputedGraphs {
    pub fn root_id() -> NodeId {
        NodeId::from(ROOT_GRAPH_ID)
    }

    pub fn root(&self) -> Option<&Graph> {
        self.graph_records.get(ROOT_GRAPH_ID)
    }

    pub fn graph(&self, partition_id: &NodeId) -> Option<&Graph> {
        self.graph_records.get(partition_id)
    }

    /// The root graph has no entry point at all.
    pub fn is_root_aborted(&self) -> bool {
        self.graph_records.is_empty()
            && self
                .errors
                .get(ROOT_GRAPH_ID)
                .map_or(false, |e| e.contains(&GraphTraverseError::Circle))
    }

    pub fn has_error(&self, kind: GraphTraverseError) -> bool {
        self.errors.values().any(|e| e.contains(&kind))
    }

    pub fn nodes_with(&self, kind: GraphTraverseError) -> Vec<&NodeId> {
        let mut ids: Vec<&NodeId> = self
            .errors
            .iter()
            .filter(|(_, e)| e.contains(&kind))
            .map(|(id, _)| id)
            .collect();
        ids.sort();
        ids
    }
}

/// Partition the flow and validate each partition.
///
/// Root start points are nodes with no incoming edge that are not LoopStart
/// seeds. With no start point the whole flow is cyclic and nothing else is
/// computed. Traversal follows edge-list order.
pub fn compute_graphs(edges: &[Edge], node_configs: &NodeConfigMap) -> ComputedGraphs {
    let loop_start_ids: Vec<NodeId> = node_configs
        .values()
        .filter(|c| c.node_type() == NodeType::LoopStart)
        .map(|c| c.node_id.clone())
        .collect();

    let mut indegrees: HashMap<&NodeId, usize> =
        node_configs.keys().map(|id| (id, 0)).collect();
    for edge in edges {
        if let Some(count) = indegrees.get_mut(&edge.target) {
            *count += 1;
        }
    }

    let root_start_ids: Vec<NodeId> = node_configs
        .keys()
        .filter(|id| indegrees.get(id) == Some(&0) && !loop_start_ids.contains(id))
        .cloned()
        .collect();

    let mut result = ComputedGraphs::default();

    if root_start_ids.is_empty() {
        result
            .errors
            .insert(ComputedGraphs::root_id(), vec![GraphTraverseError::Circle]);
        return result;
    }

    // The root traversal never reports overlap.
    let mut root_graph = Graph::new();
    {
        let nothing_claimed = HashSet::new();
        let mut traversal = Traversal {
            edges,
            claimed: &nothing_claimed,
            errors: &mut result.errors,
            graph: &mut root_graph,
        };
        for node_id in &root_start_ids {
            traversal.visit(node_id, &mut Vec::new());
        }
    }

    let mut claimed: HashSet<NodeId> = root_graph.keys().cloned().collect();
    result
        .graph_records
        .insert(ComputedGraphs::root_id(), root_graph);

    for loop_start_id in &loop_start_ids {
        let mut graph = Graph::new();
        Traversal {
            edges,
            claimed: &claimed,
            errors: &mut result.errors,
            graph: &mut graph,
        }
        .visit(loop_start_id, &mut Vec::new());

        claimed.extend(graph.keys().cloned());
        result.graph_records.insert(loop_start_id.clone(), graph);
    }

    debug!(
        partitions = result.graph_records.len(),
        errors = result.errors.len(),
        "Computed flow graphs"
    );

    result
}

struct Traversal<'a> {
    edges: &'a [Edge],
    claimed: &'a HashSet<NodeId>,
    errors: &'a mut HashMap<NodeId, Vec<GraphTraverseError>>,
    graph: &'a mut Graph,
}

impl Traversal<'_> {
    fn visit(&mut self, node_id: &NodeId, ancestors: &mut Vec<NodeId>) {
        if ancestors.contains(node_id) {
            self.record(node_id, GraphTraverseError::Circle);
            return;
        }

        if self.claimed.contains(node_id) {
            self.record(node_id, GraphTraverseError::Overlap);
        }

        let edges = self.edges;

        let incoming = self.graph.entry(node_id.clone()).or_default();
        for edge in edges.iter().filter(|e| &e.target == node_id) {
            incoming
                .entry(edge.target_handle.clone())
                .or_default()
                .insert(edge.source_handle.clone(), false);
        }

        ancestors.push(node_id.clone());
        for edge in edges.iter().filter(|e| &e.source == node_id) {
            self.visit(&edge.target, ancestors);
        }
        ancestors.pop();
    }

    fn record(&mut self, node_id: &NodeId, error: GraphTraverseError) {
        let errors = self.errors.entry(node_id.clone()).or_default();
        if !errors.contains(&error) {
            errors.push(error);
        }
    }
}
