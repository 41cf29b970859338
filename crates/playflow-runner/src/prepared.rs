use std::collections::{HashMap, HashSet};

use tracing::debug;

use playflow_core::{ConnectorId, FlowContent, NodeId, NodeType, Result, VariableConnector};
use playflow_graph::{compute_graphs, ComputedGraphs, ImmutableFlowGraph};

/// The continue and break condition targets of a loop partition's
/// LoopFinish node.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopExits {
    pub finish_node_id: NodeId,
    pub continue_target: ConnectorId,
    pub break_target: ConnectorId,
}

/// A flow with its partitions computed and each partition's scheduling shape
/// built. Read-only; any number of runs share one.
#[derive(Debug)]
pub struct PreparedFlow {
    pub content: FlowContent,
    pub graphs: ComputedGraphs,
    partitions: HashMap<NodeId, ImmutableFlowGraph>,
    /// Variable sources feeding a loop partition from outside it.
    external_sources: HashMap<NodeId, Vec<ConnectorId>>,
    loop_exits: HashMap<NodeId, LoopExits>,
}

impl PreparedFlow {
    /// Fails on integrity violations only. Cycles and overlaps are kept in
    /// `graphs` for the executor to act on.
    pub fn prepare(content: FlowContent) -> Result<Self> {
        content.check_integrity()?;

        let graphs = compute_graphs(&content.edges, &content.node_configs);

        let mut partitions = HashMap::new();
        let mut external_sources = HashMap::new();
        let mut loop_exits = HashMap::new();

        for (partition_id, graph) in &graphs.graph_records {
            let shape = ImmutableFlowGraph::from_graph(graph, &content.connectors)?;

            if partition_id != &ComputedGraphs::root_id() {
                let outside: HashSet<ConnectorId> = graph
                    .values()
                    .flat_map(|incoming| incoming.values())
                    .flat_map(|sources| sources.keys())
                    .filter(|source| {
                        content.connectors.get(*source).map_or(false, |c| {
                            c.is_variable() && !shape.contains(c.node_id())
                        })
                    })
                    .cloned()
                    .collect();
                external_sources.insert(partition_id.clone(), outside.into_iter().collect());

                if let Some(exits) = find_loop_exits(&content, &shape) {
                    loop_exits.insert(partition_id.clone(), exits);
                }
            }

            partitions.insert(partition_id.clone(), shape);
        }

        debug!(
            nodes = content.node_configs.len(),
            partitions = partitions.len(),
            "Prepared flow"
        );

        Ok(Self {
            content,
            graphs,
            partitions,
            external_sources,
            loop_exits,
        })
    }

    /// Shape of the root partition or of the partition a LoopStart seeds.
    pub fn partition(&self, partition_id: &NodeId) -> Option<&ImmutableFlowGraph> {
        self.partitions.get(partition_id)
    }

    pub fn external_sources(&self, partition_id: &NodeId) -> &[ConnectorId] {
        self.external_sources
            .get(partition_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn loop_exits(&self, loop_start_id: &NodeId) -> Option<&LoopExits> {
        self.loop_exits.get(loop_start_id)
    }

    /// The variable output wired into `target`.
    pub fn source_variable(&self, target: &ConnectorId) -> Option<&VariableConnector> {
        let source_id = self
            .partitions
            .values()
            .find_map(|shape| shape.source_variable(target))?;
        self.content.connectors.get(source_id)?.as_variable()
    }

    /// Condition targets reached by any of `fired`.
    pub fn reached_targets<'a>(
        &'a self,
        fired: &'a HashSet<ConnectorId>,
    ) -> impl Iterator<Item = &'a ConnectorId> + 'a {
        self.content
            .edges
            .iter()
            .filter(move |e| fired.contains(&e.source_handle))
            .map(|e| &e.target_handle)
    }
}

fn find_loop_exits(content: &FlowContent, shape: &ImmutableFlowGraph) -> Option<LoopExits> {
    let finish_node_id = shape.node_ids().iter().find(|id| {
        content
            .node_configs
            .get(*id)
            .map_or(false, |c| c.node_type() == NodeType::LoopFinish)
    })?;

    let targets = content.condition_targets(finish_node_id);
    let [continue_target, break_target, ..] = targets.as_slice() else {
        return None;
    };

    Some(LoopExits {
        finish_node_id: finish_node_id.clone(),
        continue_target: continue_target.id.clone(),
        break_target: break_target.id.clone(),
    })
}
