//! Indegree-driven scheduler.
//!
//! [`ImmutableFlowGraph`] holds the edge-derived shape of one partition and is
//! built once. [`FlowExecutionContext`] is the per-run counter state cloned
//! from it, so concurrent runs share the shape and never each other's state.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use playflow_core::{
    Connector, ConnectorId, ConnectorMap, Edge, NodeId, PlayflowError, Result,
};

use crate::partition::Graph;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceKind {
    Variable,
    Condition,
}

#[derive(Debug)]
struct GraphShape {
    node_ids: Vec<NodeId>,
    node_index: HashMap<NodeId, usize>,
    /// Source connector to the indexes of nodes it feeds, one entry per edge.
    dependents: HashMap<ConnectorId, (SourceKind, Vec<usize>)>,
    variable_target_to_source: HashMap<ConnectorId, ConnectorId>,
    variable_indegrees: Vec<u32>,
    condition_indegrees: Vec<u32>,
}

/// Static scheduling shape of one partition.
#[derive(Debug, Clone)]
pub struct ImmutableFlowGraph {
    shape: Arc<GraphShape>,
}

impl ImmutableFlowGraph {
    /// Build the shape for the nodes in scope. Edges targeting nodes outside
    /// the scope are ignored; an edge whose source connector is unknown or not
    /// an output is an integrity error.
    pub fn new<I>(edges: &[Edge], node_ids: I, connectors: &ConnectorMap) -> Result<Self>
    where
        I: IntoIterator<Item = NodeId>,
    {
        let mut ordered: Vec<NodeId> = node_ids.into_iter().collect();
        ordered.sort();
        ordered.dedup();

        let node_index: HashMap<NodeId, usize> = ordered
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();

        let mut dependents: HashMap<ConnectorId, (SourceKind, Vec<usize>)> = HashMap::new();
        let mut variable_target_to_source = HashMap::new();
        let mut variable_indegrees = vec![0u32; ordered.len()];
        let mut condition_indegrees = vec![0u32; ordered.len()];

        for edge in edges {
            let Some(&target) = node_index.get(&edge.target) else {
                continue;
            };

            let kind = match connectors.get(&edge.source_handle) {
                Some(Connector::FlowInput(_)) | Some(Connector::NodeOutput(_)) => {
                    SourceKind::Variable
                }
                Some(Connector::Condition(_)) => SourceKind::Condition,
                Some(other) => {
                    return Err(PlayflowError::integrity(format!(
                        "edge '{}' starts at {:?} connector '{}'",
                        edge.id,
                        other.connector_type(),
                        edge.source_handle
                    )))
                }
                None => {
                    return Err(PlayflowError::integrity(format!(
                        "edge '{}' references missing source connector '{}'",
                        edge.id, edge.source_handle
                    )))
                }
            };

            dependents
                .entry(edge.source_handle.clone())
                .or_insert_with(|| (kind, Vec::new()))
                .1
                .push(target);

            match kind {
                SourceKind::Variable => {
                    variable_target_to_source
                        .insert(edge.target_handle.clone(), edge.source_handle.clone());
                    variable_indegrees[target] += 1;
                }
                // Any one incoming condition is enough.
                SourceKind::Condition => condition_indegrees[target] = 1,
            }
        }

        Ok(Self {
            shape: Arc::new(GraphShape {
                node_ids: ordered,
                node_index,
                dependents,
                variable_target_to_source,
                variable_indegrees,
                condition_indegrees,
            }),
        })
    }

    /// Build the shape of one computed partition.
    pub fn from_graph(graph: &Graph, connectors: &ConnectorMap) -> Result<Self> {
        let mut edges = Vec::new();
        for (node_id, incoming) in graph {
            for (target_handle, sources) in incoming {
                for source_handle in sources.keys() {
                    let source = connectors.get(source_handle).ok_or_else(|| {
                        PlayflowError::integrity(format!(
                            "node '{}' is fed by missing connector '{}'",
                            node_id, source_handle
                        ))
                    })?;
                    edges.push(Edge {
                        id: format!("{}->{}", source_handle, target_handle),
                        source: source.node_id().clone(),
                        source_handle: source_handle.clone(),
                        target: node_id.clone(),
                        target_handle: target_handle.clone(),
                    });
                }
            }
        }
        Self::new(&edges, graph.keys().cloned(), connectors)
    }

    pub fn node_ids(&self) -> &[NodeId] {
        &self.shape.node_ids
    }

    pub fn contains(&self, node_id: &NodeId) -> bool {
        self.shape.node_index.contains_key(node_id)
    }

    /// The variable output wired into `target`, if any.
    pub fn source_variable(&self, target: &ConnectorId) -> Option<&ConnectorId> {
        self.shape.variable_target_to_source.get(target)
    }

    /// Fresh scheduler state over this shape.
    pub fn get_mutable_copy(&self) -> FlowExecutionContext {
        FlowExecutionContext {
            variable_indegrees: self.shape.variable_indegrees.clone(),
            condition_indegrees: self.shape.condition_indegrees.clone(),
            executed: vec![false; self.shape.node_ids.len()],
            shape: Arc::clone(&self.shape),
        }
    }
}

/// Per-run scheduler state.
#[derive(Debug, Clone)]
pub struct FlowExecutionContext {
    shape: Arc<GraphShape>,
    variable_indegrees: Vec<u32>,
    condition_indegrees: Vec<u32>,
    executed: Vec<bool>,
}

impl FlowExecutionContext {
    pub fn new<I>(edges: &[Edge], node_ids: I, connectors: &ConnectorMap) -> Result<Self>
    where
        I: IntoIterator<Item = NodeId>,
    {
        Ok(ImmutableFlowGraph::new(edges, node_ids, connectors)?.get_mutable_copy())
    }

    /// Not-yet-executed nodes with both indegrees at zero.
    pub fn get_runnable_nodes(&self) -> Vec<NodeId> {
        (0..self.shape.node_ids.len())
            .filter(|&i| self.is_ready(i))
            .map(|i| self.shape.node_ids[i].clone())
            .collect()
    }

    /// Like [`get_runnable_nodes`](Self::get_runnable_nodes), and marks the
    /// returned nodes executed.
    pub fn claim_runnable_nodes(&mut self) -> Vec<NodeId> {
        let mut claimed = Vec::new();
        for i in 0..self.shape.node_ids.len() {
            if self.is_ready(i) {
                self.executed[i] = true;
                claimed.push(self.shape.node_ids[i].clone());
            }
        }
        claimed
    }

    /// Apply fired source connectors and return nodes that just became
    /// runnable. Each node is returned at most once over the life of this
    /// context. Connectors without dependents are ignored.
    pub fn reduce_indegrees(&mut self, fired: &[ConnectorId]) -> Vec<NodeId> {
        let shape = Arc::clone(&self.shape);
        let mut touched = Vec::new();

        for connector_id in fired {
            let Some((kind, targets)) = shape.dependents.get(connector_id) else {
                continue;
            };
            for &target in targets {
                match kind {
                    SourceKind::Variable => {
                        self.variable_indegrees[target] =
                            self.variable_indegrees[target].saturating_sub(1);
                    }
                    SourceKind::Condition => self.condition_indegrees[target] = 0,
                }
                if !touched.contains(&target) {
                    touched.push(target);
                }
            }
        }

        let mut runnable = Vec::new();
        for target in touched {
            if self.is_ready(target) {
                self.executed[target] = true;
                runnable.push(shape.node_ids[target].clone());
            }
        }

        if !runnable.is_empty() {
            debug!(fired = fired.len(), runnable = ?runnable, "Reduced indegrees");
        }

        runnable
    }

    /// Coarse feasibility check: some node has no pending variable input and
    /// some node has no pending condition input.
    pub fn can_be_executed(&self) -> bool {
        self.variable_indegrees.iter().any(|&d| d == 0)
            && self.condition_indegrees.iter().any(|&d| d == 0)
    }

    pub fn source_variable(&self, target: &ConnectorId) -> Option<&ConnectorId> {
        self.shape.variable_target_to_source.get(target)
    }

    pub fn variable_indegree(&self, node_id: &NodeId) -> Option<u32> {
        self.index_of(node_id).map(|i| self.variable_indegrees[i])
    }

    pub fn condition_indegree(&self, node_id: &NodeId) -> Option<u32> {
        self.index_of(node_id).map(|i| self.condition_indegrees[i])
    }

    pub fn is_executed(&self, node_id: &NodeId) -> bool {
        self.index_of(node_id).map_or(false, |i| self.executed[i])
    }

    fn index_of(&self, node_id: &NodeId) -> Option<usize> {
        self.shape.node_index.get(node_id).copied()
    }

    fn is_ready(&self, i: usize) -> bool {
        !self.executed[i] && self.variable_indegrees[i] == 0 && self.condition_indegrees[i] == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use playflow_core::{
        ConditionConnector, ConditionTargetConnector, VariableConnector,
    };

    struct Fixture {
        connectors: ConnectorMap,
        edges: Vec<Edge>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                connectors: ConnectorMap::new(),
                edges: Vec::new(),
            }
        }

        fn add(&mut self, connector: Connector) -> ConnectorId {
            let id = connector.id().clone();
            self.connectors.insert(id.clone(), connector);
            id
        }

        fn output(&mut self, node: &str, suffix: &str) -> ConnectorId {
            let v = VariableConnector::new(&NodeId::from(node), 0, suffix).with_suffix(suffix);
            self.add(Connector::NodeOutput(v))
        }

        fn input(&mut self, node: &str, suffix: &str) -> ConnectorId {
            let v = VariableConnector::new(&NodeId::from(node), 0, suffix).with_suffix(suffix);
            self.add(Connector::NodeInput(v))
        }

        fn condition(&mut self, node: &str, suffix: &str) -> ConnectorId {
            let mut c = ConditionConnector::new(&NodeId::from(node), 0, "");
            c.id = ConnectorId::scoped(&c.node_id, suffix);
            self.add(Connector::Condition(c))
        }

        fn condition_target(&mut self, node: &str) -> ConnectorId {
            let mut t = ConditionTargetConnector::new(&NodeId::from(node));
            t.id = ConnectorId::scoped(&t.node_id, "in_cond");
            self.add(Connector::ConditionTarget(t))
        }

        fn wire(&mut self, source: &ConnectorId, target: &ConnectorId) {
            let source_node = source.as_str().split('/').next().unwrap();
            let target_node = target.as_str().split('/').next().unwrap();
            self.edges.push(Edge::new(
                source_node,
                source.clone(),
                target_node,
                target.clone(),
            ));
        }

        fn context(&self, nodes: &[&str]) -> FlowExecutionContext {
            FlowExecutionContext::new(
                &self.edges,
                nodes.iter().map(|n| NodeId::from(*n)),
                &self.connectors,
            )
            .unwrap()
        }
    }

    fn ids(nodes: &[&str]) -> Vec<NodeId> {
        nodes.iter().map(|n| NodeId::from(*n)).collect()
    }

    #[test]
    fn test_linear_scheduling_order() {
        let mut f = Fixture::new();
        let a_out = f.output("A", "out");
        let b_in = f.input("B", "in");
        let b_out = f.output("B", "out");
        let c_in = f.input("C", "in");
        f.wire(&a_out, &b_in);
        f.wire(&b_out, &c_in);

        let mut ctx = f.context(&["A", "B", "C"]);

        assert_eq!(ctx.claim_runnable_nodes(), ids(&["A"]));
        assert_eq!(ctx.reduce_indegrees(&[a_out]), ids(&["B"]));
        assert_eq!(ctx.reduce_indegrees(&[b_out]), ids(&["C"]));
        assert!(ctx.get_runnable_nodes().is_empty());
        assert_eq!(ctx.source_variable(&c_in).map(|c| c.as_str()), Some("B/out"));
    }

    #[test]
    fn test_waits_for_every_variable_input() {
        let mut f = Fixture::new();
        let a_out = f.output("A", "out");
        let b_out = f.output("B", "out");
        let c_in1 = f.input("C", "in1");
        let c_in2 = f.input("C", "in2");
        f.wire(&a_out, &c_in1);
        f.wire(&b_out, &c_in2);

        let mut ctx = f.context(&["A", "B", "C"]);
        assert_eq!(ctx.claim_runnable_nodes(), ids(&["A", "B"]));
        assert!(ctx.reduce_indegrees(&[a_out]).is_empty());
        assert_eq!(ctx.variable_indegree(&NodeId::from("C")), Some(1));
        assert_eq!(ctx.reduce_indegrees(&[b_out]), ids(&["C"]));
    }

    #[test]
    fn test_condition_fires_once() {
        let mut f = Fixture::new();
        let a_cond = f.condition("A", "c0");
        let b_target = f.condition_target("B");
        f.wire(&a_cond, &b_target);

        let mut ctx = f.context(&["A", "B"]);
        assert_eq!(ctx.condition_indegree(&NodeId::from("B")), Some(1));
        ctx.claim_runnable_nodes();

        assert_eq!(ctx.reduce_indegrees(&[a_cond.clone()]), ids(&["B"]));
        assert!(ctx.reduce_indegrees(&[a_cond.clone(), a_cond]).is_empty());
        assert_eq!(ctx.condition_indegree(&NodeId::from("B")), Some(0));
        assert!(ctx.is_executed(&NodeId::from("B")));
    }

    #[test]
    fn test_any_incoming_condition_unblocks() {
        let mut f = Fixture::new();
        let a_cond = f.condition("A", "c0");
        let b_cond = f.condition("B", "c0");
        let c_target = f.condition_target("C");
        f.wire(&a_cond, &c_target);
        f.wire(&b_cond, &c_target);

        let mut ctx = f.context(&["A", "B", "C"]);
        assert_eq!(ctx.condition_indegree(&NodeId::from("C")), Some(1));
        ctx.claim_runnable_nodes();

        assert_eq!(ctx.reduce_indegrees(&[b_cond]), ids(&["C"]));
        assert!(ctx.reduce_indegrees(&[a_cond]).is_empty());
    }

    #[test]
    fn test_condition_and_variable_both_required() {
        let mut f = Fixture::new();
        let a_out = f.output("A", "out");
        let a_cond = f.condition("A", "c0");
        let b_in = f.input("B", "in");
        let b_target = f.condition_target("B");
        f.wire(&a_out, &b_in);
        f.wire(&a_cond, &b_target);

        let mut ctx = f.context(&["A", "B"]);
        ctx.claim_runnable_nodes();
        assert!(ctx.reduce_indegrees(&[a_out]).is_empty());
        assert_eq!(ctx.reduce_indegrees(&[a_cond]), ids(&["B"]));
    }

    #[test]
    fn test_unwired_connectors_are_ignored() {
        let mut f = Fixture::new();
        let a_out = f.output("A", "out");
        let mut ctx = f.context(&["A"]);
        ctx.claim_runnable_nodes();
        assert!(ctx
            .reduce_indegrees(&[a_out, ConnectorId::from("Z/unknown")])
            .is_empty());
    }

    #[test]
    fn test_mutable_copies_are_independent() {
        let mut f = Fixture::new();
        let a_out = f.output("A", "out");
        let b_in = f.input("B", "in");
        f.wire(&a_out, &b_in);

        let shape = ImmutableFlowGraph::new(
            &f.edges,
            ids(&["A", "B"]),
            &f.connectors,
        )
        .unwrap();

        let mut first = shape.get_mutable_copy();
        first.claim_runnable_nodes();
        first.reduce_indegrees(&[a_out]);

        let second = shape.get_mutable_copy();
        assert_eq!(second.get_runnable_nodes(), ids(&["A"]));
        assert_eq!(second.variable_indegree(&NodeId::from("B")), Some(1));
    }

    #[test]
    fn test_can_be_executed() {
        let mut f = Fixture::new();
        let a_cond = f.condition("A", "c0");
        let a_target = f.condition_target("A");
        f.wire(&a_cond, &a_target);
        // A single self-gated node has no zero condition indegree.
        let ctx = f.context(&["A"]);
        assert!(!ctx.can_be_executed());

        let ctx = Fixture::new().context(&["B"]);
        assert!(ctx.can_be_executed());
    }

    #[test]
    fn test_input_connector_as_source_is_integrity_error() {
        let mut f = Fixture::new();
        let a_in = f.input("A", "in");
        let b_in = f.input("B", "in");
        f.wire(&a_in, &b_in);
        let err = FlowExecutionContext::new(&f.edges, ids(&["A", "B"]), &f.connectors).unwrap_err();
        assert!(matches!(err, PlayflowError::Integrity(_)));
    }

    #[test]
    fn test_edges_outside_scope_are_ignored() {
        let mut f = Fixture::new();
        let a_out = f.output("A", "out");
        let b_in = f.input("B", "in");
        f.wire(&a_out, &b_in);
        let ctx = f.context(&["A"]);
        assert_eq!(ctx.get_runnable_nodes(), ids(&["A"]));
    }

    #[test]
    fn test_dag_visits_each_node_once() {
        // Diamond: A -> B, A -> C, B -> D, C -> D
        let mut f = Fixture::new();
        let a_out = f.output("A", "out");
        let b_in = f.input("B", "in");
        let c_in = f.input("C", "in");
        let b_out = f.output("B", "out");
        let c_out = f.output("C", "out");
        let d_in1 = f.input("D", "in1");
        let d_in2 = f.input("D", "in2");
        f.wire(&a_out, &b_in);
        f.wire(&a_out, &c_in);
        f.wire(&b_out, &d_in1);
        f.wire(&c_out, &d_in2);

        let mut ctx = f.context(&["A", "B", "C", "D"]);
        let mut visited = Vec::new();
        let mut frontier = ctx.claim_runnable_nodes();
        while let Some(node) = frontier.pop() {
            visited.push(node.clone());
            let fired = vec![ConnectorId::scoped(&node, "out")];
            frontier.extend(ctx.reduce_indegrees(&fired));
        }

        visited.sort();
        assert_eq!(visited, ids(&["A", "B", "C", "D"]));
        assert_eq!(visited.iter().filter(|n| n.as_str() == "D").count(), 1);
    }

    #[test]
    fn test_generated_dags_run_each_node_once_after_its_sources() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        for seed in 0..200u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let n = rng.gen_range(1..=16);
            let names: Vec<String> = (0..n).map(|k| format!("N{:02}", k)).collect();

            let mut f = Fixture::new();
            let mut variable_sources: Vec<Vec<usize>> = vec![Vec::new(); n];
            let mut condition_sources: Vec<Vec<usize>> = vec![Vec::new(); n];
            for k in 0..n {
                for i in 0..k {
                    if !rng.gen_bool(0.3) {
                        continue;
                    }
                    if rng.gen_bool(0.5) {
                        let out = f.output(&names[i], "out");
                        let input = f.input(&names[k], &format!("in_{}", i));
                        f.wire(&out, &input);
                        variable_sources[k].push(i);
                    } else {
                        let cond = f.condition(&names[i], "go");
                        let target = f.condition_target(&names[k]);
                        f.wire(&cond, &target);
                        condition_sources[k].push(i);
                    }
                }
            }

            let refs: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
            let mut ctx = f.context(&refs);
            let mut position: Vec<Option<usize>> = vec![None; n];
            let mut order = 0;
            let mut frontier = ctx.claim_runnable_nodes();

            while !frontier.is_empty() {
                let node = frontier.swap_remove(rng.gen_range(0..frontier.len()));
                let k = names.iter().position(|name| name == node.as_str()).unwrap();
                assert!(position[k].is_none(), "seed {}: {} ran twice", seed, node);
                position[k] = Some(order);
                order += 1;

                let fired = vec![
                    ConnectorId::scoped(&node, "out"),
                    ConnectorId::scoped(&node, "go"),
                ];
                frontier.extend(ctx.reduce_indegrees(&fired));
            }

            assert!(
                position.iter().all(Option::is_some),
                "seed {}: not every node ran",
                seed
            );
            assert!(ctx.get_runnable_nodes().is_empty());

            for k in 0..n {
                let at = position[k].unwrap();
                for &i in &variable_sources[k] {
                    assert!(
                        position[i].unwrap() < at,
                        "seed {}: {} ran before its variable source {}",
                        seed,
                        names[k],
                        names[i]
                    );
                }
                if !condition_sources[k].is_empty() {
                    assert!(
                        condition_sources[k].iter().any(|&i| position[i].unwrap() < at),
                        "seed {}: {} ran before any condition source",
                        seed,
                        names[k]
                    );
                }
            }
        }
    }
}
