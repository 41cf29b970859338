pub mod context;
pub mod partition;

pub use context::{FlowExecutionContext, ImmutableFlowGraph};
pub use partition::{
    compute_graphs, ComputedGraphs, Graph, GraphTraverseError, ROOT_GRAPH_ID,
};
