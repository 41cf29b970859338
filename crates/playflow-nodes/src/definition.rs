use futures::stream::{self, BoxStream, StreamExt};
use futures::Future;
use serde_json::Value;

use playflow_core::{
    AccountSecrets, ConditionConnector, ConditionTargetConnector, Connector, NodeConfig, NodeId,
    NodeKind, NodeTemplate, NodeType, RunNodeResult, SecretKind, VariableConnector,
    VariableValueType,
};

/// Everything a node sees when it runs. Values are positional: one per input
/// variable, or one per output variable for start nodes.
#[derive(Debug, Clone)]
pub struct NodeRunContext {
    pub node_config: NodeConfig,
    pub input_variables: Vec<VariableConnector>,
    pub input_values: Vec<Value>,
    pub output_variables: Vec<VariableConnector>,
    pub outgoing_conditions: Vec<ConditionConnector>,
    pub secrets: AccountSecrets,
    pub prefer_streaming: bool,
}

impl NodeRunContext {
    pub fn node_id(&self) -> &NodeId {
        &self.node_config.node_id
    }

    /// Input values keyed by variable name.
    pub fn named_inputs(&self) -> serde_json::Map<String, Value> {
        self.input_variables
            .iter()
            .zip(self.input_values.iter())
            .map(|(v, value)| (v.name.clone(), value.clone()))
            .collect()
    }

    pub fn first_input(&self) -> Value {
        self.input_values.first().cloned().unwrap_or(Value::Null)
    }
}

/// Emissions of one node run. Later results supersede earlier values; the
/// last item is the final result.
pub type NodeRunStream = BoxStream<'static, RunNodeResult>;

/// Per-type node behavior.
pub trait NodeDefinition: Send + Sync + 'static {
    fn node_type(&self) -> NodeType;

    /// Display name.
    fn label(&self) -> &str;

    fn kind(&self) -> NodeKind {
        self.node_type().kind()
    }

    /// Whether users may append input variables beyond the defaults.
    fn can_user_add_incoming_variables(&self) -> bool {
        false
    }

    /// Account secret the node cannot run without.
    fn required_secret(&self) -> Option<SecretKind> {
        None
    }

    /// Default node config plus a self-consistent connector set.
    fn create_default(&self, node_id: &NodeId) -> NodeTemplate;

    fn run(&self, context: NodeRunContext) -> NodeRunStream;
}

/// A stream with a single final result.
pub fn single<F>(future: F) -> NodeRunStream
where
    F: Future<Output = RunNodeResult> + Send + 'static,
{
    stream::once(future).boxed()
}

pub fn ready(result: RunNodeResult) -> NodeRunStream {
    stream::iter(vec![result]).boxed()
}

/// Collects connectors for a default node template.
pub(crate) struct TemplateBuilder {
    node_id: NodeId,
    connectors: Vec<Connector>,
}

impl TemplateBuilder {
    pub(crate) fn new(node_id: &NodeId) -> Self {
        Self {
            node_id: node_id.clone(),
            connectors: Vec::new(),
        }
    }

    pub(crate) fn node_input(mut self, index: i32, name: &str) -> Self {
        self.connectors.push(Connector::NodeInput(
            VariableConnector::new(&self.node_id, index, name)
                .with_value_type(VariableValueType::Any),
        ));
        self
    }

    pub(crate) fn node_output(mut self, index: i32, name: &str, value_type: VariableValueType) -> Self {
        self.connectors.push(Connector::NodeOutput(
            VariableConnector::new(&self.node_id, index, name).with_value_type(value_type),
        ));
        self
    }

    pub(crate) fn flow_input(mut self, index: i32, name: &str) -> Self {
        self.connectors.push(Connector::FlowInput(
            VariableConnector::new(&self.node_id, index, name)
                .with_value_type(VariableValueType::String),
        ));
        self
    }

    pub(crate) fn flow_output(mut self, index: i32, name: &str) -> Self {
        self.connectors.push(Connector::FlowOutput(
            VariableConnector::new(&self.node_id, index, name)
                .with_value_type(VariableValueType::String),
        ));
        self
    }

    pub(crate) fn condition(mut self, index: i32, expression: &str) -> Self {
        self.connectors.push(Connector::Condition(ConditionConnector::new(
            &self.node_id,
            index,
            expression,
        )));
        self
    }

    pub(crate) fn condition_target(mut self, index: i32) -> Self {
        let mut target = ConditionTargetConnector::new(&self.node_id);
        target.index = index;
        self.connectors.push(Connector::ConditionTarget(target));
        self
    }

    pub(crate) fn build(self, config: NodeConfig) -> NodeTemplate {
        NodeTemplate {
            node_configs: vec![config],
            connectors: self.connectors,
        }
    }
}
