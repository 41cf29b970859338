//! Flow executor.
//!
//! Runs every partition as an indegree-driven dataflow: all runnable nodes
//! execute concurrently, and a node's fired connectors are applied to the
//! scheduler only after its final result. Loop nodes re-run their LoopStart
//! partition with fresh scheduler state over the shared value store.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use playflow_core::config::RunConfig;
use playflow_core::{
    AccountSecrets, ConnectorId, EventBus, NodeConfig, NodeExecutionEvent, NodeId, NodeKind,
    NodeParams, NodeType, RunEvent, RunId, RunNodeResult, RunStatus, VariableConnector,
};
use playflow_graph::{ComputedGraphs, GraphTraverseError};
use playflow_nodes::{NodeRegistry, NodeRunContext};

use crate::outcome::RunOutcome;
use crate::prepared::PreparedFlow;
use crate::store::RunStore;
use crate::validation::{graph_errors, secret_errors};

/// Flow input values keyed by FlowInput connector id or variable name.
pub type FlowInputs = HashMap<String, Value>;

/// Runs prepared flows. One executor serves any number of concurrent runs.
pub struct FlowExecutor {
    registry: Arc<NodeRegistry>,
    config: RunConfig,
    secrets: AccountSecrets,
}

impl FlowExecutor {
    pub fn new(registry: Arc<NodeRegistry>, config: RunConfig, secrets: AccountSecrets) -> Self {
        Self {
            registry,
            config,
            secrets,
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run a flow to a terminal state.
    pub async fn run(
        &self,
        prepared: Arc<PreparedFlow>,
        inputs: FlowInputs,
        events: Arc<EventBus>,
        cancel: CancellationToken,
    ) -> RunOutcome {
        let run_id = RunId::new();
        let mut validation_errors = secret_errors(&prepared.content, &self.registry, &self.secrets);
        validation_errors.extend(graph_errors(&prepared.graphs));

        events.publish(RunEvent::RunStarted {
            run_id: run_id.clone(),
            started_at: Utc::now(),
        });
        info!(run_id = %run_id, nodes = prepared.content.node_configs.len(), "Flow run started");

        if prepared.graphs.is_root_aborted()
            || prepared.graphs.has_error(GraphTraverseError::Circle)
        {
            error!(run_id = %run_id, "Flow contains a cycle, aborting run");
            return finish(
                &events,
                RunOutcome::from_store(run_id, RunStatus::Aborted, RunStore::new(), validation_errors),
            );
        }
        for node_id in prepared.graphs.nodes_with(GraphTraverseError::Overlap) {
            warn!(run_id = %run_id, node_id = %node_id, "Node belongs to more than one graph");
        }

        let shared = Arc::new(RunShared {
            run_id: run_id.clone(),
            registry: Arc::clone(&self.registry),
            prepared,
            config: self.config.clone(),
            secrets: self.secrets.clone(),
            events: Arc::clone(&events),
            cancel,
            store: Mutex::new(RunStore::new()),
        });
        shared.seed_inputs(&inputs);

        let root = run_partition(Arc::clone(&shared), ComputedGraphs::root_id()).await;

        let store = std::mem::take(&mut *shared.store());
        let status = if root.cancelled {
            RunStatus::Cancelled
        } else if store.has_errors() {
            RunStatus::FinishedWithErrors
        } else {
            RunStatus::Finished
        };

        finish(
            &events,
            RunOutcome::from_store(run_id, status, store, validation_errors),
        )
    }
}

fn finish(events: &EventBus, outcome: RunOutcome) -> RunOutcome {
    info!(
        run_id = %outcome.run_id,
        status = ?outcome.status,
        node_errors = outcome.node_errors.len(),
        "Flow run finished"
    );
    events.publish(RunEvent::RunFinished {
        run_id: outcome.run_id.clone(),
        status: outcome.status,
    });
    outcome
}

/// State one run shares between its node tasks. The store lock is never
/// held across an await.
struct RunShared {
    run_id: RunId,
    registry: Arc<NodeRegistry>,
    prepared: Arc<PreparedFlow>,
    config: RunConfig,
    secrets: AccountSecrets,
    events: Arc<EventBus>,
    cancel: CancellationToken,
    store: Mutex<RunStore>,
}

#[derive(Debug, Default)]
struct PartitionOutcome {
    fired: HashSet<ConnectorId>,
    cancelled: bool,
}

type NodeTask = BoxFuture<'static, (NodeId, Vec<ConnectorId>)>;

/// Drive one partition until its frontier is exhausted.
fn run_partition(shared: Arc<RunShared>, partition_id: NodeId) -> BoxFuture<'static, PartitionOutcome> {
    Box::pin(async move {
        let mut outcome = PartitionOutcome::default();

        let Some(shape) = shared.prepared.partition(&partition_id) else {
            warn!(partition = %partition_id, "No graph for partition");
            return outcome;
        };
        let mut state = shape.get_mutable_copy();

        if shared.cancel.is_cancelled() {
            outcome.cancelled = true;
            return outcome;
        }

        let mut ready = state.reduce_indegrees(shared.prepared.external_sources(&partition_id));
        ready.extend(state.claim_runnable_nodes());
        debug!(partition = %partition_id, runnable = ?ready, "Starting partition");

        let mut running: FuturesUnordered<NodeTask> = FuturesUnordered::new();
        for node_id in ready {
            running.push(run_node(Arc::clone(&shared), node_id));
        }

        while !running.is_empty() {
            let next = tokio::select! {
                biased;
                _ = shared.cancel.cancelled() => None,
                next = running.next() => next,
            };
            let Some((node_id, fired)) = next else {
                break;
            };

            // Results that land after cancellation are dropped.
            if shared.cancel.is_cancelled() {
                break;
            }

            let newly_runnable = state.reduce_indegrees(&fired);
            debug!(
                node_id = %node_id,
                fired = fired.len(),
                runnable = ?newly_runnable,
                "Node completed"
            );
            outcome.fired.extend(fired);

            for node_id in newly_runnable {
                if shared.cancel.is_cancelled() {
                    break;
                }
                running.push(run_node(Arc::clone(&shared), node_id));
            }
        }

        outcome.cancelled = shared.cancel.is_cancelled();
        outcome
    })
}

fn run_node(shared: Arc<RunShared>, node_id: NodeId) -> NodeTask {
    Box::pin(async move {
        let fired = shared.execute_node(&node_id).await;
        (node_id, fired)
    })
}

impl RunShared {
    fn store(&self) -> MutexGuard<'_, RunStore> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn publish_node(&self, node_id: &NodeId, event: NodeExecutionEvent) {
        self.events.publish(RunEvent::Node {
            run_id: self.run_id.clone(),
            node_id: node_id.clone(),
            event,
        });
    }

    /// Write flow inputs into the output variables of every InputNode.
    fn seed_inputs(&self, inputs: &FlowInputs) {
        let content = &self.prepared.content;
        let mut store = self.store();
        for config in content.node_configs.values() {
            if config.node_type() != NodeType::InputNode {
                continue;
            }
            for variable in content.output_variables(&config.node_id) {
                let value = inputs
                    .get(variable.id.as_str())
                    .or_else(|| inputs.get(&variable.name))
                    .cloned()
                    .unwrap_or(Value::Null);
                store.write(variable, value);
            }
        }
    }

    /// Run one node and return the connectors it fired.
    async fn execute_node(self: &Arc<Self>, node_id: &NodeId) -> Vec<ConnectorId> {
        let Some(config) = self.prepared.content.node_configs.get(node_id) else {
            self.store()
                .record_errors(node_id, vec![format!("Node '{}' not found", node_id)]);
            return Vec::new();
        };

        if self.cancel.is_cancelled() {
            return Vec::new();
        }
        self.publish_node(node_id, NodeExecutionEvent::Started);
        info!(
            run_id = %self.run_id,
            node_id = %node_id,
            node_type = %config.node_type(),
            "Executing flow node"
        );

        let result = match &config.params {
            NodeParams::Loop { loop_start_node_id } => {
                self.run_loop(node_id, loop_start_node_id.as_ref()).await
            }
            _ => self.run_definition(config).await,
        };

        if self.cancel.is_cancelled() {
            debug!(run_id = %self.run_id, node_id = %node_id, "Discarding node result after cancellation");
            return Vec::new();
        }

        let fired = self.apply_result(config, result);
        self.publish_node(node_id, NodeExecutionEvent::Finished);
        fired
    }

    async fn run_definition(&self, config: &NodeConfig) -> RunNodeResult {
        let definition = match self.registry.get(config.node_type()) {
            Ok(definition) => definition,
            Err(e) => return RunNodeResult::error(e.to_string()),
        };

        let context = self.node_context(config);
        let written: Vec<ConnectorId> = written_variables(config.kind(), &context)
            .iter()
            .map(|v| v.id.clone())
            .collect();

        let mut emissions = definition.run(context);
        let mut merged = RunNodeResult::empty();
        loop {
            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                next = emissions.next() => match next {
                    Some(result) => result,
                    None => break,
                },
            };
            if let Some(values) = &result.variable_values {
                let partial = written.iter().cloned().zip(values.iter().cloned()).collect();
                self.publish_node(&config.node_id, NodeExecutionEvent::PartialValues(partial));
            }
            merged.merge(result);
        }
        merged
    }

    fn node_context(&self, config: &NodeConfig) -> NodeRunContext {
        let content = &self.prepared.content;
        let node_id = &config.node_id;

        let input_variables: Vec<VariableConnector> =
            content.input_variables(node_id).into_iter().cloned().collect();
        let output_variables: Vec<VariableConnector> =
            content.output_variables(node_id).into_iter().cloned().collect();

        let input_values = {
            let store = self.store();
            if config.kind().is_start() {
                output_variables.iter().map(|v| store.read(v, None)).collect()
            } else {
                input_variables
                    .iter()
                    .map(|v| store.read(v, self.prepared.source_variable(&v.id)))
                    .collect()
            }
        };

        NodeRunContext {
            node_config: config.clone(),
            input_variables,
            input_values,
            output_variables,
            outgoing_conditions: content
                .outgoing_conditions(node_id)
                .into_iter()
                .cloned()
                .collect(),
            secrets: self.secrets.clone(),
            prefer_streaming: self.config.prefer_streaming,
        }
    }

    /// Record a node's final result and return what it fired. A failed node
    /// fires nothing and writes nothing.
    fn apply_result(&self, config: &NodeConfig, result: RunNodeResult) -> Vec<ConnectorId> {
        let content = &self.prepared.content;
        let node_id = &config.node_id;

        if result.has_errors() {
            warn!(run_id = %self.run_id, node_id = %node_id, errors = ?result.errors, "Flow node failed");
            self.publish_node(node_id, NodeExecutionEvent::Errors(result.errors.clone()));
            self.store().record_errors(node_id, result.errors);
            return Vec::new();
        }

        let kind = config.kind();
        let written: Vec<&VariableConnector> = if kind == NodeKind::Finish {
            content.input_variables(node_id)
        } else {
            content.output_variables(node_id)
        };
        let conditions = content.outgoing_conditions(node_id);
        let mut fired = Vec::new();

        let mut store = self.store();
        if let Some(values) = result.variable_values {
            for (variable, value) in written.iter().zip(values) {
                if config.node_type() == NodeType::OutputNode {
                    store.flow_outputs.insert(variable.id.clone(), value.clone());
                }
                store.write(variable, value);
            }
        }

        match result.condition_results {
            Some(results) => {
                for (condition, outcome) in conditions.iter().zip(results) {
                    store.record_condition(&condition.id, outcome);
                    if outcome.is_condition_matched {
                        fired.push(condition.id.clone());
                    }
                }
            }
            None => fired.extend(conditions.iter().map(|c| c.id.clone())),
        }

        if kind != NodeKind::Finish {
            fired.extend(written.iter().map(|v| v.id.clone()));
        }
        fired
    }

    /// Re-run the LoopStart partition until its LoopFinish breaks.
    async fn run_loop(self: &Arc<Self>, node_id: &NodeId, loop_start_id: Option<&NodeId>) -> RunNodeResult {
        let Some(loop_start_id) = loop_start_id else {
            return RunNodeResult::error("Loop start node is not set");
        };
        if self.prepared.partition(loop_start_id).is_none() {
            return RunNodeResult::error(format!("Loop start node '{}' has no loop graph", loop_start_id));
        }
        let Some(exits) = self.prepared.loop_exits(loop_start_id).cloned() else {
            return RunNodeResult::error("Loop graph has no Loop Finish node with continue and break targets");
        };

        let max_iterations = self.config.loop_max_iterations.max(1);

        for iteration in 1..=max_iterations {
            self.events.publish(RunEvent::LoopIteration {
                run_id: self.run_id.clone(),
                node_id: node_id.clone(),
                iteration,
            });
            debug!(node_id = %node_id, iteration, "Running loop iteration");

            let pass = run_partition(Arc::clone(self), loop_start_id.clone()).await;
            if pass.cancelled {
                return RunNodeResult::empty();
            }

            let reached: HashSet<&ConnectorId> = self.prepared.reached_targets(&pass.fired).collect();
            let is_continue = reached.contains(&exits.continue_target);
            let is_break = reached.contains(&exits.break_target);

            if is_continue && is_break {
                warn!(node_id = %node_id, "Both continue and break are met");
            }

            if is_break {
                info!(node_id = %node_id, iterations = iteration, "Loop finished");
                return RunNodeResult::empty();
            }
            if !is_continue {
                return RunNodeResult::error("Neither continue nor break is met");
            }
        }

        warn!(node_id = %node_id, max_iterations, "Loop reached its iteration limit");
        RunNodeResult::empty()
    }
}

/// Variables a node's result values land in: the inputs of Finish nodes, the
/// outputs of everything else.
fn written_variables(kind: NodeKind, context: &NodeRunContext) -> &[VariableConnector] {
    if kind == NodeKind::Finish {
        &context.input_variables
    } else {
        &context.output_variables
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use std::time::Duration;

    use playflow_test_utils::fixtures;
    use playflow_test_utils::{drain_events, mock_clients, mock_registry, MockChatClient};

    use crate::validation::ValidationError;

    fn executor(config: RunConfig, secrets: AccountSecrets) -> FlowExecutor {
        FlowExecutor::new(mock_registry(), config, secrets)
    }

    fn with_openai_key() -> AccountSecrets {
        AccountSecrets {
            open_ai_api_key: Some("sk-test".into()),
            ..AccountSecrets::default()
        }
    }

    async fn run_with(
        executor: &FlowExecutor,
        content: playflow_core::FlowContent,
        inputs: FlowInputs,
        cancel: CancellationToken,
    ) -> (RunOutcome, Vec<RunEvent>) {
        let prepared = Arc::new(PreparedFlow::prepare(content).unwrap());
        let events = Arc::new(EventBus::new(1024));
        let mut rx = events.subscribe();
        let outcome = executor.run(prepared, inputs, events, cancel).await;
        (outcome, drain_events(&mut rx))
    }

    async fn run(content: playflow_core::FlowContent, inputs: FlowInputs) -> (RunOutcome, Vec<RunEvent>) {
        let executor = executor(RunConfig::default(), with_openai_key());
        run_with(&executor, content, inputs, CancellationToken::new()).await
    }

    fn inputs(pairs: &[(&str, Value)]) -> FlowInputs {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn node_events<'a>(events: &'a [RunEvent], node: &str) -> Vec<&'a NodeExecutionEvent> {
        events
            .iter()
            .filter_map(|e| match e {
                RunEvent::Node { node_id, event, .. } if node_id.as_str() == node => Some(event),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_linear_flow_outputs() {
        let (outcome, _) = run(fixtures::linear_flow(), inputs(&[("topic", json!("world"))])).await;

        assert_eq!(outcome.status, RunStatus::Finished);
        assert_eq!(outcome.flow_output("C/result"), Some(&json!("Hello world!")));
        assert_eq!(
            outcome.variable_values.get("B/content"),
            Some(&json!("Hello world!"))
        );
        assert!(outcome.node_errors.is_empty());
    }

    #[tokio::test]
    async fn test_inputs_by_connector_id() {
        let (outcome, _) = run(fixtures::linear_flow(), inputs(&[("A/topic", json!("there"))])).await;
        assert_eq!(outcome.flow_output("C/result"), Some(&json!("Hello there!")));
    }

    #[tokio::test]
    async fn test_event_order() {
        let (outcome, events) = run(fixtures::linear_flow(), inputs(&[("topic", json!("x"))])).await;

        assert!(matches!(events.first(), Some(RunEvent::RunStarted { .. })));
        assert!(matches!(
            events.last(),
            Some(RunEvent::RunFinished { status: RunStatus::Finished, .. })
        ));
        assert!(events.iter().all(|e| e.run_id() == &outcome.run_id));

        let b = node_events(&events, "B");
        assert_eq!(b.first(), Some(&&NodeExecutionEvent::Started));
        assert!(matches!(b[1], NodeExecutionEvent::PartialValues(values)
            if values.get("B/content") == Some(&json!("Hello x!"))));
        assert_eq!(b.last(), Some(&&NodeExecutionEvent::Finished));

        let position = |node: &str| {
            events
                .iter()
                .position(|e| matches!(e, RunEvent::Node { node_id, event: NodeExecutionEvent::Started, .. } if node_id.as_str() == node))
                .unwrap()
        };
        assert!(position("A") < position("B"));
        assert!(position("B") < position("C"));
    }

    #[tokio::test]
    async fn test_condition_branch() {
        let (outcome, _) = run(fixtures::branch_flow(), inputs(&[("value", json!("Value B"))])).await;

        assert_eq!(outcome.status, RunStatus::Finished);
        assert_eq!(outcome.flow_output("Y/out"), Some(&json!("Value B")));
        assert!(outcome.flow_output("X/out").is_none());
        assert!(outcome.flow_output("D/out").is_none());
        assert!(outcome.condition_results["K/b"].is_condition_matched);
        assert!(!outcome.condition_results["K/default"].is_condition_matched);
    }

    #[tokio::test]
    async fn test_condition_default_case() {
        let (outcome, _) = run(fixtures::branch_flow(), inputs(&[("value", json!("other"))])).await;

        assert_eq!(outcome.flow_output("D/out"), Some(&json!("other")));
        assert!(outcome.flow_output("X/out").is_none());
        assert!(outcome.flow_output("Y/out").is_none());
    }

    #[tokio::test]
    async fn test_node_error_stops_dependents() {
        let (outcome, events) = run(fixtures::failing_flow(), inputs(&[("x", json!(1))])).await;

        assert_eq!(outcome.status, RunStatus::FinishedWithErrors);
        assert!(outcome.node_errors["J"][0].contains("boom"));
        assert!(outcome.variable_values.get("J/output").is_none());
        assert!(outcome.flow_outputs.is_empty());
        assert!(node_events(&events, "C").is_empty());
        assert!(node_events(&events, "J")
            .iter()
            .any(|e| matches!(e, NodeExecutionEvent::Errors(_))));
    }

    #[tokio::test]
    async fn test_missing_openai_key() {
        let executor = executor(RunConfig::default(), AccountSecrets::default());
        let (outcome, _) = run_with(
            &executor,
            fixtures::chat_flow(),
            FlowInputs::new(),
            CancellationToken::new(),
        )
        .await;

        assert_eq!(outcome.status, RunStatus::FinishedWithErrors);
        assert_eq!(outcome.node_errors["G"], vec!["OpenAI API key is missing".to_string()]);
        assert!(outcome.variable_values.get("G/content").is_none());
        assert!(outcome
            .validation_errors
            .iter()
            .any(|e| matches!(e, ValidationError::AccountLevel { .. })));
    }

    #[tokio::test]
    async fn test_chat_completion() {
        let (outcome, _) = run(fixtures::chat_flow(), FlowInputs::new()).await;

        assert_eq!(outcome.status, RunStatus::Finished);
        assert_eq!(outcome.flow_output("O/content"), Some(&json!("Hello from the mock")));
        assert_eq!(outcome.variable_values["G/messages_out"][0]["role"], json!("assistant"));
    }

    #[tokio::test]
    async fn test_streamed_chat_completion_emits_partials() {
        let config = RunConfig {
            prefer_streaming: true,
            ..RunConfig::default()
        };
        let executor = executor(config, with_openai_key());
        let (outcome, events) = run_with(
            &executor,
            fixtures::chat_flow(),
            FlowInputs::new(),
            CancellationToken::new(),
        )
        .await;

        assert_eq!(outcome.flow_output("O/content"), Some(&json!("Hello from the mock")));
        let partials = node_events(&events, "G")
            .into_iter()
            .filter(|e| matches!(e, NodeExecutionEvent::PartialValues(_)))
            .count();
        assert!(partials > 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let executor = executor(RunConfig::default(), with_openai_key());

        for _ in 0..32 {
            let cancel = CancellationToken::new();
            cancel.cancel();

            let (outcome, events) = run_with(
                &executor,
                fixtures::linear_flow(),
                inputs(&[("topic", json!("x"))]),
                cancel,
            )
            .await;

            assert_eq!(outcome.status, RunStatus::Cancelled);
            assert!(outcome.flow_outputs.is_empty());
            assert!(outcome.variable_values.get("B/content").is_none());
            assert!(!events.iter().any(|e| matches!(e, RunEvent::Node { .. })));
            assert!(matches!(
                events.last(),
                Some(RunEvent::RunFinished { status: RunStatus::Cancelled, .. })
            ));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_node_in_flight() {
        let mut clients = mock_clients();
        clients.chat = Arc::new(MockChatClient::new("too late").with_delay(Duration::from_secs(60)));
        let executor = FlowExecutor::new(
            Arc::new(NodeRegistry::with_builtins(clients)),
            RunConfig::default(),
            with_openai_key(),
        );

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = tokio::time::Instant::now();
        let (outcome, events) =
            run_with(&executor, fixtures::chat_flow(), FlowInputs::new(), cancel).await;

        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(outcome.status, RunStatus::Cancelled);
        assert_eq!(node_events(&events, "G"), vec![&NodeExecutionEvent::Started]);
        assert!(node_events(&events, "O").is_empty());
        assert!(outcome.variable_values.get("G/content").is_none());
        assert!(outcome.flow_outputs.is_empty());
    }

    #[tokio::test]
    async fn test_cycle_aborts() {
        let (outcome, events) = run(fixtures::cyclic_flow(), FlowInputs::new()).await;

        assert_eq!(outcome.status, RunStatus::Aborted);
        assert!(outcome
            .validation_errors
            .iter()
            .any(|e| matches!(e, ValidationError::FlowLevel { .. })));
        assert!(!events.iter().any(|e| matches!(e, RunEvent::Node { .. })));
    }

    #[tokio::test]
    async fn test_loop_counts_to_three() {
        let (outcome, events) = run(fixtures::loop_counter_flow(), FlowInputs::new()).await;

        assert_eq!(outcome.status, RunStatus::Finished);
        assert_eq!(outcome.flow_output("771RQ/tQ7Ul"), Some(&json!(3)));
        assert_eq!(outcome.global_variable_values["vbiQR"], json!(3));

        let iterations = events
            .iter()
            .filter(|e| matches!(e, RunEvent::LoopIteration { .. }))
            .count();
        assert_eq!(iterations, 3);
    }

    #[tokio::test]
    async fn test_loop_iteration_cap() {
        let config = RunConfig {
            loop_max_iterations: 2,
            ..RunConfig::default()
        };
        let executor = executor(config, AccountSecrets::default());
        let (outcome, _) = run_with(
            &executor,
            fixtures::loop_counter_flow(),
            FlowInputs::new(),
            CancellationToken::new(),
        )
        .await;

        assert_eq!(outcome.status, RunStatus::Finished);
        assert_eq!(outcome.flow_output("771RQ/tQ7Ul"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_loop_without_start_node() {
        let mut content = fixtures::loop_counter_flow();
        if let Some(config) = content.node_configs.get_mut("HLDHJ") {
            config.params = NodeParams::Loop { loop_start_node_id: None };
        }

        let (outcome, _) = run(content, FlowInputs::new()).await;

        assert_eq!(outcome.status, RunStatus::FinishedWithErrors);
        assert_eq!(outcome.node_errors["HLDHJ"], vec!["Loop start node is not set".to_string()]);
        assert!(outcome.flow_outputs.is_empty());
    }
}
