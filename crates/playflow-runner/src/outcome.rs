use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use playflow_core::{ConditionResult, ConnectorId, NodeId, RunId, RunStatus};

use crate::store::RunStore;
use crate::validation::ValidationError;

/// Everything a finished run leaves behind.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub run_id: RunId,
    pub status: RunStatus,
    pub variable_values: HashMap<ConnectorId, Value>,
    pub global_variable_values: HashMap<String, Value>,
    pub condition_results: HashMap<ConnectorId, ConditionResult>,
    pub node_errors: HashMap<NodeId, Vec<String>>,
    /// Values received by OutputNode inputs, keyed by connector id.
    pub flow_outputs: HashMap<ConnectorId, Value>,
    pub validation_errors: Vec<ValidationError>,
}

impl RunOutcome {
    pub(crate) fn from_store(
        run_id: RunId,
        status: RunStatus,
        store: RunStore,
        validation_errors: Vec<ValidationError>,
    ) -> Self {
        Self {
            run_id,
            status,
            variable_values: store.variable_values,
            global_variable_values: store.global_values,
            condition_results: store.condition_results,
            node_errors: store.node_errors,
            flow_outputs: store.flow_outputs,
            validation_errors,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Finished
    }

    pub fn flow_output(&self, connector_id: &str) -> Option<&Value> {
        self.flow_outputs.get(connector_id)
    }
}

/// One run of a batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchRunResult {
    pub iteration_index: usize,
    pub row_index: usize,
    pub outcome: RunOutcome,
}
