//! Per-run value store.

use std::collections::HashMap;

use serde_json::Value;

use playflow_core::{ConditionResult, ConnectorId, NodeId, VariableConnector};

/// Last-write-wins values of one run. Variables with a `global_variable_id`
/// live in the shared global slot instead of their own.
#[derive(Debug, Clone, Default)]
pub struct RunStore {
    pub variable_values: HashMap<ConnectorId, Value>,
    pub global_values: HashMap<String, Value>,
    pub condition_results: HashMap<ConnectorId, ConditionResult>,
    pub node_errors: HashMap<NodeId, Vec<String>>,
    pub flow_outputs: HashMap<ConnectorId, Value>,
}

impl RunStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of `variable`. An unset slot reads as `null`.
    ///
    /// `source` is the output wired into `variable`, if any. A global
    /// variable always reads its slot; otherwise the source's value is used.
    pub fn read(&self, variable: &VariableConnector, source: Option<&VariableConnector>) -> Value {
        if let Some(global_id) = &variable.global_variable_id {
            return self.global_values.get(global_id).cloned().unwrap_or(Value::Null);
        }
        match source {
            Some(source) => self.own_value(source),
            None => self.own_value(variable),
        }
    }

    fn own_value(&self, variable: &VariableConnector) -> Value {
        let value = match &variable.global_variable_id {
            Some(global_id) => self.global_values.get(global_id),
            None => self.variable_values.get(&variable.id),
        };
        value.cloned().unwrap_or(Value::Null)
    }

    pub fn write(&mut self, variable: &VariableConnector, value: Value) {
        match &variable.global_variable_id {
            Some(global_id) => {
                self.global_values.insert(global_id.clone(), value);
            }
            None => {
                self.variable_values.insert(variable.id.clone(), value);
            }
        }
    }

    pub fn record_condition(&mut self, condition_id: &ConnectorId, result: ConditionResult) {
        self.condition_results.insert(condition_id.clone(), result);
    }

    pub fn record_errors(&mut self, node_id: &NodeId, errors: Vec<String>) {
        self.node_errors
            .entry(node_id.clone())
            .or_default()
            .extend(errors);
    }

    pub fn has_errors(&self) -> bool {
        !self.node_errors.is_empty()
    }
}
