//! Batch runs: every input row, repeated, under a concurrency limit.

use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use playflow_core::{EventBus, RunEvent};

use crate::executor::{FlowExecutor, FlowInputs};
use crate::outcome::BatchRunResult;
use crate::prepared::PreparedFlow;

/// A run event tagged with the batch cell it came from.
#[derive(Debug, Clone, Serialize)]
pub struct BatchEvent {
    pub iteration_index: usize,
    pub row_index: usize,
    pub event: RunEvent,
}

pub struct BatchRunner {
    executor: Arc<FlowExecutor>,
    events: broadcast::Sender<BatchEvent>,
    cancel: CancellationToken,
}

impl BatchRunner {
    pub fn new(executor: Arc<FlowExecutor>) -> Self {
        let (events, _) = broadcast::channel(executor.config().event_buffer.max(1));
        Self {
            executor,
            events,
            cancel: CancellationToken::new(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BatchEvent> {
        self.events.subscribe()
    }

    /// Cancelling this token cancels every run of the batch.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run `rows × repeat` independent runs, at most `concurrency` at a time.
    /// Results arrive in completion order.
    pub fn run_batch(
        &self,
        prepared: Arc<PreparedFlow>,
        rows: Vec<FlowInputs>,
        repeat: usize,
        concurrency: usize,
    ) -> BoxStream<'static, BatchRunResult> {
        let cells: Vec<(usize, usize, FlowInputs)> = (0..repeat)
            .flat_map(|iteration_index| {
                rows.iter()
                    .enumerate()
                    .map(move |(row_index, row)| (iteration_index, row_index, row.clone()))
            })
            .collect();

        info!(
            runs = cells.len(),
            rows = rows.len(),
            repeat,
            concurrency,
            "Starting batch run"
        );

        let executor = Arc::clone(&self.executor);
        let events = self.events.clone();
        let cancel = self.cancel.clone();

        stream::iter(cells)
            .map(move |(iteration_index, row_index, inputs)| {
                let executor = Arc::clone(&executor);
                let prepared = Arc::clone(&prepared);
                let events = events.clone();
                let cancel = cancel.child_token();

                async move {
                    let bus = Arc::new(EventBus::new(executor.config().event_buffer.max(1)));
                    let mut rx = bus.subscribe();

                    let forward = async move {
                        loop {
                            match rx.recv().await {
                                Ok(event) => {
                                    let _ = events.send(BatchEvent {
                                        iteration_index,
                                        row_index,
                                        event,
                                    });
                                }
                                Err(RecvError::Lagged(skipped)) => {
                                    warn!(iteration_index, row_index, skipped, "Batch event forwarder lagged");
                                }
                                Err(RecvError::Closed) => break,
                            }
                        }
                    };

                    let run = executor.run(prepared, inputs, bus, cancel);
                    let (outcome, ()) = tokio::join!(run, forward);

                    BatchRunResult {
                        iteration_index,
                        row_index,
                        outcome,
                    }
                }
            })
            .buffer_unordered(concurrency.max(1))
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use playflow_core::config::RunConfig;
    use playflow_core::{AccountSecrets, FlowContent};
    use playflow_nodes::NodeRegistry;

    #[tokio::test]
    async fn test_empty_batch_yields_nothing() {
        let executor = Arc::new(FlowExecutor::new(
            Arc::new(NodeRegistry::new()),
            RunConfig::default(),
            AccountSecrets::default(),
        ));
        let runner = BatchRunner::new(executor);
        let prepared = Arc::new(PreparedFlow::prepare(FlowContent::new()).unwrap());

        let results: Vec<_> = runner
            .run_batch(prepared, vec![HashMap::new()], 0, 2)
            .collect()
            .await;
        assert!(results.is_empty());
    }
}
