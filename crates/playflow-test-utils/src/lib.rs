//! Shared test utilities for Playflow crates.

pub mod builder;
pub mod fixtures;
pub mod mocks;

use std::io::Write;
use std::sync::Arc;

use tokio::sync::broadcast;

use playflow_core::RunEvent;
use playflow_nodes::{IntegrationClients, NodeRegistry};

pub use builder::FlowBuilder;
pub use mocks::{MockChatClient, MockInferenceClient, MockSpeechClient};

/// Integration clients that never touch the network.
pub fn mock_clients() -> IntegrationClients {
    IntegrationClients {
        chat: Arc::new(MockChatClient::new("Hello from the mock")),
        inference: Arc::new(MockInferenceClient::default()),
        speech: Arc::new(MockSpeechClient),
    }
}

/// A registry with every built-in node type, wired to the mocks.
pub fn mock_registry() -> Arc<NodeRegistry> {
    Arc::new(NodeRegistry::with_builtins(mock_clients()))
}

/// Drain every event already published to `rx`.
pub fn drain_events(rx: &mut broadcast::Receiver<RunEvent>) -> Vec<RunEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    events
}

/// Write `contents` to a temporary `.toml` file.
pub fn write_temp_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("create temp config");
    file.write_all(contents.as_bytes()).expect("write temp config");
    file
}
