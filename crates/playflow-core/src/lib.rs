pub mod config;
pub mod connector;
pub mod error;
pub mod event;
pub mod flow;
pub mod traits;
pub mod types;

pub use config::{AccountSecrets, AppConfig, SecretKind};
pub use connector::*;
pub use error::{PlayflowError, Result};
pub use event::EventBus;
pub use flow::{ConnectorMap, FlowContent, NodeConfigMap};
pub use types::*;
