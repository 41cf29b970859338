pub mod definition;
pub mod expression;
pub mod nodes;
pub mod registry;

pub use definition::{NodeDefinition, NodeRunContext, NodeRunStream};
pub use expression::{is_truthy, Expression, ExpressionError};
pub use registry::{check_connector_contract, IntegrationClients, NodeRegistry};
