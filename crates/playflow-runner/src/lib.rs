pub mod batch;
pub mod executor;
pub mod outcome;
pub mod prepared;
pub mod store;
pub mod validation;

pub use batch::{BatchEvent, BatchRunner};
pub use executor::{FlowExecutor, FlowInputs};
pub use outcome::{BatchRunResult, RunOutcome};
pub use prepared::{LoopExits, PreparedFlow};
pub use store::RunStore;
pub use validation::{validate_flow, ValidationError};
