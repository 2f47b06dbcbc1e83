//! Workflows tie an [`Algorithm`](crate::algorithms::Algorithm), a
//! [`Problem`](crate::problems::Problem) and any number of
//! [`Monitor`](crate::monitors::Monitor)s into a generation loop.

pub mod checkpoint;
mod errors;
mod state;
mod workflow;

pub use errors::Error;
pub use state::State;
pub use workflow::{Conclusion, StdWorkflow, StdWorkflowBuilder, WorkflowState};
