mod builder;

pub mod algorithms;
pub mod bootstrap;
pub mod models;
pub mod monitors;
pub mod problems;
pub mod workflows;

pub use workflows::{StdWorkflow, WorkflowState};
