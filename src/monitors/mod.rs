//! Observers of a running workflow.

mod eval_monitor;

pub use eval_monitor::{EvalMonitor, EvalMonitorBuilder, GenerationSummary};

use crate::models::{FitnessGoal, Population};
use futures::future::BoxFuture;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("Closed: the monitor is no longer recording")]
    Closed,
    #[error("NoRuntime: the monitor must be created inside a tokio runtime")]
    NoRuntime,
}

/// Emitted after the algorithm proposed a population.
#[derive(Debug, Clone, Copy)]
pub struct AskContext<'a> {
    pub generation: u32,
    pub population: &'a Population,
}

/// Emitted after a population was evaluated.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub generation: u32,
    /// Candidates as proposed by the algorithm
    pub candidates: &'a Population,
    /// Candidates as evaluated, after the solution transform. Same rows as
    /// `candidates` when the workflow has no transform.
    pub population: &'a Population,
    /// Raw fitness as returned by the problem
    pub fitness: &'a [f64],
    pub goal: FitnessGoal,
}

/// Hooks called by the workflow. Hooks must not block, monitors that do work
/// should hand it off and settle it in [`Monitor::flush`].
pub trait Monitor: Send + Sync {
    fn post_ask(&self, _context: &AskContext<'_>) {}

    fn post_eval(&self, context: &EvalContext<'_>);

    /// Resolves once everything posted before the call has been processed.
    fn flush(&self) -> BoxFuture<'_, Result<(), Error>>;
}
