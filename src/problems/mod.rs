//! Fitness evaluation.
//!
//! A [`Problem`] maps every row of a [`Population`] to one raw fitness value.
//! Whether lower or higher is better is decided by the workflow's
//! [`FitnessGoal`](crate::models::FitnessGoal), not by the problem.

pub mod gym;
mod numerical;

pub use numerical::{Ackley, FnProblem, Rastrigin, Rosenbrock, Sphere};

use crate::models::{Key, Population};
use futures::future::BoxFuture;
use serde::{Serialize, de::DeserializeOwned};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("EvaluationError: {0}")]
    EvaluationError(#[from] anyhow::Error),
    #[error("DimensionMismatch: expected {expected} genes, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("GymError: {0}")]
    GymError(#[from] gym::Error),
}

pub trait Problem: Send + Sync {
    type State: Clone + Send + Sync + Serialize + DeserializeOwned;

    fn init(&self, key: Key) -> Result<Self::State, Error>;

    /// Returns one fitness value per row of `population`, in row order.
    fn evaluate<'a>(
        &'a self,
        state: &'a Self::State,
        population: &'a Population,
    ) -> BoxFuture<'a, Result<(Vec<f64>, Self::State), Error>>;
}
