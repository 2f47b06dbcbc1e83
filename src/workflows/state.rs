use crate::models::Key;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Immutable snapshot of a workflow run.
///
/// Every [`step`](super::StdWorkflow::step) reads a state and returns a new one,
/// the input is left untouched. `best_fitness` is raw fitness (not mapped to
/// minimization) and never gets worse from one state to the next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State<AS, PS> {
    pub(crate) id: Uuid,
    pub(crate) key: Key,
    pub(crate) generation: u32,
    pub(crate) evaluations: u64,
    #[serde(with = "crate::models::float_serde::option")]
    pub(crate) best_fitness: Option<f64>,
    pub(crate) best_solution: Option<Vec<f64>>,
    pub(crate) algorithm: AS,
    pub(crate) problem: PS,
}

impl<AS, PS> State<AS, PS> {
    /// Run id, shared by every state derived from the same `init`.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Key the run was initialized with.
    pub fn key(&self) -> Key {
        self.key
    }

    /// Number of completed steps.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Total number of individuals evaluated.
    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }

    pub fn best_fitness(&self) -> Option<f64> {
        self.best_fitness
    }

    /// Best candidate as proposed by the algorithm, before the solution transform.
    pub fn best_solution(&self) -> Option<&[f64]> {
        self.best_solution.as_deref()
    }

    pub fn algorithm(&self) -> &AS {
        &self.algorithm
    }

    pub fn problem(&self) -> &PS {
        &self.problem
    }
}
