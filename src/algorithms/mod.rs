//! Search strategies driven through an ask/tell interface.
//!
//! Algorithms are pure with respect to their state: `ask` and `tell` read a state
//! and return a new one. All randomness comes from the [`Key`](crate::models::Key)
//! stored in that state. Algorithms always minimize. The workflow maps raw fitness
//! into minimization form before calling `tell`.

mod errors;
mod genetic;
mod open_es;
mod pso;

pub use errors::Error;
pub use genetic::{GeneticAlgorithm, GeneticAlgorithmBuilder, GeneticAlgorithmState};
pub use open_es::{OpenEs, OpenEsBuilder, OpenEsState, Optimizer};
pub use pso::{Pso, PsoBuilder, PsoState};

use crate::models::{Key, Population};
use serde::{Serialize, de::DeserializeOwned};

pub trait Algorithm: Send + Sync {
    type State: Clone + Send + Sync + Serialize + DeserializeOwned;

    /// Creates the initial state from `key`.
    fn init(&self, key: Key) -> Result<Self::State, Error>;

    /// Proposes the next population to evaluate.
    fn ask(&self, state: &Self::State) -> Result<(Population, Self::State), Error>;

    /// Consumes the fitness (minimization form) of the population returned by the last `ask`.
    fn tell(&self, state: &Self::State, fitness: &[f64]) -> Result<Self::State, Error>;
}
