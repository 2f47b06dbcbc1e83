mod crossover;
mod distribution;
pub(crate) mod float_serde;
mod gene_bounds;
mod goal;
mod key;
mod mutagen;
mod population;
mod schedule;
mod selector;

pub use crossover::{AlphaOutOfRangeError, Crossover, ProbabilityOutOfRangeError};
pub use distribution::Distribution;
pub use gene_bounds::{GeneBoundError, GeneBounds};
pub use goal::{FitnessGoal, ThresholdNotFinite};
pub use key::Key;
pub use mutagen::{
    Decay, Mutagen, MutagenError, MutationRate, MutationRateOutOfRange, Temperature,
    TemperatureOutOfRange,
};
pub use population::{Population, PopulationError};
pub use schedule::{Schedule, ScheduleDecision};
pub use selector::{SelectionError, SelectionMethod, Selector};
pub(crate) use selector::rank;
