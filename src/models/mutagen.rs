use super::GeneBounds;
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

/// How a mutation parameter shrinks as a run progresses from 0 to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Decay {
    Constant,
    /// `1 - multiplier * progress`, floored at 0
    Linear { multiplier: f64 },
    /// The linear factor raised to `exponent`
    Exponential { multiplier: f64, exponent: i32 },
}

impl Decay {
    fn factor(&self, progress: f64) -> f64 {
        let linear = |multiplier: f64| (1.0 - progress * multiplier).max(0.0);

        match *self {
            Decay::Constant => 1.0,
            Decay::Linear { multiplier } => linear(multiplier),
            Decay::Exponential {
                multiplier,
                exponent,
            } => linear(multiplier).powi(exponent),
        }
    }
}

/// Declares a mutation parameter in `[0, 1]` that decays with progress.
macro_rules! decaying_parameter {
    ($(#[$meta:meta])* $name:ident, $error:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        pub struct $name {
            value: f64,
            decay: Decay,
        }

        #[derive(Debug, thiserror::Error, PartialEq)]
        #[error("{}: must be between 0.0 and 1.0, got {}", stringify!($name), .0)]
        pub struct $error(f64);

        impl $name {
            pub fn new(value: f64, decay: Decay) -> Result<Self, $error> {
                if !(0.0..=1.0).contains(&value) {
                    return Err($error(value));
                }
                Ok(Self { value, decay })
            }

            pub fn constant(value: f64) -> Result<Self, $error> {
                Self::new(value, Decay::Constant)
            }

            pub fn linear(value: f64, multiplier: f64) -> Result<Self, $error> {
                Self::new(value, Decay::Linear { multiplier })
            }

            pub fn exponential(value: f64, multiplier: f64, exponent: i32) -> Result<Self, $error> {
                Self::new(value, Decay::Exponential { multiplier, exponent })
            }

            /// Value at `progress`.
            pub fn at(&self, progress: f64) -> f64 {
                self.value * self.decay.factor(progress)
            }
        }
    };
}

decaying_parameter!(
    /// Mutation step size relative to the width of each gene's bounds.
    Temperature,
    TemperatureOutOfRange
);

decaying_parameter!(
    /// Probability that a single gene mutates.
    MutationRate,
    MutationRateOutOfRange
);

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum MutagenError {
    #[error("MutagenError: {0}")]
    MutationRate(#[from] MutationRateOutOfRange),
    #[error("MutagenError: {0}")]
    Temperature(#[from] TemperatureOutOfRange),
}

/// Gaussian mutation operator.
///
/// Each gene mutates with probability `mutation_rate`. A mutating gene moves by a
/// normally distributed step with standard deviation `temperature * bounds.width()`.
/// Every gene is clamped back into its bounds afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mutagen {
    temperature: Temperature,
    mutation_rate: MutationRate,
}

impl Mutagen {
    pub fn new(temperature: Temperature, mutation_rate: MutationRate) -> Self {
        Self {
            temperature,
            mutation_rate,
        }
    }

    /// Mutagen without decay.
    pub fn constant(temperature: f64, mutation_rate: f64) -> Result<Self, MutagenError> {
        Ok(Self::new(
            Temperature::constant(temperature)?,
            MutationRate::constant(mutation_rate)?,
        ))
    }

    pub fn temperature(&self) -> &Temperature {
        &self.temperature
    }

    pub fn mutation_rate(&self) -> &MutationRate {
        &self.mutation_rate
    }

    /// Mutates `genome` in place. `progress` in `[0, 1]` drives decay.
    pub(crate) fn mutate<R: Rng>(
        &self,
        rng: &mut R,
        genome: &mut [f64],
        bounds: &[GeneBounds],
        progress: f64,
    ) {
        let sigma = self.temperature.at(progress);
        let rate = self.mutation_rate.at(progress);

        for (gene, bounds) in genome.iter_mut().zip(bounds) {
            let step = if rng.random::<f64>() < rate {
                rng.sample::<f64, _>(StandardNormal) * sigma * bounds.width()
            } else {
                0.0
            };
            *gene = bounds.clamp(*gene + step);
        }
    }
}
