use crate::models::{GeneBoundError, SelectionError};

/// Errors that can occur while asking or telling an algorithm.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    #[error("FitnessLength: expected {expected} fitness values, got {actual}")]
    FitnessLength { expected: usize, actual: usize },
    #[error("TellBeforeAsk: no population is awaiting fitness")]
    TellBeforeAsk,
    #[error("InvalidConfiguration: {0}")]
    InvalidConfiguration(String),
    #[error("Selection error: {0}")]
    SelectionError(#[from] SelectionError),
    #[error("Bounds error: {0}")]
    BoundsError(#[from] GeneBoundError),
}

impl Error {
    pub(crate) fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }

    pub(crate) fn check_fitness_length(expected: usize, fitness: &[f64]) -> Result<(), Self> {
        if fitness.len() != expected {
            return Err(Self::FitnessLength {
                expected,
                actual: fitness.len(),
            });
        }

        Ok(())
    }
}
