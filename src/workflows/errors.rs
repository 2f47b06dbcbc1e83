use crate::{algorithms, monitors, problems};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("AlgorithmError: {0}")]
    AlgorithmError(#[from] algorithms::Error),
    #[error("ProblemError: {0}")]
    ProblemError(#[from] problems::Error),
    #[error("MonitorError: {0}")]
    MonitorError(#[from] monitors::Error),
    #[error("FitnessLength: expected {expected} fitness values, got {actual}")]
    FitnessLength { expected: usize, actual: usize },
    #[error("CheckpointIoError: {0}")]
    CheckpointIoError(#[from] std::io::Error),
    #[error("CheckpointFormatError: {0}")]
    CheckpointFormatError(#[from] serde_json::Error),
}
