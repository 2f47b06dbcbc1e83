#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("UnknownEnvironment: {0}")]
    UnknownEnvironment(String),
    #[error("InvalidConfiguration: {0}")]
    InvalidConfiguration(String),
    #[error("InvalidResourceShare: {field} must be finite and non-negative, got {value}")]
    InvalidResourceShare { field: &'static str, value: f64 },
    #[error("FractionalGpuShare: a fractional GPU share must be at most 1, got {0}")]
    FractionalGpuShare(f64),
    #[error("EnvironmentError: {0}")]
    EnvironmentError(#[from] anyhow::Error),
    #[error("SpawnError: {0}")]
    SpawnError(#[from] std::io::Error),
    #[error("PolicyError: {0}")]
    PolicyError(anyhow::Error),
    #[error("WorkerFailed: worker {worker} failed {attempts} times, last error: {reason}")]
    WorkerFailed {
        worker: usize,
        attempts: u32,
        reason: String,
    },
}

impl Error {
    pub(crate) fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }
}
