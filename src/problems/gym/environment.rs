use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Action passed to [`Environment::step`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Action {
    Discrete(usize),
    Continuous(Vec<f64>),
}

/// Result of a single environment step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub observation: Vec<f64>,
    pub reward: f64,
    /// The episode reached a terminal state
    pub terminated: bool,
    /// The episode was cut short by a time limit
    pub truncated: bool,
}

impl Transition {
    pub fn is_done(&self) -> bool {
        self.terminated || self.truncated
    }
}

/// A Gym-style simulation. Each worker owns its environments exclusively, so
/// implementations only need to be `Send`.
pub trait Environment: Send {
    fn observation_size(&self) -> usize;

    /// Starts a new episode. The same seed must produce the same episode.
    fn reset(&mut self, seed: u64) -> anyhow::Result<Vec<f64>>;

    fn step(&mut self, action: &Action) -> anyhow::Result<Transition>;
}

/// Creates fresh environments for workers, including replacements for failed ones.
pub type EnvFactory = Arc<dyn Fn() -> anyhow::Result<Box<dyn Environment>> + Send + Sync>;
