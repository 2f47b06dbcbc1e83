//! Process-level setup shared by the `evolve` binary and the demos.
//!
//! Configuration is read from `FX_EVOLVE_*` environment variables, optionally
//! loaded from a `.env.local` file, with a default for every key.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("ConfigError: invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

/// Benchmark the `evolve` binary optimizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProblemKind {
    Sphere,
    Rastrigin,
    Ackley,
    Rosenbrock,
    CartPole,
}

impl FromStr for ProblemKind {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "sphere" => Ok(Self::Sphere),
            "rastrigin" => Ok(Self::Rastrigin),
            "ackley" => Ok(Self::Ackley),
            "rosenbrock" => Ok(Self::Rosenbrock),
            "cartpole" | "cartpole-v1" => Ok(Self::CartPole),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    pub seed: u64,
    pub max_generations: u32,
    pub population_size: usize,
    pub problem: ProblemKind,
    pub dimensions: usize,
    pub num_workers: usize,
    pub env_per_worker: usize,
    pub batch_policy: bool,
    /// Path the final state is written to, if any.
    pub checkpoint: Option<String>,
    /// `tracing_subscriber` filter directive.
    pub log: String,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            seed: 42,
            max_generations: 100,
            population_size: 64,
            problem: ProblemKind::Sphere,
            dimensions: 16,
            num_workers: 4,
            env_per_worker: 4,
            batch_policy: false,
            checkpoint: None,
            log: "info".to_string(),
        }
    }
}

impl Configuration {
    /// Reads the process environment after loading `.env.local` if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::from_filename(".env.local").ok();
        Self::from_vars(std::env::vars())
    }

    /// Builds a configuration from key/value pairs. Unknown keys are ignored.
    pub fn from_vars(
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self, ConfigError> {
        let vars: HashMap<String, String> = vars.into_iter().collect();
        let defaults = Self::default();

        Ok(Self {
            seed: parse(&vars, "FX_EVOLVE_SEED", defaults.seed)?,
            max_generations: parse(&vars, "FX_EVOLVE_MAX_GENERATIONS", defaults.max_generations)?,
            population_size: parse(&vars, "FX_EVOLVE_POPULATION_SIZE", defaults.population_size)?,
            problem: parse(&vars, "FX_EVOLVE_PROBLEM", defaults.problem)?,
            dimensions: parse(&vars, "FX_EVOLVE_DIMENSIONS", defaults.dimensions)?,
            num_workers: parse(&vars, "FX_EVOLVE_NUM_WORKERS", defaults.num_workers)?,
            env_per_worker: parse(&vars, "FX_EVOLVE_ENV_PER_WORKER", defaults.env_per_worker)?,
            batch_policy: parse(&vars, "FX_EVOLVE_BATCH_POLICY", defaults.batch_policy)?,
            checkpoint: vars
                .get("FX_EVOLVE_CHECKPOINT")
                .filter(|path| !path.is_empty())
                .cloned(),
            log: vars.get("FX_EVOLVE_LOG").cloned().unwrap_or(defaults.log),
        })
    }
}

fn parse<T: FromStr>(
    vars: &HashMap<String, String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match vars.get(key) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            key,
            value: value.clone(),
        }),
    }
}

/// Installs a `fmt` subscriber. `RUST_LOG` wins over `filter` when set.
pub fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_ids(true)
        .with_target(false)
        .try_init()
        .ok();
}
