use super::environment::{EnvFactory, Environment};
use super::policy::Policy;
use super::pool::WorkerPool;
use super::resources::{PoolInfo, ResourceShare};
use super::worker::{RolloutJob, WorkerSpec};
use super::{Error, make};
use crate::models::{Key, Population};
use crate::problems::{self, Problem};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{Instrument, debug_span, info, instrument, warn};

/// Neuroevolution problem: every row of the population is a parameter vector
/// for `policy`, scored by the mean episodic reward over `num_episodes` episodes.
///
/// Rewards are to be maximized, pair it with
/// [`FitnessGoal::maximize`](crate::models::FitnessGoal::maximize).
///
/// ```rust,no_run
/// use fx_evolve::problems::gym::{GymProblem, LinearPolicy, ResourceShare};
///
/// let problem = GymProblem::builder()
///     .env_name("CartPole-v1")
///     .policy(LinearPolicy::discrete(4, 2))
///     .num_workers(4)
///     .env_per_worker(8)
///     .worker_options(ResourceShare::new(1.0, 0.25)?)
///     .batch_policy(true)
///     .build()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct GymProblem {
    pool: WorkerPool,
    info: PoolInfo,
    num_episodes: usize,
}

/// Problem state, the key that seeds every episode reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GymState {
    key: Key,
}

impl fmt::Debug for GymProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GymProblem")
            .field("info", &self.info)
            .field("num_episodes", &self.num_episodes)
            .finish_non_exhaustive()
    }
}

enum EnvSource {
    Name(String),
    Factory(EnvFactory),
}

pub struct GymProblemBuilder {
    env: Option<EnvSource>,
    policy: Option<Arc<dyn Policy>>,
    num_workers: usize,
    env_per_worker: usize,
    controller: ResourceShare,
    worker: ResourceShare,
    batch_policy: bool,
    cap_episode: Option<usize>,
    num_episodes: usize,
    max_retries: u32,
}

impl Default for GymProblemBuilder {
    fn default() -> Self {
        Self {
            env: None,
            policy: None,
            num_workers: 1,
            env_per_worker: 1,
            controller: ResourceShare::default(),
            worker: ResourceShare::default(),
            batch_policy: false,
            cap_episode: None,
            num_episodes: 1,
            max_retries: 2,
        }
    }
}

impl GymProblemBuilder {
    /// Built-in environment, see [`make`](super::make).
    pub fn env_name(mut self, name: impl Into<String>) -> Self {
        self.env = Some(EnvSource::Name(name.into()));
        self
    }

    /// Custom environments. The factory is called once per environment, also
    /// when a failed worker is replaced.
    pub fn env_factory(mut self, factory: EnvFactory) -> Self {
        self.env = Some(EnvSource::Factory(factory));
        self
    }

    pub fn policy(mut self, policy: impl Policy + 'static) -> Self {
        self.policy = Some(Arc::new(policy));
        self
    }

    pub fn shared_policy(mut self, policy: Arc<dyn Policy>) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn num_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers;
        self
    }

    pub fn env_per_worker(mut self, env_per_worker: usize) -> Self {
        self.env_per_worker = env_per_worker;
        self
    }

    pub fn controller_options(mut self, share: ResourceShare) -> Self {
        self.controller = share;
        self
    }

    pub fn worker_options(mut self, share: ResourceShare) -> Self {
        self.worker = share;
        self
    }

    /// Evaluate the policy on the controller, once per tick for all episodes.
    pub fn batch_policy(mut self, batch_policy: bool) -> Self {
        self.batch_policy = batch_policy;
        self
    }

    /// Maximum number of steps per episode.
    pub fn cap_episode(mut self, max_steps: usize) -> Self {
        self.cap_episode = Some(max_steps);
        self
    }

    pub fn num_episodes(mut self, num_episodes: usize) -> Self {
        self.num_episodes = num_episodes;
        self
    }

    /// Number of times a failed worker is replaced and its work retried.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[instrument(level = "debug", skip(self), fields(num_workers = self.num_workers, env_per_worker = self.env_per_worker, batch_policy = self.batch_policy))]
    pub fn build(self) -> Result<GymProblem, Error> {
        let env_factory: EnvFactory = match self.env {
            Some(EnvSource::Factory(factory)) => factory,
            Some(EnvSource::Name(name)) => {
                make(&name)?;
                Arc::new(move || -> anyhow::Result<Box<dyn Environment>> { Ok(make(&name)?) })
            }
            None => {
                return Err(Error::invalid_configuration(
                    "an environment name or factory is required",
                ));
            }
        };

        let policy = self
            .policy
            .ok_or_else(|| Error::invalid_configuration("a policy is required"))?;

        if self.num_workers == 0 {
            return Err(Error::invalid_configuration("num_workers must be at least 1"));
        }
        if self.env_per_worker == 0 {
            return Err(Error::invalid_configuration("env_per_worker must be at least 1"));
        }
        if self.num_episodes == 0 {
            return Err(Error::invalid_configuration("num_episodes must be at least 1"));
        }
        if self.cap_episode == Some(0) {
            return Err(Error::invalid_configuration("cap_episode must be at least 1"));
        }

        self.controller.validate()?;
        self.worker.validate()?;

        let info = PoolInfo {
            num_workers: self.num_workers,
            env_per_worker: self.env_per_worker,
            batch_policy: self.batch_policy,
            controller: self.controller,
            worker: self.worker,
        };

        let requested = info.total().num_cpus;
        if let Ok(available) = std::thread::available_parallelism() {
            if requested > available.get() as f64 {
                warn!(requested, available = available.get(), "requested more CPUs than available");
            }
        }
        info!(?info, "starting gym worker pool");

        let spec = WorkerSpec {
            env_factory,
            policy,
            env_per_worker: self.env_per_worker,
            cap_episode: self.cap_episode,
        };
        let pool = WorkerPool::start(self.num_workers, spec, self.max_retries)?;

        Ok(GymProblem {
            pool,
            info,
            num_episodes: self.num_episodes,
        })
    }
}

impl GymProblem {
    pub fn builder() -> GymProblemBuilder {
        GymProblemBuilder::default()
    }

    pub fn pool_info(&self) -> &PoolInfo {
        &self.info
    }

    /// One reset seed per individual and episode.
    fn episode_seeds(key: Key, population_size: usize, num_episodes: usize) -> Vec<Vec<u64>> {
        (0..population_size as u64)
            .map(|individual| {
                let key = key.fold_in(individual);
                (0..num_episodes as u64)
                    .map(|episode| key.fold_in(episode).seed())
                    .collect()
            })
            .collect()
    }
}

impl Problem for GymProblem {
    type State = GymState;

    fn init(&self, key: Key) -> Result<Self::State, problems::Error> {
        Ok(GymState { key })
    }

    fn evaluate<'a>(
        &'a self,
        state: &'a Self::State,
        population: &'a Population,
    ) -> BoxFuture<'a, Result<(Vec<f64>, Self::State), problems::Error>> {
        let span = debug_span!(
            "evaluate",
            population_size = population.len(),
            batch_policy = self.info.batch_policy
        );

        let evaluation = async move {
            let (key, episode_key) = state.key.split();
            let seeds = Self::episode_seeds(episode_key, population.len(), self.num_episodes);

            let rewards = if self.info.batch_policy {
                let params: Vec<Vec<f64>> = population.rows().to_vec();
                self.pool.evaluate_batched(&params, &seeds).await?
            } else {
                let jobs = population
                    .iter()
                    .zip(seeds)
                    .map(|(params, seeds)| RolloutJob {
                        params: params.to_vec(),
                        seeds,
                    })
                    .collect();
                self.pool.evaluate_local(jobs).await?
            };

            Ok::<_, problems::Error>((rewards, GymState { key }))
        };

        Box::pin(evaluation.instrument(span))
    }
}
