use super::{Algorithm, Error};
use crate::models::{Key, Population};
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Update rule applied to the estimated gradient.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Optimizer {
    Sgd,
    Adam { beta1: f64, beta2: f64, eps: f64 },
}

impl Optimizer {
    pub fn adam() -> Self {
        Self::Adam {
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
        }
    }
}

/// OpenAI evolution strategy with mirrored sampling and centered-rank shaping.
///
/// Every generation samples `population_size / 2` Gaussian perturbations `eps`
/// and evaluates `center ± sigma * eps`. Fitness is replaced by centered ranks
/// in `[-0.5, 0.5]` and the center moves against the estimated gradient.
/// Unbounded: the center is never clamped.
#[derive(Debug, Clone)]
pub struct OpenEs {
    center_init: Vec<f64>,
    population_size: usize,
    learning_rate: f64,
    noise_stdev: f64,
    optimizer: Optimizer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenEsState {
    key: Key,
    center: Vec<f64>,
    generation: u32,
    /// First and second moment estimates, only used by Adam
    moments: Option<(Vec<f64>, Vec<f64>)>,
    /// Perturbations behind the population awaiting fitness
    noise: Option<Vec<Vec<f64>>>,
}

impl OpenEsState {
    pub fn center(&self) -> &[f64] {
        &self.center
    }
}

pub struct OpenEsBuilder {
    center_init: Vec<f64>,
    population_size: usize,
    learning_rate: f64,
    noise_stdev: f64,
    optimizer: Optimizer,
}

impl OpenEsBuilder {
    pub fn learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn noise_stdev(mut self, noise_stdev: f64) -> Self {
        self.noise_stdev = noise_stdev;
        self
    }

    pub fn optimizer(mut self, optimizer: Optimizer) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn build(self) -> Result<OpenEs, Error> {
        if self.center_init.is_empty() {
            return Err(Error::invalid_configuration("OpenES needs at least one dimension"));
        }

        if self.population_size < 2 || self.population_size % 2 != 0 {
            return Err(Error::invalid_configuration(format!(
                "OpenES uses mirrored sampling, population size must be even and at least 2, got {}",
                self.population_size
            )));
        }

        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(Error::invalid_configuration("learning rate must be positive"));
        }

        if !(self.noise_stdev.is_finite() && self.noise_stdev > 0.0) {
            return Err(Error::invalid_configuration("noise stdev must be positive"));
        }

        Ok(OpenEs {
            center_init: self.center_init,
            population_size: self.population_size,
            learning_rate: self.learning_rate,
            noise_stdev: self.noise_stdev,
            optimizer: self.optimizer,
        })
    }
}

impl OpenEs {
    pub fn builder(center_init: Vec<f64>, population_size: usize) -> OpenEsBuilder {
        OpenEsBuilder {
            center_init,
            population_size,
            learning_rate: 0.05,
            noise_stdev: 0.1,
            optimizer: Optimizer::Sgd,
        }
    }
}

/// Centered ranks in `[-0.5, 0.5]`, lowest fitness gets `-0.5`.
fn centered_ranks(fitness: &[f64]) -> Vec<f64> {
    let n = fitness.len();
    if n < 2 {
        return vec![0.0; n];
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|a, b| fitness[*a].total_cmp(&fitness[*b]));

    let mut ranks = vec![0.0; n];
    for (rank, index) in order.into_iter().enumerate() {
        ranks[index] = rank as f64 / (n - 1) as f64 - 0.5;
    }
    ranks
}

impl Algorithm for OpenEs {
    type State = OpenEsState;

    fn init(&self, key: Key) -> Result<Self::State, Error> {
        let moments = match self.optimizer {
            Optimizer::Sgd => None,
            Optimizer::Adam { .. } => Some((
                vec![0.0; self.center_init.len()],
                vec![0.0; self.center_init.len()],
            )),
        };

        Ok(OpenEsState {
            key,
            center: self.center_init.clone(),
            generation: 0,
            moments,
            noise: None,
        })
    }

    #[instrument(level = "debug", skip(self, state), fields(generation = state.generation))]
    fn ask(&self, state: &Self::State) -> Result<(Population, Self::State), Error> {
        let (key, noise_key) = state.key.split();
        let mut rng = noise_key.rng();

        let half = self.population_size / 2;
        let noise: Vec<Vec<f64>> = (0..half)
            .map(|_| {
                (0..state.center.len())
                    .map(|_| rng.sample::<f64, _>(StandardNormal))
                    .collect()
            })
            .collect();

        let mut rows: Vec<Vec<f64>> = Vec::with_capacity(self.population_size);
        for sign in [1.0, -1.0] {
            for eps in &noise {
                rows.push(
                    state
                        .center
                        .iter()
                        .zip(eps)
                        .map(|(c, e)| c + sign * self.noise_stdev * e)
                        .collect(),
                );
            }
        }

        let next = OpenEsState {
            key,
            noise: Some(noise),
            ..state.clone()
        };

        Ok((Population::from_rows_unchecked(rows), next))
    }

    #[instrument(level = "debug", skip(self, state, fitness), fields(generation = state.generation, num_fitness = fitness.len()))]
    fn tell(&self, state: &Self::State, fitness: &[f64]) -> Result<Self::State, Error> {
        let noise = state.noise.as_ref().ok_or(Error::TellBeforeAsk)?;
        Error::check_fitness_length(self.population_size, fitness)?;

        let weights = centered_ranks(fitness);
        let half = noise.len();
        let dim = state.center.len();

        // Mirrored pairs share eps, so the positive and negative weights combine
        let mut grad = vec![0.0; dim];
        for (i, eps) in noise.iter().enumerate() {
            let w = weights[i] - weights[i + half];
            for (g, e) in grad.iter_mut().zip(eps) {
                *g += w * e;
            }
        }
        let scale = 1.0 / (self.population_size as f64 * self.noise_stdev);
        grad.iter_mut().for_each(|g| *g *= scale);

        let generation = state.generation + 1;
        let mut center = state.center.clone();
        let mut moments = state.moments.clone();

        match (self.optimizer, moments.as_mut()) {
            (Optimizer::Adam { beta1, beta2, eps }, Some((m, v))) => {
                let t = generation as i32;
                for d in 0..dim {
                    m[d] = beta1 * m[d] + (1.0 - beta1) * grad[d];
                    v[d] = beta2 * v[d] + (1.0 - beta2) * grad[d] * grad[d];
                    let m_hat = m[d] / (1.0 - beta1.powi(t));
                    let v_hat = v[d] / (1.0 - beta2.powi(t));
                    center[d] -= self.learning_rate * m_hat / (v_hat.sqrt() + eps);
                }
            }
            _ => {
                for (c, g) in center.iter_mut().zip(&grad) {
                    *c -= self.learning_rate * g;
                }
            }
        }

        Ok(OpenEsState {
            key: state.key,
            center,
            generation,
            moments,
            noise: None,
        })
    }
}
