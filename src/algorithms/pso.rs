use super::{Algorithm, Error};
use crate::models::{GeneBounds, Key, Population};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Particle swarm optimization.
///
/// Each particle remembers the best position it visited. After every evaluation
/// velocities are pulled towards the particle's own best (`phi_p`) and the
/// swarm's best (`phi_g`), damped by the inertia weight `w`. Positions are
/// clamped into the bounds.
#[derive(Debug, Clone)]
pub struct Pso {
    bounds: Vec<GeneBounds>,
    population_size: usize,
    w: f64,
    phi_p: f64,
    phi_g: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PsoState {
    key: Key,
    population: Population,
    velocity: Vec<Vec<f64>>,
    local_best_location: Vec<Vec<f64>>,
    #[serde(with = "crate::models::float_serde::vec")]
    local_best_fitness: Vec<f64>,
    global_best_location: Vec<f64>,
    #[serde(with = "crate::models::float_serde::scalar")]
    global_best_fitness: f64,
    awaiting_fitness: bool,
}

impl PsoState {
    pub fn global_best(&self) -> (&[f64], f64) {
        (&self.global_best_location, self.global_best_fitness)
    }
}

pub struct PsoBuilder {
    bounds: Vec<GeneBounds>,
    population_size: usize,
    w: f64,
    phi_p: f64,
    phi_g: f64,
}

impl PsoBuilder {
    /// Inertia weight.
    pub fn w(mut self, w: f64) -> Self {
        self.w = w;
        self
    }

    /// Attraction towards each particle's own best position.
    pub fn phi_p(mut self, phi_p: f64) -> Self {
        self.phi_p = phi_p;
        self
    }

    /// Attraction towards the swarm's best position.
    pub fn phi_g(mut self, phi_g: f64) -> Self {
        self.phi_g = phi_g;
        self
    }

    pub fn build(self) -> Result<Pso, Error> {
        if self.bounds.is_empty() {
            return Err(Error::invalid_configuration("PSO needs at least one dimension"));
        }

        if self.population_size == 0 {
            return Err(Error::invalid_configuration("PSO needs at least one particle"));
        }

        for (name, value) in [("w", self.w), ("phi_p", self.phi_p), ("phi_g", self.phi_g)] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::invalid_configuration(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }

        Ok(Pso {
            bounds: self.bounds,
            population_size: self.population_size,
            w: self.w,
            phi_p: self.phi_p,
            phi_g: self.phi_g,
        })
    }
}

impl Pso {
    pub fn builder(bounds: Vec<GeneBounds>, population_size: usize) -> PsoBuilder {
        PsoBuilder {
            bounds,
            population_size,
            w: 0.6,
            phi_p: 2.5,
            phi_g: 0.8,
        }
    }
}

impl Algorithm for Pso {
    type State = PsoState;

    #[instrument(level = "debug", skip(self), fields(key = key.seed(), population_size = self.population_size))]
    fn init(&self, key: Key) -> Result<Self::State, Error> {
        let (key, init_key) = key.split();
        let mut rng = init_key.rng();

        let positions: Vec<Vec<f64>> = (0..self.population_size)
            .map(|_| self.bounds.iter().map(|b| b.random(&mut rng)).collect())
            .collect();
        let velocity: Vec<Vec<f64>> = (0..self.population_size)
            .map(|_| {
                self.bounds
                    .iter()
                    .map(|b| rng.random_range(-1.0..1.0) * b.width())
                    .collect()
            })
            .collect();

        Ok(PsoState {
            key,
            local_best_location: positions.clone(),
            local_best_fitness: vec![f64::INFINITY; self.population_size],
            global_best_location: positions[0].clone(),
            global_best_fitness: f64::INFINITY,
            population: Population::from_rows_unchecked(positions),
            velocity,
            awaiting_fitness: false,
        })
    }

    fn ask(&self, state: &Self::State) -> Result<(Population, Self::State), Error> {
        let next = PsoState {
            awaiting_fitness: true,
            ..state.clone()
        };
        Ok((state.population.clone(), next))
    }

    #[instrument(level = "debug", skip(self, state, fitness), fields(num_fitness = fitness.len(), global_best = state.global_best_fitness))]
    fn tell(&self, state: &Self::State, fitness: &[f64]) -> Result<Self::State, Error> {
        if !state.awaiting_fitness {
            return Err(Error::TellBeforeAsk);
        }
        Error::check_fitness_length(self.population_size, fitness)?;

        let mut local_best_location = state.local_best_location.clone();
        let mut local_best_fitness = state.local_best_fitness.clone();
        let mut global_best_location = state.global_best_location.clone();
        let mut global_best_fitness = state.global_best_fitness;

        for (i, (&value, position)) in fitness.iter().zip(state.population.iter()).enumerate() {
            // NaN compares false and never replaces a best
            if value < local_best_fitness[i] {
                local_best_fitness[i] = value;
                local_best_location[i] = position.to_vec();
            }
            if value < global_best_fitness {
                global_best_fitness = value;
                global_best_location = position.to_vec();
            }
        }

        let (key, update_key) = state.key.split();
        let mut rng = update_key.rng();

        let mut velocity = Vec::with_capacity(self.population_size);
        let mut positions = Vec::with_capacity(self.population_size);

        for (i, position) in state.population.iter().enumerate() {
            let mut particle_velocity = Vec::with_capacity(position.len());
            let mut particle_position = Vec::with_capacity(position.len());

            for (d, bounds) in self.bounds.iter().enumerate() {
                let rp: f64 = rng.random_range(0.0..1.0);
                let rg: f64 = rng.random_range(0.0..1.0);
                let v = self.w * state.velocity[i][d]
                    + self.phi_p * rp * (local_best_location[i][d] - position[d])
                    + self.phi_g * rg * (global_best_location[d] - position[d]);

                particle_velocity.push(v);
                particle_position.push(bounds.clamp(position[d] + v));
            }

            velocity.push(particle_velocity);
            positions.push(particle_position);
        }

        Ok(PsoState {
            key,
            population: Population::from_rows_unchecked(positions),
            velocity,
            local_best_location,
            local_best_fitness,
            global_best_location,
            global_best_fitness,
            awaiting_fitness: false,
        })
    }
}
