use super::{Algorithm, Error};
use crate::models::{
    Crossover, Distribution, GeneBounds, Key, Mutagen, Population, SelectionError,
    SelectionMethod, Selector, rank,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Generational genetic algorithm with elitism.
///
/// The first `ask` returns the initial [`Distribution`]. Every later `ask` keeps
/// the `elitism` best individuals of the last evaluated population unchanged and
/// fills the rest with offspring: parents picked by the [`Selector`], combined by
/// the [`Crossover`] and perturbed by the [`Mutagen`].
///
/// ```rust
/// use fx_evolve::algorithms::GeneticAlgorithm;
/// use fx_evolve::models::{Crossover, Distribution, GeneBounds, Mutagen, Selector};
///
/// let ga = GeneticAlgorithm::builder(
///     GeneBounds::uniform(-5.12, 5.12, 10)?,
///     Distribution::latin_hypercube(50),
/// )
/// .selector(Selector::tournament(3, 50)?)
/// .crossover(Crossover::blend(0.3)?)
/// .mutagen(Mutagen::constant(0.1, 0.2)?)
/// .elitism(2)
/// .horizon(200)
/// .build()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct GeneticAlgorithm {
    bounds: Vec<GeneBounds>,
    distribution: Distribution,
    selector: Selector,
    crossover: Crossover,
    mutagen: Mutagen,
    elitism: usize,
    horizon: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneticAlgorithmState {
    key: Key,
    generation: u32,
    /// Last population that received fitness, or the initial population
    population: Population,
    /// Fitness of `population` in minimization form
    #[serde(with = "crate::models::float_serde::option_vec")]
    fitness: Option<Vec<f64>>,
    /// Population returned by `ask`, awaiting `tell`
    pending: Option<Population>,
}

impl GeneticAlgorithmState {
    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    pub fn fitness(&self) -> Option<&[f64]> {
        self.fitness.as_deref()
    }
}

pub struct GeneticAlgorithmBuilder {
    bounds: Vec<GeneBounds>,
    distribution: Distribution,
    selector: Option<Selector>,
    crossover: Crossover,
    mutagen: Option<Mutagen>,
    elitism: usize,
    horizon: Option<u32>,
}

impl GeneticAlgorithmBuilder {
    pub fn selector(mut self, selector: Selector) -> Self {
        self.selector = Some(selector);
        self
    }

    pub fn crossover(mut self, crossover: Crossover) -> Self {
        self.crossover = crossover;
        self
    }

    pub fn mutagen(mut self, mutagen: Mutagen) -> Self {
        self.mutagen = Some(mutagen);
        self
    }

    pub fn elitism(mut self, elitism: usize) -> Self {
        self.elitism = elitism;
        self
    }

    /// Number of generations over which temperature and mutation rate decay.
    pub fn horizon(mut self, generations: u32) -> Self {
        self.horizon = Some(generations);
        self
    }

    #[instrument(level = "debug", skip(self), fields(dimensions = self.bounds.len(), population_size = self.distribution.population_size(), elitism = self.elitism))]
    pub fn build(self) -> Result<GeneticAlgorithm, Error> {
        let population_size = self.distribution.population_size();

        if self.bounds.is_empty() {
            return Err(Error::invalid_configuration(
                "genetic algorithm needs at least one gene",
            ));
        }

        if population_size < 2 {
            return Err(Error::invalid_configuration(
                "population size must be at least 2",
            ));
        }

        if self.elitism >= population_size {
            return Err(Error::invalid_configuration(format!(
                "elitism ({}) must be smaller than the population size ({})",
                self.elitism, population_size
            )));
        }

        let selector = match self.selector {
            Some(selector) => selector,
            None => Selector::tournament((population_size / 2).min(2), population_size)?,
        };

        if let SelectionMethod::Tournament { size } = selector.method {
            let available = population_size.min(selector.sample_size());
            if available < size * 2 {
                return Err(Error::SelectionError(SelectionError::InvalidSampleSize {
                    min_required: size * 2,
                    provided: available,
                }));
            }
        }

        let mutagen = match self.mutagen {
            Some(mutagen) => mutagen,
            None => Mutagen::constant(0.1, 1.0 / self.bounds.len() as f64)
                .map_err(|err| Error::invalid_configuration(err.to_string()))?,
        };

        Ok(GeneticAlgorithm {
            bounds: self.bounds,
            distribution: self.distribution,
            selector,
            crossover: self.crossover,
            mutagen,
            elitism: self.elitism,
            horizon: self.horizon,
        })
    }
}

impl GeneticAlgorithm {
    pub fn builder(bounds: Vec<GeneBounds>, distribution: Distribution) -> GeneticAlgorithmBuilder {
        GeneticAlgorithmBuilder {
            bounds,
            distribution,
            selector: None,
            crossover: Crossover::Blend { alpha: 0.5 },
            mutagen: None,
            elitism: 1,
            horizon: None,
        }
    }

    pub fn population_size(&self) -> usize {
        self.distribution.population_size()
    }

    fn progress(&self, generation: u32) -> f64 {
        match self.horizon {
            Some(0) | None => 0.0,
            Some(horizon) => (generation as f64 / horizon as f64).min(1.0),
        }
    }

    /// Indices of the `count` best individuals, best first. Non-finite fitness ranks last.
    fn elite_indices(fitness: &[f64], count: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..fitness.len()).collect();
        indices.sort_by(|a, b| rank(fitness[*a]).total_cmp(&rank(fitness[*b])));
        indices.truncate(count);
        indices
    }

    fn breed_child(
        &self,
        parent1: &[f64],
        parent2: &[f64],
        progress: f64,
        rng: &mut impl Rng,
    ) -> Vec<f64> {
        let mut child = self.crossover.apply(rng, parent1, parent2);
        self.mutagen.mutate(rng, &mut child, &self.bounds, progress);
        child
    }

    #[instrument(level = "debug", skip(self, population, fitness, rng), fields(generation = generation, num_offspring = num_offspring))]
    fn breed_batch(
        &self,
        population: &Population,
        fitness: &[f64],
        num_offspring: usize,
        generation: u32,
        rng: &mut impl Rng,
    ) -> Result<Vec<Vec<f64>>, Error> {
        let progress = self.progress(generation);
        let parent_pairs = self.selector.select_parents(num_offspring, fitness, rng)?;

        Ok(parent_pairs
            .into_iter()
            .map(|(i, j)| {
                self.breed_child(
                    &population.rows()[i],
                    &population.rows()[j],
                    progress,
                    rng,
                )
            })
            .collect())
    }
}

impl Algorithm for GeneticAlgorithm {
    type State = GeneticAlgorithmState;

    #[instrument(level = "debug", skip(self), fields(key = key.seed()))]
    fn init(&self, key: Key) -> Result<Self::State, Error> {
        let (key, init_key) = key.split();
        let population = self
            .distribution
            .distribute(&self.bounds, &mut init_key.rng());

        Ok(GeneticAlgorithmState {
            key,
            generation: 0,
            population,
            fitness: None,
            pending: None,
        })
    }

    #[instrument(level = "debug", skip(self, state), fields(generation = state.generation))]
    fn ask(&self, state: &Self::State) -> Result<(Population, Self::State), Error> {
        let Some(fitness) = state.fitness.as_deref() else {
            // Nothing evaluated yet, the initial distribution goes first
            let population = state.population.clone();
            let next = GeneticAlgorithmState {
                pending: Some(population.clone()),
                ..state.clone()
            };
            return Ok((population, next));
        };

        let (key, breed_key) = state.key.split();
        let mut rng = breed_key.rng();

        let elites = Self::elite_indices(fitness, self.elitism);
        let num_offspring = self.population_size() - elites.len();

        let mut rows: Vec<Vec<f64>> = elites
            .iter()
            .map(|&i| state.population.rows()[i].clone())
            .collect();
        rows.extend(self.breed_batch(
            &state.population,
            fitness,
            num_offspring,
            state.generation,
            &mut rng,
        )?);

        let population = Population::from_rows_unchecked(rows);
        let next = GeneticAlgorithmState {
            key,
            pending: Some(population.clone()),
            ..state.clone()
        };

        Ok((population, next))
    }

    #[instrument(level = "debug", skip(self, state, fitness), fields(generation = state.generation, num_fitness = fitness.len()))]
    fn tell(&self, state: &Self::State, fitness: &[f64]) -> Result<Self::State, Error> {
        let pending = state.pending.as_ref().ok_or(Error::TellBeforeAsk)?;
        Error::check_fitness_length(pending.len(), fitness)?;

        Ok(GeneticAlgorithmState {
            key: state.key,
            generation: state.generation + 1,
            population: pending.clone(),
            fitness: Some(fitness.to_vec()),
            pending: None,
        })
    }
}
