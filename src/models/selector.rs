//! Parent selection for the genetic algorithm.
//!
//! Fitness is in minimization form, lower is better. Only the first
//! `sample_size` individuals take part. Non-finite fitness ranks last: it
//! loses every tournament it enters and has no weight on the roulette wheel.
//!
//! ```rust
//! use fx_evolve::models::Selector;
//!
//! // Two tournaments of three per parent pair
//! let tournament = Selector::tournament(3, 64)?;
//!
//! // Weight proportional to the distance from the worst fitness
//! let roulette = Selector::roulette(64);
//! # Ok::<(), fx_evolve::models::SelectionError>(())
//! ```

use rand::Rng;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;
use rand::seq::index;
use serde::{Deserialize, Serialize};
use tracing::instrument;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Selector {
    pub method: SelectionMethod,
    /// Maximum number of individuals that compete for parenthood
    pub sample_size: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub enum SelectionMethod {
    /// Each parent wins a tournament among `size` distinct candidates. The two
    /// tournaments of a pair never share a candidate, so `2 * size` are needed.
    Tournament { size: usize },
    /// Weight is `worst - fitness`, the worst candidate is never picked.
    Roulette,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("SelectionError: no individuals to select from")]
    NoValidParents,
    #[error("SelectionError: tournaments need {min_required} candidates, got {provided}")]
    InvalidSampleSize {
        min_required: usize,
        provided: usize,
    },
    #[error("SelectionError: tournament size must be at least 1")]
    EmptyTournament,
    #[error("SelectionError: roulette needs candidates with different fitness")]
    InvalidFitnessForRoulette,
}

/// Fitness used for ranking. NaN and infinities rank behind every finite value.
pub(crate) fn rank(fitness: f64) -> f64 {
    if fitness.is_finite() {
        fitness
    } else {
        f64::INFINITY
    }
}

/// Individuals eligible for selection, as `(index, rank)`.
struct Candidates(Vec<(usize, f64)>);

impl Candidates {
    fn collect(fitness: &[f64], sample_size: usize) -> Result<Self, SelectionError> {
        let candidates: Vec<(usize, f64)> = fitness
            .iter()
            .map(|value| rank(*value))
            .enumerate()
            .take(sample_size)
            .collect();

        if candidates.is_empty() {
            return Err(SelectionError::NoValidParents);
        }
        Ok(Self(candidates))
    }

    fn tournament_pairs(
        &self,
        num_pairs: usize,
        size: usize,
        rng: &mut impl Rng,
    ) -> Result<Vec<(usize, usize)>, SelectionError> {
        let min_required = 2 * size;
        if self.0.len() < min_required {
            return Err(SelectionError::InvalidSampleSize {
                min_required,
                provided: self.0.len(),
            });
        }

        let champion = |entrants: &[usize]| {
            entrants
                .iter()
                .map(|&k| self.0[k])
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .map_or(0, |(index, _)| index)
        };

        Ok((0..num_pairs)
            .map(|_| {
                let entrants = index::sample(rng, self.0.len(), min_required).into_vec();
                let (left, right) = entrants.split_at(size);
                (champion(left), champion(right))
            })
            .collect())
    }

    fn roulette_pairs(
        &self,
        num_pairs: usize,
        rng: &mut impl Rng,
    ) -> Result<Vec<(usize, usize)>, SelectionError> {
        let worst = self
            .0
            .iter()
            .map(|(_, value)| *value)
            .filter(|value| value.is_finite())
            .fold(f64::NEG_INFINITY, f64::max);

        let weights = self.0.iter().map(|(_, value)| {
            if value.is_finite() {
                worst - value
            } else {
                0.0
            }
        });
        let wheel = WeightedIndex::new(weights)
            .map_err(|_| SelectionError::InvalidFitnessForRoulette)?;

        let mut spin = || self.0[wheel.sample(rng)].0;
        Ok((0..num_pairs).map(|_| (spin(), spin())).collect())
    }
}

impl Selector {
    /// Tournament selection. `sample_size` must be at least `tournament_size * 2`.
    pub fn tournament(tournament_size: usize, sample_size: usize) -> Result<Self, SelectionError> {
        if tournament_size == 0 {
            return Err(SelectionError::EmptyTournament);
        }
        if sample_size < 2 * tournament_size {
            return Err(SelectionError::InvalidSampleSize {
                min_required: 2 * tournament_size,
                provided: sample_size,
            });
        }

        Ok(Self {
            method: SelectionMethod::Tournament {
                size: tournament_size,
            },
            sample_size,
        })
    }

    pub fn roulette(sample_size: usize) -> Self {
        Self {
            method: SelectionMethod::Roulette,
            sample_size,
        }
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    /// Selects `num_pairs` parent index pairs from `fitness` (minimization form).
    #[instrument(level = "debug", skip(self, fitness, rng), fields(method = ?self.method, num_pairs = num_pairs, num_candidates = fitness.len()))]
    pub(crate) fn select_parents(
        &self,
        num_pairs: usize,
        fitness: &[f64],
        rng: &mut impl Rng,
    ) -> Result<Vec<(usize, usize)>, SelectionError> {
        let candidates = Candidates::collect(fitness, self.sample_size)?;

        match self.method {
            SelectionMethod::Tournament { size } => candidates.tournament_pairs(num_pairs, size, rng),
            SelectionMethod::Roulette => candidates.roulette_pairs(num_pairs, rng),
        }
    }
}
