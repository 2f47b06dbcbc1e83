use super::{GeneBounds, Population};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Sampling strategy for the initial population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Distribution {
    /// Stratified sampling: every dimension is split into `population_size` equal
    /// intervals and each interval is used exactly once.
    LatinHypercube { population_size: usize },
    /// Independent uniform sampling within the bounds.
    Random { population_size: usize },
}

impl Distribution {
    pub fn latin_hypercube(population_size: usize) -> Self {
        Distribution::LatinHypercube { population_size }
    }

    pub fn random(population_size: usize) -> Self {
        Distribution::Random { population_size }
    }

    pub fn population_size(&self) -> usize {
        match self {
            Distribution::LatinHypercube { population_size }
            | Distribution::Random { population_size } => *population_size,
        }
    }

    #[instrument(level = "debug", skip(self, bounds, rng), fields(distribution = ?self, dimensions = bounds.len()))]
    pub(crate) fn distribute<R: Rng>(&self, bounds: &[GeneBounds], rng: &mut R) -> Population {
        let rows = match self {
            Distribution::LatinHypercube { population_size } => {
                latin_hypercube(*population_size, bounds, rng)
            }
            Distribution::Random { population_size } => {
                random_distribution(*population_size, bounds, rng)
            }
        };

        Population::from_rows_unchecked(rows)
    }
}

fn random_distribution<R: Rng>(
    n_samples: usize,
    bounds: &[GeneBounds],
    rng: &mut R,
) -> Vec<Vec<f64>> {
    (0..n_samples)
        .map(|_| bounds.iter().map(|b| b.random(rng)).collect())
        .collect()
}

fn latin_hypercube<R: Rng>(n_samples: usize, bounds: &[GeneBounds], rng: &mut R) -> Vec<Vec<f64>> {
    let mut genomes = vec![Vec::with_capacity(bounds.len()); n_samples];

    for gene_bounds in bounds {
        // 1. One stratum per sample, jittered inside the stratum
        let mut samples: Vec<f64> = (0..n_samples)
            .map(|i| (i as f64 + rng.random_range(0.0..1.0)) / n_samples as f64)
            .collect();

        // 2. Shuffle the strata to decorrelate dimensions
        samples.shuffle(rng);

        // 3. Transpose into the genomes
        for (genome, sample) in genomes.iter_mut().zip(samples) {
            genome.push(gene_bounds.from_sample(sample));
        }
    }

    genomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    #[test]
    fn test_latin_hypercube_fills_every_stratum() {
        let bounds = GeneBounds::uniform(0.0, 4.0, 3).unwrap();
        let mut rng = StdRng::seed_from_u64(1);

        let population = Distribution::latin_hypercube(4).distribute(&bounds, &mut rng);

        assert_eq!(population.len(), 4);
        assert_eq!(population.dim(), 3);

        for dim in 0..3 {
            let mut strata: Vec<usize> = population
                .iter()
                .map(|row| (row[dim].floor() as usize).min(3))
                .collect();
            strata.sort();
            assert_eq!(strata, vec![0, 1, 2, 3]);
        }
    }

    #[test]
    fn test_latin_hypercube_single_sample() {
        let bounds = GeneBounds::uniform(-1.0, 1.0, 2).unwrap();
        let mut rng = StdRng::seed_from_u64(1);

        let population = Distribution::latin_hypercube(1).distribute(&bounds, &mut rng);

        assert_eq!(population.len(), 1);
        assert!(population.iter().flatten().all(|g| (-1.0..=1.0).contains(g)));
    }

    #[test]
    fn test_random_distribution_is_seeded() {
        let bounds = GeneBounds::uniform(-5.0, 5.0, 2).unwrap();
        let dist = Distribution::random(5);

        let a = dist.distribute(&bounds, &mut StdRng::seed_from_u64(7));
        let b = dist.distribute(&bounds, &mut StdRng::seed_from_u64(7));
        let c = dist.distribute(&bounds, &mut StdRng::seed_from_u64(8));

        assert_eq!(a.len(), 5);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
