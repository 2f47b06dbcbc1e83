use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Recombines two real-valued parents into one child.
///
/// ```rust
/// use fx_evolve::models::Crossover;
///
/// let uniform = Crossover::uniform(0.6)?;
/// let single_point = Crossover::single_point();
/// let blend = Crossover::blend(0.5)?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Crossover {
    /// Each gene comes from the first parent with `probability`, otherwise from the second.
    Uniform { probability: f64 },
    /// Head of the first parent, tail of the second. The cut leaves at least one
    /// gene on each side, single-gene genomes are copied from the first parent.
    SinglePoint,
    /// BLX-alpha: each gene is uniform over the parents' interval widened by
    /// `alpha` times its length on both sides.
    Blend { alpha: f64 },
}

#[derive(Debug, thiserror::Error, PartialEq)]
#[error("ProbabilityOutOfRange: uniform crossover probability must be in [0, 1], got {0}")]
pub struct ProbabilityOutOfRangeError(f64);

#[derive(Debug, thiserror::Error, PartialEq)]
#[error("AlphaOutOfRange: blend alpha must be finite and non-negative, got {0}")]
pub struct AlphaOutOfRangeError(f64);

impl Crossover {
    pub fn uniform(probability: f64) -> Result<Self, ProbabilityOutOfRangeError> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(ProbabilityOutOfRangeError(probability));
        }
        Ok(Self::Uniform { probability })
    }

    pub fn single_point() -> Self {
        Self::SinglePoint
    }

    pub fn blend(alpha: f64) -> Result<Self, AlphaOutOfRangeError> {
        if alpha.is_finite() && alpha >= 0.0 {
            Ok(Self::Blend { alpha })
        } else {
            Err(AlphaOutOfRangeError(alpha))
        }
    }

    #[instrument(level = "debug", skip(self, rng, lhs, rhs), fields(crossover = ?self, genome_length = lhs.len()))]
    pub(crate) fn apply<R: Rng>(&self, rng: &mut R, lhs: &[f64], rhs: &[f64]) -> Vec<f64> {
        match *self {
            Self::Uniform { probability } => lhs
                .iter()
                .zip(rhs)
                .map(|(&a, &b)| if rng.random_bool(probability) { a } else { b })
                .collect(),
            Self::SinglePoint => {
                let cut = match lhs.len() {
                    0 | 1 => lhs.len(),
                    len => rng.random_range(1..len),
                };
                lhs[..cut].iter().chain(&rhs[cut..]).copied().collect()
            }
            Self::Blend { alpha } => lhs
                .iter()
                .zip(rhs)
                .map(|(&a, &b)| {
                    let spread = (a - b).abs() * alpha;
                    let low = a.min(b) - spread;
                    let high = a.max(b) + spread;
                    if low < high {
                        rng.random_range(low..=high)
                    } else {
                        low
                    }
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    const A: [f64; 5] = [1.0, 2.0, 3.0, 4.0, 5.0];
    const B: [f64; 5] = [6.0, 7.0, 8.0, 9.0, 10.0];

    #[test]
    fn uniform_picks_each_gene_from_a_parent() {
        let mut rng = StdRng::seed_from_u64(42);

        let child = Crossover::uniform(0.5).unwrap().apply(&mut rng, &A, &B);
        assert!(child.iter().enumerate().all(|(i, g)| *g == A[i] || *g == B[i]));

        assert_eq!(Crossover::uniform(0.0).unwrap().apply(&mut rng, &A, &B), B);
        assert_eq!(Crossover::uniform(1.0).unwrap().apply(&mut rng, &A, &B), A);
    }

    #[test]
    fn single_point_cuts_once() {
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..20 {
            let child = Crossover::single_point().apply(&mut rng, &A, &B);
            let cut = child.iter().take_while(|g| **g < 6.0).count();

            assert!((1..5).contains(&cut));
            assert_eq!(child[..cut], A[..cut]);
            assert_eq!(child[cut..], B[cut..]);
        }

        assert_eq!(
            Crossover::single_point().apply(&mut rng, &[1.0], &[2.0]),
            vec![1.0]
        );
    }

    #[test]
    fn blend_stays_in_the_widened_interval() {
        let mut rng = StdRng::seed_from_u64(42);
        let crossover = Crossover::blend(0.5).unwrap();

        for _ in 0..100 {
            let child = crossover.apply(&mut rng, &[0.0, 2.0], &[1.0, 2.0]);
            assert!((-0.5..=1.5).contains(&child[0]));
            assert_eq!(child[1], 2.0);
        }
    }

    #[test]
    fn it_validates_parameters() {
        assert_eq!(
            Crossover::uniform(1.5),
            Err(ProbabilityOutOfRangeError(1.5))
        );
        assert!(Crossover::uniform(-0.1).is_err());
        assert!(Crossover::blend(-0.1).is_err());
        assert!(Crossover::blend(f64::NAN).is_err());
        assert!(Crossover::blend(0.0).is_ok());
    }
}
