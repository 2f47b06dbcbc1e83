use super::{Error, Problem};
use crate::models::{Key, Population};
use futures::future::BoxFuture;
use std::f64::consts::{E, PI};
use std::fmt;
use std::sync::Arc;
use tracing::{Instrument, debug_span};

fn sphere(x: &[f64]) -> f64 {
    x.iter().map(|xi| xi * xi).sum()
}

fn rastrigin(x: &[f64]) -> f64 {
    10.0 * x.len() as f64
        + x.iter()
            .map(|xi| xi * xi - 10.0 * (2.0 * PI * xi).cos())
            .sum::<f64>()
}

fn ackley(x: &[f64]) -> f64 {
    if x.is_empty() {
        return 0.0;
    }

    let n = x.len() as f64;
    let sum_sq = x.iter().map(|xi| xi * xi).sum::<f64>() / n;
    let sum_cos = x.iter().map(|xi| (2.0 * PI * xi).cos()).sum::<f64>() / n;

    -20.0 * (-0.2 * sum_sq.sqrt()).exp() - sum_cos.exp() + 20.0 + E
}

fn rosenbrock(x: &[f64]) -> f64 {
    x.windows(2)
        .map(|w| 100.0 * (w[1] - w[0] * w[0]).powi(2) + (1.0 - w[0]).powi(2))
        .sum()
}

fn evaluate_rows(
    population: &Population,
    dimensions: Option<usize>,
    f: impl Fn(&[f64]) -> f64,
) -> Result<Vec<f64>, Error> {
    if let Some(expected) = dimensions {
        if !population.is_empty() && population.dim() != expected {
            return Err(Error::DimensionMismatch {
                expected,
                actual: population.dim(),
            });
        }
    }

    Ok(population.iter().map(f).collect())
}

macro_rules! benchmark {
    ($(#[$doc:meta])* $name:ident, $f:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name {
            dimensions: Option<usize>,
        }

        impl $name {
            pub fn new() -> Self {
                Self { dimensions: None }
            }

            /// Rejects populations whose rows don't have exactly `dimensions` genes.
            pub fn with_dimensions(dimensions: usize) -> Self {
                Self {
                    dimensions: Some(dimensions),
                }
            }
        }

        impl Problem for $name {
            type State = ();

            fn init(&self, _key: Key) -> Result<Self::State, Error> {
                Ok(())
            }

            fn evaluate<'a>(
                &'a self,
                _state: &'a Self::State,
                population: &'a Population,
            ) -> BoxFuture<'a, Result<(Vec<f64>, Self::State), Error>> {
                let span = debug_span!(
                    "evaluate",
                    problem = stringify!($name),
                    population_size = population.len()
                );

                Box::pin(
                    async move {
                        let fitness = evaluate_rows(population, self.dimensions, $f)?;
                        Ok::<_, Error>((fitness, ()))
                    }
                    .instrument(span),
                )
            }
        }
    };
}

benchmark!(
    /// `f(x) = Σ xᵢ²`, minimum 0 at the origin.
    Sphere,
    sphere
);
benchmark!(
    /// Highly multimodal, minimum 0 at the origin.
    Rastrigin,
    rastrigin
);
benchmark!(
    /// Minimum 0 at the origin.
    Ackley,
    ackley
);
benchmark!(
    /// Curved valley, minimum 0 at `(1, ..., 1)`.
    Rosenbrock,
    rosenbrock
);

type Objective = dyn Fn(&[f64]) -> anyhow::Result<f64> + Send + Sync;

/// Problem backed by a user closure evaluated row by row.
///
/// ```rust
/// use fx_evolve::problems::FnProblem;
///
/// let problem = FnProblem::new(|x: &[f64]| Ok(x.iter().map(|v| v.abs()).sum()));
/// ```
#[derive(Clone)]
pub struct FnProblem {
    objective: Arc<Objective>,
}

impl FnProblem {
    pub fn new<F>(objective: F) -> Self
    where
        F: Fn(&[f64]) -> anyhow::Result<f64> + Send + Sync + 'static,
    {
        Self {
            objective: Arc::new(objective),
        }
    }
}

impl fmt::Debug for FnProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnProblem").finish_non_exhaustive()
    }
}

impl Problem for FnProblem {
    type State = ();

    fn init(&self, _key: Key) -> Result<Self::State, Error> {
        Ok(())
    }

    fn evaluate<'a>(
        &'a self,
        _state: &'a Self::State,
        population: &'a Population,
    ) -> BoxFuture<'a, Result<(Vec<f64>, Self::State), Error>> {
        Box::pin(async move {
            let fitness = population
                .iter()
                .map(|row| (self.objective)(row))
                .collect::<anyhow::Result<Vec<f64>>>()?;
            Ok((fitness, ()))
        })
    }
}
