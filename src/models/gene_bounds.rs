use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::instrument;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum GeneBoundError {
    #[error(
        "InvalidBounds: lower bound must be smaller than upper. lower = {lower}, upper = {upper}"
    )]
    InvalidBound { lower: f64, upper: f64 },
    #[error("NonFiniteBound: bounds must be finite. lower = {lower}, upper = {upper}")]
    NonFinite { lower: f64, upper: f64 },
}

impl GeneBoundError {
    pub(crate) fn invalid_bound(lower: f64, upper: f64) -> Self {
        Self::InvalidBound { lower, upper }
    }

    pub(crate) fn non_finite(lower: f64, upper: f64) -> Self {
        Self::NonFinite { lower, upper }
    }
}

/// Closed interval a single gene may take.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeneBounds {
    pub(crate) lower: f64,
    pub(crate) upper: f64,
}

impl GeneBounds {
    #[instrument(level = "debug", fields(lower = lower, upper = upper))]
    pub fn new(lower: f64, upper: f64) -> Result<Self, GeneBoundError> {
        if !lower.is_finite() || !upper.is_finite() {
            return Err(GeneBoundError::non_finite(lower, upper));
        }

        if lower >= upper {
            return Err(GeneBoundError::invalid_bound(lower, upper));
        };

        Ok(Self { lower, upper })
    }

    /// Creates `dim` identical bounds, the common case for box constrained benchmarks.
    pub fn uniform(lower: f64, upper: f64, dim: usize) -> Result<Vec<Self>, GeneBoundError> {
        let bounds = Self::new(lower, upper)?;
        Ok(vec![bounds; dim])
    }

    pub fn lower(&self) -> f64 {
        self.lower
    }

    pub fn upper(&self) -> f64 {
        self.upper
    }

    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn clamp(&self, gene: f64) -> f64 {
        gene.clamp(self.lower, self.upper)
    }

    /// Maps a sample in `[0, 1]` onto the interval.
    pub fn from_sample(&self, sample: f64) -> f64 {
        self.clamp(self.lower + sample * self.width())
    }

    pub fn random<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        rng.random_range(self.lower..=self.upper)
    }
}
