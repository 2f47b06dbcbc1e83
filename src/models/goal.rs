use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Defines the optimization direction and, optionally, the fitness at which a run is complete.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FitnessGoal {
    /// Minimize fitness values, completing when fitness drops to or below the threshold.
    Minimize { threshold: Option<f64> },
    /// Maximize fitness values, completing when fitness reaches or exceeds the threshold.
    Maximize { threshold: Option<f64> },
}

#[derive(Debug, thiserror::Error, PartialEq)]
#[error("fitness goal threshold must be finite, got {0}")]
pub struct ThresholdNotFinite(f64);

impl Default for FitnessGoal {
    fn default() -> Self {
        Self::minimize()
    }
}

impl FitnessGoal {
    pub fn minimize() -> Self {
        Self::Minimize { threshold: None }
    }

    pub fn maximize() -> Self {
        Self::Maximize { threshold: None }
    }

    /// Sets the fitness at which the goal counts as reached.
    pub fn with_threshold(self, threshold: f64) -> Result<Self, ThresholdNotFinite> {
        if !threshold.is_finite() {
            return Err(ThresholdNotFinite(threshold));
        }

        Ok(match self {
            Self::Minimize { .. } => Self::Minimize {
                threshold: Some(threshold),
            },
            Self::Maximize { .. } => Self::Maximize {
                threshold: Some(threshold),
            },
        })
    }

    pub fn threshold(&self) -> Option<f64> {
        match self {
            Self::Minimize { threshold } | Self::Maximize { threshold } => *threshold,
        }
    }

    /// Returns true if `candidate` is strictly better than `incumbent`. NaN is never better.
    pub fn is_better(&self, candidate: f64, incumbent: f64) -> bool {
        if candidate.is_nan() {
            return false;
        }

        if incumbent.is_nan() {
            return true;
        }

        match self {
            Self::Minimize { .. } => candidate < incumbent,
            Self::Maximize { .. } => candidate > incumbent,
        }
    }

    /// Checks if the given fitness value has reached the goal threshold.
    #[instrument(level = "debug", skip(self), fields(goal = ?self, fitness = fitness))]
    pub fn is_reached(&self, fitness: f64) -> bool {
        match self {
            Self::Minimize {
                threshold: Some(threshold),
            } => fitness <= *threshold,
            Self::Maximize {
                threshold: Some(threshold),
            } => fitness >= *threshold,
            _ => false,
        }
    }

    /// Maps a raw fitness value onto the minimization form algorithms consume.
    pub fn to_minimization(&self, fitness: f64) -> f64 {
        if fitness.is_nan() {
            return f64::INFINITY;
        }

        match self {
            Self::Minimize { .. } => fitness,
            Self::Maximize { .. } => -fitness,
        }
    }

    /// Index of the best value in `fitness`, ignoring NaN.
    pub fn best_index(&self, fitness: &[f64]) -> Option<usize> {
        fitness
            .iter()
            .enumerate()
            .filter(|(_, value)| !value.is_nan())
            .fold(None, |best: Option<(usize, f64)>, (index, &value)| match best {
                Some((_, incumbent)) if !self.is_better(value, incumbent) => best,
                _ => Some((index, value)),
            })
            .map(|(index, _)| index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_thresholds() {
        assert!(FitnessGoal::minimize().with_threshold(f64::NAN).is_err());
        assert!(
            FitnessGoal::maximize()
                .with_threshold(f64::INFINITY)
                .is_err()
        );
    }

    #[test]
    fn test_is_reached_minimize() {
        let goal = FitnessGoal::minimize().with_threshold(0.5).unwrap();

        assert!(goal.is_reached(0.3)); // Below threshold
        assert!(goal.is_reached(0.5)); // At threshold
        assert!(!goal.is_reached(0.7)); // Above threshold
    }

    #[test]
    fn test_is_reached_maximize() {
        let goal = FitnessGoal::maximize().with_threshold(475.0).unwrap();

        assert!(!goal.is_reached(300.0));
        assert!(goal.is_reached(475.0));
        assert!(goal.is_reached(500.0));
    }

    #[test]
    fn test_never_reached_without_threshold() {
        assert!(!FitnessGoal::minimize().is_reached(f64::NEG_INFINITY));
        assert!(!FitnessGoal::maximize().is_reached(f64::INFINITY));
    }

    #[test]
    fn test_is_better_ignores_nan() {
        let goal = FitnessGoal::minimize();

        assert!(goal.is_better(1.0, 2.0));
        assert!(!goal.is_better(2.0, 1.0));
        assert!(!goal.is_better(f64::NAN, 1.0));
        assert!(goal.is_better(1.0, f64::NAN));
        assert!(FitnessGoal::maximize().is_better(2.0, 1.0));
    }

    #[test]
    fn test_to_minimization() {
        assert_eq!(FitnessGoal::minimize().to_minimization(3.0), 3.0);
        assert_eq!(FitnessGoal::maximize().to_minimization(3.0), -3.0);
        assert_eq!(
            FitnessGoal::maximize().to_minimization(f64::NAN),
            f64::INFINITY
        );
    }

    #[test]
    fn test_best_index() {
        let fitness = [3.0, f64::NAN, 1.0, 2.0];

        assert_eq!(FitnessGoal::minimize().best_index(&fitness), Some(2));
        assert_eq!(FitnessGoal::maximize().best_index(&fitness), Some(0));
        assert_eq!(FitnessGoal::minimize().best_index(&[f64::NAN]), None);
        assert_eq!(FitnessGoal::minimize().best_index(&[]), None);
    }
}
