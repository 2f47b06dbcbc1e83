use super::FitnessGoal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Budget that controls how long [`StdWorkflow::run`](crate::workflows::StdWorkflow::run) keeps stepping.
///
/// A run stops as soon as either budget is exhausted, or earlier when the
/// fitness goal has a threshold and the best fitness reaches it.
///
/// # Examples
///
/// ```rust
/// use fx_evolve::models::Schedule;
///
/// // 200 generations, no evaluation cap
/// let schedule = Schedule::generations(200);
///
/// // Stop after 10_000 evaluations or 500 generations, whichever comes first
/// let capped = Schedule::generations(500).with_max_evaluations(10_000);
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Schedule {
    /// Number of generations to step before terminating.
    pub max_generations: u32,
    /// Total number of fitness evaluations before terminating.
    pub max_evaluations: Option<u64>,
}

/// Decision about what a run should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleDecision {
    /// Budget remains and the goal has not been reached.
    Continue,
    /// The best fitness reached the goal threshold.
    Complete,
    /// A budget is exhausted.
    Terminate,
}

impl Schedule {
    pub fn generations(max_generations: u32) -> Self {
        Self {
            max_generations,
            max_evaluations: None,
        }
    }

    pub fn with_max_evaluations(mut self, max_evaluations: u64) -> Self {
        self.max_evaluations = Some(max_evaluations);
        self
    }

    /// Determines what to do given the progress of a run. The goal is checked first.
    #[instrument(level = "debug", skip(self, goal), fields(generation = generation, evaluations = evaluations, best_fitness = ?best_fitness, max_generations = self.max_generations))]
    pub fn decide(
        &self,
        generation: u32,
        evaluations: u64,
        best_fitness: Option<f64>,
        goal: &FitnessGoal,
    ) -> ScheduleDecision {
        if best_fitness.is_some_and(|fitness| goal.is_reached(fitness)) {
            return ScheduleDecision::Complete;
        }

        if generation >= self.max_generations {
            return ScheduleDecision::Terminate;
        }

        if self
            .max_evaluations
            .is_some_and(|max_evaluations| evaluations >= max_evaluations)
        {
            return ScheduleDecision::Terminate;
        }

        ScheduleDecision::Continue
    }
}
