use super::{Error, State};
use crate::algorithms::Algorithm;
use crate::builder::{Set, Unset};
use crate::models::{FitnessGoal, Key, Population, Schedule, ScheduleDecision};
use crate::monitors::{AskContext, EvalContext, Monitor};
use crate::problems::Problem;
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// State of a [`StdWorkflow`] over algorithm `A` and problem `P`.
pub type WorkflowState<A, P> = State<<A as Algorithm>::State, <P as Problem>::State>;

type SolutionTransform = Box<dyn Fn(&Population) -> Population + Send + Sync>;
type FitnessTransform = Box<dyn Fn(&[f64]) -> Vec<f64> + Send + Sync>;

/// How a [`StdWorkflow::run`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conclusion {
    /// The best fitness reached the goal's threshold.
    Completed,
    /// The schedule's budget ran out first.
    Terminated,
}

/// Standard workflow: ask the algorithm, evaluate on the problem, tell the
/// algorithm, and keep track of the best solution.
///
/// ```rust
/// use fx_evolve::algorithms::Pso;
/// use fx_evolve::models::{GeneBounds, Key, Schedule};
/// use fx_evolve::problems::Sphere;
/// use fx_evolve::workflows::{Conclusion, StdWorkflow};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let workflow = StdWorkflow::builder()
///     .algorithm(Pso::builder(GeneBounds::uniform(-10.0, 10.0, 2)?, 20).build()?)
///     .problem(Sphere::new())
///     .build();
///
/// let state = workflow.init(Key::new(42))?;
/// let (state, conclusion) = workflow.run(state, &Schedule::generations(50)).await?;
///
/// assert_eq!(conclusion, Conclusion::Terminated);
/// assert_eq!(state.generation(), 50);
/// # Ok(())
/// # }
/// ```
pub struct StdWorkflow<A, P> {
    algorithm: A,
    problem: P,
    monitors: Vec<Arc<dyn Monitor>>,
    goal: FitnessGoal,
    solution_transform: Option<SolutionTransform>,
    fitness_transform: Option<FitnessTransform>,
}

pub struct StdWorkflowBuilder<A, P> {
    algorithm: A,
    problem: P,
    monitors: Vec<Arc<dyn Monitor>>,
    goal: FitnessGoal,
    solution_transform: Option<SolutionTransform>,
    fitness_transform: Option<FitnessTransform>,
}

impl StdWorkflow<Unset, Unset> {
    pub fn builder() -> StdWorkflowBuilder<Unset, Unset> {
        StdWorkflowBuilder {
            algorithm: Unset,
            problem: Unset,
            monitors: Vec::new(),
            goal: FitnessGoal::default(),
            solution_transform: None,
            fitness_transform: None,
        }
    }
}

impl<P> StdWorkflowBuilder<Unset, P> {
    pub fn algorithm<A: Algorithm>(self, algorithm: A) -> StdWorkflowBuilder<Set<A>, P> {
        StdWorkflowBuilder {
            algorithm: Set::new(algorithm),
            problem: self.problem,
            monitors: self.monitors,
            goal: self.goal,
            solution_transform: self.solution_transform,
            fitness_transform: self.fitness_transform,
        }
    }
}

impl<A> StdWorkflowBuilder<A, Unset> {
    pub fn problem<P: Problem>(self, problem: P) -> StdWorkflowBuilder<A, Set<P>> {
        StdWorkflowBuilder {
            algorithm: self.algorithm,
            problem: Set::new(problem),
            monitors: self.monitors,
            goal: self.goal,
            solution_transform: self.solution_transform,
            fitness_transform: self.fitness_transform,
        }
    }
}

impl<A, P> StdWorkflowBuilder<A, P> {
    /// Adds a monitor. Keep a clone to read what it recorded.
    pub fn monitor(mut self, monitor: impl Monitor + 'static) -> Self {
        self.monitors.push(Arc::new(monitor));
        self
    }

    /// Optimization direction and optional completion threshold, default minimize.
    pub fn goal(mut self, goal: FitnessGoal) -> Self {
        self.goal = goal;
        self
    }

    /// Maps the algorithm's candidates to what the problem evaluates.
    pub fn solution_transform(
        mut self,
        transform: impl Fn(&Population) -> Population + Send + Sync + 'static,
    ) -> Self {
        self.solution_transform = Some(Box::new(transform));
        self
    }

    /// Applied to the minimization-form fitness right before it is told to the algorithm.
    pub fn fitness_transform(
        mut self,
        transform: impl Fn(&[f64]) -> Vec<f64> + Send + Sync + 'static,
    ) -> Self {
        self.fitness_transform = Some(Box::new(transform));
        self
    }
}

impl<A: Algorithm, P: Problem> StdWorkflowBuilder<Set<A>, Set<P>> {
    #[instrument(level = "debug", skip(self), fields(num_monitors = self.monitors.len(), goal = ?self.goal))]
    pub fn build(self) -> StdWorkflow<A, P> {
        StdWorkflow {
            algorithm: self.algorithm.into_inner(),
            problem: self.problem.into_inner(),
            monitors: self.monitors,
            goal: self.goal,
            solution_transform: self.solution_transform,
            fitness_transform: self.fitness_transform,
        }
    }
}

impl<A: Algorithm, P: Problem> StdWorkflow<A, P> {
    pub fn algorithm(&self) -> &A {
        &self.algorithm
    }

    pub fn problem(&self) -> &P {
        &self.problem
    }

    pub fn goal(&self) -> FitnessGoal {
        self.goal
    }

    /// Initializes the algorithm and the problem from independent halves of `key`.
    #[instrument(level = "info", skip(self), fields(key = key.seed()))]
    pub fn init(&self, key: Key) -> Result<WorkflowState<A, P>, Error> {
        let (algorithm_key, problem_key) = key.split();

        let state = State {
            id: Uuid::now_v7(),
            key,
            generation: 0,
            evaluations: 0,
            best_fitness: None,
            best_solution: None,
            algorithm: self.algorithm.init(algorithm_key)?,
            problem: self.problem.init(problem_key)?,
        };

        info!(run_id = %state.id, "workflow initialized");
        Ok(state)
    }

    fn transform_solutions(&self, population: &Population) -> Option<Population> {
        self.solution_transform
            .as_ref()
            .map(|transform| transform(population))
    }

    /// Proposes the next population without evaluating it.
    ///
    /// Returns the candidates after the solution transform and the state with
    /// the algorithm awaiting fitness.
    #[instrument(level = "debug", skip(self, state), fields(run_id = %state.id, generation = state.generation))]
    pub fn sample(
        &self,
        state: &WorkflowState<A, P>,
    ) -> Result<(Population, WorkflowState<A, P>), Error> {
        let (population, algorithm) = self.algorithm.ask(&state.algorithm)?;
        let population = self.transform_solutions(&population).unwrap_or(population);

        Ok((
            population,
            State {
                algorithm,
                ..state.clone()
            },
        ))
    }

    /// Runs one generation and returns the next state. `state` is not modified.
    #[instrument(level = "debug", skip(self, state), fields(run_id = %state.id, generation = state.generation))]
    pub async fn step(&self, state: &WorkflowState<A, P>) -> Result<WorkflowState<A, P>, Error> {
        let generation = state.generation;

        let (candidates, algorithm) = self.algorithm.ask(&state.algorithm)?;

        for monitor in &self.monitors {
            monitor.post_ask(&AskContext {
                generation,
                population: &candidates,
            });
        }

        let transformed = self.transform_solutions(&candidates);
        let evaluated = transformed.as_ref().unwrap_or(&candidates);

        let (fitness, problem) = self.problem.evaluate(&state.problem, evaluated).await?;
        if fitness.len() != candidates.len() {
            return Err(Error::FitnessLength {
                expected: candidates.len(),
                actual: fitness.len(),
            });
        }

        let non_finite = fitness.iter().filter(|f| !f.is_finite()).count();
        if non_finite > 0 {
            warn!(generation, non_finite, "problem returned non-finite fitness");
        }

        for monitor in &self.monitors {
            monitor.post_eval(&EvalContext {
                generation,
                candidates: &candidates,
                population: evaluated,
                fitness: &fitness,
                goal: self.goal,
            });
        }

        let mut minimized: Vec<f64> = fitness
            .iter()
            .map(|f| self.goal.to_minimization(*f))
            .collect();
        if let Some(transform) = &self.fitness_transform {
            minimized = transform(&minimized);
            if minimized.len() != candidates.len() {
                return Err(Error::FitnessLength {
                    expected: candidates.len(),
                    actual: minimized.len(),
                });
            }
        }

        let algorithm = self.algorithm.tell(&algorithm, &minimized)?;

        let (best_fitness, best_solution) = match self.goal.best_index(&fitness) {
            Some(index)
                if state
                    .best_fitness
                    .is_none_or(|incumbent| self.goal.is_better(fitness[index], incumbent)) =>
            {
                (
                    Some(fitness[index]),
                    candidates.row(index).map(<[f64]>::to_vec),
                )
            }
            _ => (state.best_fitness, state.best_solution.clone()),
        };

        let next = State {
            id: state.id,
            key: state.key,
            generation: generation + 1,
            evaluations: state.evaluations + candidates.len() as u64,
            best_fitness,
            best_solution,
            algorithm,
            problem,
        };

        info!(
            run_id = %next.id,
            generation = next.generation,
            evaluations = next.evaluations,
            best_fitness = ?next.best_fitness,
            "generation completed"
        );

        Ok(next)
    }

    /// Waits until every monitor processed what was posted so far.
    pub async fn flush(&self) -> Result<(), Error> {
        try_join_all(self.monitors.iter().map(|monitor| monitor.flush())).await?;
        Ok(())
    }

    /// Steps until `schedule` decides to stop, then flushes the monitors.
    #[instrument(level = "info", skip(self, state, schedule), fields(run_id = %state.id, max_generations = schedule.max_generations))]
    pub async fn run(
        &self,
        state: WorkflowState<A, P>,
        schedule: &Schedule,
    ) -> Result<(WorkflowState<A, P>, Conclusion), Error> {
        let mut state = state;

        let conclusion = loop {
            match schedule.decide(
                state.generation,
                state.evaluations,
                state.best_fitness,
                &self.goal,
            ) {
                ScheduleDecision::Continue => state = self.step(&state).await?,
                ScheduleDecision::Complete => break Conclusion::Completed,
                ScheduleDecision::Terminate => break Conclusion::Terminated,
            }
        };

        self.flush().await?;

        info!(
            ?conclusion,
            generation = state.generation,
            best_fitness = ?state.best_fitness,
            "run concluded"
        );

        Ok((state, conclusion))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::{GeneticAlgorithm, Pso};
    use crate::models::{Distribution, GeneBounds};
    use crate::monitors::EvalMonitor;
    use crate::problems::{FnProblem, Sphere};

    fn pso(dim: usize) -> Pso {
        Pso::builder(GeneBounds::uniform(-5.0, 5.0, dim).unwrap(), 16)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn step_leaves_the_input_state_untouched() {
        let workflow = StdWorkflow::builder()
            .algorithm(pso(3))
            .problem(Sphere::new())
            .build();

        let state = workflow.init(Key::new(1)).unwrap();
        let before = state.clone();
        let next = workflow.step(&state).await.unwrap();

        assert_eq!(state, before);
        assert_eq!(next.generation(), 1);
        assert_eq!(next.evaluations(), 16);
        assert_eq!(next.id(), state.id());
        assert!(next.best_fitness().is_some());
    }

    #[tokio::test]
    async fn it_maximizes_raw_fitness() {
        let monitor = EvalMonitor::new().unwrap();
        let workflow = StdWorkflow::builder()
            .algorithm(pso(2))
            .problem(FnProblem::new(|x: &[f64]| Ok(-x.iter().map(|v| v * v).sum::<f64>())))
            .goal(FitnessGoal::maximize())
            .monitor(monitor.clone())
            .build();

        let mut state = workflow.init(Key::new(4)).unwrap();
        let mut previous = f64::NEG_INFINITY;
        for _ in 0..30 {
            state = workflow.step(&state).await.unwrap();
            let best = state.best_fitness().unwrap();
            assert!(best >= previous);
            previous = best;
        }
        workflow.flush().await.unwrap();

        assert!(previous <= 0.0);
        assert!(previous > -0.5);
        assert_eq!(monitor.get_best_fitness(), state.best_fitness());
        assert_eq!(
            monitor.get_best_solution().as_deref(),
            state.best_solution()
        );
    }

    #[tokio::test]
    async fn it_evaluates_transformed_solutions() {
        let monitor = EvalMonitor::new().unwrap();
        let workflow = StdWorkflow::builder()
            .algorithm(pso(2))
            .problem(FnProblem::new(|x: &[f64]| Ok(x[0])))
            .solution_transform(|population: &Population| {
                Population::from_rows(population.iter().map(|_| vec![7.0, 7.0]).collect()).unwrap()
            })
            .monitor(monitor.clone())
            .build();

        let state = workflow.init(Key::new(2)).unwrap();
        let (sampled, _) = workflow.sample(&state).unwrap();
        assert!(sampled.iter().all(|row| row == [7.0, 7.0]));

        let state = workflow.step(&state).await.unwrap();
        assert_eq!(state.best_fitness(), Some(7.0));
        // The best solution stays in the algorithm's space
        assert!(state.best_solution().unwrap().iter().all(|x| (-5.0..=5.0).contains(x)));

        workflow.flush().await.unwrap();
        assert_eq!(
            monitor.get_best_solution().as_deref(),
            state.best_solution()
        );
    }

    #[tokio::test]
    async fn it_rejects_fitness_of_the_wrong_length() {
        let workflow = StdWorkflow::builder()
            .algorithm(pso(2))
            .problem(Sphere::new())
            .fitness_transform(|fitness: &[f64]| fitness[1..].to_vec())
            .build();

        let state = workflow.init(Key::new(2)).unwrap();

        assert!(matches!(
            workflow.step(&state).await,
            Err(Error::FitnessLength {
                expected: 16,
                actual: 15
            })
        ));
    }

    #[tokio::test]
    async fn run_completes_when_the_threshold_is_reached() {
        let workflow = StdWorkflow::builder()
            .algorithm(
                GeneticAlgorithm::builder(
                    GeneBounds::uniform(-1.0, 1.0, 2).unwrap(),
                    Distribution::latin_hypercube(20),
                )
                .build()
                .unwrap(),
            )
            .problem(Sphere::new())
            .goal(FitnessGoal::minimize().with_threshold(0.5).unwrap())
            .build();

        let state = workflow.init(Key::new(0)).unwrap();
        let (state, conclusion) = workflow
            .run(state, &Schedule::generations(100))
            .await
            .unwrap();

        assert_eq!(conclusion, Conclusion::Completed);
        assert!(state.best_fitness().unwrap() <= 0.5);
        assert!(state.generation() < 100);
    }

    #[tokio::test]
    async fn run_terminates_on_the_evaluation_budget() {
        let workflow = StdWorkflow::builder()
            .algorithm(pso(2))
            .problem(Sphere::new())
            .build();

        let state = workflow.init(Key::new(0)).unwrap();
        let (state, conclusion) = workflow
            .run(state, &Schedule::generations(100).with_max_evaluations(40))
            .await
            .unwrap();

        assert_eq!(conclusion, Conclusion::Terminated);
        assert_eq!(state.generation(), 3);
        assert_eq!(state.evaluations(), 48);
    }
}
