use fx_evolve::StdWorkflow;
use fx_evolve::algorithms::OpenEs;
use fx_evolve::models::{FitnessGoal, Key, Population};
use fx_evolve::problems::gym::{
    Action, CartPole, EnvFactory, Environment, Error as GymError, GymProblem, LinearPolicy,
    Transition,
};
use fx_evolve::problems::{self, Problem};
use fx_evolve::workflows;
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

const NUM_PARAMS: usize = 10;

#[derive(Clone, Copy, Debug)]
enum Crash {
    /// `step` returns an error
    Error,
    /// `step` panics and takes the worker thread down
    Panic,
}

/// CartPole that fails on its first step when `broken`.
struct Crashing {
    inner: CartPole,
    broken: Option<Crash>,
}

impl Environment for Crashing {
    fn observation_size(&self) -> usize {
        self.inner.observation_size()
    }

    fn reset(&mut self, seed: u64) -> anyhow::Result<Vec<f64>> {
        self.inner.reset(seed)
    }

    fn step(&mut self, action: &Action) -> anyhow::Result<Transition> {
        match self.broken {
            Some(Crash::Error) => anyhow::bail!("simulator crashed"),
            Some(Crash::Panic) => panic!("simulator crashed"),
            None => {}
        }
        self.inner.step(action)
    }
}

/// Only the first environment ever created is broken.
fn flaky_factory(crash: Crash) -> EnvFactory {
    let created = Arc::new(AtomicUsize::new(0));
    Arc::new(move || -> anyhow::Result<Box<dyn Environment>> {
        let first = created.fetch_add(1, Ordering::SeqCst) == 0;
        Ok(Box::new(Crashing {
            inner: CartPole::new(),
            broken: first.then_some(crash),
        }))
    })
}

fn broken_factory() -> EnvFactory {
    Arc::new(|| -> anyhow::Result<Box<dyn Environment>> {
        Ok(Box::new(Crashing {
            inner: CartPole::new(),
            broken: Some(Crash::Error),
        }))
    })
}

fn population(seed: u64, size: usize) -> Population {
    let mut rng = StdRng::seed_from_u64(seed);
    Population::from_rows(
        (0..size)
            .map(|_| (0..NUM_PARAMS).map(|_| rng.random_range(-1.0..1.0)).collect())
            .collect(),
    )
    .unwrap()
}

fn cartpole(num_workers: usize, env_per_worker: usize, batch_policy: bool) -> GymProblem {
    GymProblem::builder()
        .env_name("CartPole-v1")
        .policy(LinearPolicy::discrete(4, 2))
        .num_workers(num_workers)
        .env_per_worker(env_per_worker)
        .batch_policy(batch_policy)
        .num_episodes(2)
        .cap_episode(200)
        .build()
        .unwrap()
}

async fn rewards(problem: &GymProblem, population: &Population) -> Vec<f64> {
    let state = problem.init(Key::new(21)).unwrap();
    let (rewards, _) = problem.evaluate(&state, population).await.unwrap();
    rewards
}

#[tokio::test]
async fn test_rewards_do_not_depend_on_pool_layout() {
    let population = population(1, 9);

    let reference = rewards(&cartpole(1, 1, false), &population).await;

    assert_eq!(reference.len(), 9);
    assert!(reference.iter().all(|r| (1.0..=200.0).contains(r)));
    assert_eq!(rewards(&cartpole(3, 2, false), &population).await, reference);
    assert_eq!(rewards(&cartpole(2, 4, true), &population).await, reference);
    assert_eq!(rewards(&cartpole(4, 1, true), &population).await, reference);
}

#[tokio::test]
async fn test_problem_state_advances() {
    let problem = cartpole(2, 2, false);
    let population = population(2, 6);

    let state = problem.init(Key::new(0)).unwrap();
    let (first, next) = problem.evaluate(&state, &population).await.unwrap();
    let (again, _) = problem.evaluate(&state, &population).await.unwrap();

    assert_ne!(next, state);
    assert_eq!(first, again);
}

async fn assert_worker_replaced(crash: Crash) {
    let population = population(3, 6);
    let reference = rewards(&cartpole(2, 2, false), &population).await;

    for batch_policy in [false, true] {
        let problem = GymProblem::builder()
            .env_factory(flaky_factory(crash))
            .policy(LinearPolicy::discrete(4, 2))
            .num_workers(2)
            .env_per_worker(2)
            .batch_policy(batch_policy)
            .num_episodes(2)
            .cap_episode(200)
            .max_retries(1)
            .build()
            .unwrap();

        assert_eq!(
            rewards(&problem, &population).await,
            reference,
            "crash={crash:?} batch_policy={batch_policy}"
        );
    }
}

#[tokio::test]
async fn test_failed_worker_is_replaced() {
    assert_worker_replaced(Crash::Error).await;
}

#[tokio::test]
async fn test_dead_worker_thread_is_replaced() {
    assert_worker_replaced(Crash::Panic).await;
}

#[tokio::test]
async fn test_worker_failed_after_retries() {
    for batch_policy in [false, true] {
        let problem = GymProblem::builder()
            .env_factory(broken_factory())
            .policy(LinearPolicy::discrete(4, 2))
            .batch_policy(batch_policy)
            .max_retries(2)
            .build()
            .unwrap();

        let state = problem.init(Key::new(0)).unwrap();
        let result = problem.evaluate(&state, &population(4, 3)).await;

        match result {
            Err(problems::Error::GymError(GymError::WorkerFailed {
                worker, attempts, ..
            })) => {
                assert_eq!(worker, 0);
                assert_eq!(attempts, 3);
            }
            other => panic!("expected WorkerFailed, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_workflow_surfaces_worker_failures() {
    let workflow = StdWorkflow::builder()
        .algorithm(OpenEs::builder(vec![0.0; NUM_PARAMS], 4).build().unwrap())
        .problem(
            GymProblem::builder()
                .env_factory(broken_factory())
                .policy(LinearPolicy::discrete(4, 2))
                .max_retries(0)
                .build()
                .unwrap(),
        )
        .goal(FitnessGoal::maximize())
        .build();

    let state = workflow.init(Key::new(0)).unwrap();

    assert!(matches!(
        workflow.step(&state).await,
        Err(workflows::Error::ProblemError(problems::Error::GymError(
            GymError::WorkerFailed { attempts: 1, .. }
        )))
    ));
}

#[tokio::test]
async fn test_neuroevolution_on_cartpole() {
    let workflow = StdWorkflow::builder()
        .algorithm(
            OpenEs::builder(vec![0.0; NUM_PARAMS], 16)
                .learning_rate(0.1)
                .noise_stdev(0.5)
                .build()
                .unwrap(),
        )
        .problem(cartpole(2, 4, true))
        .goal(FitnessGoal::maximize())
        .build();

    let mut state = workflow.init(Key::new(8)).unwrap();
    let mut best = f64::NEG_INFINITY;
    for _ in 0..5 {
        state = workflow.step(&state).await.unwrap();
        let current = state.best_fitness().unwrap();
        assert!(current >= best);
        best = current;
    }

    assert_eq!(state.evaluations(), 5 * 16);
    assert!(best >= 1.0);
    assert!(best <= 200.0);
}
