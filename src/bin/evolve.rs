use anyhow::Result;
use fx_evolve::algorithms::{Algorithm, OpenEs, Optimizer, Pso};
use fx_evolve::bootstrap::{Configuration, ProblemKind, init_tracing};
use fx_evolve::models::{FitnessGoal, GeneBounds, Key, Schedule};
use fx_evolve::monitors::EvalMonitor;
use fx_evolve::problems::gym::{GymProblem, LinearPolicy};
use fx_evolve::problems::{Ackley, Problem, Rastrigin, Rosenbrock, Sphere};
use fx_evolve::workflows::{StdWorkflow, checkpoint};
use tracing::info;

// Runs one optimization described by FX_EVOLVE_* variables (see .env.local).
#[tokio::main]
async fn main() -> Result<()> {
    let config = Configuration::from_env()?;
    init_tracing(&config.log);

    info!(?config, "starting");

    match config.problem {
        ProblemKind::CartPole => {
            let policy = LinearPolicy::discrete(4, 2);
            let population_size = even(config.population_size);
            let algorithm = OpenEs::builder(vec![0.0; policy.num_params()], population_size)
                .learning_rate(0.05)
                .noise_stdev(0.1)
                .optimizer(Optimizer::adam())
                .build()?;
            let problem = GymProblem::builder()
                .env_name("CartPole-v1")
                .policy(policy)
                .num_workers(config.num_workers)
                .env_per_worker(config.env_per_worker)
                .batch_policy(config.batch_policy)
                .build()?;

            optimize(&config, algorithm, problem, FitnessGoal::maximize()).await
        }
        kind => {
            let bounds = GeneBounds::uniform(-5.0, 5.0, config.dimensions)?;
            let algorithm = Pso::builder(bounds, config.population_size).build()?;
            let goal = FitnessGoal::minimize();

            match kind {
                ProblemKind::Rastrigin => optimize(&config, algorithm, Rastrigin::new(), goal).await,
                ProblemKind::Ackley => optimize(&config, algorithm, Ackley::new(), goal).await,
                ProblemKind::Rosenbrock => {
                    optimize(&config, algorithm, Rosenbrock::new(), goal).await
                }
                _ => optimize(&config, algorithm, Sphere::new(), goal).await,
            }
        }
    }
}

fn even(population_size: usize) -> usize {
    population_size.max(2) & !1
}

async fn optimize<A, P>(
    config: &Configuration,
    algorithm: A,
    problem: P,
    goal: FitnessGoal,
) -> Result<()>
where
    A: Algorithm,
    P: Problem,
{
    let monitor = EvalMonitor::builder().topk(3).build()?;
    let workflow = StdWorkflow::builder()
        .algorithm(algorithm)
        .problem(problem)
        .goal(goal)
        .monitor(monitor.clone())
        .build();

    let state = workflow.init(Key::new(config.seed))?;
    let (state, conclusion) = workflow
        .run(state, &Schedule::generations(config.max_generations))
        .await?;

    info!(
        ?conclusion,
        generations = state.generation(),
        evaluations = state.evaluations(),
        best_fitness = ?monitor.get_best_fitness(),
        "finished"
    );
    for (rank, (fitness, _)) in monitor.get_topk().iter().enumerate() {
        info!(rank, fitness = *fitness, "top solution");
    }

    if let Some(path) = &config.checkpoint {
        checkpoint::save(&state, path)?;
        info!(path = %path, "checkpoint written");
    }

    Ok(())
}
