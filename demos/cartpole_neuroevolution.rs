//! # CartPole Neuroevolution
//!
//! Trains a linear policy for `CartPole-v1` with OpenAI-ES. Every candidate is a
//! flat parameter vector, scored by the reward its episodes collect on a pool
//! of worker threads.
//!
//! Set `BATCH_POLICY=1` to evaluate the policy on the controller, once per tick
//! for every running episode, instead of inside the workers.

use anyhow::Result;
use fx_evolve::{
    StdWorkflow,
    algorithms::{OpenEs, Optimizer},
    bootstrap::init_tracing,
    models::{FitnessGoal, Key, Schedule},
    monitors::EvalMonitor,
    problems::gym::{GymProblem, LinearPolicy, ResourceShare},
};
use std::env;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("info,fx_evolve=info");

    let batch_policy = env::var("BATCH_POLICY").is_ok_and(|v| v == "1");
    let policy = LinearPolicy::discrete(4, 2);

    let algorithm = OpenEs::builder(vec![0.0; policy.num_params()], 32)
        .learning_rate(0.05)
        .noise_stdev(0.1)
        .optimizer(Optimizer::adam())
        .build()?;

    let problem = GymProblem::builder()
        .env_name("CartPole-v1")
        .policy(policy)
        .num_workers(4)
        .env_per_worker(4)
        .worker_options(ResourceShare::cpus(1.0)?)
        .batch_policy(batch_policy)
        .num_episodes(2)
        .build()?;

    println!("pool: {:?}", problem.pool_info());

    let monitor = EvalMonitor::builder().topk(3).build()?;
    let workflow = StdWorkflow::builder()
        .algorithm(algorithm)
        .problem(problem)
        // CartPole-v1 is considered solved at 475
        .goal(FitnessGoal::maximize().with_threshold(475.0)?)
        .monitor(monitor.clone())
        .build();

    let state = workflow.init(Key::new(7))?;
    let (state, conclusion) = workflow.run(state, &Schedule::generations(100)).await?;

    println!("{conclusion:?} after {} generations", state.generation());
    for (fitness, _) in monitor.get_topk() {
        println!("reward {fitness:.1}");
    }

    Ok(())
}
