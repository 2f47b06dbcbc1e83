//! # Particle Swarm on the Sphere Function
//!
//! Minimizes `f(x) = Σ x²` in 8 dimensions with particle swarm optimization and
//! stops once the best fitness drops below `1e-4`.
//!
//! ## Key Concepts
//!
//! - **Key**: every random decision is derived from it, the same key gives the same run
//! - **State**: each `step` returns a new state, nothing is mutated in place
//! - **Monitor**: records fitness in the background, `flush` before reading it

use anyhow::Result;
use fx_evolve::{
    StdWorkflow,
    algorithms::Pso,
    bootstrap::init_tracing,
    models::{FitnessGoal, GeneBounds, Key, Schedule},
    monitors::EvalMonitor,
    problems::Sphere,
};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("info");

    let algorithm = Pso::builder(GeneBounds::uniform(-10.0, 10.0, 8)?, 40)
        .w(0.6)
        .phi_p(2.5)
        .phi_g(0.8)
        .build()?;

    let monitor = EvalMonitor::builder().full_fit_history(true).build()?;

    let workflow = StdWorkflow::builder()
        .algorithm(algorithm)
        .problem(Sphere::new())
        .goal(FitnessGoal::minimize().with_threshold(1e-4)?)
        .monitor(monitor.clone())
        .build();

    // Step manually for a few generations...
    let mut state = workflow.init(Key::new(42))?;
    for _ in 0..10 {
        state = workflow.step(&state).await?;
    }
    workflow.flush().await?;
    println!(
        "after {} generations: best = {:?}",
        state.generation(),
        monitor.get_best_fitness()
    );

    // ...then let the schedule drive the rest
    let (state, conclusion) = workflow.run(state, &Schedule::generations(500)).await?;

    println!("{conclusion:?} after {} generations", state.generation());
    println!("best fitness:  {:?}", monitor.get_best_fitness());
    println!("best solution: {:?}", monitor.get_best_solution());
    println!("recorded {} generations", monitor.get_fitness_history().len());

    Ok(())
}
