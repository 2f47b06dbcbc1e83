use fx_evolve::StdWorkflow;
use fx_evolve::algorithms::{GeneticAlgorithm, OpenEs, Pso};
use fx_evolve::models::{Distribution, FitnessGoal, GeneBounds, Key, Schedule};
use fx_evolve::monitors::EvalMonitor;
use fx_evolve::problems::{Ackley, FnProblem, Rastrigin, Sphere};

fn ga(dim: usize) -> GeneticAlgorithm {
    GeneticAlgorithm::builder(
        GeneBounds::uniform(-5.12, 5.12, dim).unwrap(),
        Distribution::latin_hypercube(30),
    )
    .elitism(2)
    .horizon(40)
    .build()
    .unwrap()
}

#[tokio::test]
async fn test_same_key_same_run() {
    let workflow = StdWorkflow::builder()
        .algorithm(ga(4))
        .problem(Rastrigin::new())
        .build();

    let mut a = workflow.init(Key::new(11)).unwrap();
    let mut b = workflow.init(Key::new(11)).unwrap();
    for _ in 0..15 {
        a = workflow.step(&a).await.unwrap();
        b = workflow.step(&b).await.unwrap();
    }

    assert_eq!(a.best_fitness(), b.best_fitness());
    assert_eq!(a.best_solution(), b.best_solution());
    assert_eq!(a.algorithm(), b.algorithm());

    let (sampled_a, _) = workflow.sample(&a).unwrap();
    let (sampled_b, _) = workflow.sample(&b).unwrap();
    assert_eq!(sampled_a, sampled_b);
}

#[tokio::test]
async fn test_different_keys_diverge() {
    let workflow = StdWorkflow::builder()
        .algorithm(ga(4))
        .problem(Rastrigin::new())
        .build();

    let a = workflow.init(Key::new(1)).unwrap();
    let b = workflow.init(Key::new(2)).unwrap();

    let (sampled_a, _) = workflow.sample(&a).unwrap();
    let (sampled_b, _) = workflow.sample(&b).unwrap();
    assert_ne!(sampled_a, sampled_b);
}

#[tokio::test]
async fn test_best_fitness_never_gets_worse() {
    let monitor = EvalMonitor::builder().full_fit_history(true).build().unwrap();
    let workflow = StdWorkflow::builder()
        .algorithm(
            Pso::builder(GeneBounds::uniform(-32.0, 32.0, 5).unwrap(), 24)
                .build()
                .unwrap(),
        )
        .problem(Ackley::new())
        .monitor(monitor.clone())
        .build();

    let mut state = workflow.init(Key::new(3)).unwrap();
    let mut best = f64::INFINITY;
    for _ in 0..40 {
        state = workflow.step(&state).await.unwrap();
        let current = state.best_fitness().unwrap();
        assert!(current <= best);
        best = current;
    }
    workflow.flush().await.unwrap();

    let history = monitor.get_fitness_history();
    assert_eq!(history.len(), 40);
    let overall = history
        .iter()
        .flatten()
        .copied()
        .fold(f64::INFINITY, f64::min);
    assert_eq!(Some(overall), state.best_fitness());
    assert_eq!(monitor.get_best_fitness(), state.best_fitness());
}

#[tokio::test]
async fn test_open_es_run_improves_on_sphere() {
    let workflow = StdWorkflow::builder()
        .algorithm(
            OpenEs::builder(vec![3.0; 6], 40)
                .learning_rate(0.1)
                .noise_stdev(0.2)
                .build()
                .unwrap(),
        )
        .problem(Sphere::new())
        .goal(FitnessGoal::minimize())
        .build();

    let state = workflow.init(Key::new(5)).unwrap();
    let initial: f64 = state.algorithm().center().iter().map(|x| x * x).sum();

    let (state, _) = workflow
        .run(state, &Schedule::generations(60))
        .await
        .unwrap();
    let last: f64 = state.algorithm().center().iter().map(|x| x * x).sum();

    assert_eq!(state.generation(), 60);
    assert_eq!(state.evaluations(), 60 * 40);
    assert!(last < initial / 4.0);
}

#[tokio::test]
async fn test_ga_survives_mostly_nan_generations() {
    // Latin hypercube puts exactly three of twenty samples below -0.7
    let problem = FnProblem::new(|x: &[f64]| {
        Ok(if x[0] < -0.7 {
            x.iter().map(|v| v * v).sum()
        } else {
            f64::NAN
        })
    });
    let workflow = StdWorkflow::builder()
        .algorithm(
            GeneticAlgorithm::builder(
                GeneBounds::uniform(-1.0, 1.0, 2).unwrap(),
                Distribution::latin_hypercube(20),
            )
            .build()
            .unwrap(),
        )
        .problem(problem)
        .build();

    let mut state = workflow.init(Key::new(8)).unwrap();
    for _ in 0..10 {
        state = workflow.step(&state).await.unwrap();
    }

    assert_eq!(state.generation(), 10);
    assert!(state.best_fitness().is_some_and(f64::is_finite));
    assert!(state.best_solution().is_some_and(|x| x[0] < -0.7));
}
