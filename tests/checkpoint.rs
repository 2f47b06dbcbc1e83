use fx_evolve::StdWorkflow;
use fx_evolve::algorithms::{Pso, PsoState};
use fx_evolve::models::{GeneBounds, Key};
use fx_evolve::problems::Sphere;
use fx_evolve::workflows::{Error, State, checkpoint};
use std::fs;

fn workflow() -> StdWorkflow<Pso, Sphere> {
    StdWorkflow::builder()
        .algorithm(
            Pso::builder(GeneBounds::uniform(-5.0, 5.0, 3).unwrap(), 12)
                .build()
                .unwrap(),
        )
        .problem(Sphere::new())
        .build()
}

#[tokio::test]
async fn test_resume_from_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.json");
    let workflow = workflow();

    let mut state = workflow.init(Key::new(9)).unwrap();
    for _ in 0..5 {
        state = workflow.step(&state).await.unwrap();
    }

    checkpoint::save(&state, &path).unwrap();
    let loaded: State<PsoState, ()> = checkpoint::load(&path).unwrap();
    assert_eq!(loaded, state);

    let continued = workflow.step(&state).await.unwrap();
    let resumed = workflow.step(&loaded).await.unwrap();
    assert_eq!(continued.best_fitness(), resumed.best_fitness());
    assert_eq!(continued.algorithm(), resumed.algorithm());
}

#[tokio::test]
async fn test_checkpoint_keeps_infinite_bests() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fresh.json");

    // Nothing has been evaluated yet, every best is still infinite
    let state = workflow().init(Key::new(1)).unwrap();
    checkpoint::save(&state, &path).unwrap();

    let loaded: State<PsoState, ()> = checkpoint::load(&path).unwrap();
    assert_eq!(loaded.algorithm().global_best().1, f64::INFINITY);
    assert_eq!(loaded, state);
}

#[test]
fn test_load_missing_file() {
    let dir = tempfile::tempdir().unwrap();

    let result = checkpoint::load::<PsoState, ()>(dir.path().join("missing.json"));

    assert!(matches!(result, Err(Error::CheckpointIoError(_))));
}

#[test]
fn test_sibling_checkpoints_do_not_collide() {
    let dir = tempfile::tempdir().unwrap();
    let json = dir.path().join("run.json");
    let bak = dir.path().join("run.bak");
    let workflow = workflow();
    let first = workflow.init(Key::new(1)).unwrap();
    let second = workflow.init(Key::new(2)).unwrap();

    std::thread::scope(|scope| {
        scope.spawn(|| {
            for _ in 0..50 {
                checkpoint::save(&first, &json).unwrap();
            }
        });
        scope.spawn(|| {
            for _ in 0..50 {
                checkpoint::save(&second, &bak).unwrap();
            }
        });
    });

    assert_eq!(checkpoint::load::<PsoState, ()>(&json).unwrap(), first);
    assert_eq!(checkpoint::load::<PsoState, ()>(&bak).unwrap(), second);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
}

#[test]
fn test_checkpoint_with_tmp_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.tmp");
    let state = workflow().init(Key::new(4)).unwrap();

    checkpoint::save(&state, &path).unwrap();
    checkpoint::save(&state, &path).unwrap();

    assert_eq!(checkpoint::load::<PsoState, ()>(&path).unwrap(), state);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}
