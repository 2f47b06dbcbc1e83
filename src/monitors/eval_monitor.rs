use super::{Error, EvalContext, Monitor};
use crate::models::{FitnessGoal, Population};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, instrument, warn};

/// Per-generation statistics over the raw fitness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSummary {
    pub generation: u32,
    /// Best fitness of the generation, `None` if every value was NaN
    pub best: Option<f64>,
    /// Mean over the non-NaN fitness values
    pub mean: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}

struct Record {
    generation: u32,
    population: Population,
    fitness: Vec<f64>,
    goal: FitnessGoal,
    recorded_at: DateTime<Utc>,
}

enum Command {
    Record(Record),
    Flush(oneshot::Sender<()>),
    Shutdown,
}

#[derive(Debug, Default)]
struct Snapshot {
    best_fitness: Option<f64>,
    best_solution: Option<Vec<f64>>,
    latest_fitness: Option<Vec<f64>>,
    history: Vec<GenerationSummary>,
    fitness_history: Vec<Vec<f64>>,
    /// Best first
    topk: Vec<(f64, Vec<f64>)>,
}

impl Snapshot {
    fn apply(&mut self, record: Record, topk: usize, full_fit_history: bool) {
        let goal = record.goal;

        if let Some(index) = goal.best_index(&record.fitness) {
            let fitness = record.fitness[index];
            let improves = self
                .best_fitness
                .is_none_or(|incumbent| goal.is_better(fitness, incumbent));

            if improves {
                self.best_fitness = Some(fitness);
                self.best_solution = record.population.row(index).map(<[f64]>::to_vec);
            }
        }

        self.update_topk(&record, topk);

        let finite: Vec<f64> = record
            .fitness
            .iter()
            .copied()
            .filter(|f| !f.is_nan())
            .collect();
        let mean = (!finite.is_empty()).then(|| finite.iter().sum::<f64>() / finite.len() as f64);

        self.history.push(GenerationSummary {
            generation: record.generation,
            best: goal.best_index(&record.fitness).map(|i| record.fitness[i]),
            mean,
            recorded_at: record.recorded_at,
        });

        if full_fit_history {
            self.fitness_history.push(record.fitness.clone());
        }
        self.latest_fitness = Some(record.fitness);
    }

    fn update_topk(&mut self, record: &Record, k: usize) {
        let goal = record.goal;

        for (fitness, row) in record.fitness.iter().zip(record.population.iter()) {
            if fitness.is_nan() {
                continue;
            }
            let position = self
                .topk
                .iter()
                .position(|(incumbent, _)| goal.is_better(*fitness, *incumbent))
                .unwrap_or(self.topk.len());

            if position < k {
                self.topk.insert(position, (*fitness, row.to_vec()));
                self.topk.truncate(k);
            }
        }
    }
}

/// Records the fitness of every evaluated generation on a background task.
///
/// Solutions are recorded as the algorithm proposed them, before any solution
/// transform, so they agree with the workflow state's best solution.
///
/// `post_eval` only enqueues, so getters may lag behind the workflow. Await
/// [`Monitor::flush`] before reading them for up-to-date values. Clones share
/// the same recording.
///
/// ```rust
/// use fx_evolve::monitors::{EvalMonitor, Monitor};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let monitor = EvalMonitor::builder().topk(3).full_fit_history(true).build()?;
/// // ... step a workflow holding a clone of the monitor ...
/// monitor.flush().await?;
/// assert_eq!(monitor.get_best_fitness(), None);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct EvalMonitor {
    sender: mpsc::UnboundedSender<Command>,
    snapshot: Arc<RwLock<Snapshot>>,
}

pub struct EvalMonitorBuilder {
    topk: usize,
    full_fit_history: bool,
}

impl EvalMonitorBuilder {
    /// Number of best solutions to keep, default 1.
    pub fn topk(mut self, topk: usize) -> Self {
        self.topk = topk;
        self
    }

    /// Keep the fitness of every generation, not only the latest.
    pub fn full_fit_history(mut self, full_fit_history: bool) -> Self {
        self.full_fit_history = full_fit_history;
        self
    }

    /// Spawns the recording task. Must be called inside a tokio runtime.
    pub fn build(self) -> Result<EvalMonitor, Error> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| Error::NoRuntime)?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let snapshot = Arc::new(RwLock::new(Snapshot::default()));

        runtime.spawn(record(
            receiver,
            snapshot.clone(),
            self.topk,
            self.full_fit_history,
        ));

        Ok(EvalMonitor { sender, snapshot })
    }
}

async fn record(
    mut receiver: mpsc::UnboundedReceiver<Command>,
    snapshot: Arc<RwLock<Snapshot>>,
    topk: usize,
    full_fit_history: bool,
) {
    while let Some(command) = receiver.recv().await {
        match command {
            Command::Record(record) => {
                snapshot
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .apply(record, topk, full_fit_history);
            }
            Command::Flush(ack) => {
                let _ = ack.send(());
            }
            Command::Shutdown => break,
        }
    }

    debug!("eval monitor stopped");
}

impl EvalMonitor {
    pub fn builder() -> EvalMonitorBuilder {
        EvalMonitorBuilder {
            topk: 1,
            full_fit_history: false,
        }
    }

    pub fn new() -> Result<Self, Error> {
        Self::builder().build()
    }

    fn read<T>(&self, f: impl FnOnce(&Snapshot) -> T) -> T {
        f(&self.snapshot.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn get_best_fitness(&self) -> Option<f64> {
        self.read(|s| s.best_fitness)
    }

    pub fn get_best_solution(&self) -> Option<Vec<f64>> {
        self.read(|s| s.best_solution.clone())
    }

    pub fn get_latest_fitness(&self) -> Option<Vec<f64>> {
        self.read(|s| s.latest_fitness.clone())
    }

    pub fn get_history(&self) -> Vec<GenerationSummary> {
        self.read(|s| s.history.clone())
    }

    /// Fitness of every generation, empty unless `full_fit_history` is set.
    pub fn get_fitness_history(&self) -> Vec<Vec<f64>> {
        self.read(|s| s.fitness_history.clone())
    }

    /// Best solutions seen so far with their fitness, best first.
    pub fn get_topk(&self) -> Vec<(f64, Vec<f64>)> {
        self.read(|s| s.topk.clone())
    }

    /// Stops recording. Records posted before the call are still applied.
    pub fn shutdown(&self) {
        let _ = self.sender.send(Command::Shutdown);
    }
}

impl Monitor for EvalMonitor {
    #[instrument(level = "debug", skip(self, context), fields(generation = context.generation))]
    fn post_eval(&self, context: &EvalContext<'_>) {
        let record = Record {
            generation: context.generation,
            population: context.candidates.clone(),
            fitness: context.fitness.to_vec(),
            goal: context.goal,
            recorded_at: Utc::now(),
        };

        if self.sender.send(Command::Record(record)).is_err() {
            warn!(generation = context.generation, "eval monitor is closed, record dropped");
        }
    }

    fn flush(&self) -> BoxFuture<'_, Result<(), Error>> {
        Box::pin(async move {
            let (ack, done) = oneshot::channel();
            self.sender
                .send(Command::Flush(ack))
                .map_err(|_| Error::Closed)?;
            done.await.map_err(|_| Error::Closed)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(monitor: &EvalMonitor, generation: u32, rows: Vec<Vec<f64>>, fitness: &[f64], goal: FitnessGoal) {
        let population = Population::from_rows(rows).unwrap();
        monitor.post_eval(&EvalContext {
            generation,
            candidates: &population,
            population: &population,
            fitness,
            goal,
        });
    }

    #[tokio::test]
    async fn it_tracks_the_best_across_generations() {
        let monitor = EvalMonitor::new().unwrap();
        let goal = FitnessGoal::minimize();

        post(&monitor, 0, vec![vec![1.0], vec![2.0]], &[4.0, 3.0], goal);
        post(&monitor, 1, vec![vec![5.0], vec![6.0]], &[7.0, 1.0], goal);
        post(&monitor, 2, vec![vec![8.0], vec![9.0]], &[f64::NAN, 2.0], goal);
        monitor.flush().await.unwrap();

        assert_eq!(monitor.get_best_fitness(), Some(1.0));
        assert_eq!(monitor.get_best_solution(), Some(vec![6.0]));
        assert_eq!(monitor.get_history().len(), 3);
        assert_eq!(monitor.get_history()[2].best, Some(2.0));
        assert_eq!(monitor.get_history()[2].mean, Some(2.0));
        assert!(monitor.get_latest_fitness().unwrap()[0].is_nan());
        assert!(monitor.get_fitness_history().is_empty());
    }

    #[tokio::test]
    async fn it_respects_maximization() {
        let monitor = EvalMonitor::builder().topk(2).build().unwrap();
        let goal = FitnessGoal::maximize();

        post(&monitor, 0, vec![vec![1.0], vec![2.0], vec![3.0]], &[10.0, 30.0, 20.0], goal);
        monitor.flush().await.unwrap();

        assert_eq!(monitor.get_best_fitness(), Some(30.0));
        assert_eq!(
            monitor.get_topk(),
            vec![(30.0, vec![2.0]), (20.0, vec![3.0])]
        );
    }

    #[tokio::test]
    async fn it_keeps_full_history_when_asked() {
        let monitor = EvalMonitor::builder().full_fit_history(true).build().unwrap();

        post(&monitor, 0, vec![vec![0.0]], &[1.0], FitnessGoal::minimize());
        post(&monitor, 1, vec![vec![0.0]], &[0.5], FitnessGoal::minimize());
        monitor.flush().await.unwrap();

        assert_eq!(monitor.get_fitness_history(), vec![vec![1.0], vec![0.5]]);
    }

    #[tokio::test]
    async fn flush_fails_after_shutdown() {
        let monitor = EvalMonitor::new().unwrap();
        post(&monitor, 0, vec![vec![0.0]], &[1.0], FitnessGoal::minimize());

        monitor.shutdown();

        assert_eq!(monitor.flush().await, Err(Error::Closed));
        assert_eq!(monitor.get_best_fitness(), Some(1.0));
    }

    #[test]
    fn it_requires_a_runtime() {
        assert_eq!(EvalMonitor::new().err(), Some(Error::NoRuntime));
    }
}
