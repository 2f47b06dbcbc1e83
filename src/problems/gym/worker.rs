use super::environment::{Action, EnvFactory, Environment, Transition};
use super::policy::Policy;
use super::Error;
use anyhow::Context;
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, instrument};

/// Parameters of one individual and the reset seed of each of its episodes.
#[derive(Debug, Clone)]
pub(crate) struct RolloutJob {
    pub params: Vec<f64>,
    pub seeds: Vec<u64>,
}

pub(crate) enum WorkerMessage {
    /// Runs complete episodes with the worker's own policy and replies with the
    /// mean episodic reward of each job.
    Rollout {
        jobs: Vec<RolloutJob>,
        reply: oneshot::Sender<anyhow::Result<Vec<f64>>>,
    },
    /// Resets the first `seeds.len()` environments and replies with their observations.
    Reset {
        seeds: Vec<u64>,
        reply: oneshot::Sender<anyhow::Result<Vec<Vec<f64>>>>,
    },
    /// Steps every environment with `Some` action.
    Step {
        actions: Vec<Option<Action>>,
        reply: oneshot::Sender<anyhow::Result<Vec<Option<Transition>>>>,
    },
    Shutdown,
}

/// Everything needed to (re)spawn a worker.
#[derive(Clone)]
pub(crate) struct WorkerSpec {
    pub env_factory: EnvFactory,
    pub policy: Arc<dyn Policy>,
    pub env_per_worker: usize,
    pub cap_episode: Option<usize>,
}

/// Controller side of a worker thread.
pub(crate) struct WorkerHandle {
    id: usize,
    sender: mpsc::UnboundedSender<WorkerMessage>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    #[instrument(level = "debug", skip(spec), fields(env_per_worker = spec.env_per_worker))]
    pub(crate) fn spawn(id: usize, spec: &WorkerSpec) -> Result<Self, Error> {
        let envs = (0..spec.env_per_worker)
            .map(|_| (spec.env_factory)())
            .collect::<anyhow::Result<Vec<_>>>()?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = Worker {
            id,
            envs,
            policy: spec.policy.clone(),
            cap_episode: spec.cap_episode,
        };

        let thread = std::thread::Builder::new()
            .name(format!("gym-worker-{id}"))
            .spawn(move || worker.run(receiver))?;

        Ok(Self {
            id,
            sender,
            thread: Some(thread),
        })
    }

    async fn request<T>(
        &self,
        message: impl FnOnce(oneshot::Sender<anyhow::Result<T>>) -> WorkerMessage,
    ) -> anyhow::Result<T> {
        let (reply, response) = oneshot::channel();

        self.sender
            .send(message(reply))
            .map_err(|_| anyhow::anyhow!("worker {} is not receiving messages", self.id))?;

        response
            .await
            .with_context(|| format!("worker {} dropped its reply", self.id))?
    }

    pub(crate) async fn rollout(&self, jobs: Vec<RolloutJob>) -> anyhow::Result<Vec<f64>> {
        self.request(|reply| WorkerMessage::Rollout { jobs, reply })
            .await
    }

    pub(crate) async fn reset(&self, seeds: Vec<u64>) -> anyhow::Result<Vec<Vec<f64>>> {
        self.request(|reply| WorkerMessage::Reset { seeds, reply })
            .await
    }

    pub(crate) async fn step(
        &self,
        actions: Vec<Option<Action>>,
    ) -> anyhow::Result<Vec<Option<Transition>>> {
        self.request(|reply| WorkerMessage::Step { actions, reply })
            .await
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        // The thread exits on Shutdown or once the channel closes. It is not
        // joined, a failed worker may still be busy.
        let _ = self.sender.send(WorkerMessage::Shutdown);
        self.thread.take();
    }
}

struct Worker {
    id: usize,
    envs: Vec<Box<dyn Environment>>,
    policy: Arc<dyn Policy>,
    cap_episode: Option<usize>,
}

/// Progress of one environment during a local rollout.
struct Slot {
    job: usize,
    observation: Vec<f64>,
    steps: usize,
    done: bool,
}

impl Worker {
    fn run(mut self, mut receiver: mpsc::UnboundedReceiver<WorkerMessage>) {
        debug!(worker = self.id, envs = self.envs.len(), "worker started");

        while let Some(message) = receiver.blocking_recv() {
            match message {
                WorkerMessage::Rollout { jobs, reply } => {
                    let _ = reply.send(self.rollout(&jobs));
                }
                WorkerMessage::Reset { seeds, reply } => {
                    let _ = reply.send(self.reset(&seeds));
                }
                WorkerMessage::Step { actions, reply } => {
                    let _ = reply.send(self.step(actions));
                }
                WorkerMessage::Shutdown => break,
            }
        }

        debug!(worker = self.id, "worker stopped");
    }

    fn reset(&mut self, seeds: &[u64]) -> anyhow::Result<Vec<Vec<f64>>> {
        if seeds.len() > self.envs.len() {
            anyhow::bail!(
                "worker {} owns {} environments, asked to reset {}",
                self.id,
                self.envs.len(),
                seeds.len()
            );
        }

        self.envs
            .iter_mut()
            .zip(seeds)
            .map(|(env, &seed)| env.reset(seed))
            .collect()
    }

    fn step(&mut self, actions: Vec<Option<Action>>) -> anyhow::Result<Vec<Option<Transition>>> {
        if actions.len() > self.envs.len() {
            anyhow::bail!(
                "worker {} owns {} environments, got {} actions",
                self.id,
                self.envs.len(),
                actions.len()
            );
        }

        self.envs
            .iter_mut()
            .zip(actions)
            .map(|(env, action)| action.map(|action| env.step(&action)).transpose())
            .collect()
    }

    /// Runs every episode of `jobs` in rounds of at most one episode per environment.
    fn rollout(&mut self, jobs: &[RolloutJob]) -> anyhow::Result<Vec<f64>> {
        let episodes: Vec<(usize, u64)> = jobs
            .iter()
            .enumerate()
            .flat_map(|(job, rollout)| rollout.seeds.iter().map(move |&seed| (job, seed)))
            .collect();

        let mut totals = vec![0.0; jobs.len()];

        for round in episodes.chunks(self.envs.len().max(1)) {
            let seeds: Vec<u64> = round.iter().map(|(_, seed)| *seed).collect();
            let mut slots: Vec<Slot> = self
                .reset(&seeds)?
                .into_iter()
                .zip(round)
                .map(|(observation, &(job, _))| Slot {
                    job,
                    observation,
                    steps: 0,
                    done: false,
                })
                .collect();

            while slots.iter().any(|slot| !slot.done) {
                let live: Vec<usize> = (0..slots.len()).filter(|&i| !slots[i].done).collect();
                let params: Vec<&[f64]> = live
                    .iter()
                    .map(|&i| jobs[slots[i].job].params.as_slice())
                    .collect();
                let observations: Vec<&[f64]> = live
                    .iter()
                    .map(|&i| slots[i].observation.as_slice())
                    .collect();

                let actions = self.policy.act_batch(&params, &observations)?;
                if actions.len() != live.len() {
                    anyhow::bail!(
                        "policy returned {} actions for {} observations",
                        actions.len(),
                        live.len()
                    );
                }

                for (i, action) in live.into_iter().zip(actions) {
                    let transition = self.envs[i].step(&action)?;
                    let slot = &mut slots[i];

                    totals[slot.job] += transition.reward;
                    slot.steps += 1;
                    slot.done = transition.is_done()
                        || self.cap_episode.is_some_and(|cap| slot.steps >= cap);
                    slot.observation = transition.observation;
                }
            }
        }

        Ok(totals
            .into_iter()
            .zip(jobs)
            .map(|(total, job)| total / job.seeds.len().max(1) as f64)
            .collect())
    }
}
