use super::Error;
use super::environment::Action;
use super::worker::{RolloutJob, WorkerHandle, WorkerSpec};
use futures::future::join_all;
use std::ops::Range;
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

/// Splits `len` items into `parts` contiguous ranges whose sizes differ by at most one.
pub(crate) fn contiguous_ranges(len: usize, parts: usize) -> Vec<Range<usize>> {
    let parts = parts.max(1);
    let base = len / parts;
    let extra = len % parts;

    let mut start = 0;
    (0..parts)
        .map(|i| {
            let size = base + usize::from(i < extra);
            let range = start..start + size;
            start += size;
            range
        })
        .collect()
}

/// One episode evaluated in batch mode.
#[derive(Debug, Clone, Copy)]
struct Episode {
    individual: usize,
    seed: u64,
}

/// Environment slot driven by the controller in batch mode.
struct LockstepSlot {
    individual: usize,
    observation: Vec<f64>,
    reward: f64,
    steps: usize,
    done: bool,
}

enum RoundError {
    /// A worker failed and can be replaced
    Worker { worker: usize, reason: String },
    Fatal(Error),
}

/// Controller of the worker threads.
///
/// The controller owns the worker handles, splits populations into one
/// contiguous chunk per worker and replaces workers that fail. Evaluations are
/// serialized through the lock on the handles.
pub(crate) struct WorkerPool {
    workers: Mutex<Vec<WorkerHandle>>,
    spec: WorkerSpec,
    max_retries: u32,
}

impl WorkerPool {
    #[instrument(level = "debug", skip(spec), fields(env_per_worker = spec.env_per_worker))]
    pub(crate) fn start(num_workers: usize, spec: WorkerSpec, max_retries: u32) -> Result<Self, Error> {
        let workers = (0..num_workers)
            .map(|id| WorkerHandle::spawn(id, &spec))
            .collect::<Result<Vec<_>, _>>()?;

        info!(num_workers, env_per_worker = spec.env_per_worker, "worker pool started");

        Ok(Self {
            workers: Mutex::new(workers),
            spec,
            max_retries,
        })
    }

    /// Registers a failure of `worker` and replaces it, or gives up once retries are exhausted.
    fn recover(
        &self,
        workers: &mut [WorkerHandle],
        attempts: &mut [u32],
        worker: usize,
        reason: String,
    ) -> Result<(), Error> {
        attempts[worker] += 1;

        if attempts[worker] > self.max_retries {
            error!(worker, attempts = attempts[worker], %reason, "worker failed after all retries");
            return Err(Error::WorkerFailed {
                worker,
                attempts: attempts[worker],
                reason,
            });
        }

        warn!(worker, attempt = attempts[worker], %reason, "restarting failed worker");
        workers[worker] = WorkerHandle::spawn(worker, &self.spec)?;
        Ok(())
    }

    /// Each worker runs its chunk of `jobs` with its own policy.
    #[instrument(level = "debug", skip(self, jobs), fields(num_jobs = jobs.len()))]
    pub(crate) async fn evaluate_local(&self, jobs: Vec<RolloutJob>) -> Result<Vec<f64>, Error> {
        let mut workers = self.workers.lock().await;
        let ranges = contiguous_ranges(jobs.len(), workers.len());
        let mut attempts = vec![0; workers.len()];
        let mut results: Vec<Option<Vec<f64>>> = ranges
            .iter()
            .map(|range| range.is_empty().then(Vec::new))
            .collect();

        loop {
            let pending: Vec<usize> = (0..results.len()).filter(|&w| results[w].is_none()).collect();
            if pending.is_empty() {
                break;
            }

            let replies = join_all(
                pending
                    .iter()
                    .map(|&w| workers[w].rollout(jobs[ranges[w].clone()].to_vec())),
            )
            .await;

            for (w, reply) in pending.into_iter().zip(replies) {
                match reply {
                    Ok(rewards) if rewards.len() == ranges[w].len() => results[w] = Some(rewards),
                    Ok(rewards) => {
                        let reason = format!(
                            "returned {} rewards for {} jobs",
                            rewards.len(),
                            ranges[w].len()
                        );
                        self.recover(&mut workers, &mut attempts, w, reason)?;
                    }
                    Err(err) => self.recover(&mut workers, &mut attempts, w, format!("{err:#}"))?,
                }
            }
        }

        Ok(results.into_iter().flatten().flatten().collect())
    }

    /// The controller drives every environment in lockstep and calls the policy
    /// once per tick for all live episodes.
    #[instrument(level = "debug", skip(self, params, seeds), fields(num_individuals = params.len()))]
    pub(crate) async fn evaluate_batched(
        &self,
        params: &[Vec<f64>],
        seeds: &[Vec<u64>],
    ) -> Result<Vec<f64>, Error> {
        let mut workers = self.workers.lock().await;
        let ranges = contiguous_ranges(params.len(), workers.len());
        let mut attempts = vec![0; workers.len()];

        let episodes: Vec<Vec<Episode>> = ranges
            .iter()
            .map(|range| {
                range
                    .clone()
                    .flat_map(|individual| {
                        seeds[individual]
                            .iter()
                            .map(move |&seed| Episode { individual, seed })
                    })
                    .collect()
            })
            .collect();

        let env_per_worker = self.spec.env_per_worker.max(1);
        let num_rounds = episodes
            .iter()
            .map(|e| e.len().div_ceil(env_per_worker))
            .max()
            .unwrap_or(0);

        let mut totals = vec![0.0; params.len()];

        for round in 0..num_rounds {
            let batches: Vec<&[Episode]> = episodes
                .iter()
                .map(|e| {
                    let start = (round * env_per_worker).min(e.len());
                    let end = (start + env_per_worker).min(e.len());
                    &e[start..end]
                })
                .collect();

            // Episodes are seeded, a failed round is replayed from its resets
            let rewards = loop {
                let outcome = self.play_round(&workers, &batches, params).await;
                match outcome {
                    Ok(rewards) => break rewards,
                    Err(RoundError::Worker { worker, reason }) => {
                        self.recover(&mut workers, &mut attempts, worker, reason)?
                    }
                    Err(RoundError::Fatal(err)) => return Err(err),
                }
            };

            for (individual, reward) in rewards {
                totals[individual] += reward;
            }
        }

        Ok(totals
            .into_iter()
            .zip(seeds)
            .map(|(total, seeds)| total / seeds.len().max(1) as f64)
            .collect())
    }

    async fn play_round(
        &self,
        workers: &[WorkerHandle],
        batches: &[&[Episode]],
        params: &[Vec<f64>],
    ) -> Result<Vec<(usize, f64)>, RoundError> {
        let active: Vec<usize> = (0..batches.len()).filter(|&w| !batches[w].is_empty()).collect();

        let resets = join_all(active.iter().map(|&w| {
            workers[w].reset(batches[w].iter().map(|episode| episode.seed).collect())
        }))
        .await;

        let mut slots: Vec<Vec<LockstepSlot>> = (0..batches.len()).map(|_| Vec::new()).collect();
        for (&w, reset) in active.iter().zip(resets) {
            let observations = reset.map_err(|err| RoundError::Worker {
                worker: w,
                reason: format!("{err:#}"),
            })?;
            slots[w] = observations
                .into_iter()
                .zip(batches[w])
                .map(|(observation, episode)| LockstepSlot {
                    individual: episode.individual,
                    observation,
                    reward: 0.0,
                    steps: 0,
                    done: false,
                })
                .collect();
        }

        loop {
            let live: Vec<(usize, usize)> = slots
                .iter()
                .enumerate()
                .flat_map(|(w, slots)| {
                    slots
                        .iter()
                        .enumerate()
                        .filter(|(_, slot)| !slot.done)
                        .map(move |(k, _)| (w, k))
                })
                .collect();
            if live.is_empty() {
                break;
            }

            let batch_params: Vec<&[f64]> = live
                .iter()
                .map(|&(w, k)| params[slots[w][k].individual].as_slice())
                .collect();
            let observations: Vec<&[f64]> = live
                .iter()
                .map(|&(w, k)| slots[w][k].observation.as_slice())
                .collect();

            let actions = self
                .spec
                .policy
                .act_batch(&batch_params, &observations)
                .map_err(|err| RoundError::Fatal(Error::PolicyError(err)))?;
            if actions.len() != live.len() {
                return Err(RoundError::Fatal(Error::PolicyError(anyhow::anyhow!(
                    "policy returned {} actions for {} observations",
                    actions.len(),
                    live.len()
                ))));
            }

            let mut per_worker: Vec<Vec<Option<Action>>> =
                slots.iter().map(|s| vec![None; s.len()]).collect();
            for (&(w, k), action) in live.iter().zip(actions) {
                per_worker[w][k] = Some(action);
            }

            let stepping: Vec<usize> = (0..per_worker.len())
                .filter(|&w| per_worker[w].iter().any(Option::is_some))
                .collect();
            let replies = join_all(
                stepping
                    .iter()
                    .map(|&w| workers[w].step(std::mem::take(&mut per_worker[w]))),
            )
            .await;

            for (&w, reply) in stepping.iter().zip(replies) {
                let transitions = reply.map_err(|err| RoundError::Worker {
                    worker: w,
                    reason: format!("{err:#}"),
                })?;

                for (slot, transition) in slots[w].iter_mut().zip(transitions) {
                    let Some(transition) = transition else {
                        continue;
                    };
                    slot.reward += transition.reward;
                    slot.steps += 1;
                    slot.done = transition.is_done()
                        || self.spec.cap_episode.is_some_and(|cap| slot.steps >= cap);
                    slot.observation = transition.observation;
                }
            }
        }

        Ok(slots
            .into_iter()
            .flatten()
            .map(|slot| (slot.individual, slot.reward))
            .collect())
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        info!(num_workers = self.workers.get_mut().len(), "worker pool stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_splits_into_contiguous_ranges() {
        assert_eq!(contiguous_ranges(10, 3), vec![0..4, 4..7, 7..10]);
        assert_eq!(contiguous_ranges(2, 4), vec![0..1, 1..2, 2..2, 2..2]);
        assert_eq!(contiguous_ranges(0, 2), vec![0..0, 0..0]);
        assert_eq!(contiguous_ranges(5, 0), vec![0..5]);
    }
}
