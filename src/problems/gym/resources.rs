use super::Error;
use serde::{Deserialize, Serialize};

/// CPU and GPU share requested for the controller or for each worker.
///
/// Shares are validated and reported through [`PoolInfo`]. Scheduling is left to
/// the OS: every worker runs on its own thread regardless of its CPU share.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceShare {
    pub num_cpus: f64,
    pub num_gpus: f64,
}

impl Default for ResourceShare {
    fn default() -> Self {
        Self {
            num_cpus: 1.0,
            num_gpus: 0.0,
        }
    }
}

impl ResourceShare {
    pub fn new(num_cpus: f64, num_gpus: f64) -> Result<Self, Error> {
        let share = Self { num_cpus, num_gpus };
        share.validate()?;
        Ok(share)
    }

    pub fn cpus(num_cpus: f64) -> Result<Self, Error> {
        Self::new(num_cpus, 0.0)
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        for (field, value) in [("num_cpus", self.num_cpus), ("num_gpus", self.num_gpus)] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidResourceShare { field, value });
            }
        }

        if self.num_gpus > 1.0 && self.num_gpus.fract() != 0.0 {
            return Err(Error::FractionalGpuShare(self.num_gpus));
        }

        Ok(())
    }
}

/// Shape of a running worker pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolInfo {
    pub num_workers: usize,
    pub env_per_worker: usize,
    pub batch_policy: bool,
    pub controller: ResourceShare,
    pub worker: ResourceShare,
}

impl PoolInfo {
    /// Resources requested by the controller and all workers together.
    pub fn total(&self) -> ResourceShare {
        ResourceShare {
            num_cpus: self.controller.num_cpus + self.worker.num_cpus * self.num_workers as f64,
            num_gpus: self.controller.num_gpus + self.worker.num_gpus * self.num_workers as f64,
        }
    }
}
