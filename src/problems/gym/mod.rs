//! Distributed neuroevolution on Gym-style environments.
//!
//! A [`GymProblem`] owns a pool of worker threads. Each worker owns
//! `env_per_worker` environments and evaluates a contiguous chunk of the
//! population. Workers that fail are replaced and their work is retried.

mod cartpole;
mod environment;
mod errors;
mod pendulum;
mod policy;
mod pool;
mod problem;
mod resources;
mod worker;

pub use cartpole::CartPole;
pub use environment::{Action, EnvFactory, Environment, Transition};
pub use errors::Error;
pub use pendulum::Pendulum;
pub use policy::{LinearOutput, LinearPolicy, Policy};
pub use problem::{GymProblem, GymProblemBuilder, GymState};
pub use resources::{PoolInfo, ResourceShare};

/// Creates a built-in environment by its Gym id.
pub fn make(name: &str) -> Result<Box<dyn Environment>, Error> {
    match name {
        "CartPole-v1" => Ok(Box::new(CartPole::new())),
        "Pendulum-v1" => Ok(Box::new(Pendulum::new())),
        other => Err(Error::UnknownEnvironment(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_makes_known_environments() {
        assert_eq!(make("CartPole-v1").unwrap().observation_size(), 4);
        assert_eq!(make("Pendulum-v1").unwrap().observation_size(), 3);
        assert!(matches!(
            make("MountainCar-v0"),
            Err(Error::UnknownEnvironment(name)) if name == "MountainCar-v0"
        ));
    }
}
