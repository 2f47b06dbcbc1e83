use super::environment::{Action, Environment, Transition};
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::f64::consts::PI;

const MAX_SPEED: f64 = 8.0;
const MAX_TORQUE: f64 = 2.0;
const DT: f64 = 0.05;
const GRAVITY: f64 = 10.0;
const MASS: f64 = 1.0;
const LENGTH: f64 = 1.0;
const MAX_EPISODE_STEPS: usize = 200;

fn angle_normalize(x: f64) -> f64 {
    (x + PI).rem_euclid(2.0 * PI) - PI
}

/// Inverted pendulum swing-up, `Pendulum-v1`.
///
/// Observation: `[cos(theta), sin(theta), theta_dot]`. The action is a single
/// torque, clipped to `[-2, 2]`. Episodes never terminate and are truncated
/// after 200 steps.
#[derive(Debug, Clone, Default)]
pub struct Pendulum {
    state: Option<(f64, f64)>,
    steps: usize,
}

impl Pendulum {
    pub fn new() -> Self {
        Self::default()
    }

    fn observation(theta: f64, theta_dot: f64) -> Vec<f64> {
        vec![theta.cos(), theta.sin(), theta_dot]
    }
}

impl Environment for Pendulum {
    fn observation_size(&self) -> usize {
        3
    }

    fn reset(&mut self, seed: u64) -> anyhow::Result<Vec<f64>> {
        let mut rng = StdRng::seed_from_u64(seed);
        let theta = rng.random_range(-PI..PI);
        let theta_dot = rng.random_range(-1.0..1.0);

        self.state = Some((theta, theta_dot));
        self.steps = 0;

        Ok(Self::observation(theta, theta_dot))
    }

    fn step(&mut self, action: &Action) -> anyhow::Result<Transition> {
        let Some((theta, theta_dot)) = self.state else {
            anyhow::bail!("Pendulum: step called before reset or after the episode ended");
        };

        let torque = match action {
            Action::Continuous(values) if values.len() == 1 => {
                values[0].clamp(-MAX_TORQUE, MAX_TORQUE)
            }
            other => anyhow::bail!("Pendulum: expected a single continuous torque, got {other:?}"),
        };
        if !torque.is_finite() {
            anyhow::bail!("Pendulum: torque must be finite");
        }

        let cost = angle_normalize(theta).powi(2)
            + 0.1 * theta_dot * theta_dot
            + 0.001 * torque * torque;

        let next_theta_dot = (theta_dot
            + (3.0 * GRAVITY / (2.0 * LENGTH) * theta.sin()
                + 3.0 / (MASS * LENGTH * LENGTH) * torque)
                * DT)
            .clamp(-MAX_SPEED, MAX_SPEED);
        let next_theta = theta + next_theta_dot * DT;

        self.steps += 1;
        let truncated = self.steps >= MAX_EPISODE_STEPS;
        self.state = (!truncated).then_some((next_theta, next_theta_dot));

        Ok(Transition {
            observation: Self::observation(next_theta, next_theta_dot),
            reward: -cost,
            terminated: false,
            truncated,
        })
    }
}
