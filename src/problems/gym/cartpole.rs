use super::environment::{Action, Environment, Transition};
use rand::{Rng, SeedableRng, rngs::StdRng};

const GRAVITY: f64 = 9.8;
const MASS_CART: f64 = 1.0;
const MASS_POLE: f64 = 0.1;
const TOTAL_MASS: f64 = MASS_CART + MASS_POLE;
// Half the pole's length
const LENGTH: f64 = 0.5;
const POLE_MASS_LENGTH: f64 = MASS_POLE * LENGTH;
const FORCE_MAG: f64 = 10.0;
const TAU: f64 = 0.02;
const THETA_THRESHOLD: f64 = 12.0 * 2.0 * std::f64::consts::PI / 360.0;
const X_THRESHOLD: f64 = 2.4;
const MAX_EPISODE_STEPS: usize = 500;

/// Classic cart-pole balancing task, `CartPole-v1`.
///
/// Observation: `[x, x_dot, theta, theta_dot]`. Actions: `0` pushes left, `1`
/// pushes right. Reward is `1` for every step, including the terminating one.
#[derive(Debug, Clone, Default)]
pub struct CartPole {
    state: Option<[f64; 4]>,
    steps: usize,
}

impl CartPole {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Environment for CartPole {
    fn observation_size(&self) -> usize {
        4
    }

    fn reset(&mut self, seed: u64) -> anyhow::Result<Vec<f64>> {
        let mut rng = StdRng::seed_from_u64(seed);
        let state = [(); 4].map(|_| rng.random_range(-0.05..0.05));

        self.state = Some(state);
        self.steps = 0;

        Ok(state.to_vec())
    }

    fn step(&mut self, action: &Action) -> anyhow::Result<Transition> {
        let Some([x, x_dot, theta, theta_dot]) = self.state else {
            anyhow::bail!("CartPole: step called before reset or after the episode ended");
        };

        let force = match action {
            Action::Discrete(0) => -FORCE_MAG,
            Action::Discrete(1) => FORCE_MAG,
            other => anyhow::bail!("CartPole: expected Discrete(0) or Discrete(1), got {other:?}"),
        };

        let cos_theta = theta.cos();
        let sin_theta = theta.sin();

        let temp = (force + POLE_MASS_LENGTH * theta_dot * theta_dot * sin_theta) / TOTAL_MASS;
        let theta_acc = (GRAVITY * sin_theta - cos_theta * temp)
            / (LENGTH * (4.0 / 3.0 - MASS_POLE * cos_theta * cos_theta / TOTAL_MASS));
        let x_acc = temp - POLE_MASS_LENGTH * theta_acc * cos_theta / TOTAL_MASS;

        // Explicit Euler
        let next = [
            x + TAU * x_dot,
            x_dot + TAU * x_acc,
            theta + TAU * theta_dot,
            theta_dot + TAU * theta_acc,
        ];
        self.steps += 1;

        let terminated = next[0].abs() > X_THRESHOLD || next[2].abs() > THETA_THRESHOLD;
        let truncated = !terminated && self.steps >= MAX_EPISODE_STEPS;

        self.state = if terminated || truncated {
            None
        } else {
            Some(next)
        };

        Ok(Transition {
            observation: next.to_vec(),
            reward: 1.0,
            terminated,
            truncated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_resets_deterministically() {
        let mut a = CartPole::new();
        let mut b = CartPole::new();

        let obs = a.reset(7).unwrap();
        assert_eq!(obs, b.reset(7).unwrap());
        assert_ne!(obs, b.reset(8).unwrap());
        assert!(obs.iter().all(|v| v.abs() <= 0.05));
    }

    #[test]
    fn it_terminates_when_pushed_one_way() {
        let mut env = CartPole::new();
        env.reset(0).unwrap();

        let mut steps = 0;
        loop {
            let transition = env.step(&Action::Discrete(1)).unwrap();
            steps += 1;
            if transition.is_done() {
                assert!(transition.terminated);
                break;
            }
        }

        assert!(steps < 100);
        assert!(env.step(&Action::Discrete(1)).is_err());
    }

    #[test]
    fn it_rejects_invalid_actions() {
        let mut env = CartPole::new();
        env.reset(0).unwrap();

        assert!(env.step(&Action::Discrete(2)).is_err());
        assert!(env.step(&Action::Continuous(vec![0.5])).is_err());
    }

    #[test]
    fn it_truncates_at_the_step_limit() {
        let mut env = CartPole::new();
        env.reset(3).unwrap();
        env.steps = MAX_EPISODE_STEPS - 1;

        let transition = env.step(&Action::Discrete(0)).unwrap();

        assert!(transition.truncated);
        assert!(!transition.terminated);
        assert_eq!(transition.reward, 1.0);
    }
}
