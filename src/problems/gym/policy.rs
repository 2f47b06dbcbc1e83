use super::environment::Action;
use serde::{Deserialize, Serialize};

/// Maps policy parameters (one row of the population) and an observation to an action.
///
/// With `batch_policy` enabled the controller calls [`Policy::act_batch`] once per
/// tick with every live episode across all workers. Override it when the policy
/// can evaluate many inputs at once.
pub trait Policy: Send + Sync {
    fn act(&self, params: &[f64], observation: &[f64]) -> anyhow::Result<Action>;

    fn act_batch(&self, params: &[&[f64]], observations: &[&[f64]]) -> anyhow::Result<Vec<Action>> {
        params
            .iter()
            .zip(observations)
            .map(|(params, observation)| self.act(params, observation))
            .collect()
    }
}

impl<F> Policy for F
where
    F: Fn(&[f64], &[f64]) -> anyhow::Result<Action> + Send + Sync,
{
    fn act(&self, params: &[f64], observation: &[f64]) -> anyhow::Result<Action> {
        self(params, observation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LinearOutput {
    /// Argmax over `num_actions` outputs.
    Discrete { num_actions: usize },
    /// `scale * tanh(output)` for each of `action_size` outputs.
    Continuous { action_size: usize, scale: f64 },
}

/// Single-layer policy `y = W x + b`.
///
/// Parameters are laid out row-major: for each output, `observation_size`
/// weights followed by a bias.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearPolicy {
    observation_size: usize,
    output: LinearOutput,
}

impl LinearPolicy {
    pub fn discrete(observation_size: usize, num_actions: usize) -> Self {
        Self {
            observation_size,
            output: LinearOutput::Discrete { num_actions },
        }
    }

    pub fn continuous(observation_size: usize, action_size: usize, scale: f64) -> Self {
        Self {
            observation_size,
            output: LinearOutput::Continuous { action_size, scale },
        }
    }

    fn num_outputs(&self) -> usize {
        match self.output {
            LinearOutput::Discrete { num_actions } => num_actions,
            LinearOutput::Continuous { action_size, .. } => action_size,
        }
    }

    /// Length of the parameter vector, ie. the genome dimension.
    pub fn num_params(&self) -> usize {
        (self.observation_size + 1) * self.num_outputs()
    }
}

impl Policy for LinearPolicy {
    fn act(&self, params: &[f64], observation: &[f64]) -> anyhow::Result<Action> {
        if params.len() != self.num_params() {
            anyhow::bail!(
                "LinearPolicy: expected {} parameters, got {}",
                self.num_params(),
                params.len()
            );
        }
        if observation.len() != self.observation_size {
            anyhow::bail!(
                "LinearPolicy: expected an observation of size {}, got {}",
                self.observation_size,
                observation.len()
            );
        }

        let outputs: Vec<f64> = params
            .chunks_exact(self.observation_size + 1)
            .map(|row| {
                let (weights, bias) = row.split_at(self.observation_size);
                weights
                    .iter()
                    .zip(observation)
                    .map(|(w, x)| w * x)
                    .sum::<f64>()
                    + bias[0]
            })
            .collect();

        Ok(match self.output {
            LinearOutput::Discrete { .. } => {
                // First maximum wins ties
                let best = outputs
                    .iter()
                    .enumerate()
                    .fold((0, f64::NEG_INFINITY), |best, (i, &y)| {
                        if y > best.1 { (i, y) } else { best }
                    });
                Action::Discrete(best.0)
            }
            LinearOutput::Continuous { scale, .. } => {
                Action::Continuous(outputs.into_iter().map(|y| scale * y.tanh()).collect())
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_counts_parameters() {
        assert_eq!(LinearPolicy::discrete(4, 2).num_params(), 10);
        assert_eq!(LinearPolicy::continuous(3, 1, 2.0).num_params(), 4);
    }

    #[test]
    fn it_picks_the_largest_output() {
        let policy = LinearPolicy::discrete(2, 2);
        // Output 0 = x0, output 1 = x1
        let params = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0];

        assert_eq!(policy.act(&params, &[0.3, 0.1]).unwrap(), Action::Discrete(0));
        assert_eq!(policy.act(&params, &[0.1, 0.3]).unwrap(), Action::Discrete(1));
    }

    #[test]
    fn it_squashes_continuous_outputs() {
        let policy = LinearPolicy::continuous(1, 1, 2.0);

        let Action::Continuous(torque) = policy.act(&[100.0, 0.0], &[1.0]).unwrap() else {
            panic!("expected a continuous action");
        };

        assert!((torque[0] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn it_rejects_wrong_parameter_count() {
        let policy = LinearPolicy::discrete(4, 2);
        assert!(policy.act(&[0.0; 3], &[0.0; 4]).is_err());
    }

    #[test]
    fn closures_are_policies() {
        let policy = |params: &[f64], obs: &[f64]| -> anyhow::Result<Action> {
            Ok(Action::Discrete(usize::from(params[0] * obs[0] > 0.0)))
        };

        let params: [&[f64]; 2] = [&[1.0], &[-1.0]];
        let observations: [&[f64]; 2] = [&[1.0], &[1.0]];
        let actions = policy.act_batch(&params, &observations).unwrap();

        assert_eq!(actions, vec![Action::Discrete(1), Action::Discrete(0)]);
    }
}
