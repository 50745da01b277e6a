use crate::error::AgentError;

/// Per-step targets for one trajectory, in temporal order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AdvantageEstimates {
    pub returns: Vec<f32>,
    pub advantages: Vec<f32>,
}

impl AdvantageEstimates {
    pub fn len(&self) -> usize {
        self.returns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.returns.is_empty()
    }

    pub fn is_finite(&self) -> bool {
        self.returns
            .iter()
            .chain(self.advantages.iter())
            .all(|value| value.is_finite())
    }
}

/// Generalized advantage estimation by backward recursion.
///
/// `next_value` bootstraps the step after the last one; a `done` flag cuts
/// both the bootstrap and the advantage carried back from later steps.
/// `values` and `dones` must hold one entry per reward.
pub fn compute_returns_and_advantages(
    rewards: &[f32],
    values: &[f32],
    dones: &[bool],
    next_value: f32,
    gamma: f32,
    lambda: f32,
) -> Result<AdvantageEstimates, AgentError> {
    let len = rewards.len();
    for actual in [values.len(), dones.len()] {
        if actual != len {
            return Err(AgentError::InvalidDimension {
                expected: len,
                actual,
            });
        }
    }

    let mut returns = vec![0.0; len];
    let mut advantages = vec![0.0; len];
    let mut gae = 0.0f32;
    let mut following = next_value;
    for step in (0..len).rev() {
        let continuing = if dones[step] { 0.0 } else { 1.0 };
        let delta = rewards[step] + gamma * following * continuing - values[step];
        gae = delta + gamma * lambda * continuing * gae;
        advantages[step] = gae;
        returns[step] = gae + values[step];
        following = values[step];
    }
    Ok(AdvantageEstimates {
        returns,
        advantages,
    })
}
