/// One on-policy step, recorded with the log-probability and value estimate
/// the policy produced when the action was taken.
#[derive(Clone, Debug, PartialEq)]
pub struct RolloutStep {
    pub state: Vec<f32>,
    pub action: usize,
    pub log_prob: f32,
    pub reward: f32,
    pub done: bool,
    pub value: f32,
}

impl RolloutStep {
    pub fn new(
        state: Vec<f32>,
        action: usize,
        log_prob: f32,
        reward: f32,
        done: bool,
        value: f32,
    ) -> Self {
        Self {
            state,
            action,
            log_prob,
            reward,
            done,
            value,
        }
    }
}

/// Unbounded, strictly ordered record of the current rollout.
#[derive(Clone, Debug, Default)]
pub struct TrajectoryBuffer {
    steps: Vec<RolloutStep>,
}

impl TrajectoryBuffer {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn push(&mut self, step: RolloutStep) {
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[RolloutStep] {
        &self.steps
    }

    pub fn last(&self) -> Option<&RolloutStep> {
        self.steps.last()
    }

    pub fn rewards(&self) -> Vec<f32> {
        self.steps.iter().map(|step| step.reward).collect()
    }

    pub fn values(&self) -> Vec<f32> {
        self.steps.iter().map(|step| step.value).collect()
    }

    pub fn dones(&self) -> Vec<bool> {
        self.steps.iter().map(|step| step.done).collect()
    }

    pub fn clear(&mut self) {
        self.steps.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_follow_push_order() {
        let mut buffer = TrajectoryBuffer::new();
        for index in 0..3 {
            buffer.push(RolloutStep::new(
                vec![index as f32],
                index,
                -0.5,
                index as f32,
                index == 2,
                0.1 * index as f32,
            ));
        }
        assert_eq!(buffer.rewards(), vec![0.0, 1.0, 2.0]);
        assert_eq!(buffer.dones(), vec![false, false, true]);
        assert_eq!(buffer.last().map(|step| step.action), Some(2));
        buffer.clear();
        assert!(buffer.is_empty());
    }
}
