use rand::Rng;

use crate::bot::Bot;
use crate::error::{AgentError, ConfigError};

/// Baseline bot that wanders by picking actions uniformly at random.
pub struct RandomWalkBot<R: Rng> {
    action_size: usize,
    rng: R,
}

impl<R: Rng> RandomWalkBot<R> {
    pub fn new(action_size: usize, rng: R) -> Result<Self, ConfigError> {
        if action_size == 0 {
            return Err(ConfigError::ActionSize);
        }
        Ok(Self { action_size, rng })
    }
}

impl<R: Rng> Bot for RandomWalkBot<R> {
    fn select_action(&mut self, _state: &[f32]) -> Result<usize, AgentError> {
        Ok(self.rng.gen_range(0..self.action_size))
    }
}
