use std::collections::HashMap;

/// Result of advancing an environment by one action.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepOutcome {
    pub observation: Vec<f32>,
    pub reward: f32,
    pub done: bool,
    pub info: HashMap<String, f32>,
}

impl StepOutcome {
    pub fn new(observation: Vec<f32>, reward: f32, done: bool) -> Self {
        Self {
            observation,
            reward,
            done,
            info: HashMap::new(),
        }
    }

    pub fn with_info(mut self, key: impl Into<String>, value: f32) -> Self {
        self.info.insert(key.into(), value);
        self
    }
}

/// Episodic environment with a fixed-length observation and a finite,
/// ordered set of discrete actions.
pub trait Environment {
    fn reset(&mut self) -> Vec<f32>;

    fn step(&mut self, action: usize) -> StepOutcome;

    fn action_space(&self) -> &[usize];

    fn observation_size(&self) -> usize;

    fn action_count(&self) -> usize {
        self.action_space().len()
    }
}
