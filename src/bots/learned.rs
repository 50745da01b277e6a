use burn::tensor::backend::AutodiffBackend;

use crate::bot::Bot;
use crate::error::AgentError;
use crate::ml::{DqnAgent, PpoAgent};

impl<B: AutodiffBackend> Bot for DqnAgent<B> {
    fn select_action(&mut self, state: &[f32]) -> Result<usize, AgentError> {
        self.act(state)
    }
}

impl<B: AutodiffBackend> Bot for PpoAgent<B> {
    fn select_action(&mut self, state: &[f32]) -> Result<usize, AgentError> {
        PpoAgent::select_action(self, state).map(|(action, _)| action)
    }
}
