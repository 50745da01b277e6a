use crate::error::AgentError;

/// Interface for anything that can drive the cleaning bot.
pub trait Bot {
    fn select_action(&mut self, state: &[f32]) -> Result<usize, AgentError>;
}
