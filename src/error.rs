use thiserror::Error;

/// Errors raised while validating agent hyperparameters.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("state size must be positive")]
    StateSize,
    #[error("action size must be positive")]
    ActionSize,
    #[error("discount factor {0} must lie in [0, 1]")]
    Gamma(f32),
    #[error("GAE mixing factor {0} must lie in [0, 1]")]
    Lambda(f32),
    #[error("exploration rate {epsilon} must lie in [{min}, 1]")]
    Epsilon { epsilon: f32, min: f32 },
    #[error("minimum exploration rate {0} must lie in [0, 1]")]
    EpsilonMin(f32),
    #[error("exploration decay {0} must lie in (0, 1]")]
    EpsilonDecay(f32),
    #[error("learning rate {0} must be positive and finite")]
    LearningRate(f64),
    #[error("clip range {0} must lie in (0, 1)")]
    ClipRange(f32),
    #[error("{0} must be positive")]
    Positive(&'static str),
}

/// Errors surfaced by agent operations.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("invalid input dimension: expected {expected} features, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },
    #[error("action {action} out of range for {action_size} actions")]
    ActionOutOfRange { action: usize, action_size: usize },
    #[error("insufficient data: {required} samples requested, {available} stored")]
    InsufficientData { required: usize, available: usize },
    #[error("non-finite {field} rejected")]
    NonFiniteInput { field: &'static str },
    #[error("non-finite loss {loss}, update rejected")]
    NonFiniteLoss { loss: f32 },
    #[error("policy produced an invalid action distribution")]
    InvalidDistribution,
    #[error("checkpoint mismatch: expected {expected}, found {found}")]
    CheckpointMismatch { expected: String, found: String },
    #[error("checkpoint error: {0}")]
    Checkpoint(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

pub(crate) fn check_state(state: &[f32], expected: usize) -> Result<(), AgentError> {
    if state.len() != expected {
        return Err(AgentError::InvalidDimension {
            expected,
            actual: state.len(),
        });
    }
    Ok(())
}

pub(crate) fn check_finite(values: &[f32], field: &'static str) -> Result<(), AgentError> {
    if values.iter().all(|value| value.is_finite()) {
        Ok(())
    } else {
        Err(AgentError::NonFiniteInput { field })
    }
}

pub(crate) fn check_action(action: usize, action_size: usize) -> Result<(), AgentError> {
    if action >= action_size {
        return Err(AgentError::ActionOutOfRange {
            action,
            action_size,
        });
    }
    Ok(())
}
