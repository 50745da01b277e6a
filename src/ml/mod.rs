pub mod checkpoint;
pub mod dqn;
pub(crate) mod encoding;
pub mod gae;
pub mod network;
pub mod ppo;
pub mod replay;
pub mod target;
pub mod trajectory;

pub use checkpoint::{CheckpointKind, CheckpointMetadata};
pub use dqn::{DqnAgent, DqnConfig, ReplayReport, bootstrap_targets, decay_epsilon, greedy_action};
pub use gae::{AdvantageEstimates, compute_returns_and_advantages};
pub use network::{ActorCritic, DEFAULT_HIDDEN, DEFAULT_STACK, Mlp, QNetwork};
pub use ppo::{
    PROB_FLOOR, PpoAgent, PpoConfig, PpoUpdateReport, clipped_objective, clipped_surrogate_loss,
};
pub use replay::{DEFAULT_CAPACITY, ReplayBuffer, Transition};
pub use target::{StopGradient, flatten_parameters, hard_sync, parameters_equal};
pub use trajectory::{RolloutStep, TrajectoryBuffer};
