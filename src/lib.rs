//! Reinforcement learning core for a dirt-cleaning bot: a replay-based DQN
//! learner and a clipped-objective PPO learner, both built on Burn.

pub mod bot;
pub mod bots;
pub mod driver;
pub mod env;
pub mod error;
pub mod ml;

pub use crate::bot::Bot;
pub use crate::bots::{BotKind, RandomWalkBot, create_bot};
pub use crate::driver::{EpisodeStats, run_bot_episode, run_dqn_episode, run_ppo_episode};
pub use crate::env::{Environment, StepOutcome};
pub use crate::error::{AgentError, ConfigError};
pub use crate::ml::{
    DqnAgent, DqnConfig, PpoAgent, PpoConfig, ReplayBuffer, RolloutStep, TrajectoryBuffer,
    Transition,
};
