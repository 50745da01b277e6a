//! Episode loops tying an [`Environment`] to a bot or a learning agent.
//!
//! Each loop runs strictly in sequence: choose an action, step the
//! environment, record the transition, and update when the agent is ready.

use burn::tensor::backend::AutodiffBackend;
use log::debug;

use crate::bot::Bot;
use crate::env::Environment;
use crate::error::AgentError;
use crate::ml::{DqnAgent, PpoAgent, RolloutStep, Transition};

/// Summary of one finished (or truncated) episode.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EpisodeStats {
    pub steps: usize,
    pub total_reward: f32,
    pub action_counts: Vec<usize>,
    pub updates: usize,
    pub last_loss: Option<f32>,
}

impl EpisodeStats {
    fn new(action_count: usize) -> Self {
        Self {
            action_counts: vec![0; action_count],
            ..Self::default()
        }
    }

    fn record(&mut self, action: usize, reward: f32) {
        self.steps += 1;
        self.total_reward += reward;
        if let Some(count) = self.action_counts.get_mut(action) {
            *count += 1;
        }
    }
}

fn truncated(steps: usize, max_steps: Option<usize>) -> bool {
    max_steps.is_some_and(|limit| steps >= limit)
}

/// Plays one episode without learning.
pub fn run_bot_episode<E: Environment>(
    env: &mut E,
    bot: &mut dyn Bot,
    max_steps: Option<usize>,
) -> Result<EpisodeStats, AgentError> {
    let mut stats = EpisodeStats::new(env.action_count());
    let mut state = env.reset();
    while !truncated(stats.steps, max_steps) {
        let action = bot.select_action(&state)?;
        let outcome = env.step(action);
        stats.record(action, outcome.reward);
        state = outcome.observation;
        if outcome.done {
            break;
        }
    }
    Ok(stats)
}

/// One DQN training episode. `replay` runs after each step once more than
/// `batch_size` transitions have been remembered, counting earlier episodes.
pub fn run_dqn_episode<E, B>(
    env: &mut E,
    agent: &mut DqnAgent<B>,
    batch_size: usize,
    max_steps: Option<usize>,
) -> Result<EpisodeStats, AgentError>
where
    E: Environment,
    B: AutodiffBackend,
{
    let mut stats = EpisodeStats::new(env.action_count());
    let mut state = env.reset();
    while !truncated(stats.steps, max_steps) {
        let action = agent.act(&state)?;
        let outcome = env.step(action);
        stats.record(action, outcome.reward);
        agent.remember(Transition::new(
            state,
            action,
            outcome.reward,
            outcome.observation.clone(),
            outcome.done,
        ))?;
        if agent.remembered() > batch_size {
            if let Some(report) = agent.replay(batch_size)? {
                stats.updates += 1;
                stats.last_loss = Some(report.loss);
            }
        }
        state = outcome.observation;
        if outcome.done {
            break;
        }
    }
    debug!(
        "dqn episode: {} steps, reward {:.3}, epsilon {:.4}",
        stats.steps,
        stats.total_reward,
        agent.epsilon()
    );
    Ok(stats)
}

/// One PPO training episode: the whole episode forms the trajectory and is
/// consumed by a single `update` at the end. If the episode fails before the
/// update, the partial trajectory is discarded.
pub fn run_ppo_episode<E, B>(
    env: &mut E,
    agent: &mut PpoAgent<B>,
    max_steps: Option<usize>,
) -> Result<EpisodeStats, AgentError>
where
    E: Environment,
    B: AutodiffBackend,
{
    let mut stats = EpisodeStats::new(env.action_count());
    if let Err(err) = collect_rollout(env, agent, max_steps, &mut stats) {
        agent.clear_trajectory();
        return Err(err);
    }
    if let Some(report) = agent.update()? {
        stats.updates += report.minibatches;
        let value_coef = agent.config().value_coef;
        stats.last_loss = Some(report.actor_loss + value_coef * report.critic_loss);
    }
    Ok(stats)
}

fn collect_rollout<E, B>(
    env: &mut E,
    agent: &mut PpoAgent<B>,
    max_steps: Option<usize>,
    stats: &mut EpisodeStats,
) -> Result<(), AgentError>
where
    E: Environment,
    B: AutodiffBackend,
{
    let mut state = env.reset();
    while !truncated(stats.steps, max_steps) {
        let (_, value) = agent.evaluate(&state)?;
        let (action, log_prob) = agent.select_action(&state)?;
        let outcome = env.step(action);
        stats.record(action, outcome.reward);
        agent.store(RolloutStep::new(
            state,
            action,
            log_prob,
            outcome.reward,
            outcome.done,
            value,
        ))?;
        state = outcome.observation;
        if outcome.done {
            break;
        }
    }
    Ok(())
}
