use std::path::Path;

use burn::module::AutodiffModule;
use burn::optim::adaptor::OptimizerAdaptor;
use burn::optim::{Adam, AdamConfig, GradientsParams, Optimizer};
use burn::tensor::Tensor;
use burn::tensor::backend::{AutodiffBackend, Backend};
use log::{debug, info, warn};
use rand::SeedableRng;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use super::checkpoint::{self, CheckpointKind, CheckpointMetadata};
use super::dqn::greedy_action;
use super::encoding::{
    action_tensor, rows_tensor, scalar_tensor, state_tensor, tensor_to_f32, tensor_to_vec,
};
use super::gae::compute_returns_and_advantages;
use super::network::{ActorCritic, DEFAULT_HIDDEN};
use super::trajectory::{RolloutStep, TrajectoryBuffer};
use crate::error::{AgentError, ConfigError, check_action, check_finite, check_state};

/// Smallest probability fed to `ln`, shared by sampling and re-evaluation so
/// behaviour and current log-probabilities stay comparable.
pub const PROB_FLOOR: f32 = 1.0e-8;

/// Hyperparameters for [`PpoAgent`], fixed at construction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PpoConfig {
    pub state_size: usize,
    pub action_size: usize,
    pub hidden: usize,
    pub gamma: f32,
    pub lambda: f32,
    pub learning_rate: f64,
    pub clip_epsilon: f32,
    pub batch_size: usize,
    pub update_steps: usize,
    pub value_coef: f32,
    pub seed: u64,
}

impl PpoConfig {
    pub fn new(state_size: usize, action_size: usize) -> Self {
        Self {
            state_size,
            action_size,
            hidden: DEFAULT_HIDDEN,
            gamma: 0.99,
            lambda: 0.95,
            learning_rate: 3.0e-4,
            clip_epsilon: 0.2,
            batch_size: 64,
            update_steps: 4,
            value_coef: 0.5,
            seed: 0x9907_D057,
        }
    }

    pub fn with_hidden(mut self, hidden: usize) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn with_gamma(mut self, gamma: f32) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn with_lambda(mut self, lambda: f32) -> Self {
        self.lambda = lambda;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_clip_epsilon(mut self, clip_epsilon: f32) -> Self {
        self.clip_epsilon = clip_epsilon;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_update_steps(mut self, update_steps: usize) -> Self {
        self.update_steps = update_steps;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.state_size == 0 {
            return Err(ConfigError::StateSize);
        }
        if self.action_size == 0 {
            return Err(ConfigError::ActionSize);
        }
        if self.hidden == 0 {
            return Err(ConfigError::Positive("hidden width"));
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(ConfigError::Gamma(self.gamma));
        }
        if !(0.0..=1.0).contains(&self.lambda) {
            return Err(ConfigError::Lambda(self.lambda));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(ConfigError::LearningRate(self.learning_rate));
        }
        if !(self.clip_epsilon > 0.0 && self.clip_epsilon < 1.0) {
            return Err(ConfigError::ClipRange(self.clip_epsilon));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Positive("batch size"));
        }
        if self.update_steps == 0 {
            return Err(ConfigError::Positive("update epochs"));
        }
        if !(self.value_coef.is_finite() && self.value_coef >= 0.0) {
            return Err(ConfigError::Positive("value coefficient"));
        }
        Ok(())
    }

    fn metadata(&self) -> CheckpointMetadata {
        CheckpointMetadata {
            kind: CheckpointKind::ActorCritic,
            state_size: self.state_size,
            action_size: self.action_size,
            hidden: self.hidden,
            depth: 1,
        }
    }
}

/// `min(ratio * advantage, clip(ratio, 1 - clip, 1 + clip) * advantage)`.
pub fn clipped_objective(ratio: f32, advantage: f32, clip: f32) -> f32 {
    let clipped = ratio.clamp(1.0 - clip, 1.0 + clip);
    (ratio * advantage).min(clipped * advantage)
}

/// Negated mean of the clipped surrogate, ready for minimisation.
pub fn clipped_surrogate_loss<B: Backend>(
    ratio: Tensor<B, 1>,
    advantages: Tensor<B, 1>,
    clip: f32,
) -> Tensor<B, 1> {
    let unclipped = ratio.clone() * advantages.clone();
    let clipped = ratio.clamp(1.0 - clip, 1.0 + clip) * advantages;
    unclipped.min_pair(clipped).mean().neg()
}

#[derive(Clone, Debug, PartialEq)]
pub struct PpoUpdateReport {
    pub actor_loss: f32,
    pub critic_loss: f32,
    pub minibatches: usize,
    pub steps: usize,
}

/// On-policy actor-critic learner with a clipped surrogate objective.
pub struct PpoAgent<B: AutodiffBackend> {
    config: PpoConfig,
    model: ActorCritic<B>,
    optimizer: OptimizerAdaptor<Adam, ActorCritic<B>, B>,
    memory: TrajectoryBuffer,
    evaluating: bool,
    rng: StdRng,
    device: B::Device,
}

impl<B: AutodiffBackend> PpoAgent<B> {
    pub fn new(config: PpoConfig, device: B::Device) -> Result<Self, AgentError> {
        config.validate()?;
        let model = ActorCritic::new(
            config.state_size,
            config.action_size,
            config.hidden,
            &device,
        );
        Ok(Self {
            optimizer: AdamConfig::new().init(),
            memory: TrajectoryBuffer::new(),
            evaluating: false,
            rng: StdRng::seed_from_u64(config.seed),
            model,
            config,
            device,
        })
    }

    pub fn config(&self) -> &PpoConfig {
        &self.config
    }

    pub fn model(&self) -> &ActorCritic<B> {
        &self.model
    }

    pub fn trajectory(&self) -> &TrajectoryBuffer {
        &self.memory
    }

    pub fn clear_trajectory(&mut self) {
        self.memory.clear();
    }

    pub fn is_evaluating(&self) -> bool {
        self.evaluating
    }

    /// In evaluation mode `select_action` returns the most probable action
    /// instead of sampling.
    pub fn set_evaluation(&mut self, evaluating: bool) {
        self.evaluating = evaluating;
    }

    /// Action probabilities and critic value for one state, without sampling.
    pub fn evaluate(&self, state: &[f32]) -> Result<(Vec<f32>, f32), AgentError> {
        check_state(state, self.config.state_size)?;
        let input = state_tensor::<B::InnerBackend>(state, &self.device);
        let (probs, value) = self.model.valid().forward(input);
        Ok((tensor_to_vec(probs), tensor_to_f32(value)))
    }

    /// Action probabilities and critic values for a batch of states.
    pub fn evaluate_batch(&self, states: &[Vec<f32>]) -> Result<Vec<(Vec<f32>, f32)>, AgentError> {
        for state in states {
            check_state(state, self.config.state_size)?;
        }
        if states.is_empty() {
            return Ok(Vec::new());
        }
        let input = rows_tensor::<B::InnerBackend, _>(
            states.iter().map(Vec::as_slice),
            self.config.state_size,
            &self.device,
        );
        let (probs, values) = self.model.valid().forward(input);
        let probs = tensor_to_vec(probs);
        let values = tensor_to_vec(values);
        Ok(probs
            .chunks(self.config.action_size)
            .map(<[f32]>::to_vec)
            .zip(values)
            .collect())
    }

    /// Draws an action from the current policy. Returns the action and its
    /// log-probability under the distribution used to pick it.
    pub fn select_action(&mut self, state: &[f32]) -> Result<(usize, f32), AgentError> {
        let (probs, _) = self.evaluate(state)?;
        let action = if self.evaluating {
            greedy_action(&probs)
        } else {
            WeightedIndex::new(&probs)
                .map_err(|_| AgentError::InvalidDistribution)?
                .sample(&mut self.rng)
        };
        Ok((action, probs[action].max(PROB_FLOOR).ln()))
    }

    pub fn store(&mut self, step: RolloutStep) -> Result<(), AgentError> {
        check_state(&step.state, self.config.state_size)?;
        check_action(step.action, self.config.action_size)?;
        check_finite(&step.state, "state")?;
        check_finite(&[step.reward], "reward")?;
        check_finite(&[step.value], "value estimate")?;
        check_finite(&[step.log_prob], "log-probability")?;
        self.memory.push(step);
        Ok(())
    }

    /// Multi-epoch clipped update over the stored trajectory. Returns
    /// `Ok(None)` when nothing has been stored.
    ///
    /// The trajectory is cleared whether or not the update succeeds. On error
    /// the parameters and optimizer state are restored to what they were
    /// before the call.
    pub fn update(&mut self) -> Result<Option<PpoUpdateReport>, AgentError> {
        if self.memory.is_empty() {
            return Ok(None);
        }
        let model = self.model.clone();
        let optimizer = self.optimizer.clone();
        let outcome = self.train_epochs();
        let steps = self.memory.len();
        self.memory.clear();
        match outcome {
            Ok(report) => {
                debug!(
                    "ppo update over {} steps: actor {:.6} critic {:.6}",
                    report.steps, report.actor_loss, report.critic_loss
                );
                Ok(Some(report))
            }
            Err(err) => {
                self.model = model;
                self.optimizer = optimizer;
                warn!("ppo update over {steps} steps rolled back: {err}");
                Err(err)
            }
        }
    }

    fn train_epochs(&mut self) -> Result<PpoUpdateReport, AgentError> {
        let steps = self.memory.len();
        let Some(last) = self.memory.last() else {
            return Err(AgentError::InsufficientData {
                required: 1,
                available: 0,
            });
        };
        let (_, next_value) = self.evaluate(&last.state)?;
        let estimates = compute_returns_and_advantages(
            &self.memory.rewards(),
            &self.memory.values(),
            &self.memory.dones(),
            next_value,
            self.config.gamma,
            self.config.lambda,
        )?;
        if !estimates.is_finite() {
            return Err(AgentError::NonFiniteLoss { loss: f32::NAN });
        }

        let mut indices: Vec<usize> = (0..steps).collect();
        let mut actor_total = 0.0;
        let mut critic_total = 0.0;
        let mut minibatches = 0usize;
        for _ in 0..self.config.update_steps {
            indices.shuffle(&mut self.rng);
            for chunk in indices.chunks(self.config.batch_size) {
                let (actor_loss, critic_loss) =
                    self.train_minibatch(chunk, &estimates.returns, &estimates.advantages)?;
                actor_total += actor_loss;
                critic_total += critic_loss;
                minibatches += 1;
            }
        }
        Ok(PpoUpdateReport {
            actor_loss: actor_total / minibatches as f32,
            critic_loss: critic_total / minibatches as f32,
            minibatches,
            steps,
        })
    }

    fn train_minibatch(
        &mut self,
        chunk: &[usize],
        returns: &[f32],
        advantages: &[f32],
    ) -> Result<(f32, f32), AgentError> {
        let rollout = self.memory.steps();
        let states = rows_tensor::<B, _>(
            chunk.iter().map(|&index| rollout[index].state.as_slice()),
            self.config.state_size,
            &self.device,
        );
        let actions: Vec<usize> = chunk.iter().map(|&index| rollout[index].action).collect();
        let behaviour: Vec<f32> = chunk.iter().map(|&index| rollout[index].log_prob).collect();
        let advantages: Vec<f32> = chunk.iter().map(|&index| advantages[index]).collect();
        let returns: Vec<f32> = chunk.iter().map(|&index| returns[index]).collect();

        let (probs, values) = self.model.forward(states);
        let log_probs: Tensor<B, 1> = probs
            .clamp_min(PROB_FLOOR)
            .log()
            .gather(1, action_tensor::<B>(&actions, &self.device))
            .flatten(0, 1);
        let ratio = (log_probs - scalar_tensor(behaviour, &self.device)).exp();
        let actor_loss = clipped_surrogate_loss(
            ratio,
            scalar_tensor(advantages, &self.device),
            self.config.clip_epsilon,
        );
        let critic_loss = (values - scalar_tensor(returns, &self.device))
            .powf_scalar(2.0)
            .mean();
        let actor_value = tensor_to_f32(actor_loss.clone().detach());
        let critic_value = tensor_to_f32(critic_loss.clone().detach());
        let loss = actor_loss + critic_loss.mul_scalar(self.config.value_coef);
        let loss_value = tensor_to_f32(loss.clone().detach());
        if !loss_value.is_finite() {
            return Err(AgentError::NonFiniteLoss { loss: loss_value });
        }

        let grads = GradientsParams::from_grads(loss.backward(), &self.model);
        self.model = self
            .optimizer
            .step(self.config.learning_rate, self.model.clone(), grads);
        Ok((actor_value, critic_value))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, AgentError> {
        checkpoint::encode::<B::InnerBackend, _>(&self.model.valid(), self.config.metadata())
    }

    /// Restores the actor-critic parameters and switches to evaluation mode.
    pub fn load_bytes(&mut self, bytes: &[u8]) -> Result<(), AgentError> {
        self.model = checkpoint::decode::<B, _>(
            self.model.clone(),
            bytes,
            &self.config.metadata(),
            &self.device,
        )?;
        self.evaluating = true;
        Ok(())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), AgentError> {
        let path = path.as_ref();
        checkpoint::write(path, &self.to_bytes()?)?;
        info!("ppo actor-critic saved to {}", path.display());
        Ok(())
    }

    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<(), AgentError> {
        let path = path.as_ref();
        self.load_bytes(&checkpoint::read(path)?)?;
        info!("ppo actor-critic loaded from {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_autodiff::Autodiff;
    use burn_ndarray::NdArray;

    type Backend = Autodiff<NdArray<f32>>;
    type Inner = NdArray<f32>;

    fn agent(config: PpoConfig) -> PpoAgent<Backend> {
        PpoAgent::new(config, Default::default()).expect("valid config")
    }

    #[test]
    fn clip_edge_is_continuous() {
        let clip = 0.2;
        let edge = 1.0 + clip;
        assert_eq!(clipped_objective(edge, 2.0, clip), edge * 2.0);
    }

    #[test]
    fn ratio_beyond_edge_is_clipped_for_positive_advantage() {
        let clip = 0.2;
        let value = clipped_objective(1.8, 2.0, clip);
        assert!((value - 1.2 * 2.0).abs() < 1e-6);
        assert!(value < 1.8 * 2.0);
    }

    #[test]
    fn ratio_below_edge_is_clipped_for_negative_advantage() {
        let value = clipped_objective(0.5, -1.0, 0.2);
        assert!((value - (-0.8)).abs() < 1e-6);
    }

    #[test]
    fn tensor_loss_matches_scalar_objective() {
        let device = Default::default();
        let ratios = vec![0.5, 1.0, 1.2, 1.8];
        let advantages = vec![1.0, -2.0, 3.0, 0.5];
        let expected = -ratios
            .iter()
            .zip(&advantages)
            .map(|(&r, &a)| clipped_objective(r, a, 0.2))
            .sum::<f32>()
            / 4.0;
        let loss = clipped_surrogate_loss::<Inner>(
            scalar_tensor(ratios, &device),
            scalar_tensor(advantages, &device),
            0.2,
        );
        assert!((tensor_to_f32(loss) - expected).abs() < 1e-5);
    }

    #[test]
    fn config_rejects_bad_clip_and_lambda() {
        assert_eq!(
            PpoConfig::new(3, 2).with_clip_epsilon(0.0).validate(),
            Err(ConfigError::ClipRange(0.0))
        );
        assert_eq!(
            PpoConfig::new(3, 2).with_lambda(-0.1).validate(),
            Err(ConfigError::Lambda(-0.1))
        );
    }

    #[test]
    fn select_action_returns_behaviour_log_prob() {
        let mut agent = agent(PpoConfig::new(3, 4));
        let state = [0.1, 0.2, 0.3];
        let (probs, _) = agent.evaluate(&state).expect("evaluate");
        let (action, log_prob) = agent.select_action(&state).expect("sample");
        assert!(action < 4);
        assert!((log_prob - probs[action].ln()).abs() < 1e-5);
    }

    #[test]
    fn update_on_empty_trajectory_is_skipped() {
        let mut agent = agent(PpoConfig::new(3, 2));
        assert_eq!(agent.update().expect("skipped"), None);
    }

    #[test]
    fn store_rejects_wrong_dimension() {
        let mut agent = agent(PpoConfig::new(3, 2));
        let err = agent
            .store(RolloutStep::new(vec![0.0; 4], 0, -0.7, 0.0, false, 0.0))
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidDimension { .. }));
        assert!(agent.trajectory().is_empty());
    }

    #[test]
    fn store_rejects_non_finite_step_values() {
        let mut agent = agent(PpoConfig::new(3, 2));
        let steps = [
            RolloutStep::new(vec![0.0; 3], 0, f32::NAN, 0.0, false, 0.0),
            RolloutStep::new(vec![0.0; 3], 0, -0.7, f32::INFINITY, false, 0.0),
            RolloutStep::new(vec![0.0; 3], 0, -0.7, 0.0, false, f32::NAN),
            RolloutStep::new(vec![0.0, f32::NAN, 0.0], 0, -0.7, 0.0, false, 0.0),
        ];
        for step in steps {
            let err = agent.store(step).unwrap_err();
            assert!(matches!(err, AgentError::NonFiniteInput { .. }), "{err}");
        }
        assert!(agent.trajectory().is_empty());
    }

    #[test]
    fn evaluation_mode_is_deterministic() {
        let mut agent = agent(PpoConfig::new(3, 4));
        agent.set_evaluation(true);
        let state = [0.4, -0.2, 0.9];
        let (probs, _) = agent.evaluate(&state).expect("evaluate");
        let expected = greedy_action(&probs);
        for _ in 0..5 {
            assert_eq!(agent.select_action(&state).expect("action").0, expected);
        }
    }
}
