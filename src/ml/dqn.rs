use std::path::Path;

use burn::module::AutodiffModule;
use burn::optim::adaptor::OptimizerAdaptor;
use burn::optim::{Adam, AdamConfig, GradientsParams, Optimizer};
use burn::tensor::Tensor;
use burn::tensor::backend::{AutodiffBackend, Backend};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::checkpoint::{self, CheckpointKind, CheckpointMetadata};
use super::encoding::{
    action_tensor, rows_tensor, scalar_tensor, state_tensor, tensor_to_f32, tensor_to_vec,
};
use super::network::{DEFAULT_HIDDEN, DEFAULT_STACK, QNetwork};
use super::replay::{DEFAULT_CAPACITY, ReplayBuffer, Transition};
use super::target::{StopGradient, hard_sync};
use crate::error::{AgentError, ConfigError, check_action, check_finite, check_state};

/// Hyperparameters for [`DqnAgent`], fixed at construction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DqnConfig {
    pub state_size: usize,
    pub action_size: usize,
    pub hidden: usize,
    pub depth: usize,
    pub gamma: f32,
    pub epsilon: f32,
    pub epsilon_min: f32,
    pub epsilon_decay: f32,
    pub learning_rate: f64,
    pub capacity: usize,
    pub update_target_steps: usize,
    pub seed: u64,
}

impl DqnConfig {
    pub fn new(state_size: usize, action_size: usize) -> Self {
        Self {
            state_size,
            action_size,
            hidden: DEFAULT_HIDDEN,
            depth: DEFAULT_STACK,
            gamma: 0.95,
            epsilon: 1.0,
            epsilon_min: 0.01,
            epsilon_decay: 0.995,
            learning_rate: 1.0e-3,
            capacity: DEFAULT_CAPACITY,
            update_target_steps: 100,
            seed: 0xD05_7B07,
        }
    }

    pub fn with_hidden(mut self, hidden: usize, depth: usize) -> Self {
        self.hidden = hidden;
        self.depth = depth;
        self
    }

    pub fn with_gamma(mut self, gamma: f32) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn with_exploration(mut self, epsilon: f32, epsilon_min: f32, epsilon_decay: f32) -> Self {
        self.epsilon = epsilon;
        self.epsilon_min = epsilon_min;
        self.epsilon_decay = epsilon_decay;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_update_target_steps(mut self, steps: usize) -> Self {
        self.update_target_steps = steps;
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
        if !(0.0..=1.0).contains(&self.epsilon_min) {
            return Err(ConfigError::EpsilonMin(self.epsilon_min));
        }
        if !(self.epsilon_min..=1.0).contains(&self.epsilon) {
            return Err(ConfigError::Epsilon {
                epsilon: self.epsilon,
                min: self.epsilon_min,
            });
        }
        if !(self.epsilon_decay > 0.0 && self.epsilon_decay <= 1.0) {
            return Err(ConfigError::EpsilonDecay(self.epsilon_decay));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(ConfigError::LearningRate(self.learning_rate));
        }
        if self.capacity == 0 {
            return Err(ConfigError::Positive("replay capacity"));
        }
        if self.update_target_steps == 0 {
            return Err(ConfigError::Positive("target sync period"));
        }
        Ok(())
    }

    fn metadata(&self) -> CheckpointMetadata {
        CheckpointMetadata {
            kind: CheckpointKind::QNetwork,
            state_size: self.state_size,
            action_size: self.action_size,
            hidden: self.hidden,
            depth: self.depth,
        }
    }
}

/// One multiplicative decay step, floored at `min`. A rate already at or
/// below the floor is left untouched so the schedule never increases.
pub fn decay_epsilon(epsilon: f32, decay: f32, min: f32) -> f32 {
    if epsilon <= min {
        epsilon
    } else {
        (epsilon * decay).max(min)
    }
}

/// `reward + gamma * (1 - done) * max_next`, evaluated element-wise.
pub fn bootstrap_targets<B: Backend>(
    rewards: Tensor<B, 1>,
    dones: Tensor<B, 1>,
    next_max: Tensor<B, 1>,
    gamma: f32,
) -> Tensor<B, 1> {
    let continuing = dones.neg().add_scalar(1.0);
    rewards + next_max.mul(continuing).mul_scalar(gamma)
}

/// Index of the first maximum.
pub fn greedy_action(values: &[f32]) -> usize {
    let mut best = 0;
    for (index, value) in values.iter().enumerate().skip(1) {
        if *value > values[best] {
            best = index;
        }
    }
    best
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReplayReport {
    pub loss: f32,
    pub epsilon: f32,
    pub step: usize,
    pub synced: bool,
}

/// Off-policy learner with replay memory and a periodically synced target.
pub struct DqnAgent<B: AutodiffBackend> {
    config: DqnConfig,
    online: QNetwork<B>,
    target: QNetwork<B::InnerBackend>,
    optimizer: OptimizerAdaptor<Adam, QNetwork<B>, B>,
    memory: ReplayBuffer,
    epsilon: f32,
    steps: usize,
    remembered: usize,
    rng: StdRng,
    device: B::Device,
}

impl<B: AutodiffBackend> DqnAgent<B> {
    pub fn new(config: DqnConfig, device: B::Device) -> Result<Self, AgentError> {
        config.validate()?;
        let online = QNetwork::<B>::new(
            config.state_size,
            config.hidden,
            config.depth,
            config.action_size,
            &device,
        );
        let target = hard_sync::<B, _>(&online);
        Ok(Self {
            optimizer: AdamConfig::new().init(),
            memory: ReplayBuffer::new(config.capacity)?,
            epsilon: config.epsilon,
            steps: 0,
            remembered: 0,
            rng: StdRng::seed_from_u64(config.seed),
            online,
            target,
            config,
            device,
        })
    }

    pub fn config(&self) -> &DqnConfig {
        &self.config
    }

    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    /// Overrides the exploration rate, e.g. `0.0` for greedy evaluation.
    ///
    /// Meant for evaluation only: unlike the decay applied by `replay`, this
    /// may raise epsilon.
    pub fn set_epsilon(&mut self, epsilon: f32) {
        self.epsilon = epsilon.clamp(0.0, 1.0);
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Transitions accepted by `remember` since construction, including
    /// those already evicted from memory.
    pub fn remembered(&self) -> usize {
        self.remembered
    }

    pub fn memory(&self) -> &ReplayBuffer {
        &self.memory
    }

    pub fn online(&self) -> &QNetwork<B> {
        &self.online
    }

    pub fn target(&self) -> &QNetwork<B::InnerBackend> {
        &self.target
    }

    /// Online action-value estimates for one state.
    pub fn q_values(&self, state: &[f32]) -> Result<Vec<f32>, AgentError> {
        check_state(state, self.config.state_size)?;
        let input = state_tensor::<B::InnerBackend>(state, &self.device);
        let values = self.online.valid().forward(input);
        Ok(tensor_to_vec(values))
    }

    /// Epsilon-greedy action selection. Leaves epsilon untouched.
    pub fn act(&mut self, state: &[f32]) -> Result<usize, AgentError> {
        check_state(state, self.config.state_size)?;
        if self.rng.gen_range(0.0..1.0) < self.epsilon {
            return Ok(self.rng.gen_range(0..self.config.action_size));
        }
        Ok(greedy_action(&self.q_values(state)?))
    }

    pub fn remember(&mut self, transition: Transition) -> Result<(), AgentError> {
        check_state(&transition.state, self.config.state_size)?;
        check_state(&transition.next_state, self.config.state_size)?;
        check_action(transition.action, self.config.action_size)?;
        check_finite(&transition.state, "state")?;
        check_finite(&transition.next_state, "next state")?;
        check_finite(&[transition.reward], "reward")?;
        self.memory.push(transition);
        self.remembered += 1;
        Ok(())
    }

    /// One gradient step on a sampled minibatch. Returns `Ok(None)` while the
    /// replay memory holds fewer than `batch_size` transitions.
    pub fn replay(&mut self, batch_size: usize) -> Result<Option<ReplayReport>, AgentError> {
        if batch_size == 0 || self.memory.len() < batch_size {
            return Ok(None);
        }
        let width = self.config.state_size;
        let (states, next_states, actions, rewards, dones) = {
            let batch = self.memory.sample(batch_size, &mut self.rng)?;
            let states =
                rows_tensor::<B, _>(batch.iter().map(|t| t.state.as_slice()), width, &self.device);
            let next_states = rows_tensor::<B::InnerBackend, _>(
                batch.iter().map(|t| t.next_state.as_slice()),
                width,
                &self.device,
            );
            let actions: Vec<usize> = batch.iter().map(|t| t.action).collect();
            let rewards: Vec<f32> = batch.iter().map(|t| t.reward).collect();
            let dones: Vec<f32> = batch.iter().map(|t| if t.done { 1.0 } else { 0.0 }).collect();
            (states, next_states, actions, rewards, dones)
        };

        let next_max: Tensor<B::InnerBackend, 1> =
            self.target.forward(next_states).max_dim(1).flatten(0, 1);
        let targets = StopGradient::<B, 1>::new(bootstrap_targets(
            scalar_tensor(rewards, &self.device),
            scalar_tensor(dones, &self.device),
            next_max,
            self.config.gamma,
        ));

        let current: Tensor<B, 1> = self
            .online
            .forward(states)
            .gather(1, action_tensor::<B>(&actions, &self.device))
            .flatten(0, 1);
        let loss = (current - targets.lift()).powf_scalar(2.0).mean();
        let loss_value = tensor_to_f32(loss.clone().detach());
        if !loss_value.is_finite() {
            warn!("dqn replay rejected: loss {loss_value}");
            return Err(AgentError::NonFiniteLoss { loss: loss_value });
        }

        let grads = GradientsParams::from_grads(loss.backward(), &self.online);
        self.online = self
            .optimizer
            .step(self.config.learning_rate, self.online.clone(), grads);

        self.epsilon = decay_epsilon(
            self.epsilon,
            self.config.epsilon_decay,
            self.config.epsilon_min,
        );
        self.steps += 1;
        let synced = self.steps % self.config.update_target_steps == 0;
        if synced {
            self.sync_target();
            info!("dqn target synced at step {}", self.steps);
        }
        debug!(
            "dqn replay step {} loss {:.6} epsilon {:.4}",
            self.steps, loss_value, self.epsilon
        );
        Ok(Some(ReplayReport {
            loss: loss_value,
            epsilon: self.epsilon,
            step: self.steps,
            synced,
        }))
    }

    /// Copies the online parameters into the target estimator.
    pub fn sync_target(&mut self) {
        self.target = hard_sync::<B, _>(&self.online);
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, AgentError> {
        checkpoint::encode::<B::InnerBackend, _>(&self.online.valid(), self.config.metadata())
    }

    /// Replaces the online parameters. The target is left as is until the
    /// next sync.
    pub fn load_bytes(&mut self, bytes: &[u8]) -> Result<(), AgentError> {
        self.online = checkpoint::decode::<B, _>(
            self.online.clone(),
            bytes,
            &self.config.metadata(),
            &self.device,
        )?;
        Ok(())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), AgentError> {
        let path = path.as_ref();
        checkpoint::write(path, &self.to_bytes()?)?;
        info!("dqn online network saved to {}", path.display());
        Ok(())
    }

    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<(), AgentError> {
        let path = path.as_ref();
        self.load_bytes(&checkpoint::read(path)?)?;
        info!("dqn online network loaded from {}", path.display());
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

    fn agent(config: DqnConfig) -> DqnAgent<Backend> {
        DqnAgent::new(config, Default::default()).expect("valid config")
    }

    #[test]
    fn decay_is_floored_and_monotone() {
        let mut epsilon = 1.0;
        for _ in 0..2_000 {
            let next = decay_epsilon(epsilon, 0.995, 0.01);
            assert!(next <= epsilon);
            assert!(next >= 0.01);
            epsilon = next;
        }
        assert_eq!(epsilon, 0.01);
        assert_eq!(decay_epsilon(0.0, 0.995, 0.01), 0.0);
    }

    #[test]
    fn bootstrap_zeroes_terminal_transitions() {
        let device = Default::default();
        let targets = bootstrap_targets::<Inner>(
            scalar_tensor(vec![1.0, 2.0], &device),
            scalar_tensor(vec![0.0, 1.0], &device),
            scalar_tensor(vec![10.0, 10.0], &device),
            0.5,
        );
        assert_eq!(tensor_to_vec(targets), vec![6.0, 2.0]);
    }

    #[test]
    fn greedy_breaks_ties_on_first_maximum() {
        assert_eq!(greedy_action(&[0.5, 2.0, 2.0, -1.0]), 1);
        assert_eq!(greedy_action(&[3.0]), 0);
    }

    #[test]
    fn config_rejects_out_of_range_values() {
        assert_eq!(
            DqnConfig::new(3, 2).with_gamma(1.5).validate(),
            Err(ConfigError::Gamma(1.5))
        );
        assert_eq!(DqnConfig::new(0, 2).validate(), Err(ConfigError::StateSize));
        assert!(matches!(
            DqnConfig::new(3, 2).with_exploration(0.001, 0.01, 0.99).validate(),
            Err(ConfigError::Epsilon { .. })
        ));
        assert!(DqnAgent::<Backend>::new(DqnConfig::new(3, 0), Default::default()).is_err());
    }

    #[test]
    fn act_rejects_wrong_dimension() {
        let mut agent = agent(DqnConfig::new(3, 2));
        let err = agent.act(&[0.0, 1.0]).unwrap_err();
        assert!(matches!(
            err,
            AgentError::InvalidDimension {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn act_with_zero_epsilon_is_greedy() {
        let mut agent = agent(DqnConfig::new(3, 4));
        agent.set_epsilon(0.0);
        let state = [0.2, -0.4, 0.9];
        let expected = greedy_action(&agent.q_values(&state).expect("values"));
        for _ in 0..10 {
            assert_eq!(agent.act(&state).expect("action"), expected);
        }
    }

    #[test]
    fn epsilon_override_is_clamped_and_decay_resumes_from_it() {
        let mut agent = agent(DqnConfig::new(2, 2).with_hidden(8, 1));
        agent.set_epsilon(0.0);
        agent.set_epsilon(1.5);
        assert_eq!(agent.epsilon(), 1.0);
        agent.set_epsilon(0.5);
        agent
            .remember(Transition::new(vec![0.0; 2], 0, 1.0, vec![0.0; 2], true))
            .expect("stored");
        agent.replay(1).expect("replay").expect("replay ran");
        assert_eq!(agent.epsilon(), decay_epsilon(0.5, 0.995, 0.01));
    }

    #[test]
    fn remember_rejects_out_of_range_action() {
        let mut agent = agent(DqnConfig::new(2, 2));
        let err = agent
            .remember(Transition::new(vec![0.0; 2], 2, 0.0, vec![0.0; 2], false))
            .unwrap_err();
        assert!(matches!(err, AgentError::ActionOutOfRange { action: 2, .. }));
        assert!(agent.memory().is_empty());
    }

    #[test]
    fn replay_skips_until_enough_history() {
        let mut agent = agent(DqnConfig::new(2, 2));
        agent
            .remember(Transition::new(vec![0.0; 2], 0, 1.0, vec![0.0; 2], false))
            .expect("stored");
        assert_eq!(agent.replay(2).expect("skipped"), None);
        assert_eq!(agent.steps(), 0);
        assert_eq!(agent.epsilon(), 1.0);
    }
}
