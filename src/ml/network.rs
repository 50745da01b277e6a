use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::tensor::Tensor;
use burn::tensor::activation::{relu, softmax};
use burn::tensor::backend::Backend;

pub const DEFAULT_HIDDEN: usize = 64;
pub const DEFAULT_STACK: usize = 2;

/// Fully connected ReLU stack followed by a linear head.
#[derive(Module, Debug)]
pub struct Mlp<B: Backend> {
    stack: Vec<Linear<B>>,
    output: Linear<B>,
}

impl<B: Backend> Mlp<B> {
    pub fn new(
        input: usize,
        hidden: usize,
        stack_depth: usize,
        output: usize,
        device: &B::Device,
    ) -> Self {
        let mut stack = Vec::with_capacity(stack_depth);
        let mut input_size = input;
        for _ in 0..stack_depth {
            stack.push(LinearConfig::new(input_size, hidden).init(device));
            input_size = hidden;
        }
        let output = LinearConfig::new(input_size, output).init(device);
        Self { stack, output }
    }

    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let mut activations = input;
        for layer in &self.stack {
            activations = relu(layer.forward(activations));
        }
        self.output.forward(activations)
    }
}

/// Action-value estimator: one output per discrete action.
pub type QNetwork<B> = Mlp<B>;

/// Separate actor and critic towers sharing one parameter set.
#[derive(Module, Debug)]
pub struct ActorCritic<B: Backend> {
    actor: Mlp<B>,
    critic: Mlp<B>,
}

impl<B: Backend> ActorCritic<B> {
    pub fn new(state_size: usize, action_size: usize, hidden: usize, device: &B::Device) -> Self {
        Self {
            actor: Mlp::new(state_size, hidden, 1, action_size, device),
            critic: Mlp::new(state_size, hidden, 1, 1, device),
        }
    }

    /// Returns action probabilities `[batch, actions]` and state values `[batch]`.
    pub fn forward(&self, states: Tensor<B, 2>) -> (Tensor<B, 2>, Tensor<B, 1>) {
        let probs = softmax(self.actor.forward(states.clone()), 1);
        (probs, self.values(states))
    }

    pub fn values(&self, states: Tensor<B, 2>) -> Tensor<B, 1> {
        self.critic.forward(states).flatten(0, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type Backend = NdArray<f32>;

    #[test]
    fn mlp_forward_produces_expected_shape() {
        let device = Default::default();
        let network = Mlp::<Backend>::new(5, 16, DEFAULT_STACK, 4, &device);
        let batch = Tensor::<Backend, 2>::zeros([3, 5], &device);
        assert_eq!(network.forward(batch).dims(), [3, 4]);
    }

    #[test]
    fn actor_critic_outputs_distribution_and_value() {
        let device = Default::default();
        let model = ActorCritic::<Backend>::new(5, 4, 16, &device);
        let batch = Tensor::<Backend, 2>::ones([2, 5], &device);
        let (probs, values) = model.forward(batch);
        assert_eq!(probs.dims(), [2, 4]);
        assert_eq!(values.dims(), [2]);
        let rows: Vec<f32> = probs.sum_dim(1).into_data().to_vec().expect("row sums");
        for total in rows {
            assert!((total - 1.0).abs() < 1e-5);
        }
    }
}
