//! Target estimator plumbing for bootstrapped value learning.
//!
//! The target copy lives on the inner (non-differentiable) backend, so every
//! value it produces is a constant with respect to the online parameters.
//! [`StopGradient`] is the only way such a value re-enters the autodiff graph.

use burn::module::{AutodiffModule, Module, ModuleMapper, Param};
use burn::tensor::Tensor;
use burn::tensor::backend::{AutodiffBackend, Backend};

use super::encoding::tensor_to_vec;

/// A tensor computed outside the autodiff graph.
pub struct StopGradient<B: AutodiffBackend, const D: usize> {
    inner: Tensor<B::InnerBackend, D>,
}

impl<B: AutodiffBackend, const D: usize> StopGradient<B, D> {
    pub fn new(inner: Tensor<B::InnerBackend, D>) -> Self {
        Self { inner }
    }

    /// Lifts the value into the training backend as a leaf without gradient.
    pub fn lift(self) -> Tensor<B, D> {
        Tensor::from_inner(self.inner)
    }
}

/// Wholesale copy of the online parameters into a fresh target module.
pub fn hard_sync<B, M>(online: &M) -> M::InnerModule
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    online.valid()
}

/// Collects every float parameter in traversal order.
struct ParamExtractor {
    values: Vec<f32>,
}

impl<B: Backend> ModuleMapper<B> for ParamExtractor {
    fn map_float<const D: usize>(&mut self, param: Param<Tensor<B, D>>) -> Param<Tensor<B, D>> {
        self.values.extend(tensor_to_vec(param.val()));
        param
    }
}

/// Flattens all float parameters of a module into one vector.
pub fn flatten_parameters<B: Backend, M: Module<B>>(module: &M) -> Vec<f32> {
    let mut extractor = ParamExtractor { values: Vec::new() };
    let _ = module.clone().map(&mut extractor);
    extractor.values
}

pub fn parameters_equal<B: Backend, M: Module<B>>(left: &M, right: &M) -> bool {
    flatten_parameters::<B, M>(left) == flatten_parameters::<B, M>(right)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::network::Mlp;
    use burn_autodiff::Autodiff;
    use burn_ndarray::NdArray;

    type Train = Autodiff<NdArray<f32>>;
    type Inner = NdArray<f32>;

    #[test]
    fn hard_sync_copies_every_parameter() {
        let device = Default::default();
        let online = Mlp::<Train>::new(3, 8, 2, 2, &device);
        let target = hard_sync::<Train, _>(&online);
        assert!(parameters_equal::<Inner, _>(&online.valid(), &target));
    }

    #[test]
    fn independent_modules_differ() {
        let device = Default::default();
        let left = Mlp::<Inner>::new(3, 8, 2, 2, &device);
        let right = Mlp::<Inner>::new(3, 8, 2, 2, &device);
        assert!(!parameters_equal::<Inner, _>(&left, &right));
    }

    #[test]
    fn lifted_values_carry_no_gradient() {
        let device = Default::default();
        let constant = StopGradient::<Train, 1>::new(Tensor::<Inner, 1>::ones([3], &device));
        let lifted = constant.lift();
        assert!(!lifted.is_require_grad());
    }
}
