use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor, TensorData};

/// Stacks equally sized feature rows into a `[rows, width]` tensor.
pub fn rows_tensor<'a, B, I>(rows: I, width: usize, device: &B::Device) -> Tensor<B, 2>
where
    B: Backend,
    I: IntoIterator<Item = &'a [f32]>,
{
    let mut values = Vec::new();
    let mut count = 0usize;
    for row in rows {
        debug_assert_eq!(row.len(), width);
        values.extend_from_slice(row);
        count += 1;
    }
    Tensor::from_data(TensorData::new(values, [count, width]), device)
}

pub fn state_tensor<B: Backend>(state: &[f32], device: &B::Device) -> Tensor<B, 2> {
    rows_tensor::<B, _>([state], state.len(), device)
}

pub fn scalar_tensor<B: Backend>(values: Vec<f32>, device: &B::Device) -> Tensor<B, 1> {
    let len = values.len();
    Tensor::from_data(TensorData::new(values, [len]), device)
}

/// Column of action indices shaped `[batch, 1]` for `gather`.
pub fn action_tensor<B: Backend>(actions: &[usize], device: &B::Device) -> Tensor<B, 2, Int> {
    let indices: Vec<i64> = actions.iter().map(|&action| action as i64).collect();
    let len = indices.len();
    Tensor::from_data(TensorData::new(indices, [len, 1]), device)
}

pub fn tensor_to_vec<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Vec<f32> {
    tensor.into_data().to_vec::<f32>().unwrap_or_default()
}

pub fn tensor_to_f32<B: Backend>(tensor: Tensor<B, 1>) -> f32 {
    tensor_to_vec(tensor).pop().unwrap_or(f32::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type Backend = NdArray<f32>;

    #[test]
    fn rows_are_stacked_in_order() {
        let device = Default::default();
        let a = [1.0, 2.0];
        let b = [3.0, 4.0];
        let tensor = rows_tensor::<Backend, _>([&a[..], &b[..]], 2, &device);
        assert_eq!(tensor.dims(), [2, 2]);
        assert_eq!(tensor_to_vec(tensor), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn action_column_gathers_selected_entries() {
        let device = Default::default();
        let values = rows_tensor::<Backend, _>([&[0.1, 0.9][..], &[0.7, 0.3][..]], 2, &device);
        let picked = values.gather(1, action_tensor::<Backend>(&[1, 0], &device));
        assert_eq!(tensor_to_vec(picked), vec![0.9, 0.7]);
    }
}
