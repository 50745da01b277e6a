use std::fs;
use std::path::Path;

use burn::module::Module;
use burn::record::{BinBytesRecorder, FullPrecisionSettings, Recorder};
use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};

use crate::error::AgentError;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckpointKind {
    QNetwork,
    ActorCritic,
}

/// Architecture description stored next to the weights.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    pub kind: CheckpointKind,
    pub state_size: usize,
    pub action_size: usize,
    pub hidden: usize,
    pub depth: usize,
}

impl CheckpointMetadata {
    fn describe(&self) -> String {
        format!(
            "{:?} {}x{} (hidden {}, depth {})",
            self.kind, self.state_size, self.action_size, self.hidden, self.depth
        )
    }
}

#[derive(Serialize, Deserialize)]
struct Checkpoint {
    metadata: CheckpointMetadata,
    weights: Vec<u8>,
}

/// Serializes a module's parameters together with its metadata.
pub fn encode<B: Backend, M: Module<B>>(
    module: &M,
    metadata: CheckpointMetadata,
) -> Result<Vec<u8>, AgentError> {
    let weights = BinBytesRecorder::<FullPrecisionSettings>::new()
        .record(module.clone().into_record(), ())
        .map_err(|err| AgentError::Checkpoint(err.to_string()))?;
    let checkpoint = Checkpoint { metadata, weights };
    bincode::serde::encode_to_vec(&checkpoint, bincode::config::standard())
        .map_err(|err| AgentError::Checkpoint(err.to_string()))
}

/// Restores parameters into `module` after checking the stored architecture
/// against `expected`. Nothing is loaded on mismatch.
pub fn decode<B: Backend, M: Module<B>>(
    module: M,
    bytes: &[u8],
    expected: &CheckpointMetadata,
    device: &B::Device,
) -> Result<M, AgentError> {
    let (checkpoint, _): (Checkpoint, usize) =
        bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|err| AgentError::Checkpoint(err.to_string()))?;
    if &checkpoint.metadata != expected {
        return Err(AgentError::CheckpointMismatch {
            expected: expected.describe(),
            found: checkpoint.metadata.describe(),
        });
    }
    let record = BinBytesRecorder::<FullPrecisionSettings>::new()
        .load::<M::Record>(checkpoint.weights, device)
        .map_err(|err| AgentError::Checkpoint(err.to_string()))?;
    Ok(module.load_record(record))
}

pub fn write(path: &Path, bytes: &[u8]) -> Result<(), AgentError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, bytes)?;
    Ok(())
}

pub fn read(path: &Path) -> Result<Vec<u8>, AgentError> {
    Ok(fs::read(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::network::Mlp;
    use crate::ml::target::parameters_equal;
    use burn_ndarray::NdArray;

    type Backend = NdArray<f32>;

    fn metadata(hidden: usize) -> CheckpointMetadata {
        CheckpointMetadata {
            kind: CheckpointKind::QNetwork,
            state_size: 3,
            action_size: 2,
            hidden,
            depth: 2,
        }
    }

    #[test]
    fn decode_restores_identical_parameters() {
        let device = Default::default();
        let source = Mlp::<Backend>::new(3, 8, 2, 2, &device);
        let bytes = encode::<Backend, _>(&source, metadata(8)).expect("encode");
        let fresh = Mlp::<Backend>::new(3, 8, 2, 2, &device);
        let restored = decode::<Backend, _>(fresh, &bytes, &metadata(8), &device).expect("decode");
        assert!(parameters_equal::<Backend, _>(&source, &restored));
    }

    #[test]
    fn decode_rejects_other_architecture() {
        let device = Default::default();
        let source = Mlp::<Backend>::new(3, 8, 2, 2, &device);
        let bytes = encode::<Backend, _>(&source, metadata(8)).expect("encode");
        let fresh = Mlp::<Backend>::new(3, 16, 2, 2, &device);
        let err = decode::<Backend, _>(fresh, &bytes, &metadata(16), &device).unwrap_err();
        assert!(matches!(err, AgentError::CheckpointMismatch { .. }));
    }

    #[test]
    fn decode_rejects_garbage() {
        let device = Default::default();
        let fresh = Mlp::<Backend>::new(3, 8, 2, 2, &device);
        let err = decode::<Backend, _>(fresh, &[1, 2, 3], &metadata(8), &device).unwrap_err();
        assert!(matches!(err, AgentError::Checkpoint(_)));
    }
}
