//! Weight-state persistence
//!
//! Named f32 tensors saved and loaded as SafeTensors. This is the
//! weight-persistence collaborator of the model packager: `save_state` and
//! `load_state` are the only two operations the rest of the crate needs.

use std::collections::HashMap;
use std::path::Path;

use safetensors::tensor::{Dtype, TensorView};

use crate::{Error, Result};

/// One named tensor of the model state.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorState {
    pub name: String,
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl TensorState {
    pub fn new(name: impl Into<String>, shape: Vec<usize>, data: Vec<f32>) -> Self {
        Self {
            name: name.into(),
            shape,
            data,
        }
    }
}

/// Ordered collection of named tensors.
pub type StateDict = Vec<TensorState>;

/// Save a state dict to a SafeTensors file.
pub fn save_state(state: &StateDict, path: &Path) -> Result<()> {
    let tensor_bytes: Vec<(String, Vec<u8>, Vec<usize>)> = state
        .iter()
        .map(|t| {
            let bytes: Vec<u8> = bytemuck::cast_slice(&t.data).to_vec();
            (t.name.clone(), bytes, t.shape.clone())
        })
        .collect();

    let views: Vec<(&str, TensorView<'_>)> = tensor_bytes
        .iter()
        .map(|(name, bytes, shape)| {
            let view = TensorView::new(Dtype::F32, shape.clone(), bytes)
                .map_err(|e| Error::Serialization(format!("Invalid tensor '{name}': {e}")))?;
            Ok((name.as_str(), view))
        })
        .collect::<Result<_>>()?;

    let serialized = safetensors::serialize(views, &None)
        .map_err(|e| Error::Serialization(format!("SafeTensors serialization failed: {e}")))?;
    std::fs::write(path, serialized)?;
    Ok(())
}

/// Load a state dict from a SafeTensors file.
pub fn load_state(path: &Path) -> Result<StateDict> {
    let data = std::fs::read(path)?;
    let tensors = safetensors::SafeTensors::deserialize(&data)
        .map_err(|e| Error::Serialization(format!("SafeTensors parsing failed: {e}")))?;

    let mut state: StateDict = tensors
        .tensors()
        .into_iter()
        .map(|(name, view)| {
            let values: &[f32] = bytemuck::cast_slice(view.data());
            TensorState::new(name, view.shape().to_vec(), values.to_vec())
        })
        .collect();
    // SafeTensors iteration order is not the write order.
    state.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(state)
}

/// Index a state dict by tensor name.
pub fn by_name(state: &StateDict) -> HashMap<&str, &TensorState> {
    state.iter().map(|t| (t.name.as_str(), t)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_state() -> StateDict {
        vec![
            TensorState::new("head.weight", vec![4], vec![0.1, -0.2, 0.3, 0.4]),
            TensorState::new("head.bias", vec![1], vec![0.05]),
            TensorState::new("backbone.embedding", vec![2, 2], vec![1.0, 2.0, 3.0, 4.0]),
        ]
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.safetensors");

        let original = sample_state();
        save_state(&original, &path).unwrap();
        let loaded = load_state(&path).unwrap();

        let index = by_name(&loaded);
        for tensor in &original {
            let restored = index.get(tensor.name.as_str()).unwrap();
            assert_eq!(restored.shape, tensor.shape);
            assert_eq!(restored.data, tensor.data);
        }
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(load_state(Path::new("/nonexistent/state.safetensors")).is_err());
    }

    #[test]
    fn test_load_invalid_data_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.safetensors");
        std::fs::write(&path, b"not a safetensors file").unwrap();
        assert!(load_state(&path).is_err());
    }

    #[test]
    fn test_by_name_lookup() {
        let state = sample_state();
        let index = by_name(&state);
        assert_eq!(index.get("head.bias").unwrap().data, vec![0.05]);
        assert!(!index.contains_key("missing"));
    }
}
