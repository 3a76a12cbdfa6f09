//! SafeTensors weight store
//!
//! Pretrained checkpoints are Keras ImageNet weights exported to SafeTensors
//! with Keras layer names (`Conv1/kernel`, `bn_Conv1/gamma`, ...) and Keras
//! memory layouts (HWIO kernels, `[in, out]` dense kernels).

use crate::trace::{TraceStep, TRACER};
use safetensors::tensor::{Dtype, TensorView};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use safetensors::SafeTensors;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Weight loading errors
#[derive(Debug, thiserror::Error)]
pub enum WeightError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("SafeTensors error: {0}")]
    SafeTensors(String),

    #[error("Missing weight tensor: {0}")]
    Missing(String),

    #[error("Shape mismatch for {name}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Unsupported architecture: {0}")]
    Architecture(String),

    #[error("Unsupported dtype {dtype} for {name}")]
    UnsupportedDtype { name: String, dtype: String },
}

/// Name and shape of one expected tensor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorSpec {
    pub name: String,
    pub shape: Vec<usize>,
}

impl TensorSpec {
    pub fn new(name: impl Into<String>, shape: &[usize]) -> Self {
        Self { name: name.into(), shape: shape.to_vec() }
    }

    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }
}

/// A decoded tensor: shape plus f32 values in row-major order
#[derive(Debug, Clone, PartialEq)]
pub struct StoredTensor {
    pub shape: Vec<usize>,
    pub values: Vec<f32>,
}

/// Named f32 tensors read from a checkpoint
#[derive(Debug, Clone, Default)]
pub struct WeightStore {
    tensors: BTreeMap<String, StoredTensor>,
}

impl WeightStore {
    /// Read and decode a `.safetensors` file
    pub fn load(path: &Path) -> Result<Self, WeightError> {
        let bytes = std::fs::read(path)
            .map_err(|source| WeightError::Io { path: path.to_path_buf(), source })?;
        TRACER.span(TraceStep::LoadWeights, path.display().to_string(), || {
            Self::from_bytes(&bytes)
        })
    }

    /// Decode an in-memory SafeTensors buffer
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WeightError> {
        let parsed =
            SafeTensors::deserialize(bytes).map_err(|e| WeightError::SafeTensors(e.to_string()))?;

        let mut tensors = BTreeMap::new();
        for (name, view) in parsed.tensors() {
            let values = tensor_to_f32_vec(&name, &view)?;
            tensors.insert(name, StoredTensor { shape: view.shape().to_vec(), values });
        }
        Ok(Self { tensors })
    }

    /// Build a store from already-decoded tensors
    pub fn from_tensors<I>(tensors: I) -> Self
    where
        I: IntoIterator<Item = (String, StoredTensor)>,
    {
        Self { tensors: tensors.into_iter().collect() }
    }

    /// Encode every tensor as F32 SafeTensors bytes
    pub fn to_safetensors_bytes(&self) -> Result<Vec<u8>, WeightError> {
        let raw: Vec<(&String, Vec<u8>, &Vec<usize>)> = self
            .tensors
            .iter()
            .map(|(name, t)| {
                (name, t.values.iter().flat_map(|v| v.to_le_bytes()).collect(), &t.shape)
            })
            .collect();

        let views = raw
            .iter()
            .map(|(name, bytes, shape)| {
                TensorView::new(Dtype::F32, shape.to_vec(), bytes)
                    .map(|view| (name.as_str(), view))
                    .map_err(|e| WeightError::SafeTensors(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        safetensors::serialize(views, None).map_err(|e| WeightError::SafeTensors(e.to_string()))
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tensors.contains_key(name)
    }

    /// Total number of scalars across all tensors (Keras `count_params`)
    pub fn num_params(&self) -> usize {
        self.tensors.values().map(|t| t.values.len()).sum()
    }

    /// Remove a tensor, checking its shape
    pub fn take(&mut self, name: &str, expected: &[usize]) -> Result<Vec<f32>, WeightError> {
        let tensor = self
            .tensors
            .remove(name)
            .ok_or_else(|| WeightError::Missing(name.to_string()))?;
        if tensor.shape != expected {
            return Err(WeightError::ShapeMismatch {
                name: name.to_string(),
                expected: expected.to_vec(),
                actual: tensor.shape,
            });
        }
        Ok(tensor.values)
    }

    /// Deterministic stand-in weights for the given tensors.
    ///
    /// Kernels are uniform in `±sqrt(3 / fan_in)`, batch-norm layers start as
    /// the identity and biases are zero, so activations stay bounded through
    /// deep networks.
    pub fn synthetic(specs: &[TensorSpec], seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let tensors = specs.iter().map(|spec| {
            let n = spec.numel();
            let values = match spec.name.rsplit('/').next().unwrap_or_default() {
                "kernel" | "depthwise_kernel" => {
                    let fan_in = if spec.name.ends_with("depthwise_kernel") {
                        spec.shape.iter().take(2).product::<usize>()
                    } else {
                        n / spec.shape.last().copied().unwrap_or(1).max(1)
                    };
                    let bound = (3.0 / fan_in.max(1) as f32).sqrt();
                    (0..n).map(|_| rng.random_range(-bound..bound)).collect()
                }
                "gamma" | "moving_variance" => vec![1.0; n],
                _ => vec![0.0; n],
            };
            (spec.name.clone(), StoredTensor { shape: spec.shape.clone(), values })
        });
        Self::from_tensors(tensors.collect::<Vec<_>>())
    }

    /// Names still held by the store
    pub fn remaining(&self) -> impl Iterator<Item = &str> {
        self.tensors.keys().map(String::as_str)
    }
}

fn tensor_to_f32_vec(name: &str, tensor: &TensorView<'_>) -> Result<Vec<f32>, WeightError> {
    let data = tensor.data();
    let values = match tensor.dtype() {
        Dtype::F32 => data
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect(),
        Dtype::F16 => data
            .chunks_exact(2)
            .map(|chunk| half::f16::from_le_bytes([chunk[0], chunk[1]]).to_f32())
            .collect(),
        Dtype::BF16 => data
            .chunks_exact(2)
            .map(|chunk| half::bf16::from_le_bytes([chunk[0], chunk[1]]).to_f32())
            .collect(),
        other => {
            return Err(WeightError::UnsupportedDtype {
                name: name.to_string(),
                dtype: format!("{other:?}"),
            })
        }
    };
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_store() -> WeightStore {
        WeightStore::from_tensors([
            (
                "dense/kernel".to_string(),
                StoredTensor { shape: vec![2, 3], values: vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0] },
            ),
            ("dense/bias".to_string(), StoredTensor { shape: vec![3], values: vec![0.5; 3] }),
        ])
    }

    #[test]
    fn test_num_params_counts_every_scalar() {
        assert_eq!(sample_store().num_params(), 9);
    }

    #[test]
    fn test_safetensors_bytes_reload() {
        let store = sample_store();
        let bytes = store.to_safetensors_bytes().expect("serialize should succeed");
        let mut reloaded = WeightStore::from_bytes(&bytes).expect("deserialize should succeed");
        assert_eq!(reloaded.len(), 2);
        assert_eq!(
            reloaded.take("dense/kernel", &[2, 3]).expect("tensor present"),
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]
        );
    }

    #[test]
    fn test_take_rejects_wrong_shape() {
        let mut store = sample_store();
        let err = store.take("dense/kernel", &[3, 2]).unwrap_err();
        assert!(matches!(err, WeightError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_take_missing_tensor() {
        let mut store = sample_store();
        let err = store.take("predictions/kernel", &[1]).unwrap_err();
        assert_eq!(err.to_string(), "Missing weight tensor: predictions/kernel");
    }

    #[test]
    fn test_take_removes_tensor() {
        let mut store = sample_store();
        store.take("dense/bias", &[3]).expect("tensor present");
        assert!(!store.contains("dense/bias"));
        assert_eq!(store.remaining().collect::<Vec<_>>(), vec!["dense/kernel"]);
    }

    #[test]
    fn test_f16_tensors_are_widened() {
        let halves: Vec<u8> =
            [1.5f32, -2.0].iter().flat_map(|v| half::f16::from_f32(*v).to_le_bytes()).collect();
        let view = TensorView::new(Dtype::F16, vec![2], &halves).expect("valid view");
        let bytes = safetensors::serialize([("w", view)], None).expect("serialize");
        let mut store = WeightStore::from_bytes(&bytes).expect("deserialize");
        assert_eq!(store.take("w", &[2]).expect("tensor present"), vec![1.5, -2.0]);
    }

    #[test]
    fn test_synthetic_weights_are_deterministic() {
        let specs = vec![
            TensorSpec::new("conv/kernel", &[3, 3, 4, 8]),
            TensorSpec::new("bn/gamma", &[8]),
            TensorSpec::new("bn/moving_mean", &[8]),
        ];
        let mut a = WeightStore::synthetic(&specs, 7);
        let mut b = WeightStore::synthetic(&specs, 7);
        assert_eq!(a.num_params(), 288 + 16);

        let ka = a.take("conv/kernel", &[3, 3, 4, 8]).expect("kernel present");
        let kb = b.take("conv/kernel", &[3, 3, 4, 8]).expect("kernel present");
        assert_eq!(ka, kb);
        let bound = (3.0f32 / 36.0).sqrt();
        assert!(ka.iter().all(|v| v.abs() <= bound));
        assert_eq!(a.take("bn/gamma", &[8]).expect("gamma present"), vec![1.0; 8]);
        assert_eq!(a.take("bn/moving_mean", &[8]).expect("mean present"), vec![0.0; 8]);
    }

    #[test]
    fn test_load_missing_file() {
        let err = WeightStore::load(Path::new("/nonexistent/model.safetensors")).unwrap_err();
        assert!(matches!(err, WeightError::Io { .. }));
    }

    #[test]
    fn test_garbage_bytes_rejected() {
        assert!(matches!(
            WeightStore::from_bytes(b"not a safetensors file"),
            Err(WeightError::SafeTensors(_))
        ));
    }
}
