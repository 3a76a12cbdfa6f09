//! Classifier abstraction over the supported ImageNet models

use super::layers::FeatureMap;
use super::mobilenet_v2::{MobileNetV2, MobileNetV2Plan};
use super::resnet50::{ResNet50, ResNet50Plan};
use super::weights::{TensorSpec, WeightError, WeightStore};
use crate::autograd::Tensor;
use crate::imaging::PreprocessMode;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Side length of the square network input
pub const INPUT_SIZE: usize = 224;

/// Supported pretrained models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ModelKind {
    #[serde(rename = "v2-0.5")]
    MobileNetV2Half,
    #[serde(rename = "v2-1.0")]
    MobileNetV2,
    #[serde(rename = "resnet50")]
    ResNet50,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [Self::MobileNetV2Half, Self::MobileNetV2, Self::ResNet50];

    /// Command-line name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MobileNetV2Half => "v2-0.5",
            Self::MobileNetV2 => "v2-1.0",
            Self::ResNet50 => "resnet50",
        }
    }

    /// MobileNetV2 width multiplier
    pub fn alpha(self) -> Option<f32> {
        match self {
            Self::MobileNetV2Half => Some(0.5),
            Self::MobileNetV2 => Some(1.0),
            Self::ResNet50 => None,
        }
    }

    /// Adversarial examples are generated against MobileNetV2 only
    pub fn is_attack_source(self) -> bool {
        self.alpha().is_some()
    }

    /// Checkpoint file name inside the models directory
    pub fn file_name(self) -> &'static str {
        match self {
            Self::MobileNetV2Half => "mobilenet_v2_0.5.safetensors",
            Self::MobileNetV2 => "mobilenet_v2_1.0.safetensors",
            Self::ResNet50 => "resnet50.safetensors",
        }
    }

    /// Every tensor a checkpoint for this model must contain
    pub fn manifest(self) -> Vec<TensorSpec> {
        match self.alpha() {
            Some(alpha) => MobileNetV2Plan::new(alpha).manifest(),
            None => ResNet50Plan::new().manifest(),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown model version '{s}'"))
    }
}

/// An ImageNet classifier that maps a preprocessed image to class probabilities
pub trait Classifier {
    fn kind(&self) -> ModelKind;

    /// Parameter count as reported by Keras `count_params()`
    fn num_params(&self) -> usize;

    /// Pixel preprocessing the weights were trained with
    fn preprocess_mode(&self) -> PreprocessMode;

    fn input_size(&self) -> usize {
        INPUT_SIZE
    }

    /// Softmax probabilities over the 1000 ImageNet classes.
    ///
    /// Gradients flow back to `image.tensor` when it requires grad.
    fn forward(&self, image: &FeatureMap) -> Tensor;
}

/// Build a classifier from an already loaded store
pub fn build_classifier(kind: ModelKind, store: &mut WeightStore) -> Result<Box<dyn Classifier>, WeightError> {
    let model: Box<dyn Classifier> = match kind {
        ModelKind::MobileNetV2Half | ModelKind::MobileNetV2 => Box::new(MobileNetV2::from_store(kind, store)?),
        ModelKind::ResNet50 => Box::new(ResNet50::from_store(store)?),
    };
    Ok(model)
}

/// Load `<models_dir>/<kind.file_name()>` and build the classifier
pub fn load_classifier(kind: ModelKind, models_dir: &Path) -> Result<Box<dyn Classifier>, WeightError> {
    let mut store = WeightStore::load(&models_dir.join(kind.file_name()))?;
    build_classifier(kind, &mut store)
}
