//! Pretrained ImageNet classifiers
//!
//! Networks are rebuilt from Keras checkpoints exported to SafeTensors.
//! Batch norm runs in inference mode and is folded into the convolutions at
//! load time, so a forward pass is convolutions, activations and adds only.

mod classifier;
pub mod layers;
pub mod mobilenet_v2;
pub mod resnet50;
mod weights;

pub use classifier::{build_classifier, load_classifier, Classifier, ModelKind, INPUT_SIZE};
pub use layers::FeatureMap;
pub use mobilenet_v2::MobileNetV2;
pub use resnet50::ResNet50;
pub use weights::{StoredTensor, TensorSpec, WeightError, WeightStore};
