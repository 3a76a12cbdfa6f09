//! Adversarial example generation
//!
//! FGSM perturbs an image by `epsilon * sign(∇x loss)`, where the loss is
//! taken against the true class or, when one is given, the target label. The
//! result is clipped back to the model's `[-1, 1]` input range.

mod fgsm;
mod report;

pub use fgsm::{
    classify, create_adversarial_pattern, linf_distance, one_hot, FgsmAttack, PIXEL_MAX, PIXEL_MIN,
};
pub use report::{is_fooled, AttackReport, TransferResult};

use crate::imaging;
use crate::labels::{ImagenetLabels, Prediction};
use crate::nn::Classifier;
use std::path::Path;

/// Classify a saved adversarial example with another model
///
/// The image is re-read from disk and preprocessed the way `model` expects,
/// so JPEG quantization is part of what has to transfer.
pub fn evaluate_transfer(
    model: &dyn Classifier,
    path: &Path,
    labels: &ImagenetLabels,
) -> crate::Result<Prediction> {
    let image = imaging::load_input(path, model.input_size(), model.preprocess_mode())?;
    classify(model, &image, labels)
}
