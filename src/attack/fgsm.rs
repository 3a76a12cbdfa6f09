//! Fast Gradient Sign Method

use crate::autograd::{backward, categorical_cross_entropy, Tensor};
use crate::labels::{ImagenetLabels, Prediction};
use crate::nn::{Classifier, FeatureMap};
use crate::trace::{TraceStep, TRACER};
use ndarray::Array1;

/// Valid range of a MobileNetV2 input pixel
pub const PIXEL_MIN: f32 = -1.0;
pub const PIXEL_MAX: f32 = 1.0;

/// One-hot encoding of `index` over `classes` entries
pub fn one_hot(index: usize, classes: usize) -> Array1<f32> {
    assert!(index < classes, "class {index} out of range for {classes} classes");
    let mut v = Array1::zeros(classes);
    v[index] = 1.0;
    v
}

/// Element-wise sign with `sign(0) = 0`
fn sign(v: f32) -> f32 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Run the model and decode its top-1 class
pub fn classify(
    model: &dyn Classifier,
    image: &FeatureMap,
    labels: &ImagenetLabels,
) -> crate::Result<Prediction> {
    let probs = TRACER.span(TraceStep::Forward, model.kind().to_string(), || model.forward(image));
    Ok(labels.decode(probs.as_slice())?)
}

/// Sign of the gradient of the cross-entropy loss w.r.t. the input pixels
///
/// `label` is a probability vector over the model's classes (usually
/// [`one_hot`]). The input is copied into a fresh leaf tensor, so `image`
/// itself is never attached to the tape.
pub fn create_adversarial_pattern(
    model: &dyn Classifier,
    image: &FeatureMap,
    label: &Array1<f32>,
) -> Array1<f32> {
    let input = Tensor::new(image.tensor.data().clone(), true);
    let watched = image.with_tensor(input.clone());

    let probs = TRACER.span(TraceStep::Forward, format!("{} (tape)", model.kind()), || {
        model.forward(&watched)
    });
    let mut loss = categorical_cross_entropy(&probs, label);
    backward(&mut loss, None);

    // No gradient at all means the loss was saturated; that is a zero pattern.
    input.grad().map_or_else(|| Array1::zeros(input.len()), |g| g.mapv(sign))
}

/// FGSM perturbation step
///
/// A target label only changes which one-hot label the pattern was computed
/// against; the step is always taken along the pattern.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FgsmAttack {
    pub epsilon: f32,
}

impl FgsmAttack {
    pub fn new(epsilon: f32) -> Self {
        Self { epsilon }
    }

    /// `clip(x + epsilon * signed_grad, -1, 1)`
    pub fn perturb(&self, image: &FeatureMap, signed_grad: &Array1<f32>) -> FeatureMap {
        assert_eq!(image.tensor.len(), signed_grad.len(), "gradient size mismatch");
        let mut adv = image.tensor.data() + &(signed_grad * self.epsilon);
        adv.mapv_inplace(|v| v.clamp(PIXEL_MIN, PIXEL_MAX));
        image.with_tensor(Tensor::new(adv, false))
    }
}

/// Largest absolute per-pixel difference
pub fn linf_distance(a: &FeatureMap, b: &FeatureMap) -> f32 {
    a.tensor
        .as_slice()
        .iter()
        .zip(b.tensor.as_slice())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f32::max)
}
