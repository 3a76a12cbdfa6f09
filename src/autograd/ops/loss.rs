//! Classification loss with Keras `CategoricalCrossentropy` semantics

use super::basic::Unary;
use crate::autograd::Tensor;
use ndarray::{Array1, Zip};

/// Probability clip applied before the logarithm (Keras backend epsilon)
pub const PROB_EPSILON: f32 = 1e-7;

fn in_clip_range(p: f32) -> bool {
    p > PROB_EPSILON && p < 1.0 - PROB_EPSILON
}

/// Cross-entropy between a probability vector and a target distribution
///
/// `loss = -Σ target · ln(clip(probs, ε, 1 - ε))`. Probabilities outside the
/// clip range receive zero gradient, matching `clip_by_value`.
pub fn categorical_cross_entropy(probs: &Tensor, target: &Array1<f32>) -> Tensor {
    assert_eq!(probs.len(), target.len(), "cross entropy length mismatch");

    let loss = Zip::from(probs.data())
        .and(target)
        .fold(0.0f32, |acc, &p, &t| acc - t * p.clamp(PROB_EPSILON, 1.0 - PROB_EPSILON).ln());

    let target = target.clone();
    Tensor::from_op(Array1::from_elem(1, loss), probs.requires_grad(), |out| Unary {
        input: probs.clone(),
        out,
        grad: Box::new(move |upstream: &Array1<f32>, probs: &Tensor| {
            let scale = upstream[0];
            Zip::from(probs.data())
                .and(&target)
                .map_collect(|&p, &t| if in_clip_range(p) { -scale * t / p } else { 0.0 })
        }),
    })
}
