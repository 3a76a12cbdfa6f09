//! Activations: ReLU, ReLU6 and softmax

use super::basic::Unary;
use crate::autograd::Tensor;
use ndarray::{Array1, Zip};

/// `max(x, 0)`
pub fn relu(a: &Tensor) -> Tensor {
    clamp(a, 0.0, f32::INFINITY)
}

/// `min(max(x, 0), 6)`, the MobileNetV2 activation
pub fn relu6(a: &Tensor) -> Tensor {
    clamp(a, 0.0, 6.0)
}

/// Gradient passes only where the input lies strictly inside `(lo, hi)`
fn clamp(a: &Tensor, lo: f32, hi: f32) -> Tensor {
    Tensor::from_op(a.data().mapv(|x| x.clamp(lo, hi)), a.requires_grad(), |out| Unary {
        input: a.clone(),
        out,
        grad: Box::new(move |upstream: &Array1<f32>, input: &Tensor| {
            let mut grad = upstream.clone();
            Zip::from(&mut grad).and(input.data()).for_each(|g, &x| {
                if x <= lo || x >= hi {
                    *g = 0.0;
                }
            });
            grad
        }),
    })
}

/// Numerically stable softmax over the whole tensor
pub fn softmax(a: &Tensor) -> Tensor {
    let peak = a.data().fold(f32::NEG_INFINITY, |m, &x| m.max(x));
    let exp = a.data().mapv(|x| (x - peak).exp());
    let probs = &exp / exp.sum();

    let y = probs.clone();
    Tensor::from_op(probs, a.requires_grad(), |out| Unary {
        input: a.clone(),
        out,
        // J = diag(y) - y yᵀ, so Jᵀ·g = y ⊙ (g - y·g)
        grad: Box::new(move |upstream: &Array1<f32>, _: &Tensor| {
            let projection = y.dot(upstream);
            &y * &(upstream - projection)
        }),
    })
}
