//! Tape-based autograd engine
//!
//! Provides automatic differentiation over flat `f32` buffers. Image-shaped
//! ops (convolution, pooling) take their geometry explicitly, the same way
//! `matmul` takes `m, k, n`.
//!
//! ```
//! use perturbar::autograd::{backward, mul, sum, Tensor};
//!
//! let x = Tensor::from_vec(vec![1.0, 2.0], true);
//! let w = Tensor::from_vec(vec![3.0, 4.0], false);
//! let mut loss = sum(&mul(&x, &w));
//! backward(&mut loss, None);
//! assert_eq!(x.grad().unwrap().to_vec(), vec![3.0, 4.0]);
//! ```

mod backward;
mod ops;
mod tensor;

#[cfg(test)]
mod tests;

pub use backward::BackwardOp;
pub use ops::*;
pub use tensor::{GradCell, Tensor};

use crate::trace::{TraceStep, TRACER};

/// Seed `tensor` with `grad_output` (ones when `None`) and run every op on
/// its tape once, consumers before producers
pub fn backward(tensor: &mut Tensor, grad_output: Option<ndarray::Array1<f32>>) {
    let seed = grad_output.unwrap_or_else(|| ndarray::Array1::ones(tensor.len()));
    tensor.set_grad(seed);

    let Some(root) = tensor.backward_op() else { return };
    let order = backward::tape_order(&root);
    TRACER.span(TraceStep::Backward, format!("{} ops", order.len()), || {
        for op in &order {
            op.backward();
        }
    });
}
