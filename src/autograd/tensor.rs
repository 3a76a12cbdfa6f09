//! Tensor with shared gradient storage

use super::BackwardOp;
use ndarray::Array1;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Shared gradient slot of a tensor, captured by the op that produced it
pub type GradCell = Rc<RefCell<Option<Array1<f32>>>>;

/// Flat f32 tensor participating in the gradient tape.
///
/// Cloning is cheap: the data buffer, gradient cell and backward op are all
/// reference counted, so a clone held by a backward op observes the same
/// gradient as the original.
#[derive(Clone)]
pub struct Tensor {
    data: Rc<Array1<f32>>,
    grad: GradCell,
    backward_op: Option<Rc<dyn BackwardOp>>,
    requires_grad: bool,
}

impl Tensor {
    /// Create a tensor from an owned buffer
    pub fn new(data: Array1<f32>, requires_grad: bool) -> Self {
        Self {
            data: Rc::new(data),
            grad: Rc::new(RefCell::new(None)),
            backward_op: None,
            requires_grad,
        }
    }

    /// Create a tensor from a vector
    pub fn from_vec(data: Vec<f32>, requires_grad: bool) -> Self {
        Self::new(Array1::from(data), requires_grad)
    }

    /// Zero-filled tensor
    pub fn zeros(len: usize, requires_grad: bool) -> Self {
        Self::new(Array1::zeros(len), requires_grad)
    }

    /// Output of an op. `make_op` receives the output's gradient cell and is
    /// only called when the output takes part in the tape.
    pub fn from_op<B, F>(data: Array1<f32>, requires_grad: bool, make_op: F) -> Self
    where
        B: BackwardOp + 'static,
        F: FnOnce(GradCell) -> B,
    {
        let mut result = Self::new(data, requires_grad);
        if requires_grad {
            let op = make_op(result.grad_cell());
            result.set_backward_op(Rc::new(op));
        }
        result
    }

    /// Constant tensor (never receives gradients)
    pub fn constant(data: Array1<f32>) -> Self {
        Self::new(data, false)
    }

    pub fn data(&self) -> &Array1<f32> {
        &self.data
    }

    /// Contiguous view of the data
    pub fn as_slice(&self) -> &[f32] {
        self.data.as_slice().expect("tensor data is always contiguous")
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn requires_grad(&self) -> bool {
        self.requires_grad
    }

    /// Snapshot of the accumulated gradient
    pub fn grad(&self) -> Option<Array1<f32>> {
        self.grad.borrow().clone()
    }

    /// Shared handle to the gradient cell, captured by backward ops
    pub fn grad_cell(&self) -> GradCell {
        Rc::clone(&self.grad)
    }

    /// Overwrite the gradient
    pub fn set_grad(&self, grad: Array1<f32>) {
        *self.grad.borrow_mut() = Some(grad);
    }

    /// Add into the gradient, initializing it on first use
    pub fn accumulate_grad(&self, grad: Array1<f32>) {
        let mut cell = self.grad.borrow_mut();
        match cell.as_mut() {
            Some(existing) => *existing += &grad,
            None => *cell = Some(grad),
        }
    }

    pub fn set_backward_op(&mut self, op: Rc<dyn BackwardOp>) {
        self.backward_op = Some(op);
    }

    pub fn backward_op(&self) -> Option<Rc<dyn BackwardOp>> {
        self.backward_op.clone()
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("len", &self.len())
            .field("requires_grad", &self.requires_grad)
            .field("has_grad", &self.grad.borrow().is_some())
            .field("has_backward_op", &self.backward_op.is_some())
            .finish()
    }
}
