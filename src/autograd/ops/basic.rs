//! Elementwise arithmetic and reductions on the tape

use crate::autograd::{BackwardOp, GradCell, Tensor};
use ndarray::Array1;

#[derive(Clone, Copy)]
enum Elementwise {
    Add,
    Mul,
}

/// `a + b`, elementwise
pub fn add(a: &Tensor, b: &Tensor) -> Tensor {
    elementwise(Elementwise::Add, a, b)
}

/// `a * b`, elementwise
pub fn mul(a: &Tensor, b: &Tensor) -> Tensor {
    elementwise(Elementwise::Mul, a, b)
}

fn elementwise(kind: Elementwise, a: &Tensor, b: &Tensor) -> Tensor {
    assert_eq!(a.len(), b.len(), "elementwise op on tensors of different length");
    let data = match kind {
        Elementwise::Add => a.data() + b.data(),
        Elementwise::Mul => a.data() * b.data(),
    };
    Tensor::from_op(data, a.requires_grad() || b.requires_grad(), |out| ElementwiseBackward {
        kind,
        lhs: a.clone(),
        rhs: b.clone(),
        out,
    })
}

struct ElementwiseBackward {
    kind: Elementwise,
    lhs: Tensor,
    rhs: Tensor,
    out: GradCell,
}

impl BackwardOp for ElementwiseBackward {
    fn backward(&self) {
        let out = self.out.borrow();
        let Some(upstream) = out.as_ref() else { return };
        // product rule: each side sees the other operand
        let (to_lhs, to_rhs) = match self.kind {
            Elementwise::Add => (upstream.clone(), upstream.clone()),
            Elementwise::Mul => (upstream * self.rhs.data(), upstream * self.lhs.data()),
        };
        if self.lhs.requires_grad() {
            self.lhs.accumulate_grad(to_lhs);
        }
        if self.rhs.requires_grad() {
            self.rhs.accumulate_grad(to_rhs);
        }
    }

    fn inputs(&self) -> Vec<&Tensor> {
        vec![&self.lhs, &self.rhs]
    }
}

/// Multiply every element by a constant
pub fn scale(a: &Tensor, factor: f32) -> Tensor {
    Tensor::from_op(a.data() * factor, a.requires_grad(), |out| Unary {
        input: a.clone(),
        out,
        grad: Box::new(move |upstream: &Array1<f32>, _: &Tensor| upstream * factor),
    })
}

/// Sum of all elements as a one-element tensor
pub fn sum(a: &Tensor) -> Tensor {
    let total = Array1::from_elem(1, a.data().sum());
    Tensor::from_op(total, a.requires_grad(), |out| Unary {
        input: a.clone(),
        out,
        grad: Box::new(|upstream: &Array1<f32>, input: &Tensor| {
            Array1::from_elem(input.len(), upstream[0])
        }),
    })
}

pub(super) type UnaryGrad = Box<dyn Fn(&Array1<f32>, &Tensor) -> Array1<f32>>;

/// Single-input op whose input gradient is a function of the upstream
/// gradient and the input
pub(super) struct Unary {
    pub(super) input: Tensor,
    pub(super) out: GradCell,
    pub(super) grad: UnaryGrad,
}

impl BackwardOp for Unary {
    fn backward(&self) {
        let out = self.out.borrow();
        if let (Some(upstream), true) = (out.as_ref(), self.input.requires_grad()) {
            self.input.accumulate_grad((self.grad)(upstream, &self.input));
        }
    }

    fn inputs(&self) -> Vec<&Tensor> {
        vec![&self.input]
    }
}
