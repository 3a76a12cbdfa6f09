//! Dense matrix product on the tape
//!
//! Flat tensors are viewed as row-major matrices and multiplied through
//! ndarray's `general_mat_mul`. Transposed operands are strided views, never
//! copies.

use crate::autograd::{BackwardOp, GradCell, Tensor};
use crate::trace::{TraceStep, TRACER};
use ndarray::{linalg::general_mat_mul, Array1, ArrayView2, ArrayViewMut2};

/// View a row-major slice as a `rows x cols` matrix
pub(crate) fn mat(data: &[f32], rows: usize, cols: usize) -> ArrayView2<'_, f32> {
    ArrayView2::from_shape((rows, cols), data).expect("slice length must equal rows * cols")
}

/// `out = a @ b + beta * out`, with `out` a row-major slice of matching size
pub(crate) fn gemm(a: ArrayView2<'_, f32>, b: ArrayView2<'_, f32>, beta: f32, out: &mut [f32]) {
    let (m, k) = a.dim();
    let n = b.ncols();
    TRACER.start(TraceStep::Matmul);
    let mut c = ArrayViewMut2::from_shape((m, n), out).expect("output length must equal m * n");
    general_mat_mul(1.0, &a, &b, beta, &mut c);
    TRACER.end(TraceStep::Matmul, format!("{m}x{k}x{n}"));
}

/// `a` (m×k) times `b` (k×n), both flattened row-major; the result is m×n
pub fn matmul(a: &Tensor, b: &Tensor, m: usize, k: usize, n: usize) -> Tensor {
    assert_eq!(a.len(), m * k, "matmul: left operand is not {m}x{k}");
    assert_eq!(b.len(), k * n, "matmul: right operand is not {k}x{n}");

    let mut product = vec![0.0f32; m * n];
    gemm(mat(a.as_slice(), m, k), mat(b.as_slice(), k, n), 0.0, &mut product);

    Tensor::from_op(Array1::from(product), a.requires_grad() || b.requires_grad(), |out| {
        MatmulBackward { lhs: a.clone(), rhs: b.clone(), dims: (m, k, n), out }
    })
}

struct MatmulBackward {
    lhs: Tensor,
    rhs: Tensor,
    dims: (usize, usize, usize),
    out: GradCell,
}

impl BackwardOp for MatmulBackward {
    fn backward(&self) {
        let out = self.out.borrow();
        let Some(upstream) = out.as_ref() else { return };
        let (m, k, n) = self.dims;
        let upstream = upstream.view().into_shape_with_order((m, n)).expect("upstream gradient is m x n");

        if self.lhs.requires_grad() {
            // dL/dA = dL/dC · Bᵀ
            let mut grad = vec![0.0f32; m * k];
            gemm(upstream.view(), mat(self.rhs.as_slice(), k, n).t(), 0.0, &mut grad);
            self.lhs.accumulate_grad(Array1::from(grad));
        }
        if self.rhs.requires_grad() {
            // dL/dB = Aᵀ · dL/dC
            let mut grad = vec![0.0f32; k * n];
            gemm(mat(self.lhs.as_slice(), m, k).t(), upstream.view(), 0.0, &mut grad);
            self.rhs.accumulate_grad(Array1::from(grad));
        }
    }

    fn inputs(&self) -> Vec<&Tensor> {
        vec![&self.lhs, &self.rhs]
    }
}
