//! Test utilities for gradient checking

use proptest::prelude::*;

/// Central-difference numerical gradient of `f` at `x`
pub fn finite_difference<F>(f: F, x: &[f32], h: f32) -> Vec<f32>
where
    F: Fn(&[f32]) -> f32,
{
    let mut shifted = x.to_vec();
    (0..x.len())
        .map(|i| {
            shifted[i] = x[i] + h;
            let f_plus = f(&shifted);
            shifted[i] = x[i] - h;
            let f_minus = f(&shifted);
            shifted[i] = x[i];
            (f_plus - f_minus) / (2.0 * h)
        })
        .collect()
}

/// Fail the proptest case if any analytical/numerical pair differs by more than `tol`
pub fn assert_grad_close(
    analytical: &ndarray::Array1<f32>,
    numerical: &[f32],
    tol: f32,
) -> Result<(), TestCaseError> {
    prop_assert_eq!(analytical.len(), numerical.len());
    for (i, (a, n)) in analytical.iter().zip(numerical).enumerate() {
        prop_assert!((a - n).abs() < tol, "index {}: analytical={}, numerical={}", i, a, n);
    }
    Ok(())
}
