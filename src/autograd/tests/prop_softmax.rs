//! Softmax on its own and chained into cross-entropy

use super::test_utils::{assert_grad_close, finite_difference};
use crate::autograd::{backward, categorical_cross_entropy, mul, softmax, sum, Tensor};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_weighted_softmax_matches_finite_difference(
        x in prop::collection::vec(-5.0f32..5.0, 2..30),
        scale in -2.0f32..2.0,
    ) {
        // ramp weights keep the objective from being constant
        let w: Vec<f32> = (0..x.len()).map(|i| scale * (i as f32 - 1.5)).collect();
        let weights = Tensor::from_vec(w.clone(), false);
        let a = Tensor::from_vec(x.clone(), true);
        let mut y = sum(&mul(&softmax(&a), &weights));
        backward(&mut y, None);

        let numerical = finite_difference(
            |v| softmax(&Tensor::from_vec(v.to_vec(), false)).data().dot(&ndarray::Array1::from(w.clone())),
            &x,
            1e-3,
        );
        assert_grad_close(&a.grad().unwrap(), &numerical, 0.01)?;
    }

    #[test]
    fn prop_softmax_outputs_sum_to_one(
        x in prop::collection::vec(-20.0f32..20.0, 1..100)
    ) {
        let a = Tensor::from_vec(x, false);
        let y = softmax(&a);

        let sum: f32 = y.data().iter().sum();
        prop_assert!((sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn prop_softmax_cross_entropy_gradient_is_p_minus_y(
        x in prop::collection::vec(-3.0f32..3.0, 2..12),
        label_seed in 0usize..1000,
    ) {
        let label = label_seed % x.len();
        let mut target = ndarray::Array1::zeros(x.len());
        target[label] = 1.0;

        let logits = Tensor::from_vec(x.clone(), true);
        let probs = softmax(&logits);
        let mut loss = categorical_cross_entropy(&probs, &target);
        backward(&mut loss, None);

        let grad = logits.grad().expect("gradient should be available");
        for i in 0..x.len() {
            let expected = probs.data()[i] - target[i];
            prop_assert!((grad[i] - expected).abs() < 1e-4,
                "index {}: grad={}, p-y={}", i, grad[i], expected);
        }
    }
}
