//! Property-based gradient checks for the image ops

use super::test_utils::{assert_grad_close, finite_difference};
use crate::autograd::{
    backward, conv2d, global_avg_pool, max_pool2d, mul, pad2d, sum, Conv2dGeometry, Padding,
    Tensor,
};
use proptest::prelude::*;

fn pseudo(seed: u32, len: usize, salt: usize) -> Vec<f32> {
    (0..len)
        .map(|i| (((seed as usize).wrapping_mul(31) + i * 17 + salt * 101) % 97) as f32 / 48.5 - 1.0)
        .collect()
}

/// Weighted sum of the op output, so every output element carries a distinct gradient
fn weighted_sum(out: &Tensor, salt: usize) -> Tensor {
    let w = Tensor::from_vec(pseudo(7, out.len(), salt), false);
    sum(&mul(out, &w))
}

fn geometry(c_in: usize, c_out: usize, size: usize, kernel: usize, stride: usize, groups: usize) -> Conv2dGeometry {
    Conv2dGeometry {
        in_channels: c_in,
        out_channels: c_out,
        in_height: size,
        in_width: size,
        kernel_h: kernel,
        kernel_w: kernel,
        stride,
        padding: Padding::same(size, size, kernel, stride),
        groups,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_conv2d_input_gradient(
        seed in 0u32..10_000,
        c_in in 1usize..4,
        c_out in 1usize..4,
        size in 3usize..7,
        kernel in prop::sample::select(vec![1usize, 3]),
        stride in 1usize..3,
    ) {
        let geom = geometry(c_in, c_out, size, kernel, stride, 1);
        let x = pseudo(seed, c_in * size * size, 1);
        let w = pseudo(seed, geom.weight_len(), 2);
        let b = pseudo(seed, c_out, 3);

        let input = Tensor::from_vec(x.clone(), true);
        let weight = Tensor::from_vec(w.clone(), false);
        let bias = Tensor::from_vec(b.clone(), false);
        let out = conv2d(&input, &weight, Some(&bias), geom);
        let mut loss = weighted_sum(&out, 4);
        backward(&mut loss, None);

        let numerical = finite_difference(
            |x_val| {
                let out = conv2d(
                    &Tensor::from_vec(x_val.to_vec(), false),
                    &Tensor::from_vec(w.clone(), false),
                    Some(&Tensor::from_vec(b.clone(), false)),
                    geom,
                );
                weighted_sum(&out, 4).data()[0]
            },
            &x,
            1e-2,
        );
        assert_grad_close(&input.grad().expect("gradient should be available"), &numerical, 0.05)?;
    }

    #[test]
    fn prop_conv2d_weight_and_bias_gradient(
        seed in 0u32..10_000,
        c_in in 1usize..3,
        c_out in 1usize..3,
        size in 3usize..6,
        stride in 1usize..3,
    ) {
        let geom = geometry(c_in, c_out, size, 3, stride, 1);
        let x = pseudo(seed, c_in * size * size, 5);
        let w = pseudo(seed, geom.weight_len(), 6);

        let input = Tensor::from_vec(x.clone(), false);
        let weight = Tensor::from_vec(w.clone(), true);
        let bias = Tensor::from_vec(vec![0.0; c_out], true);
        let out = conv2d(&input, &weight, Some(&bias), geom);
        let mut loss = weighted_sum(&out, 8);
        backward(&mut loss, None);

        let numerical = finite_difference(
            |w_val| {
                let out = conv2d(
                    &Tensor::from_vec(x.clone(), false),
                    &Tensor::from_vec(w_val.to_vec(), false),
                    None,
                    geom,
                );
                weighted_sum(&out, 8).data()[0]
            },
            &w,
            1e-2,
        );
        assert_grad_close(&weight.grad().expect("gradient should be available"), &numerical, 0.05)?;

        // Bias gradient is the per-channel sum of the output weights
        let plane = geom.out_height() * geom.out_width();
        let out_w = pseudo(7, out.len(), 8);
        let grad_b = bias.grad().expect("gradient should be available");
        for c in 0..c_out {
            let expected: f32 = out_w[c * plane..(c + 1) * plane].iter().sum();
            prop_assert!((grad_b[c] - expected).abs() < 1e-4);
        }
    }

    #[test]
    fn prop_depthwise_input_and_weight_gradient(
        seed in 0u32..10_000,
        channels in 2usize..5,
        size in 3usize..7,
        stride in 1usize..3,
    ) {
        let geom = geometry(channels, channels, size, 3, stride, channels);
        let x = pseudo(seed, channels * size * size, 9);
        let w = pseudo(seed, geom.weight_len(), 10);

        let input = Tensor::from_vec(x.clone(), true);
        let weight = Tensor::from_vec(w.clone(), true);
        let out = conv2d(&input, &weight, None, geom);
        let mut loss = weighted_sum(&out, 11);
        backward(&mut loss, None);

        let numerical_x = finite_difference(
            |x_val| {
                let out = conv2d(
                    &Tensor::from_vec(x_val.to_vec(), false),
                    &Tensor::from_vec(w.clone(), false),
                    None,
                    geom,
                );
                weighted_sum(&out, 11).data()[0]
            },
            &x,
            1e-2,
        );
        assert_grad_close(&input.grad().expect("gradient should be available"), &numerical_x, 0.05)?;

        let numerical_w = finite_difference(
            |w_val| {
                let out = conv2d(
                    &Tensor::from_vec(x.clone(), false),
                    &Tensor::from_vec(w_val.to_vec(), false),
                    None,
                    geom,
                );
                weighted_sum(&out, 11).data()[0]
            },
            &w,
            1e-2,
        );
        assert_grad_close(&weight.grad().expect("gradient should be available"), &numerical_w, 0.05)?;
    }

    #[test]
    fn prop_grouped_conv_input_gradient(seed in 0u32..10_000, size in 3usize..6) {
        // 4 -> 4 channels in 2 groups of 2
        let geom = geometry(4, 4, size, 3, 1, 2);
        let x = pseudo(seed, 4 * size * size, 12);
        let w = pseudo(seed, geom.weight_len(), 13);

        let input = Tensor::from_vec(x.clone(), true);
        let out = conv2d(&input, &Tensor::from_vec(w.clone(), false), None, geom);
        let mut loss = weighted_sum(&out, 14);
        backward(&mut loss, None);

        let numerical = finite_difference(
            |x_val| {
                let out = conv2d(
                    &Tensor::from_vec(x_val.to_vec(), false),
                    &Tensor::from_vec(w.clone(), false),
                    None,
                    geom,
                );
                weighted_sum(&out, 14).data()[0]
            },
            &x,
            1e-2,
        );
        assert_grad_close(&input.grad().expect("gradient should be available"), &numerical, 0.05)?;
    }

    #[test]
    fn prop_pad_pool_chain_gradient(seed in 0u32..10_000, channels in 1usize..3, size in 3usize..7) {
        // Distinct values keep max pooling away from ties
        let len = channels * size * size;
        let x: Vec<f32> = (0..len)
            .map(|i| ((i * 37 + seed as usize) % len) as f32 * 0.1 + 0.05)
            .collect();

        let run = |t: &Tensor| {
            let padded = pad2d(t, channels, size, size, Padding::uniform(1));
            let pooled = max_pool2d(&padded, channels, size + 2, size + 2, 3, 2);
            let out_side = (size + 2 - 3) / 2 + 1;
            global_avg_pool(&pooled, channels, out_side, out_side)
        };

        let input = Tensor::from_vec(x.clone(), true);
        let mut loss = weighted_sum(&run(&input), 15);
        backward(&mut loss, None);

        let numerical = finite_difference(
            |x_val| weighted_sum(&run(&Tensor::from_vec(x_val.to_vec(), false)), 15).data()[0],
            &x,
            1e-3,
        );
        assert_grad_close(&input.grad().expect("gradient should be available"), &numerical, 0.05)?;
    }
}
