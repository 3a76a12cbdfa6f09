//! Spatial ops on a single CHW image: zero padding, max pooling and global
//! average pooling

use super::basic::Unary;
use super::conv::Padding;
use crate::autograd::Tensor;
use ndarray::{s, Array1};

/// Zero-pad every channel
pub fn pad2d(input: &Tensor, channels: usize, height: usize, width: usize, padding: Padding) -> Tensor {
    assert_eq!(input.len(), channels * height * width, "pad2d input size mismatch");
    let out_h = height + padding.top + padding.bottom;
    let out_w = width + padding.left + padding.right;
    // flat offset of each input row inside the padded output
    let row_starts: Vec<usize> = (0..channels)
        .flat_map(|c| (0..height).map(move |y| (c * out_h + y + padding.top) * out_w + padding.left))
        .collect();

    let mut out = vec![0.0f32; channels * out_h * out_w];
    for (row, &start) in input.as_slice().chunks(width).zip(&row_starts) {
        out[start..start + width].copy_from_slice(row);
    }

    Tensor::from_op(Array1::from(out), input.requires_grad(), |out| Unary {
        input: input.clone(),
        out,
        grad: Box::new(move |upstream: &Array1<f32>, _: &Tensor| {
            row_starts
                .iter()
                .flat_map(|&start| upstream.slice(s![start..start + width]))
                .copied()
                .collect::<Array1<f32>>()
        }),
    })
}

/// Max pooling without padding (`padding="valid"`)
///
/// Returns the pooled tensor with `(h - kernel) / stride + 1` rows and columns.
pub fn max_pool2d(
    input: &Tensor,
    channels: usize,
    height: usize,
    width: usize,
    kernel: usize,
    stride: usize,
) -> Tensor {
    assert_eq!(input.len(), channels * height * width, "max_pool2d input size mismatch");
    assert!(height >= kernel && width >= kernel, "max_pool2d kernel larger than input");
    let out_h = (height - kernel) / stride + 1;
    let out_w = (width - kernel) / stride + 1;
    let src = input.as_slice();

    // flat index of the winning element of every window
    let mut winners = Vec::with_capacity(channels * out_h * out_w);
    for c in 0..channels {
        let plane = c * height * width;
        for oy in 0..out_h {
            for ox in 0..out_w {
                let window = (0..kernel).flat_map(|ky| {
                    let row = plane + (oy * stride + ky) * width + ox * stride;
                    row..row + kernel
                });
                let best = window.fold(None, |best: Option<usize>, idx| match best {
                    Some(b) if src[b] >= src[idx] => Some(b),
                    _ => Some(idx),
                });
                winners.push(best.unwrap_or(plane));
            }
        }
    }
    let pooled: Array1<f32> = winners.iter().map(|&idx| src[idx]).collect();

    Tensor::from_op(pooled, input.requires_grad(), |out| Unary {
        input: input.clone(),
        out,
        grad: Box::new(move |upstream: &Array1<f32>, input: &Tensor| {
            let mut grad = Array1::<f32>::zeros(input.len());
            for (&idx, &g) in winners.iter().zip(upstream) {
                grad[idx] += g;
            }
            grad
        }),
    })
}

/// Mean over the spatial dimensions, one value per channel
pub fn global_avg_pool(input: &Tensor, channels: usize, height: usize, width: usize) -> Tensor {
    assert_eq!(input.len(), channels * height * width, "global_avg_pool input size mismatch");
    let plane = height * width;
    let means: Array1<f32> = input
        .as_slice()
        .chunks(plane)
        .map(|channel| channel.iter().sum::<f32>() / plane as f32)
        .collect();

    Tensor::from_op(means, input.requires_grad(), |out| Unary {
        input: input.clone(),
        out,
        grad: Box::new(move |upstream: &Array1<f32>, _: &Tensor| {
            let share = 1.0 / plane as f32;
            upstream
                .iter()
                .flat_map(|&g| std::iter::repeat(g * share).take(plane))
                .collect::<Array1<f32>>()
        }),
    })
}
