//! 2-D convolution autograd operation
//!
//! Single image, CHW layout, weights in OIHW (`[out][in / groups][kh][kw]`).
//! Dense and grouped convolutions lower to im2col + GEMM; depthwise
//! convolutions (one input and one output channel per group) run a direct
//! loop instead.

use super::matmul::{gemm, mat};
use crate::autograd::{BackwardOp, GradCell, Tensor};
use crate::trace::{TraceStep, TRACER};
use ndarray::Array1;

/// Zero padding applied to each side of the spatial dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Padding {
    pub top: usize,
    pub bottom: usize,
    pub left: usize,
    pub right: usize,
}

impl Padding {
    pub const NONE: Padding = Padding { top: 0, bottom: 0, left: 0, right: 0 };

    /// Same padding on every side
    pub fn uniform(p: usize) -> Self {
        Self { top: p, bottom: p, left: p, right: p }
    }

    /// TensorFlow `padding="same"`: output is `ceil(in / stride)` and any odd
    /// remainder of padding goes to the bottom/right.
    pub fn same(in_height: usize, in_width: usize, kernel: usize, stride: usize) -> Self {
        let (top, bottom) = same_1d(in_height, kernel, stride);
        let (left, right) = same_1d(in_width, kernel, stride);
        Self { top, bottom, left, right }
    }
}

fn same_1d(input: usize, kernel: usize, stride: usize) -> (usize, usize) {
    let out = input.div_ceil(stride);
    let total = ((out - 1) * stride + kernel).saturating_sub(input);
    (total / 2, total - total / 2)
}

/// Shape parameters of a convolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conv2dGeometry {
    pub in_channels: usize,
    pub out_channels: usize,
    pub in_height: usize,
    pub in_width: usize,
    pub kernel_h: usize,
    pub kernel_w: usize,
    pub stride: usize,
    pub padding: Padding,
    pub groups: usize,
}

impl Conv2dGeometry {
    pub fn out_height(&self) -> usize {
        (self.in_height + self.padding.top + self.padding.bottom - self.kernel_h) / self.stride + 1
    }

    pub fn out_width(&self) -> usize {
        (self.in_width + self.padding.left + self.padding.right - self.kernel_w) / self.stride + 1
    }

    pub fn in_per_group(&self) -> usize {
        self.in_channels / self.groups
    }

    pub fn out_per_group(&self) -> usize {
        self.out_channels / self.groups
    }

    /// Number of weights in OIHW layout
    pub fn weight_len(&self) -> usize {
        self.out_channels * self.in_per_group() * self.kernel_h * self.kernel_w
    }

    fn is_depthwise(&self) -> bool {
        self.groups > 1 && self.in_per_group() == 1 && self.out_per_group() == 1
    }

    fn is_pointwise(&self) -> bool {
        self.kernel_h == 1 && self.kernel_w == 1 && self.stride == 1 && self.padding == Padding::NONE
    }

    /// Rows of the im2col matrix for one group
    fn patch_len(&self) -> usize {
        self.in_per_group() * self.kernel_h * self.kernel_w
    }

    /// Input coordinate for an output coordinate and kernel tap, if it falls
    /// inside the unpadded image
    #[inline]
    fn source(&self, out: usize, tap: usize, pad: usize, extent: usize) -> Option<usize> {
        (out * self.stride + tap).checked_sub(pad).filter(|&i| i < extent)
    }
}

/// 2-D convolution with optional per-channel bias
pub fn conv2d(input: &Tensor, weight: &Tensor, bias: Option<&Tensor>, geom: Conv2dGeometry) -> Tensor {
    assert_eq!(geom.in_channels % geom.groups, 0, "in_channels must divide into groups");
    assert_eq!(geom.out_channels % geom.groups, 0, "out_channels must divide into groups");
    assert_eq!(
        input.len(),
        geom.in_channels * geom.in_height * geom.in_width,
        "conv2d input size mismatch"
    );
    assert_eq!(weight.len(), geom.weight_len(), "conv2d weight size mismatch");
    if let Some(b) = bias {
        assert_eq!(b.len(), geom.out_channels, "conv2d bias size mismatch");
    }

    TRACER.start(TraceStep::Conv);
    let mut out = if geom.is_depthwise() {
        depthwise_forward(input.as_slice(), weight.as_slice(), &geom)
    } else {
        grouped_forward(input.as_slice(), weight.as_slice(), &geom)
    };
    if let Some(b) = bias {
        let plane = geom.out_height() * geom.out_width();
        for (channel, &bv) in out.chunks_mut(plane).zip(b.data().iter()) {
            channel.iter_mut().for_each(|v| *v += bv);
        }
    }
    TRACER.end(
        TraceStep::Conv,
        format!(
            "{}x{} {}->{} g{}",
            geom.kernel_h, geom.kernel_w, geom.in_channels, geom.out_channels, geom.groups
        ),
    );

    let requires_grad =
        input.requires_grad() || weight.requires_grad() || bias.is_some_and(Tensor::requires_grad);
    Tensor::from_op(Array1::from(out), requires_grad, |out_grad| Conv2dBackward {
        input: input.clone(),
        weight: weight.clone(),
        bias: bias.cloned(),
        geom,
        out: out_grad,
    })
}

fn im2col(input: &[f32], group: usize, geom: &Conv2dGeometry) -> Vec<f32> {
    let (oh, ow) = (geom.out_height(), geom.out_width());
    let plane = oh * ow;
    let ipg = geom.in_per_group();
    let mut cols = vec![0.0f32; geom.patch_len() * plane];

    for c in 0..ipg {
        let channel = &input[(group * ipg + c) * geom.in_height * geom.in_width..];
        for ki in 0..geom.kernel_h {
            for kj in 0..geom.kernel_w {
                let row = (c * geom.kernel_h + ki) * geom.kernel_w + kj;
                let dst = &mut cols[row * plane..(row + 1) * plane];
                for oy in 0..oh {
                    let Some(iy) = geom.source(oy, ki, geom.padding.top, geom.in_height) else {
                        continue;
                    };
                    for ox in 0..ow {
                        if let Some(ix) = geom.source(ox, kj, geom.padding.left, geom.in_width) {
                            dst[oy * ow + ox] = channel[iy * geom.in_width + ix];
                        }
                    }
                }
            }
        }
    }
    cols
}

fn col2im_accumulate(cols: &[f32], group: usize, geom: &Conv2dGeometry, grad_input: &mut [f32]) {
    let (oh, ow) = (geom.out_height(), geom.out_width());
    let plane = oh * ow;
    let ipg = geom.in_per_group();

    for c in 0..ipg {
        let offset = (group * ipg + c) * geom.in_height * geom.in_width;
        for ki in 0..geom.kernel_h {
            for kj in 0..geom.kernel_w {
                let row = (c * geom.kernel_h + ki) * geom.kernel_w + kj;
                let src = &cols[row * plane..(row + 1) * plane];
                for oy in 0..oh {
                    let Some(iy) = geom.source(oy, ki, geom.padding.top, geom.in_height) else {
                        continue;
                    };
                    for ox in 0..ow {
                        if let Some(ix) = geom.source(ox, kj, geom.padding.left, geom.in_width) {
                            grad_input[offset + iy * geom.in_width + ix] += src[oy * ow + ox];
                        }
                    }
                }
            }
        }
    }
}

fn grouped_forward(input: &[f32], weight: &[f32], geom: &Conv2dGeometry) -> Vec<f32> {
    let plane = geom.out_height() * geom.out_width();
    let opg = geom.out_per_group();
    let k = geom.patch_len();
    let mut out = vec![0.0f32; geom.out_channels * plane];

    for g in 0..geom.groups {
        let w_g = &weight[g * opg * k..(g + 1) * opg * k];
        let out_g = &mut out[g * opg * plane..(g + 1) * opg * plane];
        if geom.is_pointwise() {
            let in_g = &input[g * k * plane..(g + 1) * k * plane];
            gemm(mat(w_g, opg, k), mat(in_g, k, plane), 0.0, out_g);
        } else {
            let cols = im2col(input, g, geom);
            gemm(mat(w_g, opg, k), mat(&cols, k, plane), 0.0, out_g);
        }
    }
    out
}

fn depthwise_forward(input: &[f32], weight: &[f32], geom: &Conv2dGeometry) -> Vec<f32> {
    let (oh, ow) = (geom.out_height(), geom.out_width());
    let taps = geom.kernel_h * geom.kernel_w;
    let in_plane = geom.in_height * geom.in_width;
    let mut out = vec![0.0f32; geom.out_channels * oh * ow];

    for c in 0..geom.out_channels {
        let src = &input[c * in_plane..(c + 1) * in_plane];
        let w = &weight[c * taps..(c + 1) * taps];
        let dst = &mut out[c * oh * ow..(c + 1) * oh * ow];
        for oy in 0..oh {
            for ox in 0..ow {
                let mut acc = 0.0f32;
                for ki in 0..geom.kernel_h {
                    let Some(iy) = geom.source(oy, ki, geom.padding.top, geom.in_height) else {
                        continue;
                    };
                    for kj in 0..geom.kernel_w {
                        if let Some(ix) = geom.source(ox, kj, geom.padding.left, geom.in_width) {
                            acc += src[iy * geom.in_width + ix] * w[ki * geom.kernel_w + kj];
                        }
                    }
                }
                dst[oy * ow + ox] = acc;
            }
        }
    }
    out
}

struct Conv2dBackward {
    input: Tensor,
    weight: Tensor,
    bias: Option<Tensor>,
    geom: Conv2dGeometry,
    out: GradCell,
}

impl Conv2dBackward {
    fn grouped(&self, grad_out: &[f32]) {
        let geom = &self.geom;
        let plane = geom.out_height() * geom.out_width();
        let opg = geom.out_per_group();
        let k = geom.patch_len();
        let input = self.input.as_slice();
        let weight = self.weight.as_slice();

        let mut grad_input = self.input.requires_grad().then(|| vec![0.0f32; input.len()]);
        let mut grad_weight = self.weight.requires_grad().then(|| vec![0.0f32; weight.len()]);

        for g in 0..geom.groups {
            let grad_out_g = &grad_out[g * opg * plane..(g + 1) * opg * plane];
            let w_g = &weight[g * opg * k..(g + 1) * opg * k];

            if let Some(gi) = grad_input.as_mut() {
                // patch gradients: W_gᵀ · dOut_g, (k, opg) x (opg, plane)
                let w_t = mat(w_g, opg, k).reversed_axes();
                let upstream = mat(grad_out_g, opg, plane);
                if geom.is_pointwise() {
                    let gi_g = &mut gi[g * k * plane..(g + 1) * k * plane];
                    gemm(w_t, upstream, 1.0, gi_g);
                } else {
                    let mut grad_cols = vec![0.0f32; k * plane];
                    gemm(w_t, upstream, 0.0, &mut grad_cols);
                    col2im_accumulate(&grad_cols, g, geom, gi);
                }
            }

            if let Some(gw) = grad_weight.as_mut() {
                // dOut_g · colsᵀ, (opg, plane) x (plane, k)
                let owned;
                let cols = if geom.is_pointwise() {
                    &input[g * k * plane..(g + 1) * k * plane]
                } else {
                    owned = im2col(input, g, geom);
                    &owned[..]
                };
                let gw_g = &mut gw[g * opg * k..(g + 1) * opg * k];
                gemm(mat(grad_out_g, opg, plane), mat(cols, k, plane).t(), 1.0, gw_g);
            }
        }

        if let Some(gi) = grad_input {
            self.input.accumulate_grad(Array1::from(gi));
        }
        if let Some(gw) = grad_weight {
            self.weight.accumulate_grad(Array1::from(gw));
        }
    }

    fn depthwise(&self, grad_out: &[f32]) {
        let geom = &self.geom;
        let (oh, ow) = (geom.out_height(), geom.out_width());
        let taps = geom.kernel_h * geom.kernel_w;
        let in_plane = geom.in_height * geom.in_width;
        let input = self.input.as_slice();
        let weight = self.weight.as_slice();

        let mut grad_input = self.input.requires_grad().then(|| vec![0.0f32; input.len()]);
        let mut grad_weight = self.weight.requires_grad().then(|| vec![0.0f32; weight.len()]);

        for c in 0..geom.out_channels {
            let go = &grad_out[c * oh * ow..(c + 1) * oh * ow];
            for oy in 0..oh {
                for ki in 0..geom.kernel_h {
                    let Some(iy) = geom.source(oy, ki, geom.padding.top, geom.in_height) else {
                        continue;
                    };
                    for ox in 0..ow {
                        let g = go[oy * ow + ox];
                        for kj in 0..geom.kernel_w {
                            let Some(ix) = geom.source(ox, kj, geom.padding.left, geom.in_width)
                            else {
                                continue;
                            };
                            let src = c * in_plane + iy * geom.in_width + ix;
                            let tap = c * taps + ki * geom.kernel_w + kj;
                            if let Some(gi) = grad_input.as_mut() {
                                gi[src] += g * weight[tap];
                            }
                            if let Some(gw) = grad_weight.as_mut() {
                                gw[tap] += g * input[src];
                            }
                        }
                    }
                }
            }
        }

        if let Some(gi) = grad_input {
            self.input.accumulate_grad(Array1::from(gi));
        }
        if let Some(gw) = grad_weight {
            self.weight.accumulate_grad(Array1::from(gw));
        }
    }
}

impl BackwardOp for Conv2dBackward {
    fn backward(&self) {
        if let Some(grad_output) = self.out.borrow().as_ref() {
            let grad_out = grad_output.as_slice().expect("gradient output must be contiguous");

            TRACER.start(TraceStep::Conv);
            if self.geom.is_depthwise() {
                self.depthwise(grad_out);
            } else {
                self.grouped(grad_out);
            }
            TRACER.end(TraceStep::Conv, "backward");

            if let Some(bias) = self.bias.as_ref().filter(|b| b.requires_grad()) {
                let plane = self.geom.out_height() * self.geom.out_width();
                let grad_bias: Vec<f32> =
                    grad_out.chunks(plane).map(|channel| channel.iter().sum()).collect();
                bias.accumulate_grad(Array1::from(grad_bias));
            }
        }
    }

    fn inputs(&self) -> Vec<&Tensor> {
        let mut inputs = vec![&self.input, &self.weight];
        if let Some(b) = &self.bias {
            inputs.push(b);
        }
        inputs
    }
}
