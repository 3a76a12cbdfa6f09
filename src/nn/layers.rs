//! Inference layers with batch norm folded into the convolution

use super::weights::{TensorSpec, WeightError, WeightStore};
use crate::autograd::{add, conv2d, matmul, Conv2dGeometry, Padding, Tensor};
use ndarray::Array1;

/// A single CHW image flowing through a network
#[derive(Debug, Clone)]
pub struct FeatureMap {
    pub tensor: Tensor,
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

impl FeatureMap {
    pub fn new(tensor: Tensor, channels: usize, height: usize, width: usize) -> Self {
        assert_eq!(tensor.len(), channels * height * width, "feature map size mismatch");
        Self { tensor, channels, height, width }
    }

    /// Same spatial size, new contents
    pub fn with_tensor(&self, tensor: Tensor) -> Self {
        Self::new(tensor, self.channels, self.height, self.width)
    }
}

/// How a convolution pads its input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaddingRule {
    /// TensorFlow `padding="same"`
    Same,
    /// Fixed zero padding (Keras `ZeroPadding2D` followed by a valid conv)
    Explicit(Padding),
}

/// Description of a Keras `Conv2D`/`DepthwiseConv2D` + `BatchNormalization` pair
#[derive(Debug, Clone, PartialEq)]
pub struct ConvSpec {
    pub conv: String,
    pub bn: String,
    pub in_channels: usize,
    pub out_channels: usize,
    pub kernel: usize,
    pub stride: usize,
    pub depthwise: bool,
    pub conv_bias: bool,
    pub bn_epsilon: f32,
    pub padding: PaddingRule,
}

impl ConvSpec {
    fn kernel_name(&self) -> String {
        if self.depthwise {
            format!("{}/depthwise_kernel", self.conv)
        } else {
            format!("{}/kernel", self.conv)
        }
    }

    /// Keras kernel shape: HWIO, or `[kh, kw, channels, 1]` for depthwise
    fn kernel_shape(&self) -> Vec<usize> {
        if self.depthwise {
            vec![self.kernel, self.kernel, self.in_channels, 1]
        } else {
            vec![self.kernel, self.kernel, self.in_channels, self.out_channels]
        }
    }

    /// Tensors this layer reads from a checkpoint
    pub fn manifest(&self) -> Vec<TensorSpec> {
        let mut specs = vec![TensorSpec::new(self.kernel_name(), &self.kernel_shape())];
        if self.conv_bias {
            specs.push(TensorSpec::new(format!("{}/bias", self.conv), &[self.out_channels]));
        }
        for stat in ["gamma", "beta", "moving_mean", "moving_variance"] {
            specs.push(TensorSpec::new(format!("{}/{stat}", self.bn), &[self.out_channels]));
        }
        specs
    }
}

/// Convolution with folded batch norm
#[derive(Debug, Clone)]
pub struct ConvBn {
    weight: Tensor,
    bias: Tensor,
    spec: ConvSpec,
}

impl ConvBn {
    /// Take this layer's tensors out of the store and fold BN into them
    pub fn load(store: &mut WeightStore, spec: ConvSpec) -> Result<Self, WeightError> {
        let kernel = store.take(&spec.kernel_name(), &spec.kernel_shape())?;
        let c = spec.out_channels;
        let conv_bias = if spec.conv_bias {
            store.take(&format!("{}/bias", spec.conv), &[c])?
        } else {
            vec![0.0; c]
        };
        let gamma = store.take(&format!("{}/gamma", spec.bn), &[c])?;
        let beta = store.take(&format!("{}/beta", spec.bn), &[c])?;
        let mean = store.take(&format!("{}/moving_mean", spec.bn), &[c])?;
        let var = store.take(&format!("{}/moving_variance", spec.bn), &[c])?;

        let scale: Vec<f32> =
            gamma.iter().zip(&var).map(|(g, v)| g / (v + spec.bn_epsilon).sqrt()).collect();
        let bias: Vec<f32> = (0..c).map(|o| beta[o] + (conv_bias[o] - mean[o]) * scale[o]).collect();

        let weight = if spec.depthwise {
            fold_depthwise_kernel(&kernel, &scale, spec.kernel)
        } else {
            fold_hwio_kernel(&kernel, &scale, spec.kernel, spec.in_channels, spec.out_channels)
        };

        Ok(Self {
            weight: Tensor::constant(Array1::from(weight)),
            bias: Tensor::constant(Array1::from(bias)),
            spec,
        })
    }


    pub fn forward(&self, x: &FeatureMap) -> FeatureMap {
        assert_eq!(x.channels, self.spec.in_channels, "{}: channel mismatch", self.spec.conv);
        let padding = match self.spec.padding {
            PaddingRule::Same => Padding::same(x.height, x.width, self.spec.kernel, self.spec.stride),
            PaddingRule::Explicit(p) => p,
        };
        let geom = Conv2dGeometry {
            in_channels: self.spec.in_channels,
            out_channels: self.spec.out_channels,
            in_height: x.height,
            in_width: x.width,
            kernel_h: self.spec.kernel,
            kernel_w: self.spec.kernel,
            stride: self.spec.stride,
            padding,
            groups: if self.spec.depthwise { self.spec.in_channels } else { 1 },
        };
        let out = conv2d(&x.tensor, &self.weight, Some(&self.bias), geom);
        FeatureMap::new(out, geom.out_channels, geom.out_height(), geom.out_width())
    }
}

/// HWIO kernel → OIHW, each output filter scaled by its BN factor
fn fold_hwio_kernel(kernel: &[f32], scale: &[f32], k: usize, cin: usize, cout: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; kernel.len()];
    for ky in 0..k {
        for kx in 0..k {
            for i in 0..cin {
                for o in 0..cout {
                    let src = ((ky * k + kx) * cin + i) * cout + o;
                    let dst = ((o * cin + i) * k + ky) * k + kx;
                    out[dst] = kernel[src] * scale[o];
                }
            }
        }
    }
    out
}

/// `[kh, kw, C, 1]` depthwise kernel → `[C][1][kh][kw]`, scaled per channel
fn fold_depthwise_kernel(kernel: &[f32], scale: &[f32], k: usize) -> Vec<f32> {
    let channels = scale.len();
    let mut out = vec![0.0f32; kernel.len()];
    for ky in 0..k {
        for kx in 0..k {
            for c in 0..channels {
                out[(c * k + ky) * k + kx] = kernel[(ky * k + kx) * channels + c] * scale[c];
            }
        }
    }
    out
}

/// Description of a Keras `Dense` layer
#[derive(Debug, Clone, PartialEq)]
pub struct DenseSpec {
    pub name: String,
    pub in_features: usize,
    pub out_features: usize,
}

impl DenseSpec {
    pub fn manifest(&self) -> Vec<TensorSpec> {
        vec![
            TensorSpec::new(format!("{}/kernel", self.name), &[self.in_features, self.out_features]),
            TensorSpec::new(format!("{}/bias", self.name), &[self.out_features]),
        ]
    }
}

/// Fully connected layer; the Keras `[in, out]` kernel is already the
/// right-hand matmul operand
#[derive(Debug, Clone)]
pub struct Dense {
    kernel: Tensor,
    bias: Tensor,
    spec: DenseSpec,
}

impl Dense {
    pub fn load(store: &mut WeightStore, spec: DenseSpec) -> Result<Self, WeightError> {
        let kernel =
            store.take(&format!("{}/kernel", spec.name), &[spec.in_features, spec.out_features])?;
        let bias = store.take(&format!("{}/bias", spec.name), &[spec.out_features])?;
        Ok(Self {
            kernel: Tensor::constant(Array1::from(kernel)),
            bias: Tensor::constant(Array1::from(bias)),
            spec,
        })
    }

    pub fn forward(&self, x: &Tensor) -> Tensor {
        let logits = matmul(x, &self.kernel, 1, self.spec.in_features, self.spec.out_features);
        add(&logits, &self.bias)
    }
}
