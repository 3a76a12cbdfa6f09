//! MobileNetV2 (Keras `applications.MobileNetV2`, `include_top=True`)

use super::classifier::{Classifier, ModelKind};
use super::layers::{ConvBn, ConvSpec, Dense, DenseSpec, FeatureMap, PaddingRule};
use super::weights::{TensorSpec, WeightError, WeightStore};
use crate::autograd::{add, global_avg_pool, relu6, softmax, Tensor};
use crate::imaging::PreprocessMode;

const BN_EPSILON: f32 = 1e-3;
const NUM_CLASSES: usize = 1000;

/// `(filters, stride, expansion)` for the 17 inverted residual blocks
const BLOCKS: [(usize, usize, usize); 17] = [
    (16, 1, 1),
    (24, 2, 6),
    (24, 1, 6),
    (32, 2, 6),
    (32, 1, 6),
    (32, 1, 6),
    (64, 2, 6),
    (64, 1, 6),
    (64, 1, 6),
    (64, 1, 6),
    (96, 1, 6),
    (96, 1, 6),
    (96, 1, 6),
    (160, 2, 6),
    (160, 1, 6),
    (160, 1, 6),
    (320, 1, 6),
];

/// Round channels to a multiple of `divisor`, never dropping below 90% of `value`
pub fn make_divisible(value: f32, divisor: usize) -> usize {
    let d = divisor as f32;
    let rounded = (((value + d / 2.0) as usize) / divisor * divisor).max(divisor);
    if (rounded as f32) < 0.9 * value {
        rounded + divisor
    } else {
        rounded
    }
}

fn conv(name: &str, bn: &str, cin: usize, cout: usize, kernel: usize, stride: usize) -> ConvSpec {
    ConvSpec {
        conv: name.to_string(),
        bn: bn.to_string(),
        in_channels: cin,
        out_channels: cout,
        kernel,
        stride,
        depthwise: false,
        conv_bias: false,
        bn_epsilon: BN_EPSILON,
        padding: PaddingRule::Same,
    }
}

/// Layer layout of one inverted residual block
#[derive(Debug, Clone, PartialEq)]
pub struct BlockPlan {
    pub expand: Option<ConvSpec>,
    pub depthwise: ConvSpec,
    pub project: ConvSpec,
    pub residual: bool,
}

/// Full layer layout for a width multiplier
#[derive(Debug, Clone, PartialEq)]
pub struct MobileNetV2Plan {
    pub stem: ConvSpec,
    pub blocks: Vec<BlockPlan>,
    pub head: ConvSpec,
    pub predictions: DenseSpec,
}

impl MobileNetV2Plan {
    pub fn new(alpha: f32) -> Self {
        let first_filters = make_divisible(32.0 * alpha, 8);
        let stem = conv("Conv1", "bn_Conv1", 3, first_filters, 3, 2);

        let mut in_channels = first_filters;
        let mut blocks = Vec::with_capacity(BLOCKS.len());
        for (id, &(filters, stride, expansion)) in BLOCKS.iter().enumerate() {
            let prefix = if id == 0 { "expanded_conv_".to_string() } else { format!("block_{id}_") };
            let out_channels = make_divisible((filters as f32 * alpha).trunc(), 8);
            let hidden = in_channels * expansion;

            let expand = (id > 0).then(|| {
                let name = format!("{prefix}expand");
                conv(&name, &format!("{name}_BN"), in_channels, hidden, 1, 1)
            });
            let depthwise = ConvSpec {
                depthwise: true,
                ..conv(
                    &format!("{prefix}depthwise"),
                    &format!("{prefix}depthwise_BN"),
                    hidden,
                    hidden,
                    3,
                    stride,
                )
            };
            let project = conv(
                &format!("{prefix}project"),
                &format!("{prefix}project_BN"),
                hidden,
                out_channels,
                1,
                1,
            );

            blocks.push(BlockPlan {
                expand,
                depthwise,
                project,
                residual: stride == 1 && in_channels == out_channels,
            });
            in_channels = out_channels;
        }

        let last_filters = if alpha > 1.0 { make_divisible(1280.0 * alpha, 8) } else { 1280 };
        let head = conv("Conv_1", "Conv_1_bn", in_channels, last_filters, 1, 1);
        let predictions =
            DenseSpec { name: "predictions".to_string(), in_features: last_filters, out_features: NUM_CLASSES };

        Self { stem, blocks, head, predictions }
    }

    /// Every tensor the checkpoint must provide, in layer order
    pub fn manifest(&self) -> Vec<TensorSpec> {
        let mut specs = self.stem.manifest();
        for block in &self.blocks {
            if let Some(expand) = &block.expand {
                specs.extend(expand.manifest());
            }
            specs.extend(block.depthwise.manifest());
            specs.extend(block.project.manifest());
        }
        specs.extend(self.head.manifest());
        specs.extend(self.predictions.manifest());
        specs
    }
}

struct InvertedResidual {
    expand: Option<ConvBn>,
    depthwise: ConvBn,
    project: ConvBn,
    residual: bool,
}

impl InvertedResidual {
    fn forward(&self, x: &FeatureMap) -> FeatureMap {
        let mut h = x.clone();
        if let Some(expand) = &self.expand {
            h = relu6_map(&expand.forward(&h));
        }
        h = relu6_map(&self.depthwise.forward(&h));
        let out = self.project.forward(&h);
        if self.residual {
            out.with_tensor(add(&x.tensor, &out.tensor))
        } else {
            out
        }
    }
}

fn relu6_map(x: &FeatureMap) -> FeatureMap {
    x.with_tensor(relu6(&x.tensor))
}

/// MobileNetV2 classifier with batch norm folded away
pub struct MobileNetV2 {
    kind: ModelKind,
    stem: ConvBn,
    blocks: Vec<InvertedResidual>,
    head: ConvBn,
    predictions: Dense,
    num_params: usize,
}

impl MobileNetV2 {
    /// Build from a checkpoint; `kind` picks the width multiplier
    pub fn from_store(kind: ModelKind, store: &mut WeightStore) -> Result<Self, WeightError> {
        let alpha = kind
            .alpha()
            .ok_or_else(|| WeightError::Architecture(format!("{kind} is not a MobileNetV2 variant")))?;
        let plan = MobileNetV2Plan::new(alpha);
        let num_params = plan.manifest().iter().map(TensorSpec::numel).sum();

        let stem = ConvBn::load(store, plan.stem)?;
        let blocks = plan
            .blocks
            .into_iter()
            .map(|block| {
                Ok(InvertedResidual {
                    expand: block.expand.map(|spec| ConvBn::load(store, spec)).transpose()?,
                    depthwise: ConvBn::load(store, block.depthwise)?,
                    project: ConvBn::load(store, block.project)?,
                    residual: block.residual,
                })
            })
            .collect::<Result<Vec<_>, WeightError>>()?;
        let head = ConvBn::load(store, plan.head)?;
        let predictions = Dense::load(store, plan.predictions)?;

        Ok(Self { kind, stem, blocks, head, predictions, num_params })
    }
}

impl Classifier for MobileNetV2 {
    fn kind(&self) -> ModelKind {
        self.kind
    }

    fn num_params(&self) -> usize {
        self.num_params
    }

    fn preprocess_mode(&self) -> PreprocessMode {
        PreprocessMode::Tf
    }

    fn forward(&self, image: &FeatureMap) -> Tensor {
        let mut x = relu6_map(&self.stem.forward(image));
        for block in &self.blocks {
            x = block.forward(&x);
        }
        let x = relu6_map(&self.head.forward(&x));
        let pooled = global_avg_pool(&x.tensor, x.channels, x.height, x.width);
        softmax(&self.predictions.forward(&pooled))
    }
}
