//! ResNet50 (Keras `applications.ResNet50`, `include_top=True`)

use super::classifier::{Classifier, ModelKind};
use super::layers::{ConvBn, ConvSpec, Dense, DenseSpec, FeatureMap, PaddingRule};
use super::weights::{TensorSpec, WeightError, WeightStore};
use crate::autograd::{add, global_avg_pool, max_pool2d, pad2d, relu, softmax, Padding, Tensor};
use crate::imaging::PreprocessMode;

const BN_EPSILON: f32 = 1.001e-5;
const NUM_CLASSES: usize = 1000;

/// `(filters, blocks, first stride)` per stage, named `conv2` .. `conv5`
const STAGES: [(usize, usize, usize); 4] = [(64, 3, 1), (128, 4, 2), (256, 6, 2), (512, 3, 2)];

fn conv(name: &str, cin: usize, cout: usize, kernel: usize, stride: usize, padding: PaddingRule) -> ConvSpec {
    ConvSpec {
        conv: format!("{name}_conv"),
        bn: format!("{name}_bn"),
        in_channels: cin,
        out_channels: cout,
        kernel,
        stride,
        depthwise: false,
        conv_bias: true,
        bn_epsilon: BN_EPSILON,
        padding,
    }
}

/// Layer layout of one bottleneck block
#[derive(Debug, Clone, PartialEq)]
pub struct BottleneckPlan {
    pub shortcut: Option<ConvSpec>,
    pub reduce: ConvSpec,
    pub spatial: ConvSpec,
    pub expand: ConvSpec,
}

/// Full ResNet50 layer layout
#[derive(Debug, Clone, PartialEq)]
pub struct ResNet50Plan {
    pub stem: ConvSpec,
    pub blocks: Vec<BottleneckPlan>,
    pub predictions: DenseSpec,
}

impl ResNet50Plan {
    pub fn new() -> Self {
        let valid = PaddingRule::Explicit(Padding::NONE);
        let stem = conv("conv1", 3, 64, 7, 2, PaddingRule::Explicit(Padding::uniform(3)));

        let mut in_channels = 64;
        let mut blocks = Vec::new();
        for (stage, &(filters, count, first_stride)) in STAGES.iter().enumerate() {
            for b in 1..=count {
                let name = format!("conv{}_block{b}", stage + 2);
                let stride = if b == 1 { first_stride } else { 1 };
                let out_channels = 4 * filters;
                let shortcut = (b == 1)
                    .then(|| conv(&format!("{name}_0"), in_channels, out_channels, 1, stride, valid));
                blocks.push(BottleneckPlan {
                    shortcut,
                    reduce: conv(&format!("{name}_1"), in_channels, filters, 1, stride, valid),
                    spatial: conv(&format!("{name}_2"), filters, filters, 3, 1, PaddingRule::Same),
                    expand: conv(&format!("{name}_3"), filters, out_channels, 1, 1, valid),
                });
                in_channels = out_channels;
            }
        }

        let predictions =
            DenseSpec { name: "predictions".to_string(), in_features: in_channels, out_features: NUM_CLASSES };
        Self { stem, blocks, predictions }
    }

    pub fn manifest(&self) -> Vec<TensorSpec> {
        let mut specs = self.stem.manifest();
        for block in &self.blocks {
            if let Some(shortcut) = &block.shortcut {
                specs.extend(shortcut.manifest());
            }
            specs.extend(block.reduce.manifest());
            specs.extend(block.spatial.manifest());
            specs.extend(block.expand.manifest());
        }
        specs.extend(self.predictions.manifest());
        specs
    }
}

impl Default for ResNet50Plan {
    fn default() -> Self {
        Self::new()
    }
}

struct Bottleneck {
    shortcut: Option<ConvBn>,
    reduce: ConvBn,
    spatial: ConvBn,
    expand: ConvBn,
}

impl Bottleneck {
    fn forward(&self, x: &FeatureMap) -> FeatureMap {
        let identity = match &self.shortcut {
            Some(conv) => conv.forward(x),
            None => x.clone(),
        };
        let h = relu_map(&self.reduce.forward(x));
        let h = relu_map(&self.spatial.forward(&h));
        let h = self.expand.forward(&h);
        h.with_tensor(relu(&add(&identity.tensor, &h.tensor)))
    }
}

fn relu_map(x: &FeatureMap) -> FeatureMap {
    x.with_tensor(relu(&x.tensor))
}

/// ResNet50 classifier with batch norm folded away
pub struct ResNet50 {
    stem: ConvBn,
    blocks: Vec<Bottleneck>,
    predictions: Dense,
    num_params: usize,
}

impl ResNet50 {
    pub fn from_store(store: &mut WeightStore) -> Result<Self, WeightError> {
        let plan = ResNet50Plan::new();
        let num_params = plan.manifest().iter().map(TensorSpec::numel).sum();

        let stem = ConvBn::load(store, plan.stem)?;
        let blocks = plan
            .blocks
            .into_iter()
            .map(|block| {
                Ok(Bottleneck {
                    shortcut: block.shortcut.map(|spec| ConvBn::load(store, spec)).transpose()?,
                    reduce: ConvBn::load(store, block.reduce)?,
                    spatial: ConvBn::load(store, block.spatial)?,
                    expand: ConvBn::load(store, block.expand)?,
                })
            })
            .collect::<Result<Vec<_>, WeightError>>()?;
        let predictions = Dense::load(store, plan.predictions)?;

        Ok(Self { stem, blocks, predictions, num_params })
    }
}

impl Classifier for ResNet50 {
    fn kind(&self) -> ModelKind {
        ModelKind::ResNet50
    }

    fn num_params(&self) -> usize {
        self.num_params
    }

    fn preprocess_mode(&self) -> PreprocessMode {
        PreprocessMode::Caffe
    }

    fn forward(&self, image: &FeatureMap) -> Tensor {
        let x = relu_map(&self.stem.forward(image));

        // pool1: zero pad by one (inputs are post-ReLU), then 3x3/2 max pool
        let padded = pad2d(&x.tensor, x.channels, x.height, x.width, Padding::uniform(1));
        let (ph, pw) = (x.height + 2, x.width + 2);
        let pooled = max_pool2d(&padded, x.channels, ph, pw, 3, 2);
        let mut x = FeatureMap::new(pooled, x.channels, (ph - 3) / 2 + 1, (pw - 3) / 2 + 1);

        for block in &self.blocks {
            x = block.forward(&x);
        }
        let features = global_avg_pool(&x.tensor, x.channels, x.height, x.width);
        softmax(&self.predictions.forward(&features))
    }
}
