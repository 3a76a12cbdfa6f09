//! Configuration validation logic
//!
//! Turns a loosely typed [`AttackConfig`] into checked [`AttackSettings`].

use super::error::ValidationError;
use crate::config::schema::AttackConfig;
use crate::nn::ModelKind;
use std::path::PathBuf;

/// ImageNet class of the giant panda
pub const PANDA_INDEX: usize = 388;
/// ImageNet class of the Labrador retriever
pub const LABRADOR_RETRIEVER_INDEX: usize = 208;

/// Largest valid ImageNet class index
const MAX_LABEL: i64 = 999;

/// A bundled input image and its true class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSource {
    /// Name given on the command line, used in output file names
    pub name: String,
    pub file_name: &'static str,
    pub true_label: usize,
}

impl ImageSource {
    /// `labrador` selects the Labrador photo; every other name selects the panda
    pub fn from_name(name: &str) -> Self {
        let (file_name, true_label) = match name {
            "labrador" => ("YellowLabradorLooking.jpg", LABRADOR_RETRIEVER_INDEX),
            _ => ("panda.jpg", PANDA_INDEX),
        };
        Self { name: name.to_string(), file_name, true_label }
    }
}

/// Checked settings for one attack run
#[derive(Debug, Clone, PartialEq)]
pub struct AttackSettings {
    pub image: ImageSource,
    pub epsilon: f64,
    pub model: ModelKind,
    pub transfer_model: Option<ModelKind>,
    pub target_label: Option<usize>,
    pub print_params: bool,
    pub report: Option<PathBuf>,
    pub images_dir: PathBuf,
    pub models_dir: PathBuf,
    pub labels_path: PathBuf,
    pub output_dir: PathBuf,
}

impl AttackSettings {
    pub fn is_targeted(&self) -> bool {
        self.target_label.is_some()
    }

    /// Class the loss is computed against: the target, or else the true label
    pub fn label_index(&self) -> usize {
        self.target_label.unwrap_or(self.image.true_label)
    }

    pub fn image_path(&self) -> PathBuf {
        self.images_dir.join(self.image.file_name)
    }

    /// `adversarial_image_{image}_{model}_{epsilon:.3}.jpg` in the output directory
    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(adversarial_filename(&self.image.name, self.model, self.epsilon))
    }
}

pub fn adversarial_filename(image: &str, model: ModelKind, epsilon: f64) -> String {
    format!("adversarial_image_{image}_{model}_{epsilon:.3}.jpg")
}

/// Validate a configuration
///
/// Checks, in order:
/// - target label is a valid ImageNet class
/// - epsilon is in `[0, 1]`
/// - the source model is a MobileNetV2 variant
/// - the transfer model is known (it may equal the source model)
pub fn validate_config(config: &AttackConfig) -> Result<AttackSettings, ValidationError> {
    let target_label = match config.target_label {
        Some(label) if !(0..=MAX_LABEL).contains(&label) => {
            return Err(ValidationError::InvalidTargetLabel(label));
        }
        Some(label) => Some(label as usize),
        None => None,
    };

    // NaN fails the range check too
    if !(0.0..=1.0).contains(&config.epsilon) {
        return Err(ValidationError::InvalidEpsilon(config.epsilon));
    }

    let model = config
        .model_version
        .parse::<ModelKind>()
        .ok()
        .filter(|kind| kind.is_attack_source())
        .ok_or_else(|| ValidationError::InvalidModelVersion(config.model_version.clone()))?;

    let transfer_model = match &config.transfer_model_version {
        Some(name) => {
            let kind = name
                .parse::<ModelKind>()
                .map_err(|_| ValidationError::InvalidTransferModelVersion(name.clone()))?;
            Some(kind)
        }
        None => None,
    };

    Ok(AttackSettings {
        image: ImageSource::from_name(&config.image),
        epsilon: config.epsilon,
        model,
        transfer_model,
        target_label,
        print_params: config.print_params,
        report: config.report.clone(),
        images_dir: config.paths.images_dir.clone(),
        models_dir: config.paths.models_dir.clone(),
        labels_path: config.paths.labels.clone(),
        output_dir: config.paths.output_dir.clone(),
    })
}
