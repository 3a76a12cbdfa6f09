//! YAML schema for attack runs
//!
//! Every field is optional in the file; anything left out takes the same
//! default as the command line.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Complete attack configuration before validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AttackConfig {
    /// Image name: `panda` or `labrador`
    pub image: String,

    /// FGSM step size in `[0, 1]`
    pub epsilon: f64,

    /// Model the adversarial example is generated against
    pub model_version: String,

    /// Second model evaluated on the saved adversarial example
    pub transfer_model_version: Option<String>,

    /// Label the loss is computed against instead of the image's true class
    pub target_label: Option<i64>,

    pub print_params: bool,

    /// Write a JSON summary of the run here
    pub report: Option<PathBuf>,

    pub paths: PathsConfig,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            image: "panda".to_string(),
            epsilon: 0.0,
            model_version: "v2-1.0".to_string(),
            transfer_model_version: None,
            target_label: None,
            print_params: false,
            report: None,
            paths: PathsConfig::default(),
        }
    }
}

/// Filesystem locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    /// Directory holding `panda.jpg` and `YellowLabradorLooking.jpg`
    pub images_dir: PathBuf,

    /// Directory holding the `.safetensors` checkpoints
    pub models_dir: PathBuf,

    /// Keras `imagenet_class_index.json`
    pub labels: PathBuf,

    /// Where adversarial examples are written
    pub output_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            images_dir: PathBuf::from("images"),
            models_dir: PathBuf::from("models"),
            labels: PathBuf::from("models/imagenet_class_index.json"),
            output_dir: PathBuf::from("images"),
        }
    }
}
