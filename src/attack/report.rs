//! Serializable summary of an attack run

use crate::error::{Error, Result};
use crate::labels::Prediction;
use crate::nn::ModelKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Outcome of evaluating the adversarial example on a second model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferResult {
    pub model: ModelKind,
    pub prediction: Prediction,
    pub fooled: bool,
}

/// Everything an attack run printed, in machine-readable form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackReport {
    pub image: String,
    pub model: ModelKind,
    pub model_params: usize,
    pub epsilon: f64,
    /// Label the loss was computed against
    pub label_index: usize,
    pub targeted: bool,
    pub original: Prediction,
    pub adversarial: Prediction,
    pub fooled: bool,
    /// Largest per-pixel change after clipping
    pub linf_perturbation: f32,
    pub output_path: PathBuf,
    pub transfer: Option<TransferResult>,
}

/// Whether `prediction` counts as a successful attack
///
/// Untargeted: the top-1 class moved off `label_index`. Targeted: the top-1
/// class is `label_index`.
pub fn is_fooled(prediction: &Prediction, label_index: usize, targeted: bool) -> bool {
    (prediction.class_index == label_index) == targeted
}

impl AttackReport {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Report(e.to_string()))
    }

    /// Write pretty JSON, creating parent directories as needed
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Report(format!("Failed to create {}: {e}", parent.display())))?;
        }
        std::fs::write(path, self.to_json()?)
            .map_err(|e| Error::Report(format!("Failed to write {}: {e}", path.display())))
    }
}
