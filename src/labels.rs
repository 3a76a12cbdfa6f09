//! ImageNet class labels and top-k decoding

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Number of ImageNet classes
pub const NUM_CLASSES: usize = 1000;

/// Label loading errors
#[derive(Debug, thiserror::Error)]
pub enum LabelError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid class index {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Class index has no entry for class {0}")]
    MissingClass(usize),

    #[error("Classifier produced no probabilities")]
    EmptyProbabilities,
}

/// One decoded class prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub class_index: usize,
    pub wordnet_id: String,
    pub label: String,
    /// Probability in `[0, 1]`
    pub confidence: f32,
}

impl Prediction {
    pub fn percent(&self) -> f32 {
        self.confidence * 100.0
    }
}

/// WordNet id and human readable name for every class
#[derive(Debug, Clone)]
pub struct ImagenetLabels {
    entries: Vec<(String, String)>,
}

impl ImagenetLabels {
    /// Parse the Keras `imagenet_class_index.json` (`{"0": ["n01440764", "tench"], ...}`)
    pub fn load(path: &Path) -> Result<Self, LabelError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| LabelError::Io { path: path.to_path_buf(), source })?;
        let index: HashMap<usize, (String, String)> = serde_json::from_str(&text)
            .map_err(|source| LabelError::Parse { path: path.to_path_buf(), source })?;
        Self::from_index(index)
    }

    fn from_index(mut index: HashMap<usize, (String, String)>) -> Result<Self, LabelError> {
        let entries = (0..NUM_CLASSES)
            .map(|i| index.remove(&i).ok_or(LabelError::MissingClass(i)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { entries })
    }

    /// Placeholder labels `class_<index>` for when no class index is available
    pub fn fallback() -> Self {
        Self {
            entries: (0..NUM_CLASSES).map(|i| (format!("c{i:08}"), format!("class_{i}"))).collect(),
        }
    }

    /// Load `path` if it exists, otherwise fall back to placeholder labels
    pub fn load_or_fallback(path: &Path) -> Result<Self, LabelError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::fallback())
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn label(&self, class_index: usize) -> Option<&str> {
        self.entries.get(class_index).map(|(_, label)| label.as_str())
    }

    /// The `k` most probable classes, highest first
    pub fn top_k(&self, probs: &[f32], k: usize) -> Vec<Prediction> {
        let mut order: Vec<usize> = (0..probs.len().min(self.entries.len())).collect();
        order.sort_by(|&a, &b| probs[b].total_cmp(&probs[a]).then(a.cmp(&b)));
        order
            .into_iter()
            .take(k)
            .map(|i| {
                let (wordnet_id, label) = &self.entries[i];
                Prediction {
                    class_index: i,
                    wordnet_id: wordnet_id.clone(),
                    label: label.clone(),
                    confidence: probs[i],
                }
            })
            .collect()
    }

    /// Most probable class
    pub fn decode(&self, probs: &[f32]) -> Result<Prediction, LabelError> {
        self.top_k(probs, 1).into_iter().next().ok_or(LabelError::EmptyProbabilities)
    }
}
