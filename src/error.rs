//! Crate-level error type

use crate::config::ValidationError;
use crate::imaging::ImageError;
use crate::labels::LabelError;
use crate::nn::WeightError;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by an attack run
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Weight error: {0}")]
    Weights(#[from] WeightError),

    #[error("Image error: {0}")]
    Image(#[from] ImageError),

    #[error("Label error: {0}")]
    Labels(#[from] LabelError),

    #[error("Report error: {0}")]
    Report(String),
}
