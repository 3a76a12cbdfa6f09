//! Validation error types

/// Validation error type
///
/// Messages are printed verbatim as the final `Error:` line of the CLI.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Epsilon must be between 0 and 1.")]
    InvalidEpsilon(f64),

    #[error("Invalid model version. Choose 'v2-0.5', 'v2-1.0'.")]
    InvalidModelVersion(String),

    #[error("Invalid model version. Choose 'v2-0.5', 'v2-1.0' or 'resnet50'.")]
    InvalidTransferModelVersion(String),

    #[error("Target label must be between 0 and 999.")]
    InvalidTargetLabel(i64),
}
