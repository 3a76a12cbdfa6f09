//! Configuration validation
//!
//! Validates attack settings before any model is loaded.

mod error;
mod validator;

#[cfg(test)]
mod proptests;

pub use error::ValidationError;
pub use validator::{
    adversarial_filename, validate_config, AttackSettings, ImageSource, LABRADOR_RETRIEVER_INDEX,
    PANDA_INDEX,
};
