//! Attack configuration
//!
//! Settings come from three layers: built-in defaults, an optional YAML file
//! (`--config`), and command-line flags, later layers winning. The merged
//! [`AttackConfig`] is validated into [`AttackSettings`] before any model is
//! loaded.

mod cli;
mod loader;
mod schema;
mod validate;

pub use cli::{apply_overrides, normalize_args, parse_args, Cli};
pub use loader::load_config;
pub use schema::{AttackConfig, PathsConfig};
pub use validate::{
    adversarial_filename, validate_config, AttackSettings, ImageSource, ValidationError,
    LABRADOR_RETRIEVER_INDEX, PANDA_INDEX,
};
