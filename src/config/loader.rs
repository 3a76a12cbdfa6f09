//! YAML config loading

use super::schema::AttackConfig;
use crate::error::{Error, Result};
use std::fs;
use std::path::Path;

/// Load an attack configuration from a YAML file
///
/// Values are checked later, after command-line overrides are applied.
pub fn load_config<P: AsRef<Path>>(config_path: P) -> Result<AttackConfig> {
    let yaml_content = fs::read_to_string(config_path.as_ref()).map_err(|e| {
        Error::ConfigError(format!(
            "Failed to read config file {}: {}",
            config_path.as_ref().display(),
            e
        ))
    })?;

    serde_yaml::from_str(&yaml_content)
        .map_err(|e| Error::ConfigError(format!("Failed to parse YAML config: {e}")))
}
