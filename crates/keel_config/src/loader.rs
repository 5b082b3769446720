//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::KeelConfig;
use std::path::Path;

/// Name of the configuration file inside a project directory.
pub const CONFIG_FILE: &str = "keel.toml";

/// Loads and validates `keel.toml` from a project directory.
///
/// A missing file is not an error: every setting has a default.
pub fn load_config(project_dir: &Path) -> Result<KeelConfig, ConfigError> {
    let config_path = project_dir.join(CONFIG_FILE);
    if !config_path.exists() {
        return Ok(KeelConfig::default());
    }
    let content = std::fs::read_to_string(&config_path)?;
    load_config_from_str(&content)
}

/// Like [`load_config`], but falls back to defaults on any error.
pub fn load_config_or_default(project_dir: &Path) -> KeelConfig {
    match load_config(project_dir) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("config load failed, using defaults: {e}");
            KeelConfig::default()
        }
    }
}

/// Parses and validates a `keel.toml` configuration from a string.
pub fn load_config_from_str(content: &str) -> Result<KeelConfig, ConfigError> {
    let config: KeelConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Checks value ranges that serde cannot express.
fn validate_config(config: &KeelConfig) -> Result<(), ConfigError> {
    let cache = &config.configuration_cache;
    if cache.max_problems == 0 {
        return Err(ConfigError::ValidationError(
            "configuration-cache.max-problems must be at least 1".to_string(),
        ));
    }
    if cache.dir.as_os_str().is_empty() {
        return Err(ConfigError::MissingField("configuration-cache.dir".to_string()));
    }
    Ok(())
}
