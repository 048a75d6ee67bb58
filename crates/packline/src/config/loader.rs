use std::path::Path;

use crate::config::schema::{PacklineConfig, CONFIG_VERSION};
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PacklineConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

/// Loads `path` if it exists, otherwise returns the defaults.
pub fn load_config_or_default<P: AsRef<Path>>(path: P) -> Result<PacklineConfig, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        log::debug!(
            "No config at {}, using defaults",
            crate::sanitize::redact_path(path)
        );
        return Ok(PacklineConfig::default());
    }
    load_config(path)
}

pub fn load_config_from_str(content: &str) -> Result<PacklineConfig, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: PacklineConfig = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &PacklineConfig) -> Result<(), ConfigError> {
    if config.version != CONFIG_VERSION {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.snapshot_capacity == 0 {
        return Err(ConfigError::Validation {
            message: "snapshot_capacity must be at least 1".to_string(),
        });
    }

    if config.default_actor.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "default_actor must not be blank".to_string(),
        });
    }

    if let Some(dir) = &config.inbox.directory {
        if dir.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: "inbox.directory must not be blank".to_string(),
            });
        }
    }

    Ok(())
}
