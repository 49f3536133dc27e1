//! Host configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges and formats (log level, bind address)
//! - Reject unknown or duplicated plugin names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: HostConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::BTreeSet;
use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::HostConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in a config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validate a host config; `known_plugins` lists the plugins the host can build.
pub fn validate_config(
    config: &HostConfig,
    known_plugins: &[&str],
) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.logging.level.to_lowercase().as_str()) {
        errors.push(ValidationError {
            field: "logging.level".into(),
            message: format!(
                "unknown level '{}', expected one of {}",
                config.logging.level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    if config.metrics.enabled && config.metrics.address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError {
            field: "metrics.address".into(),
            message: format!("'{}' is not a socket address", config.metrics.address),
        });
    }

    let mut seen = BTreeSet::new();
    for plugin in &config.runtime.plugins {
        if !known_plugins.contains(&plugin.as_str()) {
            errors.push(ValidationError {
                field: "runtime.plugins".into(),
                message: format!("unknown plugin '{}'", plugin),
            });
        }
        if !seen.insert(plugin) {
            errors.push(ValidationError {
                field: "runtime.plugins".into(),
                message: format!("plugin '{}' listed twice", plugin),
            });
        }
    }

    for (prefix, value) in &config.components {
        if !value.is_table() {
            errors.push(ValidationError {
                field: format!("components.{}", prefix),
                message: "component settings must be a table".into(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&HostConfig::default(), &["heartbeat"]).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = HostConfig::default();
        config.logging.level = "loud".into();
        config.metrics.enabled = true;
        config.metrics.address = "nowhere".into();
        config.runtime.plugins = vec!["heartbeat".into(), "heartbeat".into(), "ghost".into()];
        config
            .components
            .insert("heartbeat".into(), toml::Value::Integer(3));

        let errors = validate_config(&config, &["heartbeat"]).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "logging.level",
                "metrics.address",
                "runtime.plugins",
                "runtime.plugins",
                "components.heartbeat"
            ]
        );
    }
}
