//! Host configuration schema.
//!
//! This module defines the configuration file read by the host binary.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the component host.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HostConfig {
    /// Logging settings.
    pub logging: LoggingConfig,

    /// Metrics exporter settings.
    pub metrics: MetricsConfig,

    /// Runtime behavior.
    pub runtime: RuntimeSettings,

    /// Merged per-component values, keyed by config prefix.
    pub components: toml::Table,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Metrics configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable the Prometheus endpoint.
    pub enabled: bool,

    /// Metrics endpoint bind address.
    pub address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Runtime behavior configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RuntimeSettings {
    /// Reload `[components]` values when the config file changes.
    pub watch: bool,

    /// Plugins to register at startup.
    pub plugins: Vec<String>,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            watch: false,
            plugins: vec!["heartbeat".to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: HostConfig = toml::from_str("").unwrap();
        assert_eq!(config.logging.level, "info");
        assert!(!config.metrics.enabled);
        assert_eq!(config.runtime.plugins, vec!["heartbeat"]);
        assert!(config.components.is_empty());
    }

    #[test]
    fn test_components_table_kept_verbatim() {
        let config: HostConfig = toml::from_str(
            r#"
            [runtime]
            plugins = []

            [components.heartbeat]
            interval_ms = 250
            "#,
        )
        .unwrap();
        assert!(config.runtime.plugins.is_empty());
        let hb = config.components["heartbeat"].as_table().unwrap();
        assert_eq!(hb["interval_ms"].as_integer(), Some(250));
    }
}
