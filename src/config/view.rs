//! Per-component configuration view.
//!
//! # Responsibilities
//! - Describe what a component expects (`ConfigContract`)
//! - Select, from the merged value source, only the sections a component
//!   declared
//! - Check each section against its contract before `initialize`
//!
//! # Design Decisions
//! - No parsing or merging here; the value source is already merged
//! - A missing section is checked as an empty table, so models whose fields
//!   all have defaults accept it

use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use thiserror::Error;

use crate::component::ComponentDescriptor;

/// Errors raised while resolving or reading a component's configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigViewError {
    /// The section is absent and the contract needs values.
    #[error("missing config section '{prefix}': {reason}")]
    Missing { prefix: String, reason: String },

    /// The section is present but does not match the contract.
    #[error("invalid config section '{prefix}': {reason}")]
    Invalid { prefix: String, reason: String },

    /// The component asked for a section it never declared.
    #[error("config section '{0}' was not declared by this component")]
    NotDeclared(String),
}

/// A configuration contract declared by a component.
pub trait ConfigContract: Send + Sync {
    /// Normalized section name in the value source.
    fn prefix(&self) -> &str;

    /// Check that `value` conforms to this contract.
    fn check(&self, value: &toml::Value) -> Result<(), String>;
}

/// Contract backed by a serde model: a section conforms if it deserializes into `T`.
pub struct TypedContract<T> {
    prefix: String,
    _model: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> TypedContract<T> {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: normalize_prefix(prefix),
            _model: PhantomData,
        }
    }
}

impl<T: DeserializeOwned> ConfigContract for TypedContract<T> {
    fn prefix(&self) -> &str {
        &self.prefix
    }

    fn check(&self, value: &toml::Value) -> Result<(), String> {
        value
            .clone()
            .try_into::<T>()
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

impl<T> fmt::Debug for TypedContract<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedContract")
            .field("prefix", &self.prefix)
            .field("model", &std::any::type_name::<T>())
            .finish()
    }
}

/// Normalize a section prefix: strip surrounding underscores and whitespace,
/// lowercase, and join inner whitespace runs with `_`.
pub fn normalize_prefix(prefix: &str) -> String {
    prefix
        .trim()
        .trim_matches('_')
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// Configuration values a single component is entitled to see.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentConfig {
    sections: BTreeMap<String, toml::Value>,
}

impl ComponentConfig {
    /// Deserialize a declared section into `T`.
    pub fn get<T: DeserializeOwned>(&self, prefix: &str) -> Result<T, ConfigViewError> {
        let prefix = normalize_prefix(prefix);
        let value = self
            .sections
            .get(&prefix)
            .ok_or_else(|| ConfigViewError::NotDeclared(prefix.clone()))?;
        value
            .clone()
            .try_into::<T>()
            .map_err(|e| ConfigViewError::Invalid {
                prefix,
                reason: e.to_string(),
            })
    }

    /// Raw value of a declared section.
    pub fn raw(&self, prefix: &str) -> Option<&toml::Value> {
        self.sections.get(&normalize_prefix(prefix))
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }
}

/// Find a section by dotted path: `database.pool` is `[database.pool]`.
fn lookup<'v>(values: &'v toml::Table, prefix: &str) -> Option<&'v toml::Value> {
    if let Some(value) = values.get(prefix) {
        return Some(value);
    }
    let mut parts = prefix.split('.');
    let mut current = values.get(parts.next()?)?;
    for part in parts {
        current = current.as_table()?.get(part)?;
    }
    Some(current)
}

/// Resolve the view of `values` that `descriptor` is entitled to.
pub fn resolve(
    descriptor: &ComponentDescriptor,
    values: &toml::Table,
) -> Result<ComponentConfig, ConfigViewError> {
    let mut sections = BTreeMap::new();

    for contract in &descriptor.config_refs {
        let prefix = contract.prefix();
        let value = match lookup(values, prefix) {
            Some(value) => {
                contract
                    .check(value)
                    .map_err(|reason| ConfigViewError::Invalid {
                        prefix: prefix.to_string(),
                        reason,
                    })?;
                value.clone()
            }
            None => {
                let empty = toml::Value::Table(toml::Table::new());
                contract
                    .check(&empty)
                    .map_err(|reason| ConfigViewError::Missing {
                        prefix: prefix.to_string(),
                        reason,
                    })?;
                empty
            }
        };
        sections.insert(prefix.to_string(), value);
    }

    tracing::trace!(
        component = %descriptor.name,
        sections = sections.len(),
        "Resolved component configuration"
    );
    Ok(ComponentConfig { sections })
}
