//! Component descriptors.
//!
//! # Responsibilities
//! - Identify a component (name, version, description)
//! - Declare its kind and the names it depends on
//! - Carry the config contracts it expects before `initialize`

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::config::view::ConfigContract;

/// Capability kind of a component; decides which cohort it is driven in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    /// Dependency-order-sensitive, always-on.
    Library,
    /// Optional, can be enabled and disabled while running.
    Plugin,
    /// The single long-running entry point.
    App,
}

impl ComponentKind {
    /// Whether a component of this kind may declare a dependency on `other`.
    ///
    /// Libraries start first and sequentially, plugins start together, the app
    /// starts last; an edge is only allowed toward an earlier cohort (or, for
    /// libraries, within the sequential library cohort).
    pub fn may_depend_on(self, other: ComponentKind) -> bool {
        match self {
            ComponentKind::Library => other == ComponentKind::Library,
            ComponentKind::Plugin => other == ComponentKind::Library,
            ComponentKind::App => other != ComponentKind::App,
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComponentKind::Library => "library",
            ComponentKind::Plugin => "plugin",
            ComponentKind::App => "app",
        };
        f.write_str(s)
    }
}

/// Immutable description of a component.
#[derive(Clone, Serialize)]
pub struct ComponentDescriptor {
    /// Unique, stable key.
    pub name: String,
    pub version: String,
    pub description: String,
    pub kind: ComponentKind,
    /// Names of components that must be initialized first.
    pub dependencies: BTreeSet<String>,
    /// Whether resolved dependency handles are passed to `initialize`.
    pub wire: bool,
    /// Config contracts in declaration order.
    #[serde(serialize_with = "serialize_contracts")]
    pub config_refs: Vec<Arc<dyn ConfigContract>>,
}

impl ComponentDescriptor {
    /// Start building a descriptor.
    pub fn builder(name: impl Into<String>, kind: ComponentKind) -> DescriptorBuilder {
        DescriptorBuilder::new(name, kind)
    }

    /// Shorthand for a library descriptor.
    pub fn library(name: impl Into<String>) -> DescriptorBuilder {
        DescriptorBuilder::new(name, ComponentKind::Library)
    }

    /// Shorthand for a plugin descriptor.
    pub fn plugin(name: impl Into<String>) -> DescriptorBuilder {
        DescriptorBuilder::new(name, ComponentKind::Plugin)
    }

    /// Shorthand for an app descriptor.
    pub fn app(name: impl Into<String>) -> DescriptorBuilder {
        DescriptorBuilder::new(name, ComponentKind::App)
    }

    /// Config prefixes this component is entitled to read.
    pub fn config_prefixes(&self) -> impl Iterator<Item = &str> {
        self.config_refs.iter().map(|c| c.prefix())
    }
}

impl fmt::Debug for ComponentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDescriptor")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("kind", &self.kind)
            .field("dependencies", &self.dependencies)
            .field("wire", &self.wire)
            .field("config_refs", &self.config_prefixes().collect::<Vec<_>>())
            .finish()
    }
}

impl fmt::Display for ComponentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{}", self.name, self.version)
    }
}

fn serialize_contracts<S>(refs: &[Arc<dyn ConfigContract>], s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.collect_seq(refs.iter().map(|c| c.prefix()))
}

/// Error returned when a descriptor is malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DescriptorError {
    #[error("component name must not be empty")]
    EmptyName,
    #[error("component '{0}' cannot depend on itself")]
    SelfDependency(String),
    #[error("component '{name}' declares config prefix '{prefix}' more than once")]
    DuplicateConfigPrefix { name: String, prefix: String },
}

/// Builder for [`ComponentDescriptor`].
pub struct DescriptorBuilder {
    name: String,
    version: String,
    description: String,
    kind: ComponentKind,
    dependencies: BTreeSet<String>,
    wire: bool,
    config_refs: Vec<Arc<dyn ConfigContract>>,
}

impl DescriptorBuilder {
    fn new(name: impl Into<String>, kind: ComponentKind) -> Self {
        Self {
            name: name.into(),
            version: "0.0.0".to_string(),
            description: String::new(),
            kind,
            dependencies: BTreeSet::new(),
            wire: true,
            config_refs: Vec::new(),
        }
    }

    /// Name of the component being described.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Declare a dependency on another component by name.
    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.dependencies.insert(name.into());
        self
    }

    pub fn wire(mut self, wire: bool) -> Self {
        self.wire = wire;
        self
    }

    /// Declare a config contract.
    pub fn config(mut self, contract: impl ConfigContract + 'static) -> Self {
        self.config_refs.push(Arc::new(contract));
        self
    }

    /// Validate and produce the descriptor.
    pub fn build(self) -> Result<ComponentDescriptor, DescriptorError> {
        if self.name.trim().is_empty() {
            return Err(DescriptorError::EmptyName);
        }
        if self.dependencies.contains(&self.name) {
            return Err(DescriptorError::SelfDependency(self.name));
        }
        let mut seen = BTreeSet::new();
        for contract in &self.config_refs {
            if !seen.insert(contract.prefix().to_string()) {
                return Err(DescriptorError::DuplicateConfigPrefix {
                    name: self.name,
                    prefix: contract.prefix().to_string(),
                });
            }
        }

        Ok(ComponentDescriptor {
            name: self.name,
            version: self.version,
            description: self.description,
            kind: self.kind,
            dependencies: self.dependencies,
            wire: self.wire,
            config_refs: self.config_refs,
        })
    }
}
