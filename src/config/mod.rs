//! Configuration subsystem.
//!
//! # Data Flow
//! ```text
//! Host config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → HostConfig (validated, immutable)
//!     → [components] table into source.rs (ConfigSource)
//!
//! Before a component is initialized:
//!     view.rs resolves only the sections named by its config contracts
//!     → checks each section against its contract
//!     → ComponentConfig handed to Component::initialize
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → atomic swap of the component values
//!     → components started afterwards observe the new values
//! ```
//!
//! # Design Decisions
//! - Host config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod source;
pub mod validation;
pub mod view;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{HostConfig, LoggingConfig, MetricsConfig, RuntimeSettings};
pub use source::ConfigSource;
pub use view::{ComponentConfig, ConfigContract, ConfigViewError, TypedContract};
