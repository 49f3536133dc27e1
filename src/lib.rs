//! Component dependency-graph and lifecycle runtime.
//!
//! Components (Libraries, Plugins, one App) are registered with their
//! declared dependencies, validated as an acyclic graph, and driven through
//! initialize and shutdown in dependency order. See [`Runtime`] for the
//! whole-system entry point.

pub mod builtin;
pub mod component;
pub mod config;
pub mod error;
pub mod graph;
pub mod lifecycle;
pub mod observability;
pub mod registry;
pub mod runtime;

pub use component::{Component, ComponentDescriptor, ComponentKind, InitContext};
pub use error::{BoxError, RuntimeError, RuntimeResult};
pub use lifecycle::{LifecycleCoordinator, LifecycleState, OutcomeReport, Shutdown};
pub use registry::{Registration, Registry};
pub use runtime::{RunSummary, Runtime};
