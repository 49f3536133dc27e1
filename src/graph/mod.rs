//! Dependency graph subsystem.
//!
//! # Data Flow
//! ```text
//! Registry snapshot (descriptors)
//!     → dependency.rs build (cycle check, DFS with on-stack marks)
//!     → topological_order (dependencies first, ties by name)
//!     → coordinator cohorts (libraries, plugins, app)
//!     → reverse() for shutdown
//! ```
//!
//! # Design Decisions
//! - Forward edges are the only source of truth; dependents are derived
//! - A graph is rebuilt from the registry whenever it is needed, never cached
//! - Shutdown order is a list reversal, not a re-derivation

pub mod dependency;

pub use dependency::{reverse, CycleError, DependencyGraph};
