//! Runtime error taxonomy.
//!
//! # Design Decisions
//! - Structural errors (names, edges, cycles) are raised before any component
//!   code runs and are never partially applied
//! - Component failures carry the failing component's name and the cause
//!   returned by the component itself
//! - Errors are `Clone` so a single failure can appear both in an outcome
//!   report and in the error returned to the caller

use std::sync::Arc;
use thiserror::Error;

use crate::component::ComponentKind;
use crate::config::view::ConfigViewError;
use crate::lifecycle::state::LifecycleState;

/// Error type returned by component implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Shared form of a component error, cheap to clone into reports.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by the registry, graph and coordinator.
#[derive(Debug, Clone, Error)]
pub enum RuntimeError {
    /// A component with this name is already registered (or appears twice in a batch).
    #[error("component '{0}' is already registered")]
    DuplicateName(String),

    /// A declared dependency does not name a registered component.
    #[error("component '{name}' depends on '{dependency}', which is not registered")]
    UnresolvedDependency { name: String, dependency: String },

    /// The dependency graph contains a cycle.
    #[error("dependency cycle detected: {}", format_cycle(.cycle))]
    CycleDetected { cycle: Vec<String> },

    /// A lifecycle request that is not legal from the component's current state.
    #[error("cannot {action} component '{name}' while it is {state}")]
    InvalidTransition {
        name: String,
        state: LifecycleState,
        action: &'static str,
    },

    /// The component still has active dependents.
    #[error("component '{name}' is still required by: {}", .dependents.join(", "))]
    HasActiveDependents { name: String, dependents: Vec<String> },

    /// No component with this name is registered.
    #[error("component '{0}' is not registered")]
    NotFound(String),

    /// A component's `initialize` failed.
    #[error("component '{name}' failed to initialize: {cause}")]
    ComponentInitFailure {
        name: String,
        #[source]
        cause: SharedError,
    },

    /// A component's `shutdown` failed.
    #[error("component '{name}' failed to shut down: {cause}")]
    ComponentShutdownFailure {
        name: String,
        #[source]
        cause: SharedError,
    },

    /// A dependency edge crosses cohorts in a direction the coordinator cannot honor.
    #[error("{kind} '{name}' cannot depend on {dependency_kind} '{dependency}'")]
    InvalidDependencyKind {
        name: String,
        kind: ComponentKind,
        dependency: String,
        dependency_kind: ComponentKind,
    },

    /// Only one App may be registered.
    #[error("cannot register app '{name}': app '{existing}' is already registered")]
    AppAlreadyRegistered { name: String, existing: String },

    /// A dependency was not initialized when the component was about to start.
    #[error("component '{name}' cannot start: dependency '{dependency}' is {state}")]
    DependencyNotReady {
        name: String,
        dependency: String,
        state: LifecycleState,
    },

    /// The configuration value handed to a component did not satisfy its contract.
    #[error("configuration rejected for component '{name}': {source}")]
    ConfigRejected {
        name: String,
        #[source]
        source: ConfigViewError,
    },

    /// The App's `run()` returned an error.
    #[error("app '{name}' exited with error: {cause}")]
    AppFailure {
        name: String,
        #[source]
        cause: SharedError,
    },
}

impl RuntimeError {
    /// Wrap a component's initialize error.
    pub fn init_failure(name: &str, cause: BoxError) -> Self {
        RuntimeError::ComponentInitFailure {
            name: name.to_string(),
            cause: Arc::from(cause),
        }
    }

    /// Wrap a component's shutdown error.
    pub fn shutdown_failure(name: &str, cause: BoxError) -> Self {
        RuntimeError::ComponentShutdownFailure {
            name: name.to_string(),
            cause: Arc::from(cause),
        }
    }

    /// True for errors detected before any component code runs.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            RuntimeError::DuplicateName(_)
                | RuntimeError::UnresolvedDependency { .. }
                | RuntimeError::CycleDetected { .. }
                | RuntimeError::HasActiveDependents { .. }
                | RuntimeError::NotFound(_)
                | RuntimeError::InvalidDependencyKind { .. }
                | RuntimeError::AppAlreadyRegistered { .. }
        )
    }
}

fn format_cycle(cycle: &[String]) -> String {
    match cycle.first() {
        Some(first) => format!("{} -> {}", cycle.join(" -> "), first),
        None => String::new(),
    }
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RuntimeError::CycleDetected {
            cycle: vec!["a".into(), "b".into()],
        };
        assert_eq!(err.to_string(), "dependency cycle detected: a -> b -> a");

        let err = RuntimeError::HasActiveDependents {
            name: "db".into(),
            dependents: vec!["cache".into(), "api".into()],
        };
        assert_eq!(
            err.to_string(),
            "component 'db' is still required by: cache, api"
        );

        let err = RuntimeError::InvalidTransition {
            name: "db".into(),
            state: LifecycleState::ShuttingDown,
            action: "stop",
        };
        assert_eq!(
            err.to_string(),
            "cannot stop component 'db' while it is shutting down"
        );
    }

    #[test]
    fn test_failure_keeps_source() {
        let err = RuntimeError::init_failure("db", "connection refused".into());
        assert!(err.to_string().contains("connection refused"));
        assert!(std::error::Error::source(&err).is_some());
        assert!(!err.is_structural());
        assert!(RuntimeError::NotFound("x".into()).is_structural());
    }
}
