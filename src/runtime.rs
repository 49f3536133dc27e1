//! Runtime facade.
//!
//! # Responsibilities
//! - Own one registry and the coordinator that drives it
//! - Offer the whole-system operations: start, wait, stop, run
//! - Forward live add/remove to the coordinator
//!
//! # Design Decisions
//! - No globals: every runtime is an explicit value, so tests can build many
//! - `run` always shuts down, whether the App finished, failed, or a shutdown
//!   was requested from outside

use std::sync::Arc;

use crate::config::ConfigSource;
use crate::error::RuntimeResult;
use crate::lifecycle::{AppExit, EventHooks, LifecycleCoordinator, OutcomeReport, Shutdown};
use crate::registry::{Registration, Registry};

/// Reports from one full `run`.
#[derive(Debug)]
pub struct RunSummary {
    pub startup: OutcomeReport,
    /// `None` when startup was aborted and the App never ran.
    pub exit: Option<AppExit>,
    pub shutdown: OutcomeReport,
}

/// A registry plus the coordinator that drives it.
pub struct Runtime {
    registry: Arc<Registry>,
    coordinator: Arc<LifecycleCoordinator>,
}

impl Runtime {
    pub fn new(config: ConfigSource) -> Self {
        Self::with_hooks(config, EventHooks::new())
    }

    pub fn with_hooks(config: ConfigSource, hooks: EventHooks) -> Self {
        Self {
            registry: Arc::new(Registry::new()),
            coordinator: Arc::new(LifecycleCoordinator::new(config, hooks)),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn coordinator(&self) -> &Arc<LifecycleCoordinator> {
        &self.coordinator
    }

    pub fn hooks(&self) -> &EventHooks {
        self.coordinator.hooks()
    }

    /// Handle that requests a system-wide shutdown when triggered.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.coordinator.shutdown_handle()
    }

    pub fn register(&self, registration: Registration) -> RuntimeResult<()> {
        self.registry.register(registration)
    }

    pub fn register_all(&self, batch: Vec<Registration>) -> RuntimeResult<()> {
        self.registry.register_all(batch)
    }

    /// Initialize everything registered.
    pub async fn start(&self) -> RuntimeResult<OutcomeReport> {
        self.coordinator.initialize_all(&self.registry).await
    }

    /// Run the App until it exits, is stopped, or shutdown is requested.
    pub async fn wait(&self) -> RuntimeResult<AppExit> {
        self.coordinator.wait(&self.registry).await
    }

    /// Shut down everything registered.
    pub async fn stop(&self) -> RuntimeResult<OutcomeReport> {
        self.coordinator.shutdown_all(&self.registry).await
    }

    /// Add and start a component while running.
    pub async fn add(&self, registration: Registration) -> RuntimeResult<OutcomeReport> {
        self.coordinator
            .register_and_start(&self.registry, registration)
            .await
    }

    /// Stop and remove a component while running.
    pub async fn remove(&self, name: &str) -> RuntimeResult<OutcomeReport> {
        self.coordinator
            .unregister_and_stop(&self.registry, name)
            .await
    }

    /// Start, wait, then stop.
    ///
    /// Only structural errors are returned as `Err`; component failures are
    /// in the reports.
    pub async fn run(&self) -> RuntimeResult<RunSummary> {
        let startup = self.start().await?;

        let exit = if startup.is_aborted() {
            tracing::error!(status = ?startup.status, "Startup aborted, shutting down");
            None
        } else {
            match self.wait().await {
                Ok(exit) => Some(exit),
                Err(e) => {
                    tracing::error!(error = %e, "Cannot run app, shutting down");
                    None
                }
            }
        };

        let shutdown = self.stop().await?;
        Ok(RunSummary {
            startup,
            exit,
            shutdown,
        })
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(ConfigSource::empty())
    }
}
