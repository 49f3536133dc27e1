//! Lifecycle coordinator.
//!
//! # Responsibilities
//! - Drive batches of components through initialize and shutdown
//! - Enforce cohort ordering: Libraries, then Plugins, then the App
//! - Apply the failure policy per cohort and report every outcome
//! - Delegate to the App's `run()` until it exits or shutdown is requested
//! - Add and remove components while the rest of the system keeps running
//!
//! # Data Flow
//! ```text
//! initialize(names)
//!     → scope + unmet dependencies (topological order)
//!     → Libraries one by one   (failure: roll back, abort batch)
//!     → Plugins concurrently   (failure: isolated)
//!     → App                    (failure: abort batch)
//!     → OutcomeReport
//!
//! shutdown(names)
//!     → HasActiveDependents pre-check
//!     → reverse of the order that actually initialized
//!     → App, Plugins concurrently, Libraries one by one (best effort)
//!     → OutcomeReport
//! ```
//!
//! # Design Decisions
//! - Each component transition holds that entry's transition lock from the
//!   first state write to the last, so states move one step at a time
//! - The coordinator never calls component code while holding a registry lock
//! - No implicit timeouts; callers wrap calls in `tokio::time::timeout` if needed
//! - Stopping the App requests a system-wide shutdown, so `wait` never keeps
//!   driving `run()` on an App that is going down

use futures_util::future::join_all;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::Instrument;
use uuid::Uuid;

use crate::component::{ComponentKind, InitContext};
use crate::config::{view, ConfigSource};
use crate::error::{RuntimeError, RuntimeResult};
use crate::graph::{self, DependencyGraph};
use crate::lifecycle::events::{EventHooks, LifecycleEvent};
use crate::lifecycle::outcome::{Operation, OutcomeEntry, OutcomeReport};
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::state::{LifecycleState, Step, Transition};
use crate::observability::metrics;
use crate::registry::container::{active_dependents, EntryMap};
use crate::registry::{Registration, Registry, RegistryEntry};

/// How waiting on the App ended.
#[derive(Debug, Clone)]
pub enum AppExit {
    /// Shutdown was requested while the App was running.
    Cancelled,
    /// The App's `run()` returned.
    Completed,
    /// The App's `run()` returned an error.
    Failed(RuntimeError),
}

/// Components of one batch, split by kind, each in batch order.
#[derive(Default)]
struct Cohorts {
    libraries: Vec<Arc<RegistryEntry>>,
    plugins: Vec<Arc<RegistryEntry>>,
    apps: Vec<Arc<RegistryEntry>>,
}

impl Cohorts {
    fn split(entries: impl IntoIterator<Item = Arc<RegistryEntry>>) -> Self {
        let mut cohorts = Cohorts::default();
        for entry in entries {
            match entry.kind() {
                ComponentKind::Library => cohorts.libraries.push(entry),
                ComponentKind::Plugin => cohorts.plugins.push(entry),
                ComponentKind::App => cohorts.apps.push(entry),
            }
        }
        cohorts
    }
}

/// Drives registered components through their lifecycle.
pub struct LifecycleCoordinator {
    config: ConfigSource,
    hooks: EventHooks,
    shutdown: Shutdown,
    /// Names in the order their last successful initialize completed.
    executed: Mutex<Vec<String>>,
}

impl LifecycleCoordinator {
    pub fn new(config: ConfigSource, hooks: EventHooks) -> Self {
        Self {
            config,
            hooks,
            shutdown: Shutdown::new(),
            executed: Mutex::new(Vec::new()),
        }
    }

    pub fn hooks(&self) -> &EventHooks {
        &self.hooks
    }

    pub fn config(&self) -> &ConfigSource {
        &self.config
    }

    /// Signal that ends `wait`. Triggered when the App stops or finishes.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Components currently up, in the order they were initialized.
    pub fn initialization_order(&self) -> Vec<String> {
        self.executed().clone()
    }

    fn executed(&self) -> MutexGuard<'_, Vec<String>> {
        self.executed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Initialize `names` plus any dependency that is not yet up.
    ///
    /// Structural problems (unknown names, unresolved edges) are returned as
    /// `Err` before any component code runs. Component failures are reported
    /// in the returned report.
    pub async fn initialize(&self, registry: &Registry, names: &[&str]) -> RuntimeResult<OutcomeReport> {
        let batch_id = Uuid::new_v4();
        let span = tracing::info_span!("initialize", batch = %batch_id);
        self.initialize_batch(registry, names, batch_id)
            .instrument(span)
            .await
    }

    /// Initialize every registered component.
    pub async fn initialize_all(&self, registry: &Registry) -> RuntimeResult<OutcomeReport> {
        let snapshot = registry.snapshot();
        let names: Vec<&str> = snapshot.keys().map(String::as_str).collect();
        self.initialize(registry, &names).await
    }

    async fn initialize_batch(
        &self,
        registry: &Registry,
        names: &[&str],
        batch_id: Uuid,
    ) -> RuntimeResult<OutcomeReport> {
        let snapshot = registry.snapshot();
        let scope = requested(&snapshot, names)?;
        let graph = DependencyGraph::build(snapshot.values().map(|e| e.descriptor.as_ref()))?;

        let mut plan = Vec::new();
        for name in graph.topological_order(Some(&scope)) {
            let Some(entry) = snapshot.get(&name) else {
                continue;
            };
            if let Some(missing) = entry
                .descriptor
                .dependencies
                .iter()
                .find(|d| !snapshot.contains_key(*d))
            {
                return Err(RuntimeError::UnresolvedDependency {
                    name,
                    dependency: missing.clone(),
                });
            }
            if scope.contains(&name) || entry.state() != LifecycleState::Initialized {
                plan.push(entry.clone());
            }
        }

        tracing::info!(
            requested = scope.len(),
            components = plan.len(),
            "Initializing components"
        );

        let Cohorts {
            libraries,
            plugins,
            apps,
        } = Cohorts::split(plan);
        let mut report = OutcomeReport::new(Operation::Initialize, batch_id);

        let mut started: Vec<&Arc<RegistryEntry>> = Vec::new();
        for (index, library) in libraries.iter().enumerate() {
            let outcome = self.start_one(&snapshot, library).await;
            let moved = outcome.to_state == LifecycleState::Initialized && !outcome.is_unchanged();
            let failure = outcome.error.clone();
            report.push(outcome);

            if let Some(cause) = failure {
                tracing::error!(
                    component = %library.name(),
                    rollback = started.len(),
                    "Library failed, rolling back batch"
                );
                for done in started.iter().rev() {
                    report.push(self.stop_one(registry, done).await);
                }
                for skipped in libraries[index + 1..].iter().chain(&plugins).chain(&apps) {
                    report.push(OutcomeEntry::skipped(
                        skipped.name(),
                        skipped.kind(),
                        skipped.state(),
                    ));
                }
                report.abort(library.name(), cause);
                return Ok(report.finish());
            }
            if moved {
                started.push(library);
            }
        }

        let outcomes = join_all(plugins.iter().map(|p| self.start_one(&snapshot, p))).await;
        for outcome in outcomes {
            report.push(outcome);
        }

        for app in &apps {
            let outcome = self.start_one(&snapshot, app).await;
            let failure = outcome.error.clone();
            report.push(outcome);
            if let Some(cause) = failure {
                report.abort(app.name(), cause);
            }
        }

        let report = report.finish();
        tracing::info!(
            status = ?report.status,
            failures = report.failures().count(),
            "Initialization finished"
        );
        Ok(report)
    }

    async fn start_one(&self, snapshot: &EntryMap, entry: &Arc<RegistryEntry>) -> OutcomeEntry {
        let _transition = entry.transition.lock().await;
        let descriptor = &entry.descriptor;
        let (name, kind) = (descriptor.name.as_str(), descriptor.kind);
        let from = entry.state();

        if entry.is_retired() {
            tracing::debug!(component = %name, "Removed before it could start");
            return OutcomeEntry::skipped(name, kind, from);
        }

        match from.apply(Transition::Start) {
            Ok(Step::Moved(_)) => {}
            Ok(Step::Unchanged) => {
                tracing::debug!(component = %name, "Already initialized");
                return OutcomeEntry::new(name, kind, from, from, None);
            }
            Err(invalid) => {
                let err = RuntimeError::InvalidTransition {
                    name: name.to_string(),
                    state: invalid.from,
                    action: invalid.transition.action(),
                };
                tracing::warn!(component = %name, error = %err, "Start rejected");
                return OutcomeEntry::new(name, kind, from, from, Some(err));
            }
        }

        self.set_state(entry, LifecycleState::Initializing);
        self.hooks.emit(LifecycleEvent::BeforeInitialize, descriptor);

        let result = match self.prepare(snapshot, entry) {
            Ok(ctx) => entry
                .handle
                .component()
                .initialize(&ctx)
                .await
                .map_err(|e| RuntimeError::init_failure(name, e)),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                self.set_state(entry, LifecycleState::Initialized);
                {
                    let mut executed = self.executed();
                    executed.retain(|n| n != name);
                    executed.push(name.to_string());
                }
                self.hooks.emit(LifecycleEvent::AfterInitialize, descriptor);
                tracing::info!(component = %name, kind = %kind, "Component initialized");
                OutcomeEntry::new(name, kind, from, LifecycleState::Initialized, None)
            }
            Err(err) => {
                self.set_state(entry, LifecycleState::Failed);
                metrics::record_failure(name, "initialize");
                tracing::error!(component = %name, kind = %kind, error = %err, "Component failed to initialize");
                OutcomeEntry::new(name, kind, from, LifecycleState::Failed, Some(err))
            }
        }
    }

    /// Check dependencies and build what `initialize` receives.
    fn prepare(&self, snapshot: &EntryMap, entry: &RegistryEntry) -> RuntimeResult<InitContext> {
        let descriptor = &entry.descriptor;
        let mut dependencies = BTreeMap::new();

        for dependency in &descriptor.dependencies {
            let Some(target) = snapshot.get(dependency) else {
                return Err(RuntimeError::UnresolvedDependency {
                    name: descriptor.name.clone(),
                    dependency: dependency.clone(),
                });
            };
            let state = target.state();
            if state != LifecycleState::Initialized {
                return Err(RuntimeError::DependencyNotReady {
                    name: descriptor.name.clone(),
                    dependency: dependency.clone(),
                    state,
                });
            }
            if descriptor.wire {
                dependencies.insert(dependency.clone(), target.handle.clone());
            }
        }

        let values = self.config.snapshot();
        let config = view::resolve(descriptor, &values).map_err(|source| {
            let rejected = RuntimeError::ConfigRejected {
                name: descriptor.name.clone(),
                source,
            };
            RuntimeError::init_failure(&descriptor.name, Box::new(rejected))
        })?;

        Ok(InitContext::new(descriptor.name.clone(), config, dependencies))
    }

    /// Shut down `names`.
    ///
    /// Rejected with `HasActiveDependents` before any component code runs if
    /// a component outside the batch still needs one of them. Every
    /// component is attempted; failures are collected in the report.
    pub async fn shutdown(&self, registry: &Registry, names: &[&str]) -> RuntimeResult<OutcomeReport> {
        let batch_id = Uuid::new_v4();
        let span = tracing::info_span!("shutdown", batch = %batch_id);
        self.shutdown_batch(registry, names, batch_id)
            .instrument(span)
            .await
    }

    /// Shut down every registered component.
    pub async fn shutdown_all(&self, registry: &Registry) -> RuntimeResult<OutcomeReport> {
        let snapshot = registry.snapshot();
        let names: Vec<&str> = snapshot.keys().map(String::as_str).collect();
        self.shutdown(registry, &names).await
    }

    async fn shutdown_batch(
        &self,
        registry: &Registry,
        names: &[&str],
        batch_id: Uuid,
    ) -> RuntimeResult<OutcomeReport> {
        let snapshot = registry.snapshot();
        let scope = requested(&snapshot, names)?;

        for name in &scope {
            let blocking: Vec<String> = active_dependents(&snapshot, name)
                .into_iter()
                .filter(|d| !scope.contains(d))
                .collect();
            if !blocking.is_empty() {
                return Err(RuntimeError::HasActiveDependents {
                    name: name.clone(),
                    dependents: blocking,
                });
            }
        }

        let order = self.shutdown_order(&snapshot, &scope)?;
        tracing::info!(components = order.len(), "Shutting down components");

        let Cohorts {
            libraries,
            plugins,
            apps,
        } = Cohorts::split(order.iter().filter_map(|n| snapshot.get(n).cloned()));
        let mut report = OutcomeReport::new(Operation::Shutdown, batch_id);

        for app in &apps {
            report.push(self.stop_one(registry, app).await);
        }

        let outcomes = join_all(plugins.iter().map(|p| self.stop_one(registry, p))).await;
        for outcome in outcomes {
            report.push(outcome);
        }

        for library in &libraries {
            report.push(self.stop_one(registry, library).await);
        }

        let report = report.finish();
        tracing::info!(
            status = ?report.status,
            failures = report.failures().count(),
            "Shutdown finished"
        );
        Ok(report)
    }

    /// Reverse of the initialization order that actually ran, with anything
    /// this coordinator never started placed by graph order.
    fn shutdown_order(&self, snapshot: &EntryMap, scope: &BTreeSet<String>) -> RuntimeResult<Vec<String>> {
        let mut order: Vec<String> = self
            .executed()
            .iter()
            .filter(|n| scope.contains(*n))
            .cloned()
            .collect();

        let graph = DependencyGraph::build(snapshot.values().map(|e| e.descriptor.as_ref()))?;
        for name in graph.topological_order(None) {
            if scope.contains(&name) && !order.contains(&name) {
                order.push(name);
            }
        }
        Ok(graph::reverse(&order))
    }

    async fn stop_one(&self, registry: &Registry, entry: &Arc<RegistryEntry>) -> OutcomeEntry {
        let _transition = entry.transition.lock().await;
        let descriptor = &entry.descriptor;
        let (name, kind) = (descriptor.name.as_str(), descriptor.kind);
        let from = entry.state();

        match from.apply(Transition::Stop) {
            Ok(Step::Moved(_)) => {}
            Ok(Step::Unchanged) => {
                tracing::debug!(component = %name, state = %from, "Nothing to shut down");
                return OutcomeEntry::new(name, kind, from, from, None);
            }
            Err(invalid) => {
                let err = RuntimeError::InvalidTransition {
                    name: name.to_string(),
                    state: invalid.from,
                    action: invalid.transition.action(),
                };
                tracing::warn!(component = %name, error = %err, "Stop rejected");
                return OutcomeEntry::new(name, kind, from, from, Some(err));
            }
        }

        // Claim the component before looking at dependents. A dependent that
        // starts concurrently then sees ShuttingDown and fails its readiness check.
        self.set_state(entry, LifecycleState::ShuttingDown);
        let active = active_dependents(&registry.snapshot(), name);
        if !active.is_empty() {
            self.set_state(entry, from);
            let err = RuntimeError::HasActiveDependents {
                name: name.to_string(),
                dependents: active,
            };
            tracing::warn!(component = %name, error = %err, "Stop rejected");
            return OutcomeEntry::new(name, kind, from, from, Some(err));
        }

        if kind == ComponentKind::App {
            self.shutdown.trigger();
        }
        self.hooks.emit(LifecycleEvent::BeforeShutdown, descriptor);

        let result = entry.handle.component().shutdown().await;
        self.executed().retain(|n| n != name);

        match result {
            Ok(()) => {
                self.set_state(entry, LifecycleState::ShutdownComplete);
                self.hooks.emit(LifecycleEvent::AfterShutdown, descriptor);
                tracing::info!(component = %name, kind = %kind, "Component shut down");
                OutcomeEntry::new(name, kind, from, LifecycleState::ShutdownComplete, None)
            }
            Err(e) => {
                let err = RuntimeError::shutdown_failure(name, e);
                self.set_state(entry, LifecycleState::Failed);
                metrics::record_failure(name, "shutdown");
                tracing::error!(component = %name, kind = %kind, error = %err, "Component failed to shut down");
                OutcomeEntry::new(name, kind, from, LifecycleState::Failed, Some(err))
            }
        }
    }

    fn set_state(&self, entry: &RegistryEntry, state: LifecycleState) {
        entry.state.store(state);
        metrics::record_transition(entry.name(), entry.kind(), state);
        tracing::debug!(component = %entry.name(), state = %state, "State changed");
    }

    /// Run the App until it exits or shutdown is requested.
    ///
    /// Shutdown is requested through the handle from `shutdown_handle`, or by
    /// stopping the App. When the App's `run()` returns (with or without an
    /// error) a system-wide shutdown is requested too. Either way the caller
    /// still owns the orderly shutdown. Without an App this simply waits for
    /// the request.
    pub async fn wait(&self, registry: &Registry) -> RuntimeResult<AppExit> {
        let shutdown = &self.shutdown;
        let Some(app) = registry.app() else {
            tracing::info!("No app registered, waiting for shutdown request");
            shutdown.cancelled().await;
            return Ok(AppExit::Cancelled);
        };
        let entry = registry
            .entry(app.name())
            .ok_or_else(|| RuntimeError::NotFound(app.name().to_string()))?;

        let state = entry.state();
        if state != LifecycleState::Initialized {
            return Err(RuntimeError::InvalidTransition {
                name: entry.name().to_string(),
                state,
                action: "run",
            });
        }

        let name = entry.name();
        let component = entry.handle.component().clone();
        tracing::info!(app = %name, "Running app");

        let exit = tokio::select! {
            result = component.run() => match result {
                Ok(()) => {
                    tracing::info!(app = %name, "App finished");
                    AppExit::Completed
                }
                Err(e) => {
                    let err = RuntimeError::AppFailure {
                        name: name.to_string(),
                        cause: Arc::from(e),
                    };
                    metrics::record_failure(name, "run");
                    tracing::error!(app = %name, error = %err, "App exited with error");
                    AppExit::Failed(err)
                }
            },
            _ = shutdown.cancelled() => {
                tracing::info!(app = %name, "Shutdown requested, stopped waiting on app");
                return Ok(AppExit::Cancelled);
            }
        };

        shutdown.trigger();
        Ok(exit)
    }

    /// Register a component and initialize it while the system is running.
    ///
    /// A component that fails to initialize stays registered in `Failed`.
    pub async fn register_and_start(
        &self,
        registry: &Registry,
        registration: Registration,
    ) -> RuntimeResult<OutcomeReport> {
        let name = registration.name().to_string();
        let lock = registry.name_lock(&name);
        let result = {
            let _guard = lock.lock().await;
            match registry.register(registration) {
                Ok(()) => self.initialize(registry, &[name.as_str()]).await,
                Err(e) => Err(e),
            }
        };
        drop(lock);
        registry.release_name_lock(&name);
        result
    }

    /// Shut down one component and remove it while the system is running.
    ///
    /// If its shutdown fails the entry stays registered in `Failed` and the
    /// shutdown error is returned.
    pub async fn unregister_and_stop(&self, registry: &Registry, name: &str) -> RuntimeResult<OutcomeReport> {
        let lock = registry.name_lock(name);
        let result = {
            let _guard = lock.lock().await;
            self.stop_and_unregister(registry, name).await
        };
        drop(lock);
        registry.release_name_lock(name);
        result
    }

    async fn stop_and_unregister(&self, registry: &Registry, name: &str) -> RuntimeResult<OutcomeReport> {
        let report = self.shutdown(registry, &[name]).await?;
        if let Some(err) = report
            .entries
            .iter()
            .rev()
            .find(|e| e.name == name)
            .and_then(|e| e.error.clone())
        {
            return Err(err);
        }

        registry.unregister(name)?;
        Ok(report)
    }
}

impl std::fmt::Debug for LifecycleCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleCoordinator")
            .field("hooks", &self.hooks)
            .field("executed", &*self.executed())
            .finish()
    }
}

fn requested(snapshot: &EntryMap, names: &[&str]) -> RuntimeResult<BTreeSet<String>> {
    names
        .iter()
        .map(|name| {
            if snapshot.contains_key(*name) {
                Ok(name.to_string())
            } else {
                Err(RuntimeError::NotFound(name.to_string()))
            }
        })
        .collect()
}
