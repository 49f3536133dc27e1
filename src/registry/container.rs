//! The component registry.
//!
//! # Responsibilities
//! - Own the single authoritative map from name to entry
//! - Validate registrations (names, edges, kinds, cycles) before applying them
//! - Refuse removals that would strand active dependents
//! - Answer queries from consistent snapshots
//!
//! # Design Decisions
//! - Readers load an immutable snapshot of the map (`ArcSwap`); writers
//!   build a new map and swap it in, so a reader never sees a half-applied
//!   registration
//! - Writers are serialized by a plain mutex that is never held across `.await`
//! - Per-name async locks let callers serialize live operations on the same
//!   name while different names proceed concurrently

use arc_swap::ArcSwap;
use dashmap::DashMap;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::component::{Component, ComponentDescriptor, ComponentKind};
use crate::error::{RuntimeError, RuntimeResult};
use crate::graph::DependencyGraph;
use crate::lifecycle::state::LifecycleState;
use crate::observability::metrics;
use crate::registry::entry::{ComponentInfo, Registration, RegistryEntry};

pub(crate) type EntryMap = BTreeMap<String, Arc<RegistryEntry>>;

/// Runtime collection of registered components.
pub struct Registry {
    entries: ArcSwap<EntryMap>,
    write_lock: Mutex<()>,
    name_locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            entries: ArcSwap::from_pointee(EntryMap::new()),
            write_lock: Mutex::new(()),
            name_locks: DashMap::new(),
        }
    }

    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register one component.
    pub fn register(&self, registration: Registration) -> RuntimeResult<()> {
        self.register_all(vec![registration])
    }

    /// Register a batch of components; all or nothing.
    ///
    /// Dependencies may point at components registered earlier or at other
    /// members of the batch.
    pub fn register_all(&self, batch: Vec<Registration>) -> RuntimeResult<()> {
        let _guard = self.lock_writes();
        let current = self.entries.load_full();

        let mut incoming: BTreeMap<String, Registration> = BTreeMap::new();
        for registration in batch {
            let name = registration.name().to_string();
            if current.contains_key(&name) || incoming.contains_key(&name) {
                return Err(RuntimeError::DuplicateName(name));
            }
            incoming.insert(name, registration);
        }

        let mut app = current
            .values()
            .find(|e| e.kind() == ComponentKind::App)
            .map(|e| e.name().to_string());
        for registration in incoming.values() {
            if registration.kind() != ComponentKind::App {
                continue;
            }
            if let Some(existing) = &app {
                return Err(RuntimeError::AppAlreadyRegistered {
                    name: registration.name().to_string(),
                    existing: existing.clone(),
                });
            }
            app = Some(registration.name().to_string());
        }

        let kind_of = |name: &str| {
            current
                .get(name)
                .map(|e| e.kind())
                .or_else(|| incoming.get(name).map(|r| r.kind()))
        };
        for registration in incoming.values() {
            let descriptor = &registration.descriptor;
            for dependency in &descriptor.dependencies {
                let Some(dependency_kind) = kind_of(dependency) else {
                    return Err(RuntimeError::UnresolvedDependency {
                        name: descriptor.name.clone(),
                        dependency: dependency.clone(),
                    });
                };
                if !descriptor.kind.may_depend_on(dependency_kind) {
                    return Err(RuntimeError::InvalidDependencyKind {
                        name: descriptor.name.clone(),
                        kind: descriptor.kind,
                        dependency: dependency.clone(),
                        dependency_kind,
                    });
                }
            }
        }

        DependencyGraph::build(
            current
                .values()
                .map(|e| e.descriptor.as_ref())
                .chain(incoming.values().map(|r| &r.descriptor)),
        )?;

        let mut next = EntryMap::clone(&current);
        for (name, registration) in incoming {
            tracing::info!(
                component = %name,
                kind = %registration.kind(),
                version = %registration.descriptor.version,
                registered_by = %registration.registered_by,
                "Component registered"
            );
            next.insert(name, Arc::new(RegistryEntry::new(registration)));
        }
        let len = next.len();
        self.entries.store(Arc::new(next));
        metrics::record_registered(len);
        Ok(())
    }

    /// Remove a component that is no longer running.
    ///
    /// Fails if the component is unknown, still required by an active
    /// dependent, or still active itself. A component in the middle of a
    /// transition counts as active. The removed entry is retired, so a batch
    /// that picked it up earlier skips it instead of starting it.
    pub fn unregister(&self, name: &str) -> RuntimeResult<Arc<ComponentDescriptor>> {
        let _guard = self.lock_writes();
        let current = self.entries.load_full();

        let entry = current
            .get(name)
            .ok_or_else(|| RuntimeError::NotFound(name.to_string()))?;

        let active = active_dependents(&current, name);
        if !active.is_empty() {
            return Err(RuntimeError::HasActiveDependents {
                name: name.to_string(),
                dependents: active,
            });
        }

        let state = entry.state();
        if state.is_active() {
            return Err(RuntimeError::InvalidTransition {
                name: name.to_string(),
                state,
                action: "unregister",
            });
        }
        let Ok(_transition) = entry.transition.try_lock() else {
            return Err(RuntimeError::InvalidTransition {
                name: name.to_string(),
                state: entry.state(),
                action: "unregister",
            });
        };
        entry.retire();

        let descriptor = entry.descriptor.clone();
        let mut next = EntryMap::clone(&current);
        next.remove(name);
        let len = next.len();
        self.entries.store(Arc::new(next));
        metrics::record_registered(len);

        tracing::info!(component = %name, "Component unregistered");
        Ok(descriptor)
    }

    /// Snapshot of one component.
    pub fn get(&self, name: &str) -> Option<ComponentInfo> {
        let snapshot = self.entries.load();
        let entry = snapshot.get(name)?;
        Some(entry.info(derived_dependents(&snapshot, name)))
    }

    /// Snapshots of every component, by name.
    pub fn all(&self) -> Vec<ComponentInfo> {
        let snapshot = self.entries.load();
        snapshot
            .values()
            .map(|e| e.info(derived_dependents(&snapshot, e.name())))
            .collect()
    }

    /// Snapshots of every component of `kind`, by name.
    pub fn query_by_kind(&self, kind: ComponentKind) -> Vec<ComponentInfo> {
        let snapshot = self.entries.load();
        snapshot
            .values()
            .filter(|e| e.kind() == kind)
            .map(|e| e.info(derived_dependents(&snapshot, e.name())))
            .collect()
    }

    /// The registered App, if any.
    pub fn app(&self) -> Option<ComponentInfo> {
        self.query_by_kind(ComponentKind::App).into_iter().next()
    }

    /// Current lifecycle state of a component.
    pub fn state(&self, name: &str) -> Option<LifecycleState> {
        self.entries.load().get(name).map(|e| e.state())
    }

    /// Typed, shared access to a registered instance.
    pub fn instance<T: Component>(&self, name: &str) -> Option<Arc<T>> {
        self.entries.load().get(name)?.handle.downcast::<T>()
    }

    /// Direct dependents of a registered component.
    pub fn dependents_of(&self, name: &str) -> RuntimeResult<BTreeSet<String>> {
        let snapshot = self.entries.load();
        if !snapshot.contains_key(name) {
            return Err(RuntimeError::NotFound(name.to_string()));
        }
        Ok(derived_dependents(&snapshot, name))
    }

    /// Direct dependencies of a registered component.
    pub fn dependencies_of(&self, name: &str) -> RuntimeResult<BTreeSet<String>> {
        self.entries
            .load()
            .get(name)
            .map(|e| e.descriptor.dependencies.clone())
            .ok_or_else(|| RuntimeError::NotFound(name.to_string()))
    }

    /// Dependency graph of everything currently registered.
    pub fn graph(&self) -> RuntimeResult<DependencyGraph> {
        let snapshot = self.entries.load();
        Ok(DependencyGraph::build(
            snapshot.values().map(|e| e.descriptor.as_ref()),
        )?)
    }

    /// Initialization order of all components, or of `scope` plus its dependency closure.
    pub fn topological_order(&self, scope: Option<&[&str]>) -> RuntimeResult<Vec<String>> {
        let graph = self.graph()?;
        let scope = match scope {
            Some(names) => {
                let mut set = BTreeSet::new();
                for name in names {
                    if !graph.contains(name) {
                        return Err(RuntimeError::NotFound(name.to_string()));
                    }
                    set.insert(name.to_string());
                }
                Some(set)
            }
            None => None,
        };
        Ok(graph.topological_order(scope.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.load().is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.load().contains_key(name)
    }

    pub(crate) fn entry(&self, name: &str) -> Option<Arc<RegistryEntry>> {
        self.entries.load().get(name).cloned()
    }

    pub(crate) fn snapshot(&self) -> Arc<EntryMap> {
        self.entries.load_full()
    }

    /// Lock used to serialize live operations on one name.
    pub(crate) fn name_lock(&self, name: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.name_locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Forget the lock for `name` once no caller holds or waits on it.
    pub(crate) fn release_name_lock(&self, name: &str) {
        self.name_locks
            .remove_if(name, |_, lock| Arc::strong_count(lock) == 1);
    }

    #[cfg(test)]
    pub(crate) fn name_lock_count(&self) -> usize {
        self.name_locks.len()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

fn derived_dependents(entries: &EntryMap, name: &str) -> BTreeSet<String> {
    entries
        .values()
        .filter(|e| e.descriptor.dependencies.contains(name))
        .map(|e| e.name().to_string())
        .collect()
}

/// Dependents of `name` whose state is active, in name order.
pub(crate) fn active_dependents(entries: &EntryMap, name: &str) -> Vec<String> {
    entries
        .values()
        .filter(|e| e.descriptor.dependencies.contains(name) && e.state().is_active())
        .map(|e| e.name().to_string())
        .collect()
}
