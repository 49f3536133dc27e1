//! Registry entries and read-only snapshots of them.

use serde::Serialize;
use std::collections::BTreeSet;
use std::panic::Location;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::Mutex;

use crate::component::{Component, ComponentDescriptor, ComponentHandle, ComponentKind};
use crate::lifecycle::state::{LifecycleState, StateCell};

/// Who registered a component, and when.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationInfo {
    /// Caller that registered the component (`file:line` unless set explicitly).
    pub registered_by: String,
    pub registered_at: SystemTime,
}

/// A component waiting to be registered.
pub struct Registration {
    pub(crate) descriptor: ComponentDescriptor,
    pub(crate) handle: ComponentHandle,
    pub(crate) registered_by: String,
}

impl Registration {
    /// Pair a descriptor with its instance. Records the caller location.
    #[track_caller]
    pub fn new<C: Component>(descriptor: ComponentDescriptor, component: C) -> Self {
        Self::from_handle(descriptor, ComponentHandle::new(component))
    }

    #[track_caller]
    pub fn from_handle(descriptor: ComponentDescriptor, handle: ComponentHandle) -> Self {
        let caller = Location::caller();
        Self {
            descriptor,
            handle,
            registered_by: format!("{}:{}", caller.file(), caller.line()),
        }
    }

    /// Override the recorded registrant.
    pub fn registered_by(mut self, who: impl Into<String>) -> Self {
        self.registered_by = who.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn kind(&self) -> ComponentKind {
        self.descriptor.kind
    }
}

/// One registered component.
///
/// The descriptor and instance never change. The state is a single atomic
/// value; `transition` is held by whoever is driving the component through a
/// transition, so there is exactly one writer at a time. Once the entry has
/// been unregistered it is `retired` and will not be started again.
pub struct RegistryEntry {
    pub(crate) descriptor: Arc<ComponentDescriptor>,
    pub(crate) handle: ComponentHandle,
    pub(crate) state: StateCell,
    pub(crate) transition: Mutex<()>,
    pub(crate) registration: RegistrationInfo,
    retired: AtomicBool,
}

impl RegistryEntry {
    pub(crate) fn new(registration: Registration) -> Self {
        Self {
            descriptor: Arc::new(registration.descriptor),
            handle: registration.handle,
            state: StateCell::default(),
            transition: Mutex::new(()),
            registration: RegistrationInfo {
                registered_by: registration.registered_by,
                registered_at: SystemTime::now(),
            },
            retired: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn kind(&self) -> ComponentKind {
        self.descriptor.kind
    }

    pub fn descriptor(&self) -> &Arc<ComponentDescriptor> {
        &self.descriptor
    }

    pub fn state(&self) -> LifecycleState {
        self.state.load()
    }

    /// Removed from the registry; callers must hold the transition lock.
    pub(crate) fn retire(&self) {
        self.retired.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_retired(&self) -> bool {
        self.retired.load(Ordering::SeqCst)
    }

    pub(crate) fn info(&self, dependents: BTreeSet<String>) -> ComponentInfo {
        ComponentInfo {
            descriptor: self.descriptor.clone(),
            state: self.state(),
            dependents,
            registration: self.registration.clone(),
        }
    }
}

/// Read-only snapshot of a registry entry.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentInfo {
    pub descriptor: Arc<ComponentDescriptor>,
    pub state: LifecycleState,
    /// Derived from forward edges when the snapshot was taken.
    pub dependents: BTreeSet<String>,
    pub registration: RegistrationInfo,
}

impl ComponentInfo {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn kind(&self) -> ComponentKind {
        self.descriptor.kind
    }
}
