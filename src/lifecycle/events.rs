//! Lifecycle event hooks.
//!
//! # Responsibilities
//! - Let callers observe components right before and after they are
//!   initialized or shut down
//! - Optionally restrict a hook to components matching a predicate
//!
//! # Design Decisions
//! - Hooks belong to a coordinator instance; there is no global registry
//! - Hooks are synchronous and must not block; long work belongs in the
//!   component itself
//! - `After*` events fire only when the transition succeeded
//! - A panicking hook is caught and logged; it cannot strand a component
//!   mid-transition or keep later hooks from running

use arc_swap::ArcSwap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::component::ComponentDescriptor;

/// Points in a component's lifecycle that hooks can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    BeforeInitialize,
    AfterInitialize,
    BeforeShutdown,
    AfterShutdown,
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleEvent::BeforeInitialize => "before_initialize",
            LifecycleEvent::AfterInitialize => "after_initialize",
            LifecycleEvent::BeforeShutdown => "before_shutdown",
            LifecycleEvent::AfterShutdown => "after_shutdown",
        };
        f.write_str(s)
    }
}

type Handler = Arc<dyn Fn(&ComponentDescriptor, LifecycleEvent) + Send + Sync>;
type Filter = Arc<dyn Fn(&ComponentDescriptor) -> bool + Send + Sync>;

struct Hook {
    event: LifecycleEvent,
    filter: Option<Filter>,
    handler: Handler,
}

/// Set of registered hooks. Cloning shares the set.
#[derive(Clone, Default)]
pub struct EventHooks {
    hooks: Arc<ArcSwap<Vec<Arc<Hook>>>>,
}

impl EventHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call `handler` for every component on `event`.
    pub fn on<H>(&self, event: LifecycleEvent, handler: H)
    where
        H: Fn(&ComponentDescriptor, LifecycleEvent) + Send + Sync + 'static,
    {
        self.add(Hook {
            event,
            filter: None,
            handler: Arc::new(handler),
        });
    }

    /// Call `handler` on `event` only for components accepted by `filter`.
    pub fn on_filtered<F, H>(&self, event: LifecycleEvent, filter: F, handler: H)
    where
        F: Fn(&ComponentDescriptor) -> bool + Send + Sync + 'static,
        H: Fn(&ComponentDescriptor, LifecycleEvent) + Send + Sync + 'static,
    {
        self.add(Hook {
            event,
            filter: Some(Arc::new(filter)),
            handler: Arc::new(handler),
        });
    }

    fn add(&self, hook: Hook) {
        let hook = Arc::new(hook);
        tracing::debug!(
            event = %hook.event,
            filtered = hook.filter.is_some(),
            "Registered lifecycle hook"
        );
        self.hooks.rcu(|hooks| {
            let mut next = Vec::clone(hooks);
            next.push(hook.clone());
            next
        });
    }

    /// Remove the hooks for `event`, or every hook.
    pub fn clear(&self, event: Option<LifecycleEvent>) {
        self.hooks.rcu(|hooks| match event {
            Some(event) => hooks
                .iter()
                .filter(|h| h.event != event)
                .cloned()
                .collect::<Vec<_>>(),
            None => Vec::new(),
        });
    }

    pub fn len(&self) -> usize {
        self.hooks.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.load().is_empty()
    }

    pub(crate) fn emit(&self, event: LifecycleEvent, descriptor: &ComponentDescriptor) {
        let hooks = self.hooks.load();
        let mut called = 0usize;
        for hook in hooks.iter().filter(|h| h.event == event) {
            let run = || {
                if hook.filter.as_ref().map_or(true, |f| f(descriptor)) {
                    (hook.handler)(descriptor, event);
                    return true;
                }
                false
            };
            match panic::catch_unwind(AssertUnwindSafe(run)) {
                Ok(true) => called += 1,
                Ok(false) => {}
                Err(_) => tracing::error!(
                    component = %descriptor.name,
                    event = %event,
                    "Lifecycle hook panicked"
                ),
            }
        }
        if called > 0 {
            tracing::trace!(
                component = %descriptor.name,
                event = %event,
                handlers = called,
                "Emitted lifecycle event"
            );
        }
    }
}

impl fmt::Debug for EventHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHooks").field("hooks", &self.len()).finish()
    }
}
