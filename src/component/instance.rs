//! Component capability trait and live instances.

use async_trait::async_trait;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::config::view::ComponentConfig;
use crate::error::BoxError;

/// Capability implemented by every component.
///
/// Only `initialize` and `shutdown` are required. `run` is only driven for the
/// App; its default never completes, so the App stays up until the runtime is
/// asked to shut down.
#[async_trait]
pub trait Component: Send + Sync + 'static {
    /// Bring the component up. Receives its resolved config and dependencies.
    async fn initialize(&self, ctx: &InitContext) -> Result<(), BoxError>;

    /// Release everything acquired in `initialize`.
    async fn shutdown(&self) -> Result<(), BoxError>;

    /// Main loop of the App.
    async fn run(&self) -> Result<(), BoxError> {
        futures_util::future::pending::<()>().await;
        Ok(())
    }
}

/// Type-erased handle to a live component.
///
/// Keeps a second, `Any`-typed pointer to the same allocation so that typed
/// access (`downcast`) works without the trait needing `as_any`.
#[derive(Clone)]
pub struct ComponentHandle {
    component: Arc<dyn Component>,
    any: Arc<dyn Any + Send + Sync>,
}

impl ComponentHandle {
    /// Wrap a concrete component.
    pub fn new<C: Component>(component: C) -> Self {
        Self::from_arc(Arc::new(component))
    }

    /// Wrap an already shared component.
    pub fn from_arc<C: Component>(component: Arc<C>) -> Self {
        Self {
            component: component.clone(),
            any: component,
        }
    }

    /// The component as its capability trait.
    pub fn component(&self) -> &Arc<dyn Component> {
        &self.component
    }

    /// Typed access to the concrete component.
    pub fn downcast<T: Component>(&self) -> Option<Arc<T>> {
        self.any.clone().downcast::<T>().ok()
    }
}

impl fmt::Debug for ComponentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ComponentHandle")
    }
}

/// Everything a component receives when it is initialized.
///
/// Built by the coordinator right before `initialize` is called.
pub struct InitContext {
    name: String,
    config: ComponentConfig,
    dependencies: BTreeMap<String, ComponentHandle>,
}

impl InitContext {
    pub(crate) fn new(
        name: String,
        config: ComponentConfig,
        dependencies: BTreeMap<String, ComponentHandle>,
    ) -> Self {
        Self {
            name,
            config,
            dependencies,
        }
    }

    /// Name of the component being initialized.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configuration sections this component is entitled to.
    pub fn config(&self) -> &ComponentConfig {
        &self.config
    }

    /// Typed handle to a declared dependency.
    ///
    /// Empty when the component was declared with `wire(false)`.
    pub fn dependency<T: Component>(&self, name: &str) -> Option<Arc<T>> {
        self.dependencies.get(name).and_then(|h| h.downcast::<T>())
    }

    /// Names of the dependencies passed in.
    pub fn dependency_names(&self) -> impl Iterator<Item = &str> {
        self.dependencies.keys().map(String::as_str)
    }
}
