//! Shared utilities for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use component_runtime::component::{ComponentHandle, DescriptorBuilder};
use component_runtime::{BoxError, Component, InitContext, Registration, Registry};

/// Ordered record of component calls, shared by every mock in a test.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, call: String) {
        self.0.lock().unwrap().push(call);
    }

    pub fn all(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Component names for one kind of call (`begin`, `init`, `shutdown`, `run`),
    /// in order. `begin` is logged when `initialize` is entered, `init` when it ends.
    pub fn calls(&self, kind: &str) -> Vec<String> {
        let prefix = format!("{kind}:");
        self.all()
            .into_iter()
            .filter_map(|c| c.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

#[derive(Clone, Copy)]
enum RunBehavior {
    UntilCancelled,
    ReturnAfter(Duration),
    FailAfter(Duration),
}

/// Programmable component that records every call it receives.
pub struct MockComponent {
    name: String,
    log: CallLog,
    fail_init: AtomicBool,
    fail_shutdown: AtomicBool,
    delay: Duration,
    run: RunBehavior,
    init_calls: AtomicU32,
    shutdown_calls: AtomicU32,
    dependencies_seen: Mutex<Vec<String>>,
}

impl MockComponent {
    pub fn new(name: &str, log: &CallLog) -> Self {
        Self {
            name: name.to_string(),
            log: log.clone(),
            fail_init: AtomicBool::new(false),
            fail_shutdown: AtomicBool::new(false),
            delay: Duration::ZERO,
            run: RunBehavior::UntilCancelled,
            init_calls: AtomicU32::new(0),
            shutdown_calls: AtomicU32::new(0),
            dependencies_seen: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_init(self) -> Self {
        self.fail_init.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_shutdown(self) -> Self {
        self.fail_shutdown.store(true, Ordering::SeqCst);
        self
    }

    /// Sleep this long inside both `initialize` and `shutdown`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn run_returns_after(mut self, after: Duration) -> Self {
        self.run = RunBehavior::ReturnAfter(after);
        self
    }

    pub fn run_fails_after(mut self, after: Duration) -> Self {
        self.run = RunBehavior::FailAfter(after);
        self
    }

    pub fn set_fail_init(&self, fail: bool) {
        self.fail_init.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_shutdown(&self, fail: bool) {
        self.fail_shutdown.store(fail, Ordering::SeqCst);
    }

    pub fn init_calls(&self) -> u32 {
        self.init_calls.load(Ordering::SeqCst)
    }

    pub fn shutdown_calls(&self) -> u32 {
        self.shutdown_calls.load(Ordering::SeqCst)
    }

    /// Dependency handles passed to the last `initialize`.
    pub fn dependencies_seen(&self) -> Vec<String> {
        self.dependencies_seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Component for MockComponent {
    async fn initialize(&self, ctx: &InitContext) -> Result<(), BoxError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        self.log.push(format!("begin:{}", self.name));
        *self.dependencies_seen.lock().unwrap() =
            ctx.dependency_names().map(str::to_string).collect();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.log.push(format!("init:{}", self.name));
        if self.fail_init.load(Ordering::SeqCst) {
            return Err(format!("{} refused to start", self.name).into());
        }
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), BoxError> {
        self.shutdown_calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.log.push(format!("shutdown:{}", self.name));
        if self.fail_shutdown.load(Ordering::SeqCst) {
            return Err(format!("{} refused to stop", self.name).into());
        }
        Ok(())
    }

    async fn run(&self) -> Result<(), BoxError> {
        self.log.push(format!("run:{}", self.name));
        match self.run {
            RunBehavior::UntilCancelled => futures_util::future::pending::<()>().await,
            RunBehavior::ReturnAfter(after) => tokio::time::sleep(after).await,
            RunBehavior::FailAfter(after) => {
                tokio::time::sleep(after).await;
                return Err(format!("{} crashed", self.name).into());
            }
        }
        Ok(())
    }
}

/// Build a registration around a mock, keeping a typed handle to it.
pub fn registration(builder: DescriptorBuilder, mock: MockComponent) -> (Registration, Arc<MockComponent>) {
    let mock = Arc::new(mock);
    let registration = Registration::from_handle(
        builder.build().expect("valid descriptor"),
        ComponentHandle::from_arc(mock.clone()),
    );
    (registration, mock)
}

/// Register a plain mock named after its descriptor.
pub fn register(registry: &Registry, builder: DescriptorBuilder, log: &CallLog) -> Arc<MockComponent> {
    let name = builder.name().to_string();
    register_mock(registry, builder, MockComponent::new(&name, log))
}

pub fn register_mock(registry: &Registry, builder: DescriptorBuilder, mock: MockComponent) -> Arc<MockComponent> {
    let (registration, mock) = registration(builder, mock);
    registry.register(registration).expect("registration accepted");
    mock
}
