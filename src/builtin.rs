//! Built-in components shipped with the host binary.
//!
//! - `event-log` (Library): in-memory log other components write to
//! - `heartbeat` (Plugin): records a beat into the event log on an interval
//! - `supervisor` (App): runs until shutdown, or for a configured time

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::component::{Component, ComponentDescriptor, InitContext};
use crate::config::TypedContract;
use crate::error::BoxError;
use crate::registry::Registration;

/// Plugins the host knows how to build.
pub const KNOWN_PLUGINS: &[&str] = &["heartbeat"];

pub const EVENT_LOG: &str = "event-log";
pub const HEARTBEAT: &str = "heartbeat";
pub const SUPERVISOR: &str = "supervisor";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Bounded in-memory event log.
#[derive(Default)]
pub struct EventLog {
    events: Mutex<VecDeque<String>>,
    capacity: Mutex<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EventLogConfig {
    pub capacity: usize,
}

impl Default for EventLogConfig {
    fn default() -> Self {
        Self { capacity: 1024 }
    }
}

impl EventLog {
    pub fn record(&self, event: impl Into<String>) {
        let capacity = *lock(&self.capacity);
        let mut events = lock(&self.events);
        if capacity > 0 && events.len() >= capacity {
            events.pop_front();
        }
        events.push_back(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        lock(&self.events).iter().cloned().collect()
    }
}

#[async_trait]
impl Component for EventLog {
    async fn initialize(&self, ctx: &InitContext) -> Result<(), BoxError> {
        let config: EventLogConfig = ctx.config().get(EVENT_LOG)?;
        *lock(&self.capacity) = config.capacity;
        lock(&self.events).clear();
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), BoxError> {
        tracing::debug!(events = lock(&self.events).len(), "Event log closed");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    pub interval_ms: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self { interval_ms: 1000 }
    }
}

/// Periodically records a beat into the event log.
#[derive(Default)]
pub struct Heartbeat {
    task: Mutex<Option<JoinHandle<()>>>,
}

#[async_trait]
impl Component for Heartbeat {
    async fn initialize(&self, ctx: &InitContext) -> Result<(), BoxError> {
        let config: HeartbeatConfig = ctx.config().get(HEARTBEAT)?;
        if config.interval_ms == 0 {
            return Err("heartbeat.interval_ms must be greater than zero".into());
        }
        let log = ctx
            .dependency::<EventLog>(EVENT_LOG)
            .ok_or("event log not wired into heartbeat")?;

        let interval = Duration::from_millis(config.interval_ms);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            let mut beat = 0u64;
            loop {
                ticker.tick().await;
                beat += 1;
                log.record(format!("heartbeat {beat}"));
                tracing::trace!(beat, "Heartbeat");
            }
        });
        if let Some(previous) = lock(&self.task).replace(task) {
            previous.abort();
        }
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), BoxError> {
        if let Some(task) = lock(&self.task).take() {
            task.abort();
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Exit after this long; run until shutdown when unset.
    pub run_for_ms: Option<u64>,
}

/// The host's App.
#[derive(Default)]
pub struct Supervisor {
    run_for: Mutex<Option<Duration>>,
    log: Mutex<Option<Arc<EventLog>>>,
}

#[async_trait]
impl Component for Supervisor {
    async fn initialize(&self, ctx: &InitContext) -> Result<(), BoxError> {
        let config: SupervisorConfig = ctx.config().get(SUPERVISOR)?;
        *lock(&self.run_for) = config.run_for_ms.map(Duration::from_millis);
        *lock(&self.log) = ctx.dependency::<EventLog>(EVENT_LOG);
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), BoxError> {
        lock(&self.log).take();
        Ok(())
    }

    async fn run(&self) -> Result<(), BoxError> {
        let log = lock(&self.log).clone();
        if let Some(log) = &log {
            log.record("supervisor running");
        }
        let run_for = *lock(&self.run_for);
        match run_for {
            Some(duration) => tokio::time::sleep(duration).await,
            None => futures_util::future::pending::<()>().await,
        }
        if let Some(log) = &log {
            log.record("supervisor finished");
        }
        Ok(())
    }
}

/// Registrations for the built-in components, with the given plugins enabled.
pub fn registrations(plugins: &[String]) -> Result<Vec<Registration>, BoxError> {
    let mut batch = vec![Registration::new(
        ComponentDescriptor::library(EVENT_LOG)
            .description("In-memory event log")
            .config(TypedContract::<EventLogConfig>::new(EVENT_LOG))
            .build()?,
        EventLog::default(),
    )
    .registered_by("host")];

    let mut app = ComponentDescriptor::app(SUPERVISOR)
        .description("Keeps the host running")
        .depends_on(EVENT_LOG)
        .config(TypedContract::<SupervisorConfig>::new(SUPERVISOR));

    for plugin in plugins {
        match plugin.as_str() {
            HEARTBEAT => batch.push(
                Registration::new(
                    ComponentDescriptor::plugin(HEARTBEAT)
                        .description("Periodic liveness beat")
                        .depends_on(EVENT_LOG)
                        .config(TypedContract::<HeartbeatConfig>::new(HEARTBEAT))
                        .build()?,
                    Heartbeat::default(),
                )
                .registered_by("host"),
            ),
            other => return Err(format!("unknown plugin '{other}'").into()),
        }
        app = app.depends_on(plugin.as_str());
    }

    batch.push(Registration::new(app.build()?, Supervisor::default()).registered_by("host"));
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigSource;
    use crate::lifecycle::LifecycleState;
    use crate::runtime::Runtime;

    #[tokio::test]
    async fn test_builtin_host_runs_to_completion() {
        let values: toml::Table = toml::from_str(
            r#"
            [heartbeat]
            interval_ms = 5

            [supervisor]
            run_for_ms = 40
            "#,
        )
        .unwrap();
        let runtime = Runtime::new(ConfigSource::new(values));
        runtime
            .register_all(registrations(&["heartbeat".to_string()]).unwrap())
            .unwrap();

        let summary = runtime.run().await.unwrap();
        assert!(summary.startup.is_success());
        assert!(matches!(
            summary.exit,
            Some(crate::lifecycle::AppExit::Completed)
        ));
        assert!(summary.shutdown.is_success());
        assert_eq!(
            runtime.registry().state(HEARTBEAT),
            Some(LifecycleState::ShutdownComplete)
        );

        let log = runtime.registry().instance::<EventLog>(EVENT_LOG).unwrap();
        let events = log.events();
        assert!(events.iter().any(|e| e.starts_with("heartbeat")));
        assert!(events.iter().any(|e| e == "supervisor finished"));
    }

    #[test]
    fn test_unknown_plugin_rejected() {
        let err = registrations(&["radar".to_string()]).err().unwrap();
        assert!(err.to_string().contains("radar"));
    }

    #[tokio::test]
    async fn test_zero_interval_rejected() {
        let values: toml::Table = toml::from_str("[heartbeat]\ninterval_ms = 0").unwrap();
        let runtime = Runtime::new(ConfigSource::new(values));
        runtime
            .register_all(registrations(&["heartbeat".to_string()]).unwrap())
            .unwrap();

        let report = runtime.start().await.unwrap();
        assert_eq!(report.final_state(HEARTBEAT), Some(LifecycleState::Failed));
        // The app depends on the failed plugin, so it cannot start.
        assert!(report.is_aborted());
        runtime.stop().await.unwrap();
        assert_eq!(runtime.registry().state(EVENT_LOG), Some(LifecycleState::ShutdownComplete));
    }

    #[test]
    fn test_event_log_keeps_most_recent() {
        let log = EventLog::default();
        *lock(&log.capacity) = 2;
        for event in ["a", "b", "c"] {
            log.record(event);
        }
        assert_eq!(log.events(), vec!["b", "c"]);
    }
}
