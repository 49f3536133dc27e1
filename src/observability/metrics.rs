//! Metrics collection and exposition.
//!
//! # Metrics
//! - `component_transitions_total` (counter): state changes by component, kind, state
//! - `component_failures_total` (counter): failed initialize/shutdown calls by component, operation
//! - `components_registered` (gauge): current registry size
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a cheap no-op
//! - The Prometheus exporter is optional and owned by the host binary

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

use crate::component::ComponentKind;
use crate::lifecycle::state::LifecycleState;

/// Install the Prometheus recorder and serve `/metrics` on `addr`.
///
/// Must be called from inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            describe();
            tracing::info!(address = %addr, "Metrics exporter listening");
        }
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

fn describe() {
    metrics::describe_counter!(
        "component_transitions_total",
        "Lifecycle state changes per component"
    );
    metrics::describe_counter!(
        "component_failures_total",
        "Failed initialize or shutdown calls per component"
    );
    metrics::describe_gauge!("components_registered", "Components currently registered");
}

pub fn record_transition(component: &str, kind: ComponentKind, state: LifecycleState) {
    metrics::counter!(
        "component_transitions_total",
        "component" => component.to_string(),
        "kind" => kind.to_string(),
        "state" => state_label(state),
    )
    .increment(1);
}

pub fn record_failure(component: &str, operation: &'static str) {
    metrics::counter!(
        "component_failures_total",
        "component" => component.to_string(),
        "operation" => operation,
    )
    .increment(1);
}

pub fn record_registered(count: usize) {
    metrics::gauge!("components_registered").set(count as f64);
}

fn state_label(state: LifecycleState) -> &'static str {
    match state {
        LifecycleState::Uninitialized => "uninitialized",
        LifecycleState::Initializing => "initializing",
        LifecycleState::Initialized => "initialized",
        LifecycleState::ShuttingDown => "shutting_down",
        LifecycleState::ShutdownComplete => "shutdown_complete",
        LifecycleState::Failed => "failed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_transition("db", ComponentKind::Library, LifecycleState::Initialized);
        record_failure("db", "initialize");
        record_registered(3);
        assert_eq!(state_label(LifecycleState::ShutdownComplete), "shutdown_complete");
    }
}
