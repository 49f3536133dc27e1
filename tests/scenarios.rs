//! Ordering, failure policy and registry scenarios.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use component_runtime::config::ConfigSource;
use component_runtime::graph::DependencyGraph;
use component_runtime::lifecycle::{BatchStatus, EventHooks, LifecycleCoordinator, LifecycleState};
use component_runtime::{ComponentDescriptor, Registry, RuntimeError};

mod common;
use common::{register, register_mock, CallLog, MockComponent};

fn coordinator() -> LifecycleCoordinator {
    LifecycleCoordinator::new(ConfigSource::empty(), EventHooks::new())
}

#[tokio::test]
async fn test_libraries_then_app_and_reverse_on_shutdown() {
    let registry = Registry::new();
    let log = CallLog::new();
    register(&registry, ComponentDescriptor::app("app").depends_on("lib2"), &log);
    register(&registry, ComponentDescriptor::library("lib1"), &log);
    register(&registry, ComponentDescriptor::library("lib2").depends_on("lib1"), &log);
    let coordinator = coordinator();

    let report = coordinator
        .initialize(&registry, &["lib1", "lib2", "app"])
        .await
        .unwrap();
    assert!(report.is_success());
    assert_eq!(log.calls("init"), vec!["lib1", "lib2", "app"]);
    assert_eq!(report.names(), vec!["lib1", "lib2", "app"]);

    let report = coordinator
        .shutdown(&registry, &["lib1", "lib2", "app"])
        .await
        .unwrap();
    assert!(report.is_success());
    assert_eq!(log.calls("shutdown"), vec!["app", "lib2", "lib1"]);
    for name in ["lib1", "lib2", "app"] {
        assert_eq!(registry.state(name), Some(LifecycleState::ShutdownComplete));
    }
}

#[tokio::test]
async fn test_plugin_failure_is_isolated() {
    let registry = Registry::new();
    let log = CallLog::new();
    register(&registry, ComponentDescriptor::plugin("p1"), &log);
    register_mock(
        &registry,
        ComponentDescriptor::plugin("p2"),
        MockComponent::new("p2", &log).failing_init(),
    );
    register(&registry, ComponentDescriptor::plugin("p3"), &log);

    let report = coordinator()
        .initialize(&registry, &["p1", "p2", "p3"])
        .await
        .unwrap();

    assert!(matches!(report.status, BatchStatus::PartialSuccess));
    assert_eq!(report.final_state("p1"), Some(LifecycleState::Initialized));
    assert_eq!(report.final_state("p2"), Some(LifecycleState::Failed));
    assert_eq!(report.final_state("p3"), Some(LifecycleState::Initialized));

    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert!(matches!(
        failures[0].error,
        Some(RuntimeError::ComponentInitFailure { ref name, .. }) if name == "p2"
    ));
}

#[tokio::test]
async fn test_library_failure_rolls_back_batch() {
    let registry = Registry::new();
    let log = CallLog::new();
    let lib1 = register(&registry, ComponentDescriptor::library("lib1"), &log);
    register_mock(
        &registry,
        ComponentDescriptor::library("lib2").depends_on("lib1"),
        MockComponent::new("lib2", &log).failing_init(),
    );
    let plugin = register(&registry, ComponentDescriptor::plugin("plugin").depends_on("lib1"), &log);
    let app = register(&registry, ComponentDescriptor::app("app").depends_on("lib2"), &log);

    let report = coordinator()
        .initialize(&registry, &["lib1", "lib2", "plugin", "app"])
        .await
        .unwrap();

    match &report.status {
        BatchStatus::Aborted { component, cause } => {
            assert_eq!(component, "lib2");
            assert!(cause.to_string().contains("lib2 refused to start"));
        }
        other => panic!("expected abort, got {other:?}"),
    }
    assert_eq!(report.final_state("lib1"), Some(LifecycleState::ShutdownComplete));
    assert_eq!(report.final_state("lib2"), Some(LifecycleState::Failed));
    assert_eq!(lib1.shutdown_calls(), 1);
    assert_eq!(plugin.init_calls(), 0);
    assert_eq!(app.init_calls(), 0);
    assert_eq!(registry.state("plugin"), Some(LifecycleState::Uninitialized));
    assert!(report.entries.iter().any(|e| e.name == "app" && e.skipped));
}

#[tokio::test]
async fn test_unresolved_dependency_leaves_registry_unchanged() {
    let registry = Registry::new();
    let log = CallLog::new();
    register(&registry, ComponentDescriptor::library("db"), &log);
    let before: Vec<String> = registry.all().iter().map(|c| c.name().to_string()).collect();

    let (registration, _) = common::registration(
        ComponentDescriptor::plugin("cache").depends_on("redis"),
        MockComponent::new("cache", &log),
    );
    let err = registry.register(registration).unwrap_err();

    assert!(matches!(
        err,
        RuntimeError::UnresolvedDependency { ref name, ref dependency }
            if name == "cache" && dependency == "redis"
    ));
    let after: Vec<String> = registry.all().iter().map(|c| c.name().to_string()).collect();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_active_dependents_block_unregister() {
    let registry = Registry::new();
    let log = CallLog::new();
    register(&registry, ComponentDescriptor::library("db"), &log);
    register(&registry, ComponentDescriptor::plugin("web").depends_on("db"), &log);
    let coordinator = coordinator();
    coordinator.initialize(&registry, &["db", "web"]).await.unwrap();

    let err = coordinator.unregister_and_stop(&registry, "db").await.unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::HasActiveDependents { ref dependents, .. } if dependents == &["web"]
    ));
    assert!(matches!(
        registry.unregister("db"),
        Err(RuntimeError::HasActiveDependents { .. })
    ));
    // Nothing was shut down by the rejected call.
    assert!(log.calls("shutdown").is_empty());

    coordinator.shutdown(&registry, &["web"]).await.unwrap();
    coordinator.unregister_and_stop(&registry, "db").await.unwrap();
    assert!(!registry.contains("db"));
    assert_eq!(log.calls("shutdown"), vec!["web", "db"]);
}

#[tokio::test]
async fn test_shutdown_pre_check_runs_no_component_code() {
    let registry = Registry::new();
    let log = CallLog::new();
    register(&registry, ComponentDescriptor::library("db"), &log);
    register(&registry, ComponentDescriptor::plugin("web").depends_on("db"), &log);
    let coordinator = coordinator();
    coordinator.initialize(&registry, &["web"]).await.unwrap();

    let err = coordinator.shutdown(&registry, &["db"]).await.unwrap_err();
    assert!(err.is_structural());
    assert_eq!(registry.state("db"), Some(LifecycleState::Initialized));

    // Shutting both down together is fine: the dependent goes first.
    let report = coordinator.shutdown(&registry, &["db", "web"]).await.unwrap();
    assert!(report.is_success());
    assert_eq!(log.calls("shutdown"), vec!["web", "db"]);
}

#[tokio::test]
async fn test_shutdown_is_idempotent() {
    let registry = Registry::new();
    let log = CallLog::new();
    let db = register(&registry, ComponentDescriptor::library("db"), &log);
    let coordinator = coordinator();
    coordinator.initialize(&registry, &["db"]).await.unwrap();

    coordinator.shutdown(&registry, &["db"]).await.unwrap();
    let report = coordinator.shutdown(&registry, &["db"]).await.unwrap();

    assert!(report.is_success());
    assert!(report.entries[0].is_unchanged());
    assert_eq!(report.final_state("db"), Some(LifecycleState::ShutdownComplete));
    assert_eq!(db.shutdown_calls(), 1);
}

#[tokio::test]
async fn test_shutdown_failures_are_collected() {
    let registry = Registry::new();
    let log = CallLog::new();
    register_mock(
        &registry,
        ComponentDescriptor::library("db"),
        MockComponent::new("db", &log).failing_shutdown(),
    );
    register_mock(
        &registry,
        ComponentDescriptor::plugin("p1").depends_on("db"),
        MockComponent::new("p1", &log).failing_shutdown(),
    );
    register(&registry, ComponentDescriptor::plugin("p2").depends_on("db"), &log);
    let coordinator = coordinator();
    coordinator.initialize_all(&registry).await.unwrap();

    let report = coordinator.shutdown_all(&registry).await.unwrap();
    assert!(matches!(report.status, BatchStatus::PartialSuccess));
    assert_eq!(report.errors().len(), 2);
    assert_eq!(report.final_state("db"), Some(LifecycleState::Failed));
    assert_eq!(report.final_state("p1"), Some(LifecycleState::Failed));
    assert_eq!(report.final_state("p2"), Some(LifecycleState::ShutdownComplete));
    assert_eq!(log.calls("shutdown").last().map(String::as_str), Some("db"));
}

#[tokio::test]
async fn test_shutdown_follows_executed_order() {
    let registry = Registry::new();
    let log = CallLog::new();
    register(&registry, ComponentDescriptor::library("a"), &log);
    register(&registry, ComponentDescriptor::library("b"), &log);
    let coordinator = coordinator();

    // Graph order would be [a, b]; the order that actually ran is [b, a].
    coordinator.initialize(&registry, &["b"]).await.unwrap();
    coordinator.initialize(&registry, &["a"]).await.unwrap();
    assert_eq!(coordinator.initialization_order(), vec!["b", "a"]);

    coordinator.shutdown_all(&registry).await.unwrap();
    assert_eq!(log.calls("shutdown"), vec!["a", "b"]);
}

#[tokio::test]
async fn test_failed_component_can_be_restarted() {
    let registry = Registry::new();
    let log = CallLog::new();
    let db = register_mock(
        &registry,
        ComponentDescriptor::library("db"),
        MockComponent::new("db", &log).failing_init(),
    );
    let coordinator = coordinator();

    let report = coordinator.initialize(&registry, &["db"]).await.unwrap();
    assert!(report.is_aborted());

    db.set_fail_init(false);
    let report = coordinator.initialize(&registry, &["db"]).await.unwrap();
    assert!(report.is_success());
    assert_eq!(registry.state("db"), Some(LifecycleState::Initialized));
    assert_eq!(db.init_calls(), 2);
}

#[tokio::test]
async fn test_dependency_not_ready() {
    let registry = Registry::new();
    let log = CallLog::new();
    register_mock(
        &registry,
        ComponentDescriptor::plugin("auth"),
        MockComponent::new("auth", &log).failing_init(),
    );
    let app = register(&registry, ComponentDescriptor::app("app").depends_on("auth"), &log);

    let report = coordinator().initialize_all(&registry).await.unwrap();
    assert_eq!(app.init_calls(), 0);
    match &report.status {
        BatchStatus::Aborted { component, cause } => {
            assert_eq!(component, "app");
            assert!(cause.to_string().contains("dependency 'auth' is failed"), "{cause}");
        }
        other => panic!("expected abort, got {other:?}"),
    }
}

#[test]
fn test_topological_order_respects_every_edge() {
    // Layered graphs of growing size; every edge must point backwards in the order.
    for width in 1..6usize {
        let mut edges: Vec<(String, Vec<String>)> = Vec::new();
        for layer in 0..4usize {
            for i in 0..width {
                let name = format!("n{layer}_{i}");
                let deps = if layer == 0 {
                    Vec::new()
                } else {
                    (0..width)
                        .filter(|j| (i + j + layer) % 2 == 0 || *j == i)
                        .map(|j| format!("n{}_{j}", layer - 1))
                        .collect()
                };
                edges.push((name, deps));
            }
        }
        let graph = DependencyGraph::from_edges(
            edges
                .iter()
                .map(|(name, deps)| (name.clone(), deps.iter().cloned().collect())),
        )
        .unwrap();
        let order = graph.topological_order(None);

        assert_eq!(order.len(), edges.len());
        let unique: BTreeSet<_> = order.iter().collect();
        assert_eq!(unique.len(), order.len());
        let position = |n: &str| order.iter().position(|o| o == n).unwrap();
        for (name, deps) in &edges {
            for dep in deps {
                assert!(position(dep) < position(name), "{dep} must precede {name}");
            }
        }
    }
}

#[test]
fn test_cycle_names_every_member() {
    let edge = |name: &str, deps: &[&str]| {
        (
            name.to_string(),
            deps.iter().map(|d| d.to_string()).collect::<BTreeSet<_>>(),
        )
    };
    let edges = vec![
        edge("root", &[]),
        edge("a", &["root", "c"]),
        edge("b", &["a"]),
        edge("c", &["b"]),
    ];
    let err = DependencyGraph::from_edges(edges).unwrap_err();
    let members: BTreeSet<_> = err.cycle.iter().map(String::as_str).collect();
    assert_eq!(members, BTreeSet::from(["a", "b", "c"]));
}

#[tokio::test]
async fn test_plugins_in_one_batch_overlap() {
    let registry = Registry::new();
    let log = CallLog::new();
    let delay = Duration::from_millis(100);
    for name in ["p1", "p2", "p3"] {
        register_mock(
            &registry,
            ComponentDescriptor::plugin(name),
            MockComponent::new(name, &log).with_delay(delay),
        );
    }
    let coordinator = coordinator();

    let started = Instant::now();
    let report = coordinator.initialize_all(&registry).await.unwrap();
    let elapsed = started.elapsed();
    assert!(report.is_success());
    assert!(elapsed < delay * 2, "initialize took {elapsed:?}");

    let started = Instant::now();
    let report = coordinator.shutdown_all(&registry).await.unwrap();
    let elapsed = started.elapsed();
    assert!(report.is_success());
    assert!(elapsed < delay * 2, "shutdown took {elapsed:?}");
}

#[tokio::test]
async fn test_libraries_never_overlap() {
    let registry = Registry::new();
    let log = CallLog::new();
    let delay = Duration::from_millis(30);
    for builder in [
        ComponentDescriptor::library("a"),
        ComponentDescriptor::library("b").depends_on("a"),
        ComponentDescriptor::library("c").depends_on("b"),
        ComponentDescriptor::library("solo"),
    ] {
        let name = builder.name().to_string();
        register_mock(&registry, builder, MockComponent::new(&name, &log).with_delay(delay));
    }

    let started = Instant::now();
    let report = coordinator().initialize_all(&registry).await.unwrap();
    assert!(report.is_success());
    assert!(started.elapsed() >= delay * 4);

    // Each library finishes before the next one begins.
    let calls: Vec<String> = log
        .all()
        .into_iter()
        .filter(|c| c.starts_with("begin:") || c.starts_with("init:"))
        .collect();
    assert_eq!(calls.len(), 8);
    for pair in calls.chunks(2) {
        let name = pair[0].strip_prefix("begin:").expect("begin comes first");
        assert_eq!(pair[1], format!("init:{name}"));
    }
    let begun = log.calls("begin");
    let position = |n: &str| begun.iter().position(|b| b == n).unwrap();
    assert!(position("a") < position("b") && position("b") < position("c"));
}
