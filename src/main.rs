//! Component runtime host.
//!
//! Loads a host config, registers the built-in components, starts them in
//! dependency order and runs until the App exits or the process is signalled.
//!
//! # Architecture Overview
//!
//! ```text
//!   host.toml ──▶ config loader ──▶ ConfigSource ◀── file watcher (optional)
//!                                        │
//!                                        ▼
//!   built-in registrations ──▶ Registry ──▶ LifecycleCoordinator
//!                                             │  Libraries (sequential)
//!                                             │  Plugins   (concurrent)
//!                                             │  App       (run until exit)
//!                                             ▼
//!   SIGINT/SIGTERM ──▶ Shutdown ──▶ ordered shutdown ──▶ JSON outcome report
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use component_runtime::builtin::{self, KNOWN_PLUGINS};
use component_runtime::config::watcher::{apply_updates, ConfigWatcher};
use component_runtime::config::{load_config, ConfigSource, HostConfig};
use component_runtime::error::BoxError;
use component_runtime::lifecycle::signals::spawn_signal_listener;
use component_runtime::lifecycle::BatchStatus;
use component_runtime::observability::{logging, metrics};
use component_runtime::Runtime;

#[derive(Parser)]
#[command(name = "component-runtime")]
#[command(about = "Host for dependency-ordered components", long_about = None)]
struct Cli {
    /// Host configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Emit logs as JSON regardless of the config file
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Start every component and run until the app exits or a signal arrives
    Run,
    /// Print the registered components and their initialization order
    Plan,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path, KNOWN_PLUGINS)?,
        None => HostConfig::default(),
    };

    logging::init_logging(&config.logging.level, cli.json_logs || config.logging.json);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?cli.config,
        plugins = ?config.runtime.plugins,
        "component-runtime starting"
    );

    let source = ConfigSource::new(config.components.clone());
    let runtime = Runtime::new(source.clone());
    runtime.register_all(builtin::registrations(&config.runtime.plugins)?)?;

    if let Some(Commands::Plan) = cli.command {
        let plan = serde_json::json!({
            "order": runtime.registry().topological_order(None)?,
            "components": runtime.registry().all(),
        });
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    if config.metrics.enabled {
        if let Ok(addr) = config.metrics.address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.metrics.address,
                "Failed to parse metrics address"
            );
        }
    }

    // Dropping the watcher stops it, so it is held until shutdown.
    let _watcher = match (&cli.config, config.runtime.watch) {
        (Some(path), true) => {
            let (watcher, updates) = ConfigWatcher::new(path, KNOWN_PLUGINS);
            tokio::spawn(apply_updates(updates, source.clone()));
            match watcher.run() {
                Ok(watcher) => Some(watcher),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to start config watcher");
                    None
                }
            }
        }
        _ => None,
    };

    let signals = spawn_signal_listener(runtime.shutdown_handle());
    let summary = runtime.run().await?;
    signals.abort();

    let report = serde_json::json!({
        "startup": summary.startup,
        "exit": summary.exit.as_ref().map(|exit| format!("{exit:?}")),
        "shutdown": summary.shutdown,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let BatchStatus::Aborted { cause, .. } = &summary.startup.status {
        return Err(cause.clone().into());
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
