//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Registry and coordinator produce:
//!     → tracing events (structured key/value fields)
//!     → metrics.rs (transition and failure counters, registry gauge)
//!
//! Host binary installs:
//!     → logging.rs (fmt or JSON subscriber, EnvFilter)
//!     → metrics.rs (optional Prometheus scrape endpoint)
//! ```
//!
//! # Design Decisions
//! - The library only emits; installing a subscriber or recorder is the
//!   host's job
//! - Metric updates are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
