//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! State machine (state.rs):
//!     Uninitialized → Initializing → Initialized → ShuttingDown → ShutdownComplete
//!                                 ↘ Failed                     ↘ Failed
//!
//! Coordinator (coordinator.rs):
//!     Registry snapshot → cohorts → component calls → OutcomeReport (outcome.rs)
//!     Before/After hooks fire around every call (events.rs)
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     SIGTERM/SIGINT or App exit → Shutdown::trigger → wait() returns → ordered shutdown
//! ```
//!
//! # Design Decisions
//! - Libraries start one at a time, Plugins concurrently, the App last
//! - Library failures roll the batch back; Plugin failures stay isolated
//! - Shutdown is best effort and reverses the order that actually started

pub mod coordinator;
pub mod events;
pub mod outcome;
pub mod shutdown;
pub mod signals;
pub mod state;

pub use coordinator::{AppExit, LifecycleCoordinator};
pub use events::{EventHooks, LifecycleEvent};
pub use outcome::{BatchStatus, Operation, OutcomeEntry, OutcomeReport};
pub use shutdown::Shutdown;
pub use state::{LifecycleState, StateCell};
