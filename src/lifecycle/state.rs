//! Component lifecycle state machine.
//!
//! # States
//! - Uninitialized: registered, never started (or a new attempt pending)
//! - Initializing / ShuttingDown: a transition is in flight
//! - Initialized: up and usable by dependents
//! - ShutdownComplete / Failed: end of a lifecycle attempt
//!
//! # State Transitions
//! ```text
//! Uninitialized --start--> Initializing
//! Initializing  --success--> Initialized
//! Initializing  --failure--> Failed
//! Initialized   --stop--> ShuttingDown
//! ShuttingDown  --success--> ShutdownComplete
//! ShuttingDown  --failure--> Failed
//! ```
//!
//! `stop` on a component that is not running and `start` on a component that
//! is already up are reported as no-ops. `start` from `ShutdownComplete` or
//! `Failed` opens a new attempt.

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use thiserror::Error;

/// Lifecycle state of one component.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Uninitialized = 0,
    Initializing = 1,
    Initialized = 2,
    ShuttingDown = 3,
    ShutdownComplete = 4,
    Failed = 5,
}

impl From<u8> for LifecycleState {
    fn from(val: u8) -> Self {
        match val {
            1 => LifecycleState::Initializing,
            2 => LifecycleState::Initialized,
            3 => LifecycleState::ShuttingDown,
            4 => LifecycleState::ShutdownComplete,
            5 => LifecycleState::Failed,
            _ => LifecycleState::Uninitialized,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::Uninitialized => "uninitialized",
            LifecycleState::Initializing => "initializing",
            LifecycleState::Initialized => "initialized",
            LifecycleState::ShuttingDown => "shutting down",
            LifecycleState::ShutdownComplete => "shut down",
            LifecycleState::Failed => "failed",
        };
        f.write_str(s)
    }
}

impl LifecycleState {
    /// A transition is in flight or the component is up.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            LifecycleState::Initializing | LifecycleState::Initialized | LifecycleState::ShuttingDown
        )
    }

    /// End of a lifecycle attempt.
    pub fn is_terminal(self) -> bool {
        matches!(self, LifecycleState::ShutdownComplete | LifecycleState::Failed)
    }

    /// Apply a transition request.
    pub fn apply(self, transition: Transition) -> Result<Step, InvalidTransition> {
        use LifecycleState::*;
        use Transition::*;

        let step = match (self, transition) {
            (Uninitialized | ShutdownComplete | Failed, Start) => Step::Moved(Initializing),
            (Initialized, Start) => Step::Unchanged,
            (Initializing, Succeed) => Step::Moved(Initialized),
            (Initializing, Fail) => Step::Moved(Failed),
            (Initialized, Stop) => Step::Moved(ShuttingDown),
            (Uninitialized | ShutdownComplete | Failed, Stop) => Step::Unchanged,
            (ShuttingDown, Succeed) => Step::Moved(ShutdownComplete),
            (ShuttingDown, Fail) => Step::Moved(Failed),
            (from, transition) => return Err(InvalidTransition { from, transition }),
        };
        Ok(step)
    }
}

/// Transition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Start,
    Succeed,
    Fail,
    Stop,
}

impl Transition {
    /// Verb used in error messages.
    pub fn action(self) -> &'static str {
        match self {
            Transition::Start => "start",
            Transition::Succeed => "complete",
            Transition::Fail => "fail",
            Transition::Stop => "stop",
        }
    }
}

/// Result of applying a legal transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Moved(LifecycleState),
    Unchanged,
}

/// A transition that is not legal from the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot {} while {from}", .transition.action())]
pub struct InvalidTransition {
    pub from: LifecycleState,
    pub transition: Transition,
}

/// Atomic holder for a [`LifecycleState`].
///
/// Readers never observe a partially written state. Writers are serialized
/// by the owning entry's transition lock.
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn new(state: LifecycleState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn load(&self) -> LifecycleState {
        LifecycleState::from(self.0.load(Ordering::SeqCst))
    }

    pub(crate) fn store(&self, state: LifecycleState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new(LifecycleState::Uninitialized)
    }
}
