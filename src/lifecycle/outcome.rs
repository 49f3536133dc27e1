//! Outcome reports for lifecycle batches.

use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::component::ComponentKind;
use crate::error::RuntimeError;
use crate::lifecycle::state::LifecycleState;

/// Lifecycle operation a report describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Initialize,
    Shutdown,
}

/// Result for one component within a batch.
#[derive(Debug, Clone, Serialize)]
pub struct OutcomeEntry {
    pub name: String,
    pub kind: ComponentKind,
    pub from_state: LifecycleState,
    pub to_state: LifecycleState,
    /// The component was not attempted because the batch was aborted.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<RuntimeError>,
}

impl OutcomeEntry {
    pub(crate) fn new(
        name: &str,
        kind: ComponentKind,
        from_state: LifecycleState,
        to_state: LifecycleState,
        error: Option<RuntimeError>,
    ) -> Self {
        Self {
            name: name.to_string(),
            kind,
            from_state,
            to_state,
            skipped: false,
            error,
        }
    }

    pub(crate) fn skipped(name: &str, kind: ComponentKind, state: LifecycleState) -> Self {
        Self {
            skipped: true,
            ..Self::new(name, kind, state, state, None)
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }

    /// The state did not change (no-op or skipped).
    pub fn is_unchanged(&self) -> bool {
        self.from_state == self.to_state
    }
}

/// Overall result of a batch.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchStatus {
    /// Every component reached its target state (or was already there).
    Success,
    /// Some components failed; the rest of the batch completed.
    PartialSuccess,
    /// A fail-fast component failed and the batch was halted.
    Aborted {
        component: String,
        #[serde(serialize_with = "serialize_abort_cause")]
        cause: RuntimeError,
    },
}

/// Structured, ordered result of one lifecycle batch.
///
/// A component can appear more than once (e.g. initialized, then rolled
/// back); the last entry holds its final state.
#[derive(Debug, Clone, Serialize)]
pub struct OutcomeReport {
    pub batch_id: Uuid,
    pub operation: Operation,
    pub entries: Vec<OutcomeEntry>,
    pub status: BatchStatus,
}

impl OutcomeReport {
    pub(crate) fn new(operation: Operation, batch_id: Uuid) -> Self {
        Self {
            batch_id,
            operation,
            entries: Vec::new(),
            status: BatchStatus::Success,
        }
    }

    pub(crate) fn push(&mut self, entry: OutcomeEntry) {
        self.entries.push(entry);
    }

    pub(crate) fn abort(&mut self, component: &str, cause: RuntimeError) {
        self.status = BatchStatus::Aborted {
            component: component.to_string(),
            cause,
        };
    }

    /// Settle the status once every entry has been recorded.
    pub(crate) fn finish(mut self) -> Self {
        if matches!(self.status, BatchStatus::Success) && self.entries.iter().any(|e| e.is_failure())
        {
            self.status = BatchStatus::PartialSuccess;
        }
        self
    }

    /// Final state of a component in this batch.
    pub fn final_state(&self, name: &str) -> Option<LifecycleState> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.name == name)
            .map(|e| e.to_state)
    }

    /// Names in the order their first entry was recorded.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for entry in &self.entries {
            if !names.contains(&entry.name.as_str()) {
                names.push(&entry.name);
            }
        }
        names
    }

    /// Every failed entry.
    pub fn failures(&self) -> impl Iterator<Item = &OutcomeEntry> {
        self.entries.iter().filter(|e| e.is_failure())
    }

    /// Every error, in the order it happened.
    pub fn errors(&self) -> Vec<&RuntimeError> {
        self.entries.iter().filter_map(|e| e.error.as_ref()).collect()
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, BatchStatus::Success)
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self.status, BatchStatus::Aborted { .. })
    }

    /// Turn an aborted batch into its cause; keep every other report.
    pub fn into_result(self) -> Result<Self, RuntimeError> {
        match self.status {
            BatchStatus::Aborted { cause, .. } => Err(cause),
            _ => Ok(self),
        }
    }
}

fn serialize_error<S: Serializer>(err: &Option<RuntimeError>, s: S) -> Result<S::Ok, S::Error> {
    match err {
        Some(err) => s.serialize_some(&err.to_string()),
        None => s.serialize_none(),
    }
}

fn serialize_abort_cause<S: Serializer>(err: &RuntimeError, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&err.to_string())
}
