//! Execution status and the admission predicates built on it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::validation::CloseEvent;

/// Id prefixes handed out before the backend has assigned a durable id.
pub const TEMPORARY_ID_PREFIXES: [&str; 2] = ["pending-", "temp-"];

/// Execution status as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Execution is queued but not yet started.
    Pending,
    /// Execution is currently running.
    Running,
    /// Execution is paused.
    Paused,
    /// Execution completed successfully.
    Completed,
    /// Execution failed.
    Failed,
}

impl ExecutionStatus {
    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether no further events are expected for this status.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current status plus the last status that was actually known.
///
/// Callers sometimes lose the status for a moment (e.g. while a view
/// refetches); the shadow keeps the last `Some` so a terminated execution
/// is not mistaken for a live one in the meantime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusShadow {
    current: Option<ExecutionStatus>,
    last_known: Option<ExecutionStatus>,
}

impl StatusShadow {
    /// Create a shadow seeded with the initial status in both slots.
    #[must_use]
    pub const fn new(initial: Option<ExecutionStatus>) -> Self {
        Self {
            current: initial,
            last_known: initial,
        }
    }

    /// Overwrite the current slot; the shadow slot only moves on `Some`.
    pub fn update(&mut self, status: Option<ExecutionStatus>) {
        self.current = status;
        if status.is_some() {
            self.last_known = status;
        }
    }

    /// Status as last reported by the caller.
    #[must_use]
    pub const fn current(&self) -> Option<ExecutionStatus> {
        self.current
    }

    /// Last status that was `Some`.
    #[must_use]
    pub const fn last_known(&self) -> Option<ExecutionStatus> {
        self.last_known
    }

    /// Current status, falling back to the last known one.
    #[must_use]
    pub fn effective(&self) -> Option<ExecutionStatus> {
        self.current.or(self.last_known)
    }

    /// Whether the effective status is terminal.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        is_terminated(self.current, self.last_known)
    }
}

/// Why a connect or reconnect was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No execution id, or an empty one.
    MissingId,
    /// The id is a client-side placeholder.
    TemporaryId,
    /// The execution already reached a terminal status.
    Terminated(ExecutionStatus),
    /// The peer closed the stream normally.
    CleanClosure,
    /// The retry budget is spent.
    AttemptsExhausted,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingId => f.write_str("no execution id"),
            Self::TemporaryId => f.write_str("temporary execution id"),
            Self::Terminated(status) => write!(f, "execution is {status}"),
            Self::CleanClosure => f.write_str("connection closed cleanly"),
            Self::AttemptsExhausted => f.write_str("max reconnect attempts reached"),
        }
    }
}

/// Whether `status`, falling back to `last_known`, is terminal.
#[must_use]
pub fn is_terminated(
    status: Option<ExecutionStatus>,
    last_known: Option<ExecutionStatus>,
) -> bool {
    status.or(last_known).is_some_and(ExecutionStatus::is_terminal)
}

/// Whether `id` is a placeholder that does not exist on the backend yet.
#[must_use]
pub fn is_temporary_id(id: &str) -> bool {
    TEMPORARY_ID_PREFIXES
        .iter()
        .any(|prefix| id.starts_with(prefix))
}

/// First guard that refuses a fresh connection, if any.
#[must_use]
pub fn connect_skip_reason(
    id: Option<&str>,
    status: Option<ExecutionStatus>,
    last_known: Option<ExecutionStatus>,
) -> Option<SkipReason> {
    let Some(id) = id.filter(|id| !id.is_empty()) else {
        return Some(SkipReason::MissingId);
    };
    if is_temporary_id(id) {
        return Some(SkipReason::TemporaryId);
    }
    terminated_reason(status, last_known)
}

/// Whether a fresh connection must not be attempted.
#[must_use]
pub fn should_skip(
    id: Option<&str>,
    status: Option<ExecutionStatus>,
    last_known: Option<ExecutionStatus>,
) -> bool {
    connect_skip_reason(id, status, last_known).is_some()
}

/// First guard that refuses a reconnect after `close`, if any.
///
/// Guards run in a fixed order: temporary id, terminal status, clean
/// closure, attempt budget, missing id.
#[must_use]
pub fn reconnect_skip_reason(
    close: &CloseEvent,
    attempt: u32,
    max_attempts: u32,
    id: Option<&str>,
    status: Option<ExecutionStatus>,
    last_known: Option<ExecutionStatus>,
) -> Option<SkipReason> {
    if id.is_some_and(is_temporary_id) {
        return Some(SkipReason::TemporaryId);
    }
    if let Some(reason) = terminated_reason(status, last_known) {
        return Some(reason);
    }
    if close.is_clean_closure() {
        return Some(SkipReason::CleanClosure);
    }
    if attempt >= max_attempts {
        return Some(SkipReason::AttemptsExhausted);
    }
    if id.is_none_or(str::is_empty) {
        return Some(SkipReason::MissingId);
    }
    None
}

/// Whether the stream should be re-established after `close`.
#[must_use]
pub fn should_reconnect(
    close: &CloseEvent,
    attempt: u32,
    max_attempts: u32,
    id: Option<&str>,
    status: Option<ExecutionStatus>,
    last_known: Option<ExecutionStatus>,
) -> bool {
    reconnect_skip_reason(close, attempt, max_attempts, id, status, last_known).is_none()
}

fn terminated_reason(
    status: Option<ExecutionStatus>,
    last_known: Option<ExecutionStatus>,
) -> Option<SkipReason> {
    status
        .or(last_known)
        .filter(|s| s.is_terminal())
        .map(SkipReason::Terminated)
}
