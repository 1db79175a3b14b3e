//! Lifecycle of a single saga run.

use serde::{Deserialize, Serialize};

/// Where a saga run is in its lifecycle.
///
/// ```text
/// NotStarted ──► Running ──┬──► Completed
///                          └──► Compensating ──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SagaState {
    #[default]
    NotStarted,

    /// Forward actions are executing.
    Running,

    /// A forward action failed; committed steps are being undone.
    Compensating,

    /// Every forward action succeeded.
    Completed,

    /// Compensation finished after a failure, with or without errors.
    Failed,
}

impl SagaState {
    /// Returns true if the run may move from this state to `next`.
    pub fn can_transition_to(self, next: SagaState) -> bool {
        matches!(
            (self, next),
            (SagaState::NotStarted, SagaState::Running)
                | (SagaState::Running, SagaState::Completed)
                | (SagaState::Running, SagaState::Compensating)
                | (SagaState::Compensating, SagaState::Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SagaState::Completed | SagaState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SagaState::NotStarted => "NotStarted",
            SagaState::Running => "Running",
            SagaState::Compensating => "Compensating",
            SagaState::Completed => "Completed",
            SagaState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for SagaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks the state of one run and logs each transition.
#[derive(Debug)]
pub(crate) struct RunState {
    current: SagaState,
}

impl RunState {
    pub(crate) fn new() -> Self {
        Self {
            current: SagaState::NotStarted,
        }
    }

    pub(crate) fn current(&self) -> SagaState {
        self.current
    }

    pub(crate) fn move_to(&mut self, next: SagaState) {
        debug_assert!(
            self.current.can_transition_to(next),
            "invalid saga transition {} -> {}",
            self.current,
            next
        );
        tracing::debug!(from = %self.current, to = %next, "saga state changed");
        self.current = next;
    }
}
