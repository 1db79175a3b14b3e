//! Results of a saga run.

use common::RunId;

use crate::error::SagaError;

/// Outcome of [`SagaCoordinator::run_saga`](crate::SagaCoordinator::run_saga).
pub type SagaResult = Result<SagaSummary, SagaFailure>;

/// A run in which every forward action succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SagaSummary {
    pub saga: String,
    pub run_id: RunId,
    /// Names of the committed steps, in execution order.
    pub committed: Vec<String>,
}

/// A compensating action that failed.
#[derive(Debug)]
pub struct CompensationError {
    pub step: String,
    pub error: SagaError,
}

impl std::fmt::Display for CompensationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "compensation of '{}' failed: {}", self.step, self.error)
    }
}

/// A run that stopped at a failing step.
#[derive(Debug)]
pub struct SagaFailure {
    pub saga: String,
    pub run_id: RunId,
    /// The step whose forward action failed.
    pub failed_step: String,
    /// The error that stopped forward execution.
    pub error: SagaError,
    /// One entry per compensating action that failed, in the order they ran.
    pub compensation_errors: Vec<CompensationError>,
    /// Steps whose compensation succeeded, in the order they ran.
    pub compensated: Vec<String>,
}

impl SagaFailure {
    /// True when at least one compensating action failed, leaving the
    /// collaborators out of step with each other.
    pub fn is_inconsistent(&self) -> bool {
        !self.compensation_errors.is_empty()
    }
}

impl std::fmt::Display for SagaFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "saga '{}' failed at step '{}': {}",
            self.saga, self.failed_step, self.error
        )?;
        if self.is_inconsistent() {
            write!(f, " ({} compensation errors", self.compensation_errors.len())?;
            for err in &self.compensation_errors {
                write!(f, "; {err}")?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}
