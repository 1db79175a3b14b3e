//! Saga error types.

use domain::DomainError;
use ledger::LedgerError;
use thiserror::Error;

use crate::outcome::SagaFailure;
use crate::services::identity::IdentityError;
use crate::services::payment::PaymentError;

/// Errors that can occur while building or running sagas.
#[derive(Debug, Error)]
pub enum SagaError {
    /// Identity service error.
    #[error("Identity service error: {0}")]
    Identity(#[from] IdentityError),

    /// Ledger error.
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Payment processor error.
    #[error("Payment processor error: {0}")]
    Payment(#[from] PaymentError),

    /// Domain error.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Input was rejected before any step ran.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The run was cancelled through its cancellation token.
    #[error("Saga run was cancelled")]
    Cancelled,

    /// The run's deadline passed, or a single attempt timed out.
    #[error("Deadline exceeded")]
    DeadlineExceeded,

    /// A handoff cell was written twice in one run.
    #[error("Handoff value was already set")]
    HandoffAlreadySet,

    /// A step read a handoff cell that no earlier step filled.
    #[error("Handoff value is missing")]
    HandoffEmpty,

    /// The saga definition is invalid.
    #[error("Saga misconfigured: {0}")]
    Misconfigured(String),

    /// A collaborator never answered within the retry policy.
    #[error("Could not reach {collaborator} after {attempts} attempts: {last_error}")]
    ConnectorExhausted {
        collaborator: String,
        attempts: u32,
        last_error: String,
    },

    /// A saga run failed; compensation has already been attempted.
    #[error("{0}")]
    Failed(Box<SagaFailure>),
}

impl SagaError {
    /// Returns true when the error means the requested record does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            SagaError::Ledger(LedgerError::NotFound(_)) => true,
            SagaError::Identity(IdentityError::NotFound(_)) => true,
            SagaError::Payment(PaymentError::NotFound(_)) => true,
            SagaError::Failed(failure) => failure.error.is_not_found(),
            _ => false,
        }
    }

    /// Returns true when the error is a uniqueness conflict.
    pub fn is_conflict(&self) -> bool {
        match self {
            SagaError::Ledger(LedgerError::AlreadyExists(_)) => true,
            SagaError::Identity(IdentityError::AlreadyExists(_)) => true,
            SagaError::Failed(failure) => failure.error.is_conflict() && !failure.is_inconsistent(),
            _ => false,
        }
    }
}

impl From<SagaFailure> for SagaError {
    fn from(failure: SagaFailure) -> Self {
        SagaError::Failed(Box::new(failure))
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
