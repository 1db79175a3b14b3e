//! Per-run context shared by every step of a saga.

use std::future::Future;
use std::time::Duration;

use common::RunId;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::SagaError;

/// Context handed to every forward and compensating action of one run.
///
/// Carries the run id used to correlate log lines, an optional deadline and
/// a cancellation token. Actions wrap collaborator calls in [`bounded`] so a
/// cancelled or expired run stops promptly.
///
/// [`bounded`]: SagaContext::bounded
#[derive(Debug, Clone)]
pub struct SagaContext {
    run_id: RunId,
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl SagaContext {
    /// Creates a context with a fresh run id, no deadline and its own token.
    pub fn new() -> Self {
        Self {
            run_id: RunId::new(),
            deadline: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Sets the deadline to `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Uses `token` so the run can be cancelled from outside.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fails if the run was cancelled or its deadline has passed.
    pub fn check(&self) -> Result<(), SagaError> {
        if self.cancel.is_cancelled() {
            return Err(SagaError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(SagaError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Runs `fut` unless the run is cancelled or its deadline passes first.
    pub async fn bounded<F, T, E>(&self, fut: F) -> Result<T, SagaError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<SagaError>,
    {
        self.check()?;

        let guarded = async {
            match self.deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, fut)
                    .await
                    .map_err(|_| SagaError::DeadlineExceeded)?
                    .map_err(Into::into),
                None => fut.await.map_err(Into::into),
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(SagaError::Cancelled),
            result = guarded => result,
        }
    }

    /// Derives the context used for compensating actions.
    ///
    /// Keeps the run id but drops the deadline and cancellation so a
    /// timeout that aborted the forward phase cannot abort the rollback.
    pub fn for_compensation(&self) -> Self {
        Self {
            run_id: self.run_id,
            deadline: None,
            cancel: CancellationToken::new(),
        }
    }
}

impl Default for SagaContext {
    fn default() -> Self {
        Self::new()
    }
}
