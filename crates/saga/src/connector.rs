//! Bounded retry for reaching collaborators.

use std::future::Future;
use std::time::Duration;

use crate::error::SagaError;

/// How many times to try, how long each try may take, and how long to wait
/// between tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// `None` lets each attempt run to completion.
    pub attempt_timeout: Option<Duration>,
    pub sleep_interval: Duration,
}

impl RetryPolicy {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
    pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_millis(10);
    pub const DEFAULT_SLEEP_INTERVAL: Duration = Duration::from_millis(10);

    pub fn new(max_attempts: u32, attempt_timeout: Option<Duration>, sleep_interval: Duration) -> Self {
        Self {
            max_attempts,
            attempt_timeout,
            sleep_interval,
        }
    }

    /// A single attempt with no timeout.
    pub fn once() -> Self {
        Self::new(1, None, Duration::ZERO)
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_MAX_ATTEMPTS,
            Some(Self::DEFAULT_ATTEMPT_TIMEOUT),
            Self::DEFAULT_SLEEP_INTERVAL,
        )
    }
}

/// Runs `op` until it succeeds or the policy's attempts are used up.
///
/// Returns the last error on exhaustion. An attempt that outlives the
/// policy's timeout counts as failed with `DeadlineExceeded`.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, SagaError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Into<SagaError>,
{
    let attempts = policy.attempts();
    let mut attempt = 1;
    loop {
        let result = match policy.attempt_timeout {
            Some(limit) => match tokio::time::timeout(limit, op()).await {
                Ok(result) => result.map_err(Into::into),
                Err(_) => Err(SagaError::DeadlineExceeded),
            },
            None => op().await.map_err(Into::into),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(error) if attempt >= attempts => return Err(error),
            Err(error) => {
                tracing::warn!(attempt, max_attempts = attempts, %error, "attempt failed, retrying");
                tokio::time::sleep(policy.sleep_interval).await;
                attempt += 1;
            }
        }
    }
}

/// Probes a collaborator with `retry`, turning exhaustion into
/// `ConnectorExhausted`.
#[tracing::instrument(skip(policy, probe))]
pub async fn connect_with_retry<T, E, F, Fut>(
    collaborator: &str,
    policy: &RetryPolicy,
    mut probe: F,
) -> Result<T, SagaError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Into<SagaError>,
{
    let result = retry(policy, || {
        metrics::counter!("connector_attempts_total", "collaborator" => collaborator.to_string())
            .increment(1);
        probe()
    })
    .await;

    match result {
        Ok(value) => {
            tracing::info!(collaborator, "collaborator reachable");
            Ok(value)
        }
        Err(error) => {
            tracing::error!(collaborator, %error, "collaborator unreachable");
            Err(SagaError::ConnectorExhausted {
                collaborator: collaborator.to_string(),
                attempts: policy.attempts(),
                last_error: error.to_string(),
            })
        }
    }
}
