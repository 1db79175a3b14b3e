//! Saga coordinator: runs steps in order and compensates on failure.

use std::time::Instant;

use crate::connector::{RetryPolicy, retry};
use crate::context::SagaContext;
use crate::outcome::{CompensationError, SagaFailure, SagaResult, SagaSummary};
use crate::saga::Saga;
use crate::state::{RunState, SagaState};
use crate::step::Step;

/// Executes sagas.
///
/// Forward actions run strictly in order and are never retried. On the
/// first failure every committed step is compensated from last to first;
/// steps without compensation are skipped, and a failing compensation is
/// recorded without stopping the rest.
///
/// The coordinator holds no per-run state and may be shared freely.
#[derive(Debug, Clone, Default)]
pub struct SagaCoordinator {
    compensation_retry: Option<RetryPolicy>,
}

impl SagaCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retries each failing compensating action under `policy`.
    pub fn with_compensation_retry(mut self, policy: RetryPolicy) -> Self {
        self.compensation_retry = Some(policy);
        self
    }

    /// Runs `saga` to completion or through compensation.
    #[tracing::instrument(
        skip(self, ctx, saga),
        fields(saga = %saga.name(), run_id = %ctx.run_id())
    )]
    pub async fn run_saga(&self, ctx: &SagaContext, saga: &Saga) -> SagaResult {
        let saga_name = saga.name().to_string();
        metrics::counter!("saga_executions_total", "saga" => saga_name.clone()).increment(1);
        let started = Instant::now();

        let mut run = RunState::new();
        run.move_to(SagaState::Running);

        let mut committed: Vec<&Step> = Vec::with_capacity(saga.len());
        for step in saga.steps() {
            tracing::debug!(step = step.name(), "saga step started");
            let outcome = match ctx.check() {
                Ok(()) => step.execute(ctx.clone()).await,
                Err(e) => Err(e),
            };

            let error = match outcome {
                Ok(()) => {
                    tracing::debug!(step = step.name(), "saga step committed");
                    committed.push(step);
                    continue;
                }
                Err(error) => error,
            };

            tracing::warn!(step = step.name(), %error, "saga step failed, compensating");
            run.move_to(SagaState::Compensating);
            let (compensated, compensation_errors) = self.compensate(ctx, &committed).await;
            run.move_to(SagaState::Failed);

            let failure = SagaFailure {
                saga: saga_name.clone(),
                run_id: ctx.run_id(),
                failed_step: step.name().to_string(),
                error,
                compensation_errors,
                compensated,
            };

            metrics::histogram!("saga_duration_seconds", "saga" => saga_name.clone())
                .record(started.elapsed().as_secs_f64());
            metrics::counter!("saga_failed_total", "saga" => saga_name.clone()).increment(1);
            if failure.is_inconsistent() {
                metrics::counter!("saga_inconsistent_total", "saga" => saga_name).increment(1);
                tracing::error!(
                    alert = true,
                    state = %run.current(),
                    failed_step = %failure.failed_step,
                    compensation_errors = failure.compensation_errors.len(),
                    "saga failed and compensation was incomplete"
                );
            } else {
                tracing::warn!(failed_step = %failure.failed_step, "saga failed and was rolled back");
            }
            return Err(failure);
        }

        run.move_to(SagaState::Completed);
        let duration = started.elapsed().as_secs_f64();
        metrics::histogram!("saga_duration_seconds", "saga" => saga_name.clone()).record(duration);
        metrics::counter!("saga_completed_total", "saga" => saga_name.clone()).increment(1);
        tracing::info!(state = %run.current(), duration, steps = committed.len(), "saga completed");

        Ok(SagaSummary {
            saga: saga_name,
            run_id: ctx.run_id(),
            committed: committed.iter().map(|s| s.name().to_string()).collect(),
        })
    }

    /// Undoes committed steps in reverse order, collecting every failure.
    async fn compensate(
        &self,
        ctx: &SagaContext,
        committed: &[&Step],
    ) -> (Vec<String>, Vec<CompensationError>) {
        let comp_ctx = ctx.for_compensation();
        let mut compensated = Vec::new();
        let mut errors = Vec::new();

        for step in committed.iter().rev() {
            let Some(compensation) = step.compensation() else {
                tracing::debug!(step = step.name(), "no compensation, skipping");
                continue;
            };

            let result = match &self.compensation_retry {
                Some(policy) => retry(policy, || compensation(comp_ctx.clone())).await,
                None => compensation(comp_ctx.clone()).await,
            };

            match result {
                Ok(()) => {
                    tracing::debug!(step = step.name(), "step compensated");
                    compensated.push(step.name().to_string());
                }
                Err(error) => {
                    metrics::counter!("saga_compensation_failures_total").increment(1);
                    tracing::error!(step = step.name(), %error, "compensation failed");
                    errors.push(CompensationError {
                        step: step.name().to_string(),
                        error,
                    });
                }
            }
        }

        (compensated, errors)
    }
}
