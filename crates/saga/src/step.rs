//! Saga steps and the handoff cell that carries data between them.

use std::future::Future;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::OnceCell;

use crate::context::SagaContext;
use crate::error::SagaError;

/// A forward or compensating action.
pub type Action = Arc<dyn Fn(SagaContext) -> BoxFuture<'static, Result<(), SagaError>> + Send + Sync>;

fn boxed_action<F, Fut>(f: F) -> Action
where
    F: Fn(SagaContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), SagaError>> + Send + 'static,
{
    Arc::new(move |ctx| f(ctx).boxed())
}

/// One unit of work in a saga.
///
/// The forward action is required; the compensating action is optional and
/// should undo the forward action's externally visible effect. Steps hold
/// no run state: values produced during a run travel through a [`Handoff`].
#[derive(Clone)]
pub struct Step {
    name: String,
    action: Action,
    compensation: Option<Action>,
}

impl Step {
    pub fn new<F, Fut>(name: impl Into<String>, action: F) -> Self
    where
        F: Fn(SagaContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), SagaError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            action: boxed_action(action),
            compensation: None,
        }
    }

    /// Attaches the action that undoes this step.
    pub fn with_compensation<F, Fut>(mut self, compensation: F) -> Self
    where
        F: Fn(SagaContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), SagaError>> + Send + 'static,
    {
        self.compensation = Some(boxed_action(compensation));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_compensation(&self) -> bool {
        self.compensation.is_some()
    }

    pub(crate) async fn execute(&self, ctx: SagaContext) -> Result<(), SagaError> {
        (self.action)(ctx).await
    }

    pub(crate) fn compensation(&self) -> Option<&Action> {
        self.compensation.as_ref()
    }
}

impl std::fmt::Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("has_compensation", &self.has_compensation())
            .finish()
    }
}

/// Single-assignment cell shared by the steps of one saga run.
///
/// A forward action `put`s the value it produced; a later action or a
/// compensating action reads it back. Writing twice is an error.
pub struct Handoff<T> {
    cell: Arc<OnceCell<T>>,
}

impl<T: Clone> Handoff<T> {
    pub fn new() -> Self {
        Self {
            cell: Arc::new(OnceCell::new()),
        }
    }

    pub fn put(&self, value: T) -> Result<(), SagaError> {
        self.cell
            .set(value)
            .map_err(|_| SagaError::HandoffAlreadySet)
    }

    pub fn get(&self) -> Option<T> {
        self.cell.get().cloned()
    }

    /// Returns the value, failing with `HandoffEmpty` if nothing was put.
    pub fn require(&self) -> Result<T, SagaError> {
        self.get().ok_or(SagaError::HandoffEmpty)
    }
}

impl<T> Clone for Handoff<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T: Clone> Default for Handoff<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Handoff<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Handoff").field(&self.cell.get()).finish()
    }
}
