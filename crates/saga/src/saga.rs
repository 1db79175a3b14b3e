//! Saga definitions.

use crate::error::SagaError;
use crate::step::Step;

/// A named, ordered sequence of steps.
#[derive(Debug, Clone)]
pub struct Saga {
    name: String,
    steps: Vec<Step>,
}

impl Saga {
    /// Builds a saga without checking the steps.
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            name: name.into(),
            steps,
        }
    }

    /// Builds a saga, rejecting any non-terminal step without compensation.
    ///
    /// Only the last step may omit it: nothing runs after the last step, so
    /// it can never need undoing.
    pub fn checked(name: impl Into<String>, steps: Vec<Step>) -> Result<Self, SagaError> {
        let name = name.into();
        if let Some((_, init)) = steps.split_last()
            && let Some(step) = init.iter().find(|s| !s.has_compensation())
        {
            return Err(SagaError::Misconfigured(format!(
                "saga '{name}': step '{}' has no compensation but is not the last step",
                step.name()
            )));
        }
        Ok(Self { name, steps })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
