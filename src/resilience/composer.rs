//! Sequential composition of timeout-bounded operations.
//!
//! # Data Flow
//! ```text
//! [step 0] --remaining()--> run --ok--> [step 1 (skipped: None)] --> [step 2] ... --> done
//!                             \--err--> abort composition, surface error
//! ```
//!
//! # Design Decisions
//! - All steps share one [`TimeoutBudget`]; each starts with what is left
//! - A `None` step is skipped, so step lists can be made conditionally
//!   shorter without rebuilding them
//! - The cursor only moves forward; the first failure ends the composition

use std::future::Future;
use std::time::Duration;

use futures_util::future::BoxFuture;

use crate::error::SessionResult;
use crate::resilience::timeouts::{with_timeout, TimeoutBudget};

/// One step: given the remaining time, produce the operation to await.
pub type Step<'a> = Box<dyn FnOnce(Duration) -> BoxFuture<'a, SessionResult<()>> + Send + 'a>;

/// Box `operation` as a [`Step`].
pub fn boxed_step<'a, F, Fut>(operation: F) -> Step<'a>
where
    F: FnOnce(Duration) -> Fut + Send + 'a,
    Fut: Future<Output = SessionResult<()>> + Send + 'a,
{
    Box::new(move |timeout| Box::pin(operation(timeout)))
}

/// Ordered list of timeout-bounded steps run under one budget.
#[derive(Default)]
pub struct OperationComposer<'a> {
    steps: Vec<Option<Step<'a>>>,
}

impl<'a> OperationComposer<'a> {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Append a step.
    pub fn step<F, Fut>(mut self, operation: F) -> Self
    where
        F: FnOnce(Duration) -> Fut + Send + 'a,
        Fut: Future<Output = SessionResult<()>> + Send + 'a,
    {
        self.steps.push(Some(boxed_step(operation)));
        self
    }

    /// Append a step only when `condition` holds; otherwise leave a hole.
    pub fn step_if<F, Fut>(self, condition: bool, operation: F) -> Self
    where
        F: FnOnce(Duration) -> Fut + Send + 'a,
        Fut: Future<Output = SessionResult<()>> + Send + 'a,
    {
        if condition {
            self.step(operation)
        } else {
            self.skip()
        }
    }

    /// Append an empty slot that is skipped when the composition runs.
    pub fn skip(mut self) -> Self {
        self.steps.push(None);
        self
    }

    /// Append already-built steps, holes included.
    pub fn extend(mut self, steps: impl IntoIterator<Item = Option<Step<'a>>>) -> Self {
        self.steps.extend(steps);
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step in order under a fresh budget of `timeout`.
    pub async fn run(self, timeout: Duration) -> SessionResult<()> {
        self.run_within(TimeoutBudget::new(timeout)).await
    }

    /// Run every step in order under an existing budget.
    pub async fn run_within(self, budget: TimeoutBudget) -> SessionResult<()> {
        for (index, step) in self.steps.into_iter().enumerate() {
            let Some(begin) = step else {
                continue;
            };

            let remaining = budget.remaining();
            let result = with_timeout("composed operation", remaining, begin(remaining)).await;
            if let Err(error) = result.and_then(|r| r) {
                tracing::debug!(step = index, error = %error, "Composed operation failed");
                return Err(error);
            }
        }

        Ok(())
    }
}
