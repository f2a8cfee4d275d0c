//! Iteration pacing for reliable requestors.
//!
//! A logical request runs as a series of iterations. Each iteration owns a
//! window of at most `iteration` out of the shared budget; an attempt that
//! produced nothing usable waits out the rest of its window before the next
//! attempt starts.
//!
//! ```text
//! budget  |------------------------------- B -------------------------------|
//! windows |---- W ----|---- W ----|---- W ----|-- rest --|
//!          attempt+wait attempt+wait attempt+wait  last
//! ```
//!
//! Every iteration's request timeout is `min(remaining, W)`. The last
//! iteration is the one whose remaining budget fits inside a window, so it
//! gets all of what is left, which is never more than `W`.

use std::time::Duration;

use crate::resilience::timeouts::TimeoutBudget;

/// Timing for one requestor iteration.
#[derive(Debug, Clone, Copy)]
pub struct IterationPlan {
    /// The window this iteration owns; pacing waits until it runs out.
    pub window: TimeoutBudget,
    /// Timeout handed to the attempt itself.
    pub request_timeout: Duration,
    /// No further iteration fits in the budget.
    pub last: bool,
}

/// Plan the next iteration against `budget`.
pub fn plan_iteration(budget: &TimeoutBudget, iteration: Duration) -> IterationPlan {
    let remaining = budget.remaining();
    let last = remaining <= iteration;
    let request_timeout = remaining.min(iteration);

    IterationPlan {
        window: TimeoutBudget::new(request_timeout),
        request_timeout,
        last,
    }
}

/// Slice of `remaining` a secondary receive or reply wait may use.
///
/// When `capped` is false the wait may use everything left.
pub fn receive_slice(remaining: Duration, cap: Duration, capped: bool) -> Duration {
    if capped {
        remaining.min(cap)
    } else {
        remaining
    }
}
