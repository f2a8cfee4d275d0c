//! Timeout budgets.
//!
//! # Responsibilities
//! - Turn a caller-supplied duration into one fixed deadline
//! - Answer "how much time is left" for every sub-step of an operation
//!
//! # Design Decisions
//! - A budget is never renewed; retries and sub-steps deplete the same one
//! - `Duration::MAX` means "no deadline"
//! - Uses Tokio's clock so it agrees with `tokio::time::timeout`

use std::time::Duration;

use tokio::time::Instant;

use crate::error::SessionError;

/// A deadline computed once from a caller-supplied duration.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutBudget {
    original: Duration,
    started: Instant,
    deadline: Option<Instant>,
}

impl TimeoutBudget {
    /// Start a budget of `timeout` from now.
    pub fn new(timeout: Duration) -> Self {
        let started = Instant::now();
        Self {
            original: timeout,
            started,
            deadline: started.checked_add(timeout),
        }
    }

    /// A budget that never runs out.
    pub fn infinite() -> Self {
        Self::new(Duration::MAX)
    }

    /// Time left before the deadline; zero once it has passed.
    pub fn remaining(&self) -> Duration {
        match self.deadline {
            Some(deadline) => deadline.saturating_duration_since(Instant::now()),
            None => Duration::MAX,
        }
    }

    /// Time left, capped at `cap`.
    pub fn remaining_capped(&self, cap: Duration) -> Duration {
        self.remaining().min(cap)
    }

    pub fn original(&self) -> Duration {
        self.original
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn is_expired(&self) -> bool {
        self.deadline.is_some() && self.remaining().is_zero()
    }

    pub fn is_infinite(&self) -> bool {
        self.deadline.is_none()
    }

    /// The error reported when this budget runs out during `operation`.
    pub fn timeout_error(&self, operation: impl Into<String>) -> SessionError {
        SessionError::timeout(operation, self.original)
    }
}

/// Run `future` within `timeout`, reporting a [`SessionError::Timeout`]
/// for `operation` when it does not finish in time.
pub async fn with_timeout<F, T>(operation: &str, timeout: Duration, future: F) -> Result<T, SessionError>
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(timeout, future)
        .await
        .map_err(|_| SessionError::timeout(operation, timeout))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaining_is_monotonic_and_never_negative() {
        let budget = TimeoutBudget::new(Duration::from_millis(20));
        let mut last = budget.remaining();
        for _ in 0..5 {
            std::thread::sleep(Duration::from_millis(6));
            let now = budget.remaining();
            assert!(now <= last);
            last = now;
        }
        assert_eq!(budget.remaining(), Duration::ZERO);
        assert!(budget.is_expired());
    }

    #[test]
    fn infinite_budget() {
        let budget = TimeoutBudget::infinite();
        assert!(budget.is_infinite());
        assert_eq!(budget.remaining(), Duration::MAX);
        assert!(!budget.is_expired());
    }

    #[test]
    fn capped_remaining() {
        let budget = TimeoutBudget::new(Duration::from_secs(30));
        assert_eq!(budget.remaining_capped(Duration::from_secs(2)), Duration::from_secs(2));
        let short = TimeoutBudget::new(Duration::from_millis(1));
        assert!(short.remaining_capped(Duration::from_secs(2)) <= Duration::from_millis(1));
    }

    #[tokio::test]
    async fn with_timeout_reports_operation() {
        let err = with_timeout("slow op", Duration::from_millis(10), tokio::time::sleep(Duration::from_secs(5)))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(err.to_string().contains("slow op"));
    }
}
