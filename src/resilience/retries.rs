//! Retry classification.
//!
//! # Responsibilities
//! - Decide whether a failed requestor iteration may be retried
//! - Keep fatal categories (security, quota, misuse) out of the retry loop
//!
//! # Design Decisions
//! - The binder owns transport classification (`is_handleable`)
//! - Aborts and faults are terminal, never retried
//! - Session establishment is stricter: the binder must still be open and
//!   the final iteration's failure is surfaced instead of a timeout

use crate::channel::binder::{ChannelBinder, CommunicationState};
use crate::error::SessionError;

/// How a requestor treats failed iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryPolicy {
    /// Retry anything the binder classifies as handleable. Running out of
    /// budget is reported as a timeout.
    #[default]
    Handleable,
    /// Retry only while establishing a session over an open binder, and
    /// never on the last iteration.
    Establishing,
}

/// Whether the failure `error` of an iteration may be retried.
pub fn is_retryable(
    policy: RetryPolicy,
    binder: &dyn ChannelBinder,
    error: &SessionError,
    last_iteration: bool,
) -> bool {
    if error.is_fatal() || error.is_terminal() {
        return false;
    }

    if !binder.is_handleable(error) {
        return false;
    }

    match policy {
        RetryPolicy::Handleable => true,
        RetryPolicy::Establishing => binder.state() == CommunicationState::Opened && !last_iteration,
    }
}

/// Map an iteration failure to what the caller should see when it is not
/// retried.
pub fn surface(policy: RetryPolicy, error: SessionError) -> SessionError {
    match (policy, error) {
        (RetryPolicy::Establishing, SessionError::QuotaExceeded(reason)) => {
            SessionError::Communication(format!("quota exceeded while establishing session: {}", reason))
        }
        (_, error) => error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::simulated::SimulatedBinder;

    #[tokio::test]
    async fn test_handleable_policy() {
        let binder = SimulatedBinder::new();
        binder.open(std::time::Duration::from_secs(1)).await.unwrap();
        let transient = SessionError::Communication("reset".into());

        assert!(is_retryable(RetryPolicy::Handleable, &binder, &transient, false));
        assert!(is_retryable(RetryPolicy::Handleable, &binder, &transient, true));
        assert!(!is_retryable(
            RetryPolicy::Handleable,
            &binder,
            &SessionError::Security("denied".into()),
            false
        ));
        assert!(!is_retryable(
            RetryPolicy::Handleable,
            &binder,
            &SessionError::Aborted { object: "x".into() },
            false
        ));
    }

    #[tokio::test]
    async fn test_establishing_policy() {
        let binder = SimulatedBinder::new();
        let transient = SessionError::Communication("reset".into());

        // Binder not open yet.
        assert!(!is_retryable(RetryPolicy::Establishing, &binder, &transient, false));

        binder.open(std::time::Duration::from_secs(1)).await.unwrap();
        assert!(is_retryable(RetryPolicy::Establishing, &binder, &transient, false));
        assert!(!is_retryable(RetryPolicy::Establishing, &binder, &transient, true));
    }

    #[test]
    fn test_quota_promoted_while_establishing() {
        let err = surface(RetryPolicy::Establishing, SessionError::QuotaExceeded("64KB".into()));
        assert!(matches!(err, SessionError::Communication(_)));

        let err = surface(RetryPolicy::Handleable, SessionError::QuotaExceeded("64KB".into()));
        assert!(matches!(err, SessionError::QuotaExceeded(_)));
    }
}
