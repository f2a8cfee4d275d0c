//! Error taxonomy for the reliable session core.
//!
//! Every failure a caller can observe is one [`SessionError`]. The variants
//! map onto the five classes the core distinguishes when deciding whether to
//! retry, propagate, or report a condition:
//!
//! ```text
//! Timeout         budget exhausted while waiting
//! Aborted         a party tore the communication object down
//! Faulted         the session/remote reported a terminal condition
//! Communication   transient; the binder decides if it is handleable
//! QuotaExceeded / Security / InvalidOperation   fatal, never retried
//! ```

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the reliable session core.
///
/// `Clone` so that one recorded terminal condition can be handed to every
/// waiter observing it.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// A timeout budget was exhausted.
    #[error("{operation} did not complete within {timeout:?}")]
    Timeout { operation: String, timeout: Duration },

    /// The communication object was aborted while someone was waiting on it.
    #[error("communication object {object} was aborted")]
    Aborted { object: String },

    /// The communication object entered a terminal faulted state.
    #[error("communication object {object} is faulted: {reason}")]
    Faulted { object: String, reason: String },

    /// A transport-level failure. Retry eligibility is decided by the binder.
    #[error("communication error: {0}")]
    Communication(String),

    /// A message or buffer quota was exceeded.
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Security negotiation or message security failed.
    #[error("security failure: {0}")]
    Security(String),

    /// A reliable messaging protocol fault.
    #[error(transparent)]
    Protocol(#[from] ProtocolFault),

    /// The operation is not valid in the current state.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

impl SessionError {
    /// Build a timeout error for the named operation.
    pub fn timeout(operation: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted { .. })
    }

    pub fn is_faulted(&self) -> bool {
        matches!(self, Self::Faulted { .. } | Self::Protocol(_))
    }

    /// Security, quota, and misuse failures are never retried, no matter
    /// how the binder classifies them.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Security(_) | Self::QuotaExceeded(_) | Self::InvalidOperation(_)
        )
    }

    /// Terminal conditions recorded on a communication object.
    pub fn is_terminal(&self) -> bool {
        self.is_aborted() || self.is_faulted()
    }
}

/// Faults raised by reliable messaging protocol validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolFault {
    /// The peer closed or terminated without a final acknowledgement.
    #[error("sequence {sequence} terminated: the final acknowledgement is missing")]
    MissingFinalAck { sequence: String },

    /// The final acknowledgement does not cover exactly the messages sent.
    #[error("sequence {sequence} received an invalid acknowledgement {ranges}")]
    InvalidAcknowledgement { sequence: String, ranges: String },

    /// A response is correlated to a different request.
    #[error("sequence {sequence} received a {request} response with the wrong RelatesTo")]
    WrongRelatesTo { sequence: String, request: String },

    /// A response has an unexpected action.
    #[error("sequence {sequence}: expected {expected} in reply to {request}, got {action}")]
    UnexpectedResponse {
        sequence: String,
        request: String,
        action: String,
        expected: String,
    },
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;
