//! One-shot wait object that can be interrupted.
//!
//! # Data Flow
//! ```text
//! set() / abort(obj) / fault(obj)
//!     → first resolution wins (watch value None → Some)
//!     → every current and future waiter wakes
//!         Signaled   → Ok(true)
//!         Aborted    → Err(obj.aborted_error())
//!         Faulted    → Err(obj.terminal_error())
//! reset() → back to None, waiters block again
//! ```
//!
//! # Design Decisions
//! - Once resolved, later set/abort/fault calls are ignored until `reset`
//! - Resolution errors are captured at the moment of abort/fault, so waiters
//!   see the object's condition as it was then
//! - On timeout a waiter either errors or returns `false`, chosen per object
//!   with an override per call

use std::time::Duration;

use tokio::sync::watch;

use crate::blocking;
use crate::channel::binder::CommunicationObject;
use crate::error::{SessionError, SessionResult};

#[derive(Debug, Clone)]
enum Resolution {
    Signaled,
    Aborted(SessionError),
    Faulted(SessionError),
}

/// A waitable flag resolved by a signal, an abort, or a fault.
#[derive(Debug)]
pub struct InterruptibleWaitObject {
    state: watch::Sender<Option<Resolution>>,
    throw_timeout_by_default: bool,
}

impl InterruptibleWaitObject {
    /// Create a wait object whose timeouts are errors.
    pub fn new(signaled: bool) -> Self {
        Self::with_timeout_policy(signaled, true)
    }

    /// Create a wait object, choosing whether a timed-out `wait` errors
    /// (`true`) or returns `Ok(false)`.
    pub fn with_timeout_policy(signaled: bool, throw_timeout_by_default: bool) -> Self {
        let initial = signaled.then_some(Resolution::Signaled);
        let (state, _) = watch::channel(initial);
        Self {
            state,
            throw_timeout_by_default,
        }
    }

    /// Signal the object. No-op once resolved.
    pub fn set(&self) {
        self.resolve(Resolution::Signaled);
    }

    /// Resolve with `object`'s abort error. No-op once resolved.
    pub fn abort(&self, object: &dyn CommunicationObject) {
        self.resolve(Resolution::Aborted(object.aborted_error()));
    }

    /// Resolve with `object`'s terminal error. No-op once resolved.
    pub fn fault(&self, object: &dyn CommunicationObject) {
        self.resolve(Resolution::Faulted(object.terminal_error()));
    }

    /// Return to the unsignaled state.
    pub fn reset(&self) {
        self.state.send_if_modified(|state| state.take().is_some());
    }

    pub fn is_set(&self) -> bool {
        matches!(*self.state.borrow(), Some(Resolution::Signaled))
    }

    pub fn is_resolved(&self) -> bool {
        self.state.borrow().is_some()
    }

    /// Wait up to `timeout`, applying the object's timeout policy.
    pub async fn wait(&self, timeout: Duration) -> SessionResult<bool> {
        self.wait_with(timeout, self.throw_timeout_by_default).await
    }

    /// Wait up to `timeout`; a timeout yields `Ok(false)`.
    pub async fn try_wait(&self, timeout: Duration) -> SessionResult<bool> {
        self.wait_with(timeout, false).await
    }

    /// Wait up to `timeout`, choosing explicitly whether a timeout errors.
    pub async fn wait_with(&self, timeout: Duration, throw_on_timeout: bool) -> SessionResult<bool> {
        let mut rx = self.state.subscribe();

        let resolved = tokio::time::timeout(timeout, async move {
            loop {
                let current = rx.borrow_and_update().clone();
                if let Some(resolution) = current {
                    return Some(resolution);
                }
                if rx.changed().await.is_err() {
                    return None;
                }
            }
        })
        .await;

        match resolved {
            Ok(Some(Resolution::Signaled)) => Ok(true),
            Ok(Some(Resolution::Aborted(error))) | Ok(Some(Resolution::Faulted(error))) => Err(error),
            Ok(None) => Ok(false),
            Err(_) if throw_on_timeout => Err(SessionError::timeout("wait", timeout)),
            Err(_) => Ok(false),
        }
    }

    /// Blocking form of [`wait`](Self::wait).
    pub fn wait_blocking(&self, timeout: Duration) -> SessionResult<bool> {
        blocking::block_on(self.wait(timeout))?
    }

    fn resolve(&self, resolution: Resolution) {
        self.state.send_if_modified(|state| {
            if state.is_some() {
                return false;
            }
            *state = Some(resolution);
            true
        });
    }
}
