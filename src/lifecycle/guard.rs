//! Bounded-concurrency admission with drain-to-zero on close.
//!
//! # Data Flow
//! ```text
//! enter() ──► closed or current == max? ──yes──► refused (false)
//!                   │no
//!                   ▼
//!             current += 1 ──► protected work ──► exit(): current -= 1
//!                                                     │
//!                                    current == 0 ────┴──► wake pending close()
//! ```
//!
//! # Design Decisions
//! - State lives in a watch channel; transitions happen inside
//!   `send_if_modified`, so admission and closing are serialized
//! - Only the exit that reaches zero (or an abort) notifies waiters
//! - `abort` releases pending closers without waiting for the drain

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::blocking;
use crate::error::{SessionError, SessionResult};
use crate::observability::metrics;

#[derive(Debug, Default, Clone, Copy)]
struct GuardState {
    current: usize,
    closed: bool,
    aborted: bool,
}

/// Admission counter bounded by `max`.
#[derive(Debug)]
pub struct Guard {
    max: usize,
    state: watch::Sender<GuardState>,
}

impl Guard {
    pub fn new(max: usize) -> Self {
        let (state, _) = watch::channel(GuardState::default());
        Self { max, state }
    }

    /// Admit one unit of work if open and below the limit.
    pub fn enter(&self) -> bool {
        let mut admitted = false;
        self.state.send_if_modified(|state| {
            if !state.closed && state.current < self.max {
                state.current += 1;
                admitted = true;
            }
            false
        });

        if !admitted {
            metrics::record_guard_rejected();
        }
        admitted
    }

    /// Admit one unit of work, returning a permit that exits on drop.
    pub fn try_enter(self: &Arc<Self>) -> Option<GuardPermit> {
        self.enter().then(|| GuardPermit {
            guard: Arc::clone(self),
        })
    }

    /// Release one admitted unit.
    ///
    /// # Panics
    /// If called more often than `enter` succeeded.
    pub fn exit(&self) {
        let mut unmatched = false;
        self.state.send_if_modified(|state| {
            if state.current == 0 {
                unmatched = true;
                return false;
            }
            state.current -= 1;
            state.current == 0
        });

        assert!(!unmatched, "Guard::exit called without a matching enter");
    }

    /// Refuse new admissions and wait up to `timeout` for admitted work to
    /// drain.
    pub async fn close(&self, timeout: Duration) -> SessionResult<()> {
        let mut rx = self.state.subscribe();
        self.state.send_if_modified(|state| {
            let newly_closed = !state.closed;
            state.closed = true;
            newly_closed
        });

        let drained = tokio::time::timeout(timeout, async move {
            loop {
                let state = *rx.borrow_and_update();
                if state.current == 0 || state.aborted {
                    return;
                }
                if rx.changed().await.is_err() {
                    return;
                }
            }
        })
        .await;

        drained.map_err(|_| {
            tracing::debug!(in_flight = self.current(), "Guard did not drain in time");
            SessionError::timeout("guard close", timeout)
        })
    }

    /// Blocking form of [`close`](Self::close).
    pub fn close_blocking(&self, timeout: Duration) -> SessionResult<()> {
        blocking::block_on(self.close(timeout))?
    }

    /// Refuse new admissions immediately and release pending closers.
    pub fn abort(&self) {
        self.state.send_if_modified(|state| {
            if state.aborted {
                return false;
            }
            state.closed = true;
            state.aborted = true;
            true
        });
    }

    pub fn current(&self) -> usize {
        self.state.borrow().current
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn is_closed(&self) -> bool {
        self.state.borrow().closed
    }
}

/// RAII admission that exits the guard on drop.
#[derive(Debug)]
pub struct GuardPermit {
    guard: Arc<Guard>,
}

impl Drop for GuardPermit {
    fn drop(&mut self) {
        self.guard.exit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admission_is_bounded() {
        let guard = Guard::new(1);
        assert!(guard.enter());
        assert!(!guard.enter());
        guard.exit();
        assert!(guard.enter());
        assert_eq!(guard.current(), 1);
    }

    #[test]
    #[should_panic(expected = "without a matching enter")]
    fn unmatched_exit_panics() {
        Guard::new(2).exit();
    }

    #[tokio::test]
    async fn close_with_nothing_in_flight_completes() {
        let guard = Guard::new(3);
        guard.close(Duration::ZERO).await.unwrap();
        assert!(guard.is_closed());
        assert!(!guard.enter());
    }

    #[tokio::test]
    async fn close_waits_for_last_exit() {
        let guard = Arc::new(Guard::new(2));
        assert!(guard.enter());
        assert!(guard.enter());

        let closer = {
            let guard = guard.clone();
            tokio::spawn(async move { guard.close(Duration::from_secs(5)).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!guard.enter());
        guard.exit();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!closer.is_finished());

        guard.exit();
        closer.await.unwrap().unwrap();
        assert_eq!(guard.current(), 0);
    }

    #[tokio::test]
    async fn close_times_out_while_work_remains() {
        let guard = Guard::new(1);
        assert!(guard.enter());
        let err = guard.close(Duration::from_millis(20)).await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn abort_releases_pending_close() {
        let guard = Arc::new(Guard::new(1));
        assert!(guard.enter());

        let closer = {
            let guard = guard.clone();
            tokio::spawn(async move { guard.close(Duration::from_secs(5)).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        guard.abort();
        closer.await.unwrap().unwrap();
        assert!(!guard.enter());
    }

    #[test]
    fn permit_exits_on_drop() {
        let guard = Arc::new(Guard::new(1));
        {
            let _permit = guard.try_enter().unwrap();
            assert!(guard.try_enter().is_none());
        }
        assert_eq!(guard.current(), 0);
        assert!(guard.try_enter().is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn blocking_close() {
        let guard = Guard::new(1);
        guard.close_blocking(Duration::from_millis(10)).unwrap();
    }
}
