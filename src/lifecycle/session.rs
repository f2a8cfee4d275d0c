//! Session lifecycle orchestration.
//!
//! # Data Flow
//! ```text
//! open(T):   binder.open ──► session.open ──► opened
//!                 └──────┬───────┘
//!                    failure ──► binder.close (best effort) ──► original error
//!
//! close(T):  [caller steps] ──► session.close ──► binder.close    (one budget T)
//!                    failure ──► binder.close if not reached ──► original error
//! ```
//!
//! # Design Decisions
//! - Secondary close failures are traced and the binder aborted, never surfaced
//! - Blocking forms drive the same futures as the async forms

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::blocking;
use crate::channel::binder::{ChannelBinder, MaskingMode};
use crate::error::SessionResult;
use crate::observability::metrics;
use crate::resilience::composer::{OperationComposer, Step};
use crate::resilience::timeouts::TimeoutBudget;

/// The reliable session layered over a binder.
#[async_trait]
pub trait ReliableSession: Send + Sync {
    async fn open(&self, timeout: Duration) -> SessionResult<()>;

    async fn close(&self, timeout: Duration) -> SessionResult<()>;

    fn abort(&self);
}

/// Sequences binder and session open/close.
pub struct SessionOrchestrator {
    binder: Arc<dyn ChannelBinder>,
    session: Arc<dyn ReliableSession>,
}

impl SessionOrchestrator {
    pub fn new(binder: Arc<dyn ChannelBinder>, session: Arc<dyn ReliableSession>) -> Self {
        Self { binder, session }
    }

    pub fn binder(&self) -> &Arc<dyn ChannelBinder> {
        &self.binder
    }

    pub fn session(&self) -> &Arc<dyn ReliableSession> {
        &self.session
    }

    /// Open the binder, then the session, within `timeout`.
    pub async fn open(&self, timeout: Duration) -> SessionResult<()> {
        let budget = TimeoutBudget::new(timeout);

        let result = async {
            self.binder.open(budget.remaining()).await?;
            self.session.open(budget.remaining()).await
        }
        .await;

        metrics::record_session_transition("open", result.is_ok());
        match result {
            Ok(()) => {
                info!(binder = %self.binder.id(), elapsed = ?budget.elapsed(), "Reliable session opened");
                Ok(())
            }
            Err(error) => {
                debug!(binder = %self.binder.id(), error = %error, "Session open failed, closing binder");
                self.close_binder_quietly(budget.remaining()).await;
                Err(error)
            }
        }
    }

    /// Close the session, then the binder, within `timeout`.
    pub async fn close(&self, timeout: Duration) -> SessionResult<()> {
        self.close_with(timeout, Vec::new()).await
    }

    /// Close with `steps` run first, all sharing one `timeout` budget.
    pub async fn close_with<'a>(&'a self, timeout: Duration, steps: Vec<Option<Step<'a>>>) -> SessionResult<()> {
        let budget = TimeoutBudget::new(timeout);
        let binder_reached = Arc::new(AtomicBool::new(false));
        let reached = binder_reached.clone();

        let result = OperationComposer::new()
            .extend(steps)
            .step(move |remaining| self.session.close(remaining))
            .step(move |remaining| {
                reached.store(true, Ordering::SeqCst);
                self.binder.close(remaining, MaskingMode::Handled)
            })
            .run_within(budget)
            .await;

        metrics::record_session_transition("close", result.is_ok());
        match result {
            Ok(()) => {
                info!(binder = %self.binder.id(), "Reliable session closed");
                Ok(())
            }
            Err(error) => {
                debug!(binder = %self.binder.id(), error = %error, "Session close failed");
                if !binder_reached.load(Ordering::SeqCst) {
                    self.close_binder_quietly(budget.remaining()).await;
                }
                Err(error)
            }
        }
    }

    /// Tear down the session and binder without waiting.
    pub fn abort(&self) {
        self.session.abort();
        self.binder.abort();
    }

    pub fn open_blocking(&self, timeout: Duration) -> SessionResult<()> {
        blocking::block_on(self.open(timeout))?
    }

    pub fn close_blocking(&self, timeout: Duration) -> SessionResult<()> {
        blocking::block_on(self.close(timeout))?
    }

    async fn close_binder_quietly(&self, timeout: Duration) {
        if let Err(error) = self.binder.close(timeout, MaskingMode::Handled).await {
            debug!(binder = %self.binder.id(), error = %error, "Best-effort binder close failed, aborting");
            self.binder.abort();
        }
    }
}
