//! Best-effort fault delivery.
//!
//! # Responsibilities
//! - Send a fault over a binder, then close that binder, off the caller's path
//! - Track outstanding items so a coordinated close can drain them
//! - Abandon everything on abort without sending
//!
//! [`TypedFaultHelper`] carries the shared queueing; [`ReplyFaultHelper`]
//! and [`SendFaultHelper`] differ only in how the fault is transmitted.

pub mod reply;
pub mod send;
pub mod typed;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::channel::binder::{ChannelBinder, RequestContext};
use crate::channel::message::Message;
use crate::error::SessionResult;

pub use reply::{ReplyFault, ReplyFaultHelper, ReplyFaultSender};
pub use send::{SendFaultHelper, SendFaultSender};
pub use typed::{FaultSender, TypedFaultHelper};

#[async_trait]
pub trait FaultHelper: Send + Sync {
    /// Queue `fault` for delivery on `binder` and return immediately.
    /// Failures that cannot be reported to a caller go to
    /// [`ChannelBinder::handle_error`].
    fn send_fault_async(&self, binder: Arc<dyn ChannelBinder>, context: Option<Box<dyn RequestContext>>, fault: Message);

    /// Wait for outstanding items to finish, up to `timeout`, then refuse
    /// new ones. Items still running when the wait ends are abandoned.
    async fn close(&self, timeout: Duration) -> SessionResult<()>;

    /// Abandon every outstanding item without sending.
    fn abort(&self);
}
