//! The channel binder contract consumed by the core.
//!
//! # Responsibilities
//! - Transmit messages (send, request/reply, receive)
//! - Drive the underlying transport channel's lifecycle
//! - Classify failures the core may retry around
//! - Absorb failures that surface on background work with no caller
//!
//! The core never implements this trait; transports do. See
//! [`SimulatedBinder`](crate::channel::simulated::SimulatedBinder) for an
//! in-memory implementation.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::channel::message::{EndpointAddress, Message};
use crate::error::{SessionError, SessionResult};

/// Global atomic counter for binder IDs.
/// Relaxed ordering is enough: only uniqueness matters.
static BINDER_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Identity of a binder, used to key per-binder bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BinderId(u64);

impl BinderId {
    /// Generate a new unique binder ID.
    pub fn new() -> Self {
        Self(BINDER_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for BinderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BinderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "binder-{}", self.0)
    }
}

/// Lifecycle state of a communication object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommunicationState {
    Created,
    Opening,
    Opened,
    Closing,
    Closed,
    Faulted,
}

/// Whether the binder translates low-level transport failures before they
/// reach the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaskingMode {
    /// Failures are surfaced as-is.
    #[default]
    None,
    /// Handleable failures are absorbed by the binder.
    Handled,
    /// The binder's own default applies.
    Unhandled,
}

/// Anything that can be aborted or faulted and can describe its terminal
/// condition.
pub trait CommunicationObject: Send + Sync {
    fn state(&self) -> CommunicationState;

    /// The error waiters observe after this object is aborted.
    fn aborted_error(&self) -> SessionError;

    /// The error waiters observe after this object faults.
    fn terminal_error(&self) -> SessionError;
}

/// A received request together with the means to reply to it.
#[async_trait]
pub trait RequestContext: Send + Sync {
    fn request_message(&self) -> Option<&Message>;

    async fn reply(&self, message: Message, timeout: Duration) -> SessionResult<()>;

    fn abort(&self);
}

#[async_trait]
impl<T: RequestContext + ?Sized> RequestContext for std::sync::Arc<T> {
    fn request_message(&self) -> Option<&Message> {
        (**self).request_message()
    }

    async fn reply(&self, message: Message, timeout: Duration) -> SessionResult<()> {
        (**self).reply(message, timeout).await
    }

    fn abort(&self) {
        (**self).abort()
    }
}

/// Abstraction over a transport channel.
#[async_trait]
pub trait ChannelBinder: CommunicationObject {
    fn id(&self) -> BinderId;

    async fn open(&self, timeout: Duration) -> SessionResult<()>;

    async fn close(&self, timeout: Duration, mask: MaskingMode) -> SessionResult<()>;

    fn abort(&self);

    /// Transmit one message; no reply expected.
    async fn send(&self, message: Message, timeout: Duration, mask: MaskingMode) -> SessionResult<()>;

    /// Transmit one message and return the transport's correlated reply.
    async fn request(
        &self,
        message: Message,
        timeout: Duration,
        mask: MaskingMode,
    ) -> SessionResult<Option<Message>>;

    /// Receive whatever arrives next, or `None` when nothing arrived in time.
    async fn try_receive(
        &self,
        timeout: Duration,
        mask: MaskingMode,
    ) -> SessionResult<Option<Box<dyn RequestContext>>>;

    /// Whether `error` is one the core may retry around.
    fn is_handleable(&self, error: &SessionError) -> bool;

    fn local_address(&self) -> Option<EndpointAddress>;

    fn remote_address(&self) -> EndpointAddress;

    /// Sink for failures on background work with no caller to report to.
    fn handle_error(&self, error: SessionError);

    /// Make sure a channel exists before a session-establishing request.
    /// Returns false when no attempt should be made this iteration.
    async fn ensure_channel_for_request(&self) -> SessionResult<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binder_id_unique() {
        let id1 = BinderId::new();
        let id2 = BinderId::new();
        assert_ne!(id1, id2);
        assert!(id2.as_u64() > id1.as_u64());
        assert!(id1.to_string().starts_with("binder-"));
    }

    #[test]
    fn default_masking_is_none() {
        assert_eq!(MaskingMode::default(), MaskingMode::None);
    }
}
