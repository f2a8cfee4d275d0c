//! Single reliable transmissions over a binder.
//!
//! A reliable channel's transmission loop sends each attempt once and decides
//! on its own when to retransmit, so a handleable failure of one attempt is
//! often not worth raising. With `save_handled` set, such a failure is kept
//! on the outcome instead and the attempt counts as completed.

use std::sync::Arc;
use std::time::Duration;

use crate::channel::binder::{ChannelBinder, MaskingMode};
use crate::channel::message::Message;
use crate::error::{SessionError, SessionResult};

/// The result of one transmission plus any handleable failure it absorbed.
#[derive(Debug)]
pub struct OutputOutcome<T> {
    pub value: T,
    pub handled: Option<SessionError>,
}

/// One-shot send/request helper bound to a binder and masking mode.
#[derive(Clone)]
pub struct ReliableOutput {
    binder: Arc<dyn ChannelBinder>,
    mask: MaskingMode,
    save_handled: bool,
}

impl ReliableOutput {
    pub fn new(binder: Arc<dyn ChannelBinder>, mask: MaskingMode) -> Self {
        Self {
            binder,
            mask,
            save_handled: false,
        }
    }

    /// Keep handleable failures on the outcome instead of raising them.
    pub fn save_handled(mut self, save: bool) -> Self {
        self.save_handled = save;
        self
    }

    /// Send `message` once.
    pub async fn send(&self, message: Message, timeout: Duration) -> SessionResult<OutputOutcome<()>> {
        let result = self.binder.send(message, timeout, self.mask).await;
        self.settle(result, ())
    }

    /// Send `message` once and return the transport's reply, if any.
    pub async fn request(
        &self,
        message: Message,
        timeout: Duration,
    ) -> SessionResult<OutputOutcome<Option<Message>>> {
        let result = self.binder.request(message, timeout, self.mask).await;
        self.settle(result, None)
    }

    fn settle<T>(&self, result: SessionResult<T>, fallback: T) -> SessionResult<OutputOutcome<T>> {
        match result {
            Ok(value) => Ok(OutputOutcome { value, handled: None }),
            Err(error) if self.save_handled && self.binder.is_handleable(&error) => {
                tracing::debug!(binder = %self.binder.id(), error = %error, "Transmission failure saved");
                Ok(OutputOutcome {
                    value: fallback,
                    handled: Some(error),
                })
            }
            Err(error) => Err(error),
        }
    }
}
