//! Faults sent directly on the binder.

use std::time::Duration;

use async_trait::async_trait;

use crate::channel::binder::{ChannelBinder, MaskingMode, RequestContext};
use crate::channel::message::Message;
use crate::error::SessionResult;
use crate::fault::typed::{FaultSender, TypedFaultHelper};

#[derive(Debug, Clone, Copy, Default)]
pub struct SendFaultSender;

#[async_trait]
impl FaultSender for SendFaultSender {
    type State = Message;

    fn name(&self) -> &'static str {
        "send"
    }

    /// The fault goes out on the binder, so a request context handed in is
    /// never replied to and is aborted here.
    fn state(&self, context: Option<Box<dyn RequestContext>>, fault: Message) -> SessionResult<Message> {
        if let Some(context) = context {
            context.abort();
        }
        Ok(fault)
    }

    async fn send_fault(&self, binder: &dyn ChannelBinder, message: &Message, timeout: Duration) -> SessionResult<()> {
        binder.send(message.clone(), timeout, MaskingMode::None).await
    }

    // Nothing beyond the message itself is held.
    fn abort_state(&self, _message: &Message) {}
}

pub type SendFaultHelper = TypedFaultHelper<SendFaultSender>;

impl TypedFaultHelper<SendFaultSender> {
    pub fn send(send_timeout: Duration, close_timeout: Duration) -> Self {
        Self::new(SendFaultSender, send_timeout, close_timeout)
    }
}
