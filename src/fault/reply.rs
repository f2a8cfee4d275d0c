//! Faults delivered as the reply on a received request.

use std::time::Duration;

use async_trait::async_trait;

use crate::channel::binder::{ChannelBinder, RequestContext};
use crate::channel::message::Message;
use crate::error::{SessionError, SessionResult};
use crate::fault::typed::{FaultSender, TypedFaultHelper};

/// A fault waiting to be sent as the reply on `context`.
pub struct ReplyFault {
    pub context: Box<dyn RequestContext>,
    pub message: Message,
}

/// Replies with the fault on the originating request context.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplyFaultSender;

#[async_trait]
impl FaultSender for ReplyFaultSender {
    type State = ReplyFault;

    fn name(&self) -> &'static str {
        "reply"
    }

    fn state(&self, context: Option<Box<dyn RequestContext>>, fault: Message) -> SessionResult<ReplyFault> {
        let context = context.ok_or_else(|| {
            SessionError::InvalidOperation("a reply fault needs the request context it answers".into())
        })?;

        Ok(ReplyFault { context, message: fault })
    }

    async fn send_fault(&self, _binder: &dyn ChannelBinder, state: &ReplyFault, timeout: Duration) -> SessionResult<()> {
        state.context.reply(state.message.clone(), timeout).await
    }

    fn abort_state(&self, state: &ReplyFault) {
        state.context.abort();
    }
}

pub type ReplyFaultHelper = TypedFaultHelper<ReplyFaultSender>;

impl TypedFaultHelper<ReplyFaultSender> {
    pub fn reply(send_timeout: Duration, close_timeout: Duration) -> Self {
        Self::new(ReplyFaultSender, send_timeout, close_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::simulated::{SimulatedBinder, SimulatedRequestContext};
    use crate::fault::FaultHelper;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn fault_is_sent_as_reply_and_binder_closed() {
        let binder = Arc::new(SimulatedBinder::new());
        binder.open(Duration::from_secs(1)).await.unwrap();

        let replies = Arc::new(Mutex::new(Vec::new()));
        let context = SimulatedRequestContext::new(Message::new("urn:rm/CreateSequence", Vec::new()), replies.clone());

        let helper = ReplyFaultHelper::reply(Duration::from_secs(1), Duration::from_secs(1));
        helper.send_fault_async(binder.clone(), Some(Box::new(context)), Message::new("urn:rm/Fault", Vec::new()));
        helper.close(Duration::from_secs(1)).await.unwrap();

        let replies = replies.lock().unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].action, "urn:rm/Fault");
        assert!(binder.sent().is_empty());
    }

    #[tokio::test]
    async fn missing_context_is_reported_to_binder() {
        let binder = Arc::new(SimulatedBinder::new());
        let helper = ReplyFaultHelper::reply(Duration::from_secs(1), Duration::from_secs(1));

        helper.send_fault_async(binder.clone(), None, Message::new("urn:rm/Fault", Vec::new()));

        assert_eq!(helper.outstanding(), 0);
        assert!(matches!(binder.handled_errors().as_slice(), [SessionError::InvalidOperation(_)]));
    }

    #[tokio::test]
    async fn failing_reply_aborts_context() {
        let binder = Arc::new(SimulatedBinder::new());
        binder.open(Duration::from_secs(1)).await.unwrap();

        let context = Arc::new(
            SimulatedRequestContext::new(Message::new("urn:rm/Ping", Vec::new()), Arc::new(Mutex::new(Vec::new())))
                .failing(SessionError::Communication("gone".into())),
        );

        let helper = ReplyFaultHelper::reply(Duration::from_secs(1), Duration::from_secs(1));
        helper.send_fault_async(binder.clone(), Some(Box::new(context.clone())), Message::new("urn:rm/Fault", Vec::new()));
        helper.close(Duration::from_secs(1)).await.unwrap();

        assert!(context.is_aborted());
        assert_eq!(binder.handled_errors().len(), 1);
    }
}
