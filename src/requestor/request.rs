//! Embedded-reply strategy: the transport's own request call returns the
//! reply.
//!
//! A reply can also reach the session's receive loop before this requestor
//! asks for it. Such a reply is buffered through [`EmbeddedReply::deliver`]
//! and handed back when the transport call itself produced nothing.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::channel::binder::{ChannelBinder, MaskingMode};
use crate::channel::message::Message;
use crate::error::SessionResult;
use crate::requestor::RequestStrategy;

#[derive(Debug, Default)]
struct ReplyState {
    replied: bool,
    buffered: Option<Message>,
}

/// Reply returned by `ChannelBinder::request`, with out-of-band buffering.
#[derive(Debug, Default)]
pub struct EmbeddedReply {
    state: Mutex<ReplyState>,
}

impl EmbeddedReply {
    /// Buffer a reply that arrived out of band. Only the first one is kept,
    /// and nothing is kept once the requestor has replied.
    pub fn deliver(&self, reply: Message) {
        let mut state = self.state.lock().expect("reply mutex poisoned");
        if !state.replied && state.buffered.is_none() {
            state.buffered = Some(reply);
        }
    }

    /// The buffered reply, if any.
    pub fn reply_info(&self) -> Option<Message> {
        self.state.lock().expect("reply mutex poisoned").buffered.clone()
    }

    pub fn has_replied(&self) -> bool {
        self.state.lock().expect("reply mutex poisoned").replied
    }

    /// Reconcile the transport's reply with a buffered one.
    fn settle(&self, reply: Option<Message>, last: bool) -> Option<Message> {
        let mut state = self.state.lock().expect("reply mutex poisoned");
        let reply = match reply {
            Some(reply) => {
                state.buffered = None;
                Some(reply)
            }
            None => state.buffered.clone(),
        };

        if reply.is_some() || last {
            state.replied = true;
        }
        reply
    }
}

#[async_trait]
impl RequestStrategy for EmbeddedReply {
    fn name(&self) -> &'static str {
        "request"
    }

    async fn exchange(
        &self,
        binder: &dyn ChannelBinder,
        request: Message,
        timeout: Duration,
        last: bool,
    ) -> SessionResult<Option<Message>> {
        let reply = binder.request(request, timeout, MaskingMode::None).await?;
        Ok(self.settle(reply, last))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::message::MessageId;

    fn reply(tag: &str) -> Message {
        let mut message = Message::new("urn:rm/CreateSequenceResponse", tag.as_bytes().to_vec());
        message.relates_to = Some(MessageId::new());
        message
    }

    #[test]
    fn transport_reply_wins_over_buffered() {
        let strategy = EmbeddedReply::default();
        strategy.deliver(reply("buffered"));

        let settled = strategy.settle(Some(reply("transport")), false).unwrap();
        assert_eq!(settled.body, b"transport");
        assert!(strategy.reply_info().is_none());
        assert!(strategy.has_replied());
    }

    #[test]
    fn buffered_reply_fills_missing_transport_reply() {
        let strategy = EmbeddedReply::default();
        strategy.deliver(reply("first"));
        strategy.deliver(reply("second"));

        let settled = strategy.settle(None, false).unwrap();
        assert_eq!(settled.body, b"first");
    }

    #[test]
    fn last_iteration_marks_replied() {
        let strategy = EmbeddedReply::default();
        assert!(strategy.settle(None, false).is_none());
        assert!(!strategy.has_replied());

        assert!(strategy.settle(None, true).is_none());
        assert!(strategy.has_replied());

        strategy.deliver(reply("late"));
        assert!(strategy.reply_info().is_none());
    }
}
