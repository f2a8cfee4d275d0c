//! Secondary-receive strategy: send, then take whatever the binder receives
//! next as the reply.

use std::time::Duration;

use async_trait::async_trait;

use crate::channel::binder::{ChannelBinder, MaskingMode};
use crate::channel::message::Message;
use crate::config::schema::RequestorConfig;
use crate::error::SessionResult;
use crate::requestor::{RequestStrategy, DEFAULT_RECEIVE};
use crate::resilience::pacing::receive_slice;
use crate::resilience::timeouts::TimeoutBudget;

/// Reply obtained by a separately timed `try_receive` after the send.
#[derive(Debug, Clone)]
pub struct SecondaryReceive {
    receive_cap: Duration,
    timeout_is_safe: bool,
}

impl SecondaryReceive {
    /// `timeout_is_safe` lets the receive be capped at `receive_cap`
    /// instead of using all that is left of the attempt.
    pub fn new(receive_cap: Duration, timeout_is_safe: bool) -> Self {
        Self {
            receive_cap,
            timeout_is_safe,
        }
    }

    pub fn from_config(config: &RequestorConfig) -> Self {
        Self::new(config.receive(), config.timeout_is_safe)
    }

    pub fn timeout_is_safe(&self) -> bool {
        self.timeout_is_safe
    }
}

impl Default for SecondaryReceive {
    fn default() -> Self {
        Self::new(DEFAULT_RECEIVE, false)
    }
}

#[async_trait]
impl RequestStrategy for SecondaryReceive {
    fn name(&self) -> &'static str {
        "send_receive"
    }

    async fn exchange(
        &self,
        binder: &dyn ChannelBinder,
        request: Message,
        timeout: Duration,
        _last: bool,
    ) -> SessionResult<Option<Message>> {
        let budget = TimeoutBudget::new(timeout);
        binder.send(request, budget.remaining(), MaskingMode::None).await?;

        let receive_timeout = receive_slice(budget.remaining(), self.receive_cap, self.timeout_is_safe);
        let context = binder.try_receive(receive_timeout, MaskingMode::None).await?;
        Ok(context.and_then(|context| context.request_message().cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::message::MessageId;
    use crate::channel::simulated::{ScriptedOutcome, SimulatedBinder};

    #[tokio::test]
    async fn reply_comes_from_receive() {
        let binder = SimulatedBinder::new();
        binder.open(Duration::from_secs(1)).await.unwrap();

        let mut request = Message::new("urn:rm/CloseSequence", Vec::new());
        let id = MessageId::new();
        request.message_id = Some(id);

        let reply = SecondaryReceive::default()
            .exchange(&binder, request, Duration::from_secs(1), false)
            .await
            .unwrap()
            .unwrap();
        assert!(reply.relates_to_id(&id));
    }

    #[tokio::test]
    async fn capped_receive_gives_up_early() {
        let binder = SimulatedBinder::builder().script([ScriptedOutcome::NoReply]).build();
        binder.open(Duration::from_secs(1)).await.unwrap();

        let strategy = SecondaryReceive::new(Duration::from_millis(20), true);
        let started = tokio::time::Instant::now();
        let reply = strategy
            .exchange(&binder, Message::new("urn:rm/CloseSequence", Vec::new()), Duration::from_secs(5), false)
            .await
            .unwrap();

        assert!(reply.is_none());
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
