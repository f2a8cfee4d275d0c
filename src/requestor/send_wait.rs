//! External-signal strategy: send, then wait for another part of the
//! session (its receive loop) to deliver the correlated reply.
//!
//! Send and wait are composed under the attempt's timeout. The wait is
//! capped at the receive window and times out as a handleable failure, so
//! the requestor paces and retries.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::channel::binder::{ChannelBinder, CommunicationObject, MaskingMode};
use crate::channel::message::Message;
use crate::config::schema::RequestorConfig;
use crate::error::SessionResult;
use crate::interrupt::wait_object::InterruptibleWaitObject;
use crate::requestor::{RequestStrategy, DEFAULT_RECEIVE};
use crate::resilience::composer::OperationComposer;

#[derive(Debug, Default)]
struct ReplyState {
    replied: bool,
    info: Option<Message>,
}

/// Reply signaled through [`ExternalSignal::deliver`].
#[derive(Debug)]
pub struct ExternalSignal {
    receive_cap: Duration,
    reply_handle: InterruptibleWaitObject,
    state: Mutex<ReplyState>,
}

impl ExternalSignal {
    pub fn new(receive_cap: Duration) -> Self {
        Self {
            receive_cap,
            reply_handle: InterruptibleWaitObject::new(false),
            state: Mutex::new(ReplyState::default()),
        }
    }

    pub fn from_config(config: &RequestorConfig) -> Self {
        Self::new(config.receive())
    }

    /// Hand over a reply observed by the receive loop. The first reply wins;
    /// anything after the requestor has replied is dropped.
    pub fn deliver(&self, reply: Message) {
        {
            let mut state = self.state.lock().expect("reply mutex poisoned");
            if state.replied || state.info.is_some() {
                return;
            }
            state.info = Some(reply);
        }

        self.reply_handle.set();
    }

    /// The delivered reply, if any.
    pub fn reply_info(&self) -> Option<Message> {
        self.state.lock().expect("reply mutex poisoned").info.clone()
    }

    pub fn has_replied(&self) -> bool {
        self.state.lock().expect("reply mutex poisoned").replied
    }

    fn take_reply(&self, last: bool) -> Option<Message> {
        let mut state = self.state.lock().expect("reply mutex poisoned");
        if state.info.is_some() || last {
            state.replied = true;
        }
        state.info.clone()
    }
}

impl Default for ExternalSignal {
    fn default() -> Self {
        Self::new(DEFAULT_RECEIVE)
    }
}

#[async_trait]
impl RequestStrategy for ExternalSignal {
    fn name(&self) -> &'static str {
        "send_wait"
    }

    async fn exchange(
        &self,
        binder: &dyn ChannelBinder,
        request: Message,
        timeout: Duration,
        last: bool,
    ) -> SessionResult<Option<Message>> {
        let cap = self.receive_cap;

        OperationComposer::new()
            .step(move |remaining| binder.send(request, remaining, MaskingMode::None))
            .step(move |remaining| async move {
                self.reply_handle.wait(remaining.min(cap)).await.map(|_| ())
            })
            .run(timeout)
            .await?;

        Ok(self.take_reply(last))
    }

    fn on_fault(&self, object: &dyn CommunicationObject) {
        self.state.lock().expect("reply mutex poisoned").replied = true;
        self.reply_handle.fault(object);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::binder::CommunicationState;
    use crate::channel::simulated::{ScriptedOutcome, SimulatedBinder};
    use crate::error::SessionError;
    use std::sync::Arc;

    struct Session;

    impl CommunicationObject for Session {
        fn state(&self) -> CommunicationState {
            CommunicationState::Faulted
        }

        fn aborted_error(&self) -> SessionError {
            SessionError::Aborted { object: "session".into() }
        }

        fn terminal_error(&self) -> SessionError {
            SessionError::Faulted {
                object: "session".into(),
                reason: "SequenceTerminated".into(),
            }
        }
    }

    async fn quiet_binder() -> SimulatedBinder {
        let binder = SimulatedBinder::builder().script([ScriptedOutcome::NoReply]).build();
        binder.open(Duration::from_secs(1)).await.unwrap();
        binder
    }

    #[tokio::test]
    async fn delivered_reply_completes_wait() {
        let binder = quiet_binder().await;
        let strategy = Arc::new(ExternalSignal::default());

        let deliverer = {
            let strategy = strategy.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                strategy.deliver(Message::new("urn:rm/TerminateSequenceResponse", Vec::new()));
                strategy.deliver(Message::new("urn:rm/Ignored", Vec::new()));
            })
        };

        let reply = strategy
            .exchange(&binder, Message::new("urn:rm/TerminateSequence", Vec::new()), Duration::from_secs(1), false)
            .await
            .unwrap()
            .unwrap();
        deliverer.await.unwrap();

        assert_eq!(reply.action, "urn:rm/TerminateSequenceResponse");
        assert!(strategy.has_replied());
    }

    #[tokio::test]
    async fn wait_is_capped_and_times_out() {
        let binder = quiet_binder().await;
        let strategy = ExternalSignal::new(Duration::from_millis(20));

        let err = strategy
            .exchange(&binder, Message::new("urn:rm/TerminateSequence", Vec::new()), Duration::from_secs(5), false)
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn fault_interrupts_wait_and_stops_delivery() {
        let binder = quiet_binder().await;
        let strategy = Arc::new(ExternalSignal::default());

        let waiter = {
            let strategy = strategy.clone();
            tokio::spawn(async move {
                strategy
                    .exchange(&binder, Message::new("urn:rm/TerminateSequence", Vec::new()), Duration::from_secs(5), false)
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        strategy.on_fault(&Session);

        let err = waiter.await.unwrap().unwrap_err();
        assert!(err.is_faulted());

        strategy.deliver(Message::new("urn:rm/TerminateSequenceResponse", Vec::new()));
        assert!(strategy.reply_info().is_none());
    }
}
