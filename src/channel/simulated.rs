//! In-memory channel binder.
//!
//! # Data Flow
//! ```text
//! request(msg) ──► script / drop roll ──► Reply    → Ok(Some(correlated reply))
//!                                       ├► NoReply  → Ok(None)
//!                                       ├► Fail(e)  → Err(e) (absorbed if masked + handleable)
//!                                       └► Delay(d) → reply after d, bounded by the timeout
//! send(msg)    ──► same outcomes, replies land in the inbox
//! try_receive  ◄── inbox (replies to sends, push_inbound)
//! ```
//!
//! # Design Decisions
//! - Scripted outcomes are consumed first; afterwards every transmission
//!   succeeds unless the random drop roll loses it
//! - Only communication failures and timeouts are handleable
//! - Everything the binder sees is recorded for assertions

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::channel::binder::{
    BinderId, ChannelBinder, CommunicationObject, CommunicationState, MaskingMode, RequestContext,
};
use crate::channel::message::{EndpointAddress, Message};
use crate::config::schema::SimulationConfig;
use crate::error::{SessionError, SessionResult};
use crate::resilience::timeouts::with_timeout;

/// Outcome of one scripted transmission.
#[derive(Debug, Clone)]
pub enum ScriptedOutcome {
    /// Succeed with a correlated reply.
    Reply,
    /// Succeed without a reply.
    NoReply,
    /// Fail with the given error.
    Fail(SessionError),
    /// Reply after the given delay.
    Delay(Duration),
}

/// Builder for [`SimulatedBinder`].
#[derive(Debug, Default)]
pub struct SimulatedBinderBuilder {
    latency: Duration,
    drop_rate: f64,
    fail_open: Option<SessionError>,
    fail_close: Option<SessionError>,
    script: VecDeque<ScriptedOutcome>,
    local_address: Option<EndpointAddress>,
    remote_address: Option<EndpointAddress>,
}

impl SimulatedBinderBuilder {
    /// Delay applied to every operation.
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Probability in [0, 1] that an unscripted transmission is lost.
    pub fn drop_rate(mut self, drop_rate: f64) -> Self {
        self.drop_rate = drop_rate.clamp(0.0, 1.0);
        self
    }

    pub fn fail_open(mut self, error: SessionError) -> Self {
        self.fail_open = Some(error);
        self
    }

    pub fn fail_close(mut self, error: SessionError) -> Self {
        self.fail_close = Some(error);
        self
    }

    /// Outcomes for the next transmissions, in order.
    pub fn script(mut self, outcomes: impl IntoIterator<Item = ScriptedOutcome>) -> Self {
        self.script.extend(outcomes);
        self
    }

    pub fn local_address(mut self, address: EndpointAddress) -> Self {
        self.local_address = Some(address);
        self
    }

    pub fn remote_address(mut self, address: EndpointAddress) -> Self {
        self.remote_address = Some(address);
        self
    }

    pub fn build(self) -> SimulatedBinder {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        SimulatedBinder {
            id: BinderId::new(),
            latency: self.latency,
            drop_rate: self.drop_rate,
            fail_open: self.fail_open,
            fail_close: self.fail_close,
            local_address: self.local_address,
            remote_address: self
                .remote_address
                .unwrap_or_else(|| EndpointAddress::new("sim://remote")),
            state: Mutex::new(CommunicationState::Created),
            script: Mutex::new(self.script),
            sent: Mutex::new(Vec::new()),
            handled: Mutex::new(Vec::new()),
            context_replies: Arc::new(Mutex::new(Vec::new())),
            inbox_tx,
            inbox_rx: tokio::sync::Mutex::new(inbox_rx),
            stats: SimulatedStats::default(),
        }
    }
}

/// Operation counters of a [`SimulatedBinder`].
#[derive(Debug, Default)]
pub struct SimulatedStats {
    pub opens: AtomicU32,
    pub closes: AtomicU32,
    pub aborts: AtomicU32,
    pub sends: AtomicU32,
    pub requests: AtomicU32,
    pub receives: AtomicU32,
}

/// A binder whose transport is a script and an in-memory inbox.
#[derive(Debug)]
pub struct SimulatedBinder {
    id: BinderId,
    latency: Duration,
    drop_rate: f64,
    fail_open: Option<SessionError>,
    fail_close: Option<SessionError>,
    local_address: Option<EndpointAddress>,
    remote_address: EndpointAddress,
    state: Mutex<CommunicationState>,
    script: Mutex<VecDeque<ScriptedOutcome>>,
    sent: Mutex<Vec<Message>>,
    handled: Mutex<Vec<SessionError>>,
    context_replies: Arc<Mutex<Vec<Message>>>,
    inbox_tx: mpsc::UnboundedSender<Message>,
    inbox_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Message>>,
    stats: SimulatedStats,
}

impl SimulatedBinder {
    /// A binder that succeeds at everything immediately.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> SimulatedBinderBuilder {
        SimulatedBinderBuilder::default()
    }

    /// A binder using the simulation settings from configuration.
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self::builder()
            .latency(config.latency())
            .drop_rate(config.drop_rate)
            .build()
    }

    /// Append outcomes to the script.
    pub fn push_script(&self, outcomes: impl IntoIterator<Item = ScriptedOutcome>) {
        self.script.lock().expect("script mutex poisoned").extend(outcomes);
    }

    /// Make `message` arrive for the next `try_receive`.
    pub fn push_inbound(&self, message: Message) {
        // The receiver lives as long as the binder.
        let _ = self.inbox_tx.send(message);
    }

    /// Messages handed to `send` or `request`, in order.
    pub fn sent(&self) -> Vec<Message> {
        self.sent.lock().expect("sent mutex poisoned").clone()
    }

    /// Errors routed to `handle_error` or absorbed by masking.
    pub fn handled_errors(&self) -> Vec<SessionError> {
        self.handled.lock().expect("handled mutex poisoned").clone()
    }

    /// Replies made through request contexts this binder produced.
    pub fn context_replies(&self) -> Vec<Message> {
        self.context_replies.lock().expect("replies mutex poisoned").clone()
    }

    pub fn stats(&self) -> &SimulatedStats {
        &self.stats
    }

    fn set_state(&self, next: CommunicationState) {
        *self.state.lock().expect("state mutex poisoned") = next;
    }

    fn ensure_open(&self) -> SessionResult<()> {
        match self.state() {
            CommunicationState::Opened => Ok(()),
            CommunicationState::Closed => Err(self.aborted_error()),
            CommunicationState::Faulted => Err(self.terminal_error()),
            state => Err(SessionError::InvalidOperation(format!(
                "{} is not open ({:?})",
                self.id, state
            ))),
        }
    }

    fn next_outcome(&self) -> ScriptedOutcome {
        if let Some(outcome) = self.script.lock().expect("script mutex poisoned").pop_front() {
            return outcome;
        }

        if self.drop_rate > 0.0 && fastrand::f64() < self.drop_rate {
            ScriptedOutcome::Fail(SessionError::Communication("simulated message loss".into()))
        } else {
            ScriptedOutcome::Reply
        }
    }

    fn record(&self, message: &Message) {
        self.sent.lock().expect("sent mutex poisoned").push(message.clone());
    }

    fn mask<T: Default>(&self, result: SessionResult<T>, mask: MaskingMode) -> SessionResult<T> {
        match result {
            Err(error) if mask == MaskingMode::Handled && self.is_handleable(&error) => {
                self.handled.lock().expect("handled mutex poisoned").push(error);
                Ok(T::default())
            }
            other => other,
        }
    }

    fn reply_for(request: &Message) -> Message {
        Message::reply_to(request, format!("{}Response", request.action), request.body.clone())
    }
}

impl Default for SimulatedBinder {
    fn default() -> Self {
        Self::new()
    }
}

impl CommunicationObject for SimulatedBinder {
    fn state(&self) -> CommunicationState {
        *self.state.lock().expect("state mutex poisoned")
    }

    fn aborted_error(&self) -> SessionError {
        SessionError::Aborted {
            object: self.id.to_string(),
        }
    }

    fn terminal_error(&self) -> SessionError {
        SessionError::Faulted {
            object: self.id.to_string(),
            reason: "simulated channel faulted".into(),
        }
    }
}

#[async_trait]
impl ChannelBinder for SimulatedBinder {
    fn id(&self) -> BinderId {
        self.id
    }

    async fn open(&self, timeout: Duration) -> SessionResult<()> {
        if self.state() != CommunicationState::Created {
            return Err(SessionError::InvalidOperation(format!("{} was already opened", self.id)));
        }

        self.stats.opens.fetch_add(1, Ordering::Relaxed);
        self.set_state(CommunicationState::Opening);
        with_timeout("binder open", timeout, tokio::time::sleep(self.latency)).await?;

        if let Some(error) = &self.fail_open {
            self.set_state(CommunicationState::Faulted);
            return Err(error.clone());
        }

        self.set_state(CommunicationState::Opened);
        Ok(())
    }

    async fn close(&self, timeout: Duration, mask: MaskingMode) -> SessionResult<()> {
        if matches!(self.state(), CommunicationState::Closed) {
            return Ok(());
        }

        self.stats.closes.fetch_add(1, Ordering::Relaxed);
        self.set_state(CommunicationState::Closing);

        let result = async {
            with_timeout("binder close", timeout, tokio::time::sleep(self.latency)).await?;
            match &self.fail_close {
                Some(error) => Err(error.clone()),
                None => Ok(()),
            }
        }
        .await;

        match &result {
            Ok(()) => self.set_state(CommunicationState::Closed),
            Err(_) => self.set_state(CommunicationState::Faulted),
        }
        self.mask(result, mask)
    }

    fn abort(&self) {
        self.stats.aborts.fetch_add(1, Ordering::Relaxed);
        self.set_state(CommunicationState::Closed);
    }

    async fn send(&self, message: Message, timeout: Duration, mask: MaskingMode) -> SessionResult<()> {
        self.ensure_open()?;
        self.stats.sends.fetch_add(1, Ordering::Relaxed);
        self.record(&message);

        let outcome = self.next_outcome();
        let result = with_timeout("send", timeout, async {
            tokio::time::sleep(self.latency).await;
            match outcome {
                ScriptedOutcome::Reply => {
                    let _ = self.inbox_tx.send(Self::reply_for(&message));
                    Ok(())
                }
                ScriptedOutcome::NoReply => Ok(()),
                ScriptedOutcome::Fail(error) => Err(error),
                ScriptedOutcome::Delay(delay) => {
                    let inbox = self.inbox_tx.clone();
                    let reply = Self::reply_for(&message);
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        let _ = inbox.send(reply);
                    });
                    Ok(())
                }
            }
        })
        .await
        .and_then(|r| r);

        self.mask(result, mask)
    }

    async fn request(
        &self,
        message: Message,
        timeout: Duration,
        mask: MaskingMode,
    ) -> SessionResult<Option<Message>> {
        self.ensure_open()?;
        self.stats.requests.fetch_add(1, Ordering::Relaxed);
        self.record(&message);

        let outcome = self.next_outcome();
        let result = with_timeout("request", timeout, async {
            tokio::time::sleep(self.latency).await;
            match outcome {
                ScriptedOutcome::Reply => Ok(Some(Self::reply_for(&message))),
                ScriptedOutcome::NoReply => Ok(None),
                ScriptedOutcome::Fail(error) => Err(error),
                ScriptedOutcome::Delay(delay) => {
                    tokio::time::sleep(delay).await;
                    Ok(Some(Self::reply_for(&message)))
                }
            }
        })
        .await
        .and_then(|r| r);

        self.mask(result, mask)
    }

    async fn try_receive(
        &self,
        timeout: Duration,
        mask: MaskingMode,
    ) -> SessionResult<Option<Box<dyn RequestContext>>> {
        self.ensure_open()?;
        self.stats.receives.fetch_add(1, Ordering::Relaxed);

        let received = tokio::time::timeout(timeout, async {
            let mut inbox = self.inbox_rx.lock().await;
            inbox.recv().await
        })
        .await;

        let result: SessionResult<Option<Box<dyn RequestContext>>> = match received {
            Ok(Some(message)) => {
                let context = SimulatedRequestContext::new(message, self.context_replies.clone());
                Ok(Some(Box::new(context)))
            }
            Ok(None) | Err(_) => Ok(None),
        };
        self.mask(result, mask)
    }

    fn is_handleable(&self, error: &SessionError) -> bool {
        matches!(error, SessionError::Communication(_) | SessionError::Timeout { .. })
    }

    fn local_address(&self) -> Option<EndpointAddress> {
        self.local_address.clone()
    }

    fn remote_address(&self) -> EndpointAddress {
        self.remote_address.clone()
    }

    fn handle_error(&self, error: SessionError) {
        tracing::debug!(binder = %self.id, error = %error, "Simulated binder absorbed error");
        self.handled.lock().expect("handled mutex poisoned").push(error);
    }
}

/// A received message and the means to reply to it.
#[derive(Debug)]
pub struct SimulatedRequestContext {
    message: Message,
    replies: Arc<Mutex<Vec<Message>>>,
    reply_failure: Option<SessionError>,
    aborted: AtomicBool,
}

impl SimulatedRequestContext {
    pub fn new(message: Message, replies: Arc<Mutex<Vec<Message>>>) -> Self {
        Self {
            message,
            replies,
            reply_failure: None,
            aborted: AtomicBool::new(false),
        }
    }

    /// Make every reply through this context fail with `error`.
    pub fn failing(mut self, error: SessionError) -> Self {
        self.reply_failure = Some(error);
        self
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RequestContext for SimulatedRequestContext {
    fn request_message(&self) -> Option<&Message> {
        Some(&self.message)
    }

    async fn reply(&self, message: Message, _timeout: Duration) -> SessionResult<()> {
        if self.is_aborted() {
            return Err(SessionError::Aborted {
                object: "request context".into(),
            });
        }
        if let Some(error) = &self.reply_failure {
            return Err(error.clone());
        }

        self.replies.lock().expect("replies mutex poisoned").push(message);
        Ok(())
    }

    fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::message::MessageId;

    fn correlated(action: &str) -> Message {
        let mut message = Message::new(action, b"payload".to_vec());
        message.message_id = Some(MessageId::new());
        message
    }

    #[tokio::test]
    async fn request_returns_correlated_reply() {
        let binder = SimulatedBinder::new();
        binder.open(Duration::from_secs(1)).await.unwrap();

        let request = correlated("urn:test/Echo");
        let reply = binder
            .request(request.clone(), Duration::from_secs(1), MaskingMode::None)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(reply.action, "urn:test/EchoResponse");
        assert!(reply.relates_to_id(&request.message_id.unwrap()));
        assert_eq!(binder.sent().len(), 1);
    }

    #[tokio::test]
    async fn scripted_failures_are_consumed_in_order() {
        let binder = SimulatedBinder::builder()
            .script([
                ScriptedOutcome::Fail(SessionError::Communication("reset".into())),
                ScriptedOutcome::NoReply,
            ])
            .build();
        binder.open(Duration::from_secs(1)).await.unwrap();

        let timeout = Duration::from_secs(1);
        let err = binder
            .request(correlated("a"), timeout, MaskingMode::None)
            .await
            .unwrap_err();
        assert!(binder.is_handleable(&err));
        assert!(binder.request(correlated("a"), timeout, MaskingMode::None).await.unwrap().is_none());
        assert!(binder.request(correlated("a"), timeout, MaskingMode::None).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn handled_mask_absorbs_handleable_errors() {
        let binder = SimulatedBinder::builder()
            .script([ScriptedOutcome::Fail(SessionError::Communication("reset".into()))])
            .build();
        binder.open(Duration::from_secs(1)).await.unwrap();

        binder
            .send(Message::new("a", Vec::new()), Duration::from_secs(1), MaskingMode::Handled)
            .await
            .unwrap();
        assert_eq!(binder.handled_errors().len(), 1);
    }

    #[tokio::test]
    async fn send_replies_arrive_in_inbox() {
        let binder = SimulatedBinder::new();
        binder.open(Duration::from_secs(1)).await.unwrap();

        let request = correlated("urn:test/Ping");
        binder
            .send(request.clone(), Duration::from_secs(1), MaskingMode::None)
            .await
            .unwrap();

        let context = binder
            .try_receive(Duration::from_secs(1), MaskingMode::None)
            .await
            .unwrap()
            .unwrap();
        let reply = context.request_message().unwrap();
        assert!(reply.relates_to_id(&request.message_id.unwrap()));

        let nothing = binder
            .try_receive(Duration::from_millis(10), MaskingMode::None)
            .await
            .unwrap();
        assert!(nothing.is_none());
    }

    #[tokio::test]
    async fn lifecycle_transitions() {
        let binder = SimulatedBinder::new();
        assert_eq!(binder.state(), CommunicationState::Created);
        binder.open(Duration::from_secs(1)).await.unwrap();
        assert_eq!(binder.state(), CommunicationState::Opened);
        binder.close(Duration::from_secs(1), MaskingMode::None).await.unwrap();
        assert_eq!(binder.state(), CommunicationState::Closed);

        let err = binder
            .send(Message::new("a", Vec::new()), Duration::from_secs(1), MaskingMode::None)
            .await
            .unwrap_err();
        assert!(err.is_aborted());
    }

    #[tokio::test]
    async fn failed_open_faults_binder() {
        let binder = SimulatedBinder::builder()
            .fail_open(SessionError::Security("bad token".into()))
            .build();
        assert!(binder.open(Duration::from_secs(1)).await.is_err());
        assert_eq!(binder.state(), CommunicationState::Faulted);
    }
}
