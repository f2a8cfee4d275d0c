//! Reliable requestors.
//!
//! # Data Flow
//! ```text
//! request(T)
//!   └─ loop while budget T lasts
//!        plan_iteration (window = min(remaining, W), last?)
//!        [Establishing] binder.ensure_channel_for_request
//!        build message from template (MessageId + ReplyTo when correlated)
//!        strategy.exchange ──┬── reply usable ─────────► Ok(reply)
//!                            ├── handled failure ─────► trace, pace
//!                            ├── fatal / not retryable ► Err
//!                            └── abort / fault ───────► Err (terminal)
//!        last? ──► Err(Timeout)
//!        abortable wait for the rest of the window
//! ```
//!
//! # Variants
//! - [`EmbeddedReply`]: the transport's request call returns the reply
//! - [`SecondaryReceive`]: send, then a separately timed receive
//! - [`ExternalSignal`]: send, then wait for the receive loop to deliver
//!
//! # Design Decisions
//! - One logical request at a time per requestor; iterations are sequential
//! - Every iteration's timeout is `min(remaining, W)`, so the last one gets
//!   whatever is left
//! - Abort and fault are sticky: later requests fail immediately

pub mod request;
pub mod send_receive;
pub mod send_wait;

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, trace};

use crate::blocking;
use crate::channel::binder::{ChannelBinder, CommunicationObject};
use crate::channel::message::{AddressingVersion, EndpointAddress, Message, MessageId};
use crate::config::schema::RequestorConfig;
use crate::error::{SessionError, SessionResult};
use crate::interrupt::wait_object::InterruptibleWaitObject;
use crate::observability::metrics;
use crate::resilience::pacing::{plan_iteration, IterationPlan};
use crate::resilience::retries::{self, RetryPolicy};
use crate::resilience::timeouts::{with_timeout, TimeoutBudget};

pub use request::EmbeddedReply;
pub use send_receive::SecondaryReceive;
pub use send_wait::ExternalSignal;

/// Default iteration window.
pub const DEFAULT_ITERATION: Duration = Duration::from_secs(10);

/// Default cap on a secondary receive or reply wait.
pub const DEFAULT_RECEIVE: Duration = Duration::from_secs(10);

/// How one attempt transmits the request and obtains its reply.
#[async_trait]
pub trait RequestStrategy: Send + Sync {
    /// Short label used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Transmit `request` and produce the reply, if one arrived, within
    /// `timeout`. `last` is set on the final iteration.
    async fn exchange(
        &self,
        binder: &dyn ChannelBinder,
        request: Message,
        timeout: Duration,
        last: bool,
    ) -> SessionResult<Option<Message>>;

    /// Observe a fault of the owning communication object.
    fn on_fault(&self, _object: &dyn CommunicationObject) {}
}

/// What every attempt sends.
#[derive(Debug, Clone)]
pub struct RequestTemplate {
    pub action: String,
    pub body: Vec<u8>,
    pub addressing: AddressingVersion,
}

impl RequestTemplate {
    pub fn new(action: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            action: action.into(),
            body: body.into(),
            addressing: AddressingVersion::default(),
        }
    }

    pub fn with_addressing(mut self, addressing: AddressingVersion) -> Self {
        self.addressing = addressing;
        self
    }
}

/// Issues one logical request and retries it within a shared budget.
pub struct ReliableRequestor<S> {
    binder: Arc<dyn ChannelBinder>,
    strategy: S,
    template: RequestTemplate,
    message_id: OnceLock<MessageId>,
    policy: RetryPolicy,
    iteration: Duration,
    timeout_operation: String,
    abort_handle: InterruptibleWaitObject,
    in_flight: tokio::sync::Mutex<()>,
}

pub type RequestReliableRequestor = ReliableRequestor<EmbeddedReply>;
pub type SendReceiveReliableRequestor = ReliableRequestor<SecondaryReceive>;
pub type SendWaitReliableRequestor = ReliableRequestor<ExternalSignal>;

impl<S: RequestStrategy> ReliableRequestor<S> {
    pub fn new(binder: Arc<dyn ChannelBinder>, strategy: S, template: RequestTemplate) -> Self {
        let timeout_operation = template.action.clone();
        Self {
            binder,
            strategy,
            template,
            message_id: OnceLock::new(),
            policy: RetryPolicy::default(),
            iteration: DEFAULT_ITERATION,
            timeout_operation,
            abort_handle: InterruptibleWaitObject::with_timeout_policy(false, false),
            in_flight: tokio::sync::Mutex::new(()),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Iteration window W.
    pub fn with_iteration(mut self, iteration: Duration) -> Self {
        self.iteration = iteration;
        self
    }

    /// Operation named by the timeout error raised when the budget runs out.
    pub fn with_timeout_operation(mut self, operation: impl Into<String>) -> Self {
        self.timeout_operation = operation.into();
        self
    }

    /// Apply the pacing settings from configuration.
    pub fn configured(self, config: &RequestorConfig) -> Self {
        self.with_iteration(config.iteration())
    }

    /// Require a correlated reply. The id is created once and reused by
    /// every attempt.
    pub fn set_request_reply_pattern(&self) -> SessionResult<MessageId> {
        let id = MessageId::new();
        self.message_id
            .set(id)
            .map_err(|_| SessionError::InvalidOperation("request/reply pattern is already set".into()))?;
        Ok(id)
    }

    pub fn message_id(&self) -> Option<MessageId> {
        self.message_id.get().copied()
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    pub fn binder(&self) -> &Arc<dyn ChannelBinder> {
        &self.binder
    }

    /// Unblock anyone waiting in this requestor with `object`'s abort error.
    pub fn abort(&self, object: &dyn CommunicationObject) {
        self.abort_handle.abort(object);
    }

    /// Unblock anyone waiting in this requestor with `object`'s terminal
    /// error.
    pub fn fault(&self, object: &dyn CommunicationObject) {
        self.strategy.on_fault(object);
        self.abort_handle.fault(object);
    }

    /// Issue the request, retrying within `timeout`, until a usable reply
    /// arrives.
    pub async fn request(&self, timeout: Duration) -> SessionResult<Option<Message>> {
        let _exclusive = self.in_flight.lock().await;
        let budget = TimeoutBudget::new(timeout);
        let variant = self.strategy.name();

        loop {
            let plan = plan_iteration(&budget, self.iteration);

            match self.attempt(&plan).await {
                Ok(Some(reply)) if self.is_usable(&reply) => {
                    metrics::record_request_outcome(variant, "reply");
                    return Ok(reply);
                }
                Ok(_) => {
                    trace!(action = %self.template.action, variant, "No usable reply this iteration");
                }
                Err(error) => {
                    if !retries::is_retryable(self.policy, self.binder.as_ref(), &error, plan.last) {
                        let outcome = if error.is_aborted() { "aborted" } else { "error" };
                        metrics::record_request_outcome(variant, outcome);
                        return Err(retries::surface(self.policy, error));
                    }

                    metrics::record_request_retry(variant);
                    debug!(
                        action = %self.template.action,
                        variant,
                        error = %error,
                        last = plan.last,
                        "Handled request failure"
                    );
                }
            }

            if plan.last {
                break;
            }

            self.abort_handle.try_wait(plan.window.remaining()).await?;
        }

        metrics::record_request_outcome(variant, "timeout");
        Err(budget.timeout_error(self.timeout_operation.clone()))
    }

    /// Blocking form of [`request`](Self::request).
    pub fn request_blocking(&self, timeout: Duration) -> SessionResult<Option<Message>> {
        blocking::block_on(self.request(timeout))?
    }

    /// One iteration; an abort or fault cuts the attempt short.
    async fn attempt(&self, plan: &IterationPlan) -> SessionResult<Option<Option<Message>>> {
        tokio::select! {
            biased;
            interrupted = self.abort_handle.wait_with(Duration::MAX, false) => {
                Err(interrupted.err().unwrap_or_else(|| self.binder.aborted_error()))
            }
            outcome = self.transmit(plan) => outcome,
        }
    }

    /// `Ok(None)` when no attempt was made, otherwise what the strategy
    /// produced.
    async fn transmit(&self, plan: &IterationPlan) -> SessionResult<Option<Option<Message>>> {
        if self.policy == RetryPolicy::Establishing && !self.binder.ensure_channel_for_request().await? {
            return Ok(None);
        }

        let request = self.create_request_message();
        metrics::record_request_attempt(self.strategy.name());
        // The binder is handed the timeout but is not trusted to honor it.
        let reply = with_timeout(
            "request attempt",
            plan.request_timeout,
            self.strategy
                .exchange(self.binder.as_ref(), request, plan.request_timeout, plan.last),
        )
        .await??;
        Ok(Some(reply))
    }

    /// A correlated request needs an actual reply; anything else will do.
    fn is_usable(&self, reply: &Option<Message>) -> bool {
        self.message_id.get().is_none() || reply.is_some()
    }

    fn create_request_message(&self) -> Message {
        let mut message = Message::new(self.template.action.clone(), self.template.body.clone());
        if let Some(id) = self.message_id.get() {
            message.message_id = Some(*id);
            message.reply_to = self.reply_to();
        }
        message
    }

    fn reply_to(&self) -> Option<EndpointAddress> {
        let local = self.binder.local_address();
        match self.template.addressing {
            AddressingVersion::August2004 => Some(local.unwrap_or_else(EndpointAddress::anonymous)),
            AddressingVersion::V10 => local.filter(|address| !address.is_anonymous()),
        }
    }
}
