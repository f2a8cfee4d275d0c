//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reliable_session::channel::binder::{
    BinderId, ChannelBinder, CommunicationObject, CommunicationState, MaskingMode, RequestContext,
};
use reliable_session::channel::message::EndpointAddress;
use reliable_session::Message;
use reliable_session::channel::simulated::{SimulatedBinder, SimulatedBinderBuilder};
use reliable_session::requestor::EmbeddedReply;
use reliable_session::{ReliableSession, RequestReliableRequestor, RequestTemplate, SessionError, SessionResult};

/// Build and open a simulated binder.
pub async fn open_binder(builder: SimulatedBinderBuilder) -> Arc<SimulatedBinder> {
    let binder = Arc::new(builder.build());
    binder.open(Duration::from_secs(5)).await.unwrap();
    binder
}

/// A correlated request/reply requestor pacing at `iteration`.
pub fn correlated_requestor(binder: Arc<SimulatedBinder>, iteration: Duration) -> RequestReliableRequestor {
    let requestor = RequestReliableRequestor::new(
        binder,
        EmbeddedReply::default(),
        RequestTemplate::new("urn:test/Echo", b"ping".to_vec()),
    )
    .with_iteration(iteration);
    requestor.set_request_reply_pattern().unwrap();
    requestor
}

/// Session whose open and close can be made to fail.
#[derive(Default)]
pub struct ScriptedSession {
    pub fail_open: bool,
    pub fail_close: bool,
    pub calls: Mutex<Vec<&'static str>>,
}

impl ScriptedSession {
    pub fn failing_open() -> Self {
        Self {
            fail_open: true,
            ..Default::default()
        }
    }

    pub fn failing_close() -> Self {
        Self {
            fail_close: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReliableSession for ScriptedSession {
    async fn open(&self, _timeout: Duration) -> SessionResult<()> {
        self.calls.lock().unwrap().push("open");
        if self.fail_open {
            return Err(SessionError::Security("CreateSequence refused".into()));
        }
        Ok(())
    }

    async fn close(&self, _timeout: Duration) -> SessionResult<()> {
        self.calls.lock().unwrap().push("close");
        if self.fail_close {
            return Err(SessionError::Communication("TerminateSequence lost".into()));
        }
        Ok(())
    }

    fn abort(&self) {
        self.calls.lock().unwrap().push("abort");
    }
}

/// Open binder that sleeps through every transmission, whatever timeout it
/// is handed.
pub struct StallingBinder {
    id: BinderId,
    stall: Duration,
    pub transmissions: AtomicU32,
}

impl StallingBinder {
    pub fn new(stall: Duration) -> Self {
        Self {
            id: BinderId::new(),
            stall,
            transmissions: AtomicU32::new(0),
        }
    }

    pub fn transmissions(&self) -> u32 {
        self.transmissions.load(Ordering::SeqCst)
    }
}

impl CommunicationObject for StallingBinder {
    fn state(&self) -> CommunicationState {
        CommunicationState::Opened
    }

    fn aborted_error(&self) -> SessionError {
        SessionError::Aborted {
            object: self.id.to_string(),
        }
    }

    fn terminal_error(&self) -> SessionError {
        self.aborted_error()
    }
}

#[async_trait]
impl ChannelBinder for StallingBinder {
    fn id(&self) -> BinderId {
        self.id
    }

    async fn open(&self, _timeout: Duration) -> SessionResult<()> {
        Ok(())
    }

    async fn close(&self, _timeout: Duration, _mask: MaskingMode) -> SessionResult<()> {
        Ok(())
    }

    fn abort(&self) {}

    async fn send(&self, _message: Message, _timeout: Duration, _mask: MaskingMode) -> SessionResult<()> {
        self.transmissions.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.stall).await;
        Ok(())
    }

    async fn request(
        &self,
        message: Message,
        _timeout: Duration,
        _mask: MaskingMode,
    ) -> SessionResult<Option<Message>> {
        self.transmissions.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.stall).await;
        Ok(Some(Message::reply_to(&message, "urn:test/EchoResponse", Vec::new())))
    }

    async fn try_receive(
        &self,
        timeout: Duration,
        _mask: MaskingMode,
    ) -> SessionResult<Option<Box<dyn RequestContext>>> {
        tokio::time::sleep(timeout.min(self.stall)).await;
        Ok(None)
    }

    fn is_handleable(&self, error: &SessionError) -> bool {
        matches!(error, SessionError::Communication(_) | SessionError::Timeout { .. })
    }

    fn local_address(&self) -> Option<EndpointAddress> {
        None
    }

    fn remote_address(&self) -> EndpointAddress {
        EndpointAddress::anonymous()
    }

    fn handle_error(&self, _error: SessionError) {}
}
