//! Queueing and draining shared by every fault helper.
//!
//! Each accepted item is keyed by its binder's id and owns a spawned task
//! that sends the fault and then closes the binder. The task removes its own
//! entry when it finishes; the removal that empties the map while a close is
//! pending releases the closer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::blocking;
use crate::channel::binder::{BinderId, ChannelBinder, MaskingMode, RequestContext};
use crate::channel::message::Message;
use crate::config::schema::FaultConfig;
use crate::error::{SessionError, SessionResult};
use crate::fault::FaultHelper;
use crate::interrupt::wait_object::InterruptibleWaitObject;
use crate::observability::metrics;

/// How a fault is actually delivered. Implementations only describe the
/// send and the cleanup of an abandoned item.
#[async_trait]
pub trait FaultSender: Send + Sync + 'static {
    /// Everything needed to send one fault.
    type State: Send + Sync + 'static;

    fn name(&self) -> &'static str;

    /// Package a fault for later delivery.
    fn state(&self, context: Option<Box<dyn RequestContext>>, fault: Message) -> SessionResult<Self::State>;

    async fn send_fault(&self, binder: &dyn ChannelBinder, state: &Self::State, timeout: Duration)
        -> SessionResult<()>;

    /// Release what `state` holds without sending.
    fn abort_state(&self, state: &Self::State);
}

struct Entry<T> {
    binder: Arc<dyn ChannelBinder>,
    state: Arc<T>,
    task: Option<JoinHandle<()>>,
}

struct HelperState<T> {
    /// `None` once the helper is closed or aborted.
    items: Option<HashMap<BinderId, Entry<T>>>,
    close_handle: Option<Arc<InterruptibleWaitObject>>,
}

enum Admission {
    Accepted,
    Closed,
    Duplicate,
}

struct HelperInner<S: FaultSender> {
    sender: S,
    send_timeout: Duration,
    close_timeout: Duration,
    state: Mutex<HelperState<S::State>>,
}

/// Fault helper generic over how faults are sent.
pub struct TypedFaultHelper<S: FaultSender> {
    inner: Arc<HelperInner<S>>,
}

impl<S: FaultSender> TypedFaultHelper<S> {
    /// `send_timeout` bounds each fault send, `close_timeout` each binder
    /// close that follows it.
    pub fn new(sender: S, send_timeout: Duration, close_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(HelperInner {
                sender,
                send_timeout,
                close_timeout,
                state: Mutex::new(HelperState {
                    items: Some(HashMap::new()),
                    close_handle: None,
                }),
            }),
        }
    }

    pub fn with_config(sender: S, config: &FaultConfig) -> Self {
        Self::new(sender, config.send_timeout(), config.close_timeout())
    }

    pub fn sender(&self) -> &S {
        &self.inner.sender
    }

    /// Items accepted and not yet finished.
    pub fn outstanding(&self) -> usize {
        let state = self.inner.state.lock().expect("fault helper mutex poisoned");
        state.items.as_ref().map_or(0, HashMap::len)
    }

    /// True once close or abort forbade new items.
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().expect("fault helper mutex poisoned").items.is_none()
    }

    pub fn close_blocking(&self, timeout: Duration) -> SessionResult<()> {
        blocking::block_on(self.close(timeout))?
    }

    fn accept(&self, binder: Arc<dyn ChannelBinder>, state: S::State) -> SessionResult<()> {
        let id = binder.id();
        let state = Arc::new(state);

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                self.inner.sender.abort_state(&state);
                binder.abort();
                return Err(SessionError::InvalidOperation(
                    "fault delivery requires a tokio runtime".into(),
                ));
            }
        };

        let admission = {
            let mut guard = self.inner.state.lock().expect("fault helper mutex poisoned");
            match guard.items.as_mut() {
                None => Admission::Closed,
                Some(items) if items.contains_key(&id) => Admission::Duplicate,
                Some(items) => {
                    items.insert(
                        id,
                        Entry {
                            binder: binder.clone(),
                            state: state.clone(),
                            task: None,
                        },
                    );
                    Admission::Accepted
                }
            }
        };

        match admission {
            Admission::Accepted => {}
            Admission::Closed => {
                tracing::debug!(binder = %id, "Fault helper closed, abandoning fault");
                metrics::record_fault_item("abandoned");
                self.inner.sender.abort_state(&state);
                binder.abort();
                return Ok(());
            }
            Admission::Duplicate => {
                metrics::record_fault_item("duplicate");
                self.inner.sender.abort_state(&state);
                return Err(SessionError::InvalidOperation(format!(
                    "a fault is already pending for {}",
                    id
                )));
            }
        }

        metrics::record_fault_item("accepted");
        let task = runtime.spawn(HelperInner::deliver(self.inner.clone(), binder, state));

        // The task may already have finished and removed its entry.
        let mut guard = self.inner.state.lock().expect("fault helper mutex poisoned");
        if let Some(entry) = guard.items.as_mut().and_then(|items| items.get_mut(&id)) {
            entry.task = Some(task);
        }
        Ok(())
    }
}

impl<S: FaultSender> HelperInner<S> {
    async fn deliver(inner: Arc<Self>, binder: Arc<dyn ChannelBinder>, state: Arc<S::State>) {
        let id = binder.id();

        if let Err(error) = inner.sender.send_fault(binder.as_ref(), &state, inner.send_timeout).await {
            tracing::debug!(binder = %id, sender = inner.sender.name(), error = %error, "Fault send failed, aborting binder");
            metrics::record_fault_item("failed");
            inner.sender.abort_state(&state);
            binder.abort();
            binder.handle_error(error);
            inner.remove(id);
            return;
        }

        metrics::record_fault_item("sent");
        if let Err(error) = binder.close(inner.close_timeout, MaskingMode::None).await {
            binder.handle_error(error);
        }
        inner.remove(id);
    }

    fn remove(&self, id: BinderId) {
        let close_handle = {
            let mut guard = self.state.lock().expect("fault helper mutex poisoned");
            let Some(items) = guard.items.as_mut() else {
                return;
            };

            items.remove(&id);
            if !items.is_empty() {
                return;
            }
            let Some(handle) = guard.close_handle.clone() else {
                return;
            };

            guard.items = None;
            handle
        };

        close_handle.set();
    }

    fn abort(&self) {
        let (items, close_handle) = {
            let mut guard = self.state.lock().expect("fault helper mutex poisoned");
            (guard.items.take(), guard.close_handle.clone())
        };

        for (id, entry) in items.into_iter().flatten() {
            if let Some(task) = entry.task {
                task.abort();
            }
            tracing::warn!(binder = %id, sender = self.sender.name(), "Abandoning outstanding fault");
            metrics::record_fault_item("abandoned");
            self.sender.abort_state(&entry.state);
            entry.binder.abort();
        }

        if let Some(handle) = close_handle {
            handle.set();
        }
    }
}

#[async_trait]
impl<S: FaultSender> FaultHelper for TypedFaultHelper<S> {
    fn send_fault_async(&self, binder: Arc<dyn ChannelBinder>, context: Option<Box<dyn RequestContext>>, fault: Message) {
        let result = self
            .inner
            .sender
            .state(context, fault)
            .and_then(|state| self.accept(binder.clone(), state));

        if let Err(error) = result {
            binder.handle_error(error);
        }
    }

    async fn close(&self, timeout: Duration) -> SessionResult<()> {
        let handle = {
            let mut guard = self.inner.state.lock().expect("fault helper mutex poisoned");
            match guard.items.as_ref() {
                None => return Ok(()),
                Some(items) if items.is_empty() => {
                    guard.items = None;
                    return Ok(());
                }
                Some(_) => {
                    let handle = Arc::new(InterruptibleWaitObject::with_timeout_policy(false, false));
                    guard.close_handle = Some(handle.clone());
                    handle
                }
            }
        };

        if !handle.wait(timeout).await? {
            tracing::warn!(timeout = ?timeout, "Fault helper close timed out");
        }
        self.inner.abort();
        Ok(())
    }

    fn abort(&self) {
        self.inner.abort();
    }
}
