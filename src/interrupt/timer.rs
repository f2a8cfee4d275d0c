//! Cancelable one-shot timer.
//!
//! Each `set` schedules a Tokio task that sleeps for the interval and then
//! runs the callback, unless the timer was re-set, canceled, or aborted in
//! the meantime. A generation counter tells a stale firing apart from the
//! current one, so the callback runs at most once per `set`.
//!
//! The callback runs outside the timer's lock and may re-arm the timer.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::error::{SessionError, SessionResult};

type Callback = Box<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct TimerState {
    aborted: bool,
    generation: u64,
    pending: Option<JoinHandle<()>>,
}

struct TimerInner {
    state: Mutex<TimerState>,
    callback: Callback,
    default_interval: Duration,
    runtime: Handle,
}

impl TimerInner {
    fn fire(weak: Weak<TimerInner>, generation: u64) {
        let Some(inner) = weak.upgrade() else {
            return;
        };

        {
            let mut state = inner.state.lock().expect("timer mutex poisoned");
            if state.aborted || state.generation != generation {
                return;
            }
            state.pending = None;
        }

        (inner.callback)();
    }
}

/// A one-shot delayed callback that can be re-scheduled, canceled, or
/// permanently disabled.
pub struct InterruptibleTimer {
    inner: Arc<TimerInner>,
}

impl InterruptibleTimer {
    /// Create a timer bound to the current Tokio runtime.
    pub fn new<F>(default_interval: Duration, callback: F) -> SessionResult<Self>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let runtime = Handle::try_current()
            .map_err(|_| SessionError::InvalidOperation("timer created outside a Tokio runtime".into()))?;

        Ok(Self {
            inner: Arc::new(TimerInner {
                state: Mutex::new(TimerState::default()),
                callback: Box::new(callback),
                default_interval,
                runtime,
            }),
        })
    }

    /// Schedule the callback after `interval`, replacing any pending firing.
    pub fn set(&self, interval: Duration) {
        let mut state = self.inner.state.lock().expect("timer mutex poisoned");
        if state.aborted {
            return;
        }
        self.schedule(&mut state, interval);
    }

    /// Schedule with the default interval.
    pub fn set_default(&self) {
        self.set(self.inner.default_interval);
    }

    /// Schedule only if nothing is pending.
    pub fn set_if_not_set(&self, interval: Duration) {
        let mut state = self.inner.state.lock().expect("timer mutex poisoned");
        if state.aborted || state.pending.is_some() {
            return;
        }
        self.schedule(&mut state, interval);
    }

    /// Cancel a pending firing. Returns true if one was actually prevented.
    pub fn cancel(&self) -> bool {
        let mut state = self.inner.state.lock().expect("timer mutex poisoned");
        Self::clear(&mut state)
    }

    /// Cancel and disable the timer for good.
    pub fn abort(&self) {
        let mut state = self.inner.state.lock().expect("timer mutex poisoned");
        state.aborted = true;
        Self::clear(&mut state);
    }

    pub fn is_set(&self) -> bool {
        self.inner.state.lock().expect("timer mutex poisoned").pending.is_some()
    }

    pub fn is_aborted(&self) -> bool {
        self.inner.state.lock().expect("timer mutex poisoned").aborted
    }

    fn schedule(&self, state: &mut TimerState, interval: Duration) {
        Self::clear(state);

        let generation = state.generation;
        let weak = Arc::downgrade(&self.inner);
        state.pending = Some(self.inner.runtime.spawn(async move {
            tokio::time::sleep(interval).await;
            TimerInner::fire(weak, generation);
        }));
    }

    fn clear(state: &mut TimerState) -> bool {
        state.generation = state.generation.wrapping_add(1);
        match state.pending.take() {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }
}

impl Drop for InterruptibleTimer {
    fn drop(&mut self) {
        self.abort();
    }
}
