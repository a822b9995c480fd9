use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

/// Coalesces bursts of triggers into one delayed action.
///
/// Each `schedule` cancels the previous, not-yet-fired action. There is at
/// most one timer outstanding per instance.
pub struct Debounce {
    duration: Duration,
    inner: Mutex<DebounceInner>,
}

#[derive(Default)]
struct DebounceInner {
    pending: Option<JoinHandle<()>>,
    disposed: bool,
}

impl Debounce {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            inner: Mutex::new(DebounceInner::default()),
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Arm `action` to run after the configured quiet period.
    ///
    /// Must be called from inside a tokio runtime. Ignored after `dispose`.
    pub fn schedule<F>(&self, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut inner = self.inner.lock().expect("debounce mutex poisoned");
        if inner.disposed {
            tracing::debug!("debounce disposed, ignoring schedule");
            return;
        }

        if let Some(previous) = inner.pending.take() {
            previous.abort();
        }

        let deadline = Instant::now() + self.duration;
        inner.pending = Some(tokio::spawn(async move {
            sleep_until(deadline).await;
            action();
        }));
    }

    /// Drop the pending action, if any, without disposing.
    pub fn cancel(&self) {
        let mut inner = self.inner.lock().expect("debounce mutex poisoned");
        if let Some(pending) = inner.pending.take() {
            pending.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        let inner = self.inner.lock().expect("debounce mutex poisoned");
        inner
            .pending
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    pub fn dispose(&self) {
        let mut inner = self.inner.lock().expect("debounce mutex poisoned");
        inner.disposed = true;
        if let Some(pending) = inner.pending.take() {
            pending.abort();
        }
    }
}

impl Drop for Debounce {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.inner.lock() {
            if let Some(pending) = inner.pending.take() {
                pending.abort();
            }
        }
    }
}
