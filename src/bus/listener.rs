use std::marker::PhantomData;
use std::sync::Mutex;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::channel::NotificationChannel;
use super::envelope::NotificationEnvelope;
use super::parser::{DecodeResult, NotificationParser, NotificationType};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ListenerError {
    #[error("listener for {0} is already active")]
    AlreadyActive(String),
    #[error("listener for {0} was stopped; construct a new one")]
    Stopped(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerPhase {
    Idle,
    Active,
    Stopped,
}

enum Lifecycle {
    Idle,
    Active(JoinHandle<()>),
    Stopped,
}

/// Binds a [`NotificationParser`] for one object id to a live subscription.
///
/// Lifecycle is `Idle -> Active -> Stopped`; a stopped listener can never be
/// restarted, so callbacks from an old session cannot reach a disposed owner.
/// `stop` before `start` changes nothing.
pub struct Listener<T> {
    object_id: String,
    channel: NotificationChannel,
    lifecycle: Mutex<Lifecycle>,
    _ty: PhantomData<fn() -> T>,
}

impl<T: NotificationType> Listener<T> {
    pub fn new(channel: NotificationChannel, object_id: impl Into<String>) -> Self {
        Self {
            object_id: object_id.into(),
            channel,
            lifecycle: Mutex::new(Lifecycle::Idle),
            _ty: PhantomData,
        }
    }

    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    pub fn phase(&self) -> ListenerPhase {
        match *self.lifecycle.lock().expect("listener mutex poisoned") {
            Lifecycle::Idle => ListenerPhase::Idle,
            Lifecycle::Active(_) => ListenerPhase::Active,
            Lifecycle::Stopped => ListenerPhase::Stopped,
        }
    }

    /// Subscribe and start routing envelopes to `handler`.
    ///
    /// The subscription is taken before this returns, so anything published
    /// afterwards is observed. Must be called from inside a tokio runtime.
    pub fn start<F>(&self, handler: F) -> Result<(), ListenerError>
    where
        F: Fn(T, DecodeResult) + Send + Sync + 'static,
    {
        let mut guard = self.lifecycle.lock().expect("listener mutex poisoned");
        match *guard {
            Lifecycle::Active(_) => return Err(ListenerError::AlreadyActive(self.object_id.clone())),
            Lifecycle::Stopped => return Err(ListenerError::Stopped(self.object_id.clone())),
            Lifecycle::Idle => {}
        }

        let rx = self.channel.subscribe();
        let parser = NotificationParser::new(self.object_id.clone(), handler);
        *guard = Lifecycle::Active(tokio::spawn(route(rx, parser)));
        tracing::debug!("{} listener started for {}", T::SOURCE, self.object_id);
        Ok(())
    }

    /// Release the subscription. Safe to call in any phase, any number of
    /// times; only an active listener moves to `Stopped`.
    pub fn stop(&self) {
        let mut guard = self.lifecycle.lock().expect("listener mutex poisoned");
        if !matches!(*guard, Lifecycle::Active(_)) {
            return;
        }
        if let Lifecycle::Active(task) = std::mem::replace(&mut *guard, Lifecycle::Stopped) {
            task.abort();
            tracing::debug!("{} listener stopped for {}", T::SOURCE, self.object_id);
        }
    }
}

impl<T> Drop for Listener<T> {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.lifecycle.lock() {
            if let Lifecycle::Active(task) = std::mem::replace(&mut *guard, Lifecycle::Stopped) {
                task.abort();
            }
        }
    }
}

async fn route<T, F>(mut rx: broadcast::Receiver<NotificationEnvelope>, parser: NotificationParser<T, F>)
where
    T: NotificationType,
    F: Fn(T, DecodeResult) + Send + Sync,
{
    loop {
        match rx.recv().await {
            Ok(envelope) => {
                parser.parse(&envelope);
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!(
                    "{} listener for {} lagged, dropped {n} notifications",
                    T::SOURCE,
                    parser.object_id()
                );
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
