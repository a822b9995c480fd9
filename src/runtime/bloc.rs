use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, oneshot};

pub const DEFAULT_STATE_CAPACITY: usize = 64;

/// Reduction logic for one state container.
///
/// `reduce` runs on the container's own task, one event at a time. Failures
/// from backend calls belong in the returned state, not in a panic.
#[async_trait]
pub trait Reducer: Send + 'static {
    type Event: Debug + Send + 'static;
    type State: Clone + Debug + Send + Sync + 'static;

    async fn reduce(
        &mut self,
        state: &Self::State,
        event: Self::Event,
        dispatcher: &Dispatcher<Self::Event>,
    ) -> Self::State;

    /// Called once when the container closes. Stop listeners and timers here.
    async fn on_close(&mut self) {}
}

enum Command<E> {
    Event(E),
    Close(oneshot::Sender<()>),
}

/// Producer side of a container's intake queue.
///
/// Listener callbacks, timers and reducers (for follow-up events) all hold
/// clones of the same dispatcher, so every event lands in one FIFO.
pub struct Dispatcher<E> {
    tx: mpsc::UnboundedSender<Command<E>>,
    closed: Arc<AtomicBool>,
    name: &'static str,
}

impl<E> Clone for Dispatcher<E> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            closed: self.closed.clone(),
            name: self.name,
        }
    }
}

impl<E: Debug + Send + 'static> Dispatcher<E> {
    /// Enqueue `event`. Returns `false` (and drops the event) once the
    /// container is closed.
    pub fn dispatch(&self, event: E) -> bool {
        if self.is_closed() {
            tracing::debug!("{}: ignoring {:?} after close", self.name, event);
            return false;
        }
        self.tx.send(Command::Event(event)).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Closes the container when the last `BlocHandle` goes away.
///
/// The run task, listener callbacks and timers all hold dispatchers, so the
/// intake queue never drains on its own.
struct CloseOnDrop<E> {
    dispatcher: Dispatcher<E>,
}

impl<E> Drop for CloseOnDrop<E> {
    fn drop(&mut self) {
        if self.dispatcher.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let (ack_tx, _) = oneshot::channel();
        let _ = self.dispatcher.tx.send(Command::Close(ack_tx));
        tracing::debug!("{} dropped without close", self.dispatcher.name);
    }
}

/// Handle to a running state container.
///
/// Clones share one container. Dropping the last clone closes it like
/// `close()`, without waiting for `on_close` to finish.
pub struct BlocHandle<R: Reducer> {
    dispatcher: Dispatcher<R::Event>,
    current: Arc<RwLock<R::State>>,
    states: broadcast::Sender<R::State>,
    _lifetime: Arc<CloseOnDrop<R::Event>>,
}

impl<R: Reducer> Clone for BlocHandle<R> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: self.dispatcher.clone(),
            current: self.current.clone(),
            states: self.states.clone(),
            _lifetime: self._lifetime.clone(),
        }
    }
}

impl<R: Reducer> BlocHandle<R> {
    /// Start a container task owning `reducer` and `initial` state.
    ///
    /// Subscribers that fall more than `state_capacity` snapshots behind
    /// skip the oldest ones; `state()` always returns the latest.
    pub fn spawn(reducer: R, initial: R::State, state_capacity: usize) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (states, _) = broadcast::channel(state_capacity.max(1));
        let dispatcher = Dispatcher {
            tx,
            closed: Arc::new(AtomicBool::new(false)),
            name: std::any::type_name::<R>(),
        };
        let current = Arc::new(RwLock::new(initial));

        tokio::spawn(run(
            reducer,
            rx,
            dispatcher.clone(),
            current.clone(),
            states.clone(),
        ));
        tracing::debug!("{} started", dispatcher.name);

        Self {
            _lifetime: Arc::new(CloseOnDrop {
                dispatcher: dispatcher.clone(),
            }),
            dispatcher,
            current,
            states,
        }
    }

    pub fn dispatch(&self, event: R::Event) -> bool {
        self.dispatcher.dispatch(event)
    }

    pub fn dispatcher(&self) -> Dispatcher<R::Event> {
        self.dispatcher.clone()
    }

    /// Latest published snapshot.
    pub fn state(&self) -> R::State {
        self.current.read().expect("bloc state lock poisoned").clone()
    }

    /// Stream of every snapshot published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<R::State> {
        self.states.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.dispatcher.is_closed()
    }

    /// Dispose the container.
    ///
    /// Queued events are dropped, a reduction in flight finishes but its
    /// result is never published, and `Reducer::on_close` runs once. Later
    /// calls return immediately.
    pub async fn close(&self) {
        if self.dispatcher.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let (ack_tx, ack_rx) = oneshot::channel();
        if self.dispatcher.tx.send(Command::Close(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
        tracing::debug!("{} closed", self.dispatcher.name);
    }
}

async fn run<R: Reducer>(
    mut reducer: R,
    mut rx: mpsc::UnboundedReceiver<Command<R::Event>>,
    dispatcher: Dispatcher<R::Event>,
    current: Arc<RwLock<R::State>>,
    states: broadcast::Sender<R::State>,
) {
    while let Some(command) = rx.recv().await {
        match command {
            Command::Event(event) => {
                if dispatcher.is_closed() {
                    tracing::trace!("{}: dropping queued {:?}", dispatcher.name, event);
                    continue;
                }

                let snapshot = current.read().expect("bloc state lock poisoned").clone();
                tracing::trace!("{}: reducing {:?}", dispatcher.name, event);
                let next = reducer.reduce(&snapshot, event, &dispatcher).await;

                if dispatcher.is_closed() {
                    tracing::debug!("{}: discarding state produced after close", dispatcher.name);
                    continue;
                }

                *current.write().expect("bloc state lock poisoned") = next.clone();
                // No subscribers is fine; `state()` still sees the snapshot.
                let _ = states.send(next);
            }
            Command::Close(ack) => {
                reducer.on_close().await;
                let _ = ack.send(());
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    enum CounterEvent {
        Add(i64),
    }

    struct Counter {
        closes: Arc<std::sync::atomic::AtomicUsize>,
    }

    #[async_trait]
    impl Reducer for Counter {
        type Event = CounterEvent;
        type State = i64;

        async fn reduce(&mut self, state: &i64, event: CounterEvent, _: &Dispatcher<CounterEvent>) -> i64 {
            match event {
                CounterEvent::Add(n) => state + n,
            }
        }

        async fn on_close(&mut self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counter() -> (BlocHandle<Counter>, Arc<std::sync::atomic::AtomicUsize>) {
        let closes = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let handle = BlocHandle::spawn(Counter { closes: closes.clone() }, 0, 8);
        (handle, closes)
    }

    #[tokio::test]
    async fn each_event_publishes_one_snapshot() {
        let (bloc, _) = counter();
        let mut states = bloc.subscribe();

        bloc.dispatch(CounterEvent::Add(2));
        bloc.dispatch(CounterEvent::Add(3));

        assert_eq!(states.recv().await.unwrap(), 2);
        assert_eq!(states.recv().await.unwrap(), 5);
        assert_eq!(bloc.state(), 5);
    }

    #[tokio::test]
    async fn close_twice_runs_on_close_once() {
        let (bloc, closes) = counter();
        bloc.close().await;
        bloc.close().await;

        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(bloc.is_closed());
    }

    #[tokio::test]
    async fn dropping_the_last_handle_closes_the_container() {
        let (bloc, closes) = counter();
        let clone = bloc.clone();
        let dispatcher = bloc.dispatcher();

        drop(bloc);
        tokio::task::yield_now().await;
        assert_eq!(closes.load(Ordering::SeqCst), 0);
        assert!(!dispatcher.is_closed());

        drop(clone);
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(!dispatcher.dispatch(CounterEvent::Add(1)));
    }

    #[tokio::test]
    async fn dispatch_after_close_is_swallowed() {
        let (bloc, _) = counter();
        bloc.dispatch(CounterEvent::Add(1));
        let mut states = bloc.subscribe();
        assert_eq!(states.recv().await.unwrap(), 1);

        bloc.close().await;
        assert!(!bloc.dispatch(CounterEvent::Add(10)));
        assert_eq!(bloc.state(), 1);
    }
}
