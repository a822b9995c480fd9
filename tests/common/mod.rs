//! Shared helpers for the sync integration tests.

pub mod fake_backend;

use std::time::Duration;

use tokio::sync::broadcast;

pub use fake_backend::FakeBackend;

/// Receive snapshots until one satisfies `predicate`.
pub async fn wait_for<S, P>(states: &mut broadcast::Receiver<S>, predicate: P) -> S
where
    S: Clone,
    P: Fn(&S) -> bool,
{
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            match states.recv().await {
                Ok(state) if predicate(&state) => return state,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("state stream closed"),
            }
        }
    })
    .await
    .expect("expected state never published")
}
