use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::envelope::{ErrorCode, ErrorInfo, NotificationEnvelope};

pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Process-wide fan-out channel of backend notifications.
///
/// Cloning is cheap; every clone publishes into the same stream. Each
/// subscriber gets its own receiver and filters by object id itself.
#[derive(Clone)]
pub struct NotificationChannel {
    inner: Arc<ChannelInner>,
}

struct ChannelInner {
    tx: broadcast::Sender<NotificationEnvelope>,
    seq: AtomicI64,
}

impl Default for NotificationChannel {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl NotificationChannel {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(ChannelInner {
                tx,
                seq: AtomicI64::new(0),
            }),
        }
    }

    /// Publish a pre-built envelope.
    pub fn publish(&self, envelope: NotificationEnvelope) {
        if let Err(e) = self.inner.tx.send(envelope) {
            tracing::trace!("notification dropped, no subscribers: {}", e.0.object_id);
        }
    }

    /// Build and publish an envelope in one call.
    pub fn emit(
        &self,
        source: impl Into<String>,
        object_id: impl Into<String>,
        ty: i32,
        payload: Result<Vec<u8>, ErrorInfo>,
    ) -> NotificationEnvelope {
        let seq = self.inner.seq.fetch_add(1, Ordering::Relaxed);
        let envelope = NotificationEnvelope {
            id: Uuid::new_v4().to_string(),
            seq,
            source: source.into(),
            object_id: object_id.into(),
            ty,
            payload,
            created_at: Utc::now().to_rfc3339(),
        };
        self.publish(envelope.clone());
        envelope
    }

    /// Serialize `value` as the payload and emit it.
    pub fn emit_value<T: Serialize>(
        &self,
        source: impl Into<String>,
        object_id: impl Into<String>,
        ty: i32,
        value: &T,
    ) -> NotificationEnvelope {
        let payload = serde_json::to_vec(value).map_err(|e| {
            ErrorInfo::with_code(ErrorCode::Serialize, format!("notification payload: {e}"))
        });
        self.emit(source, object_id, ty, payload)
    }

    pub fn emit_error(
        &self,
        source: impl Into<String>,
        object_id: impl Into<String>,
        ty: i32,
        error: ErrorInfo,
    ) -> NotificationEnvelope {
        self.emit(source, object_id, ty, Err(error))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEnvelope> {
        self.inner.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_subscriber_sees_every_envelope() {
        let channel = NotificationChannel::new(16);
        let mut a = channel.subscribe();
        let mut b = channel.subscribe();

        channel.emit("Workspace", "doc-1", 1, Ok(b"one".to_vec()));
        channel.emit("Workspace", "doc-2", 1, Ok(b"two".to_vec()));

        for rx in [&mut a, &mut b] {
            let first = rx.recv().await.expect("first envelope");
            let second = rx.recv().await.expect("second envelope");
            assert_eq!(first.object_id, "doc-1");
            assert_eq!(second.object_id, "doc-2");
            assert!(first.seq < second.seq);
        }
    }

    #[tokio::test]
    async fn emit_without_subscribers_is_not_an_error() {
        let channel = NotificationChannel::default();
        let envelope = channel.emit_value("Workspace", "trash", 2, &vec!["a", "b"]);
        assert_eq!(envelope.payload, Ok(br#"["a","b"]"#.to_vec()));
        assert_eq!(channel.subscriber_count(), 0);
    }
}
