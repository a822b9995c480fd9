//! Notification plumbing between the backend and state containers.
//!
//! - `NotificationChannel`: broadcast stream of tagged envelopes
//! - `NotificationParser`: object-id/source filter plus tag decoding
//! - `Listener`: parser bound to a live subscription with a start/stop lifecycle
//!
//! # Flow
//!
//! Backend emits an envelope -> every `Listener` receives it -> its parser
//! drops envelopes for other objects -> the handler turns the rest into
//! container events.

mod channel;
mod envelope;
mod listener;
mod parser;

pub use channel::{NotificationChannel, DEFAULT_CHANNEL_CAPACITY};
pub use envelope::{ErrorCode, ErrorInfo, NotificationEnvelope};
pub use listener::{Listener, ListenerError, ListenerPhase};
pub use parser::{
    decode_payload, DatabaseNotification, DecodeResult, FolderNotification, NotificationParser,
    NotificationType,
};
