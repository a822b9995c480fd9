use std::fmt::Debug;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;

use super::envelope::{ErrorCode, ErrorInfo, NotificationEnvelope};

/// Result handed to notification handlers: raw payload or the reported error.
pub type DecodeResult = Result<Vec<u8>, ErrorInfo>;

/// A family of notification tags emitted by one backend source.
pub trait NotificationType: Copy + Debug + Send + Sync + 'static {
    /// Source name carried in every envelope of this family.
    const SOURCE: &'static str;

    /// Unknown tags return `None` so newer backends never break older clients.
    fn from_tag(tag: i32) -> Option<Self>;

    fn tag(self) -> i32;
}

/// Notifications emitted by the folder/workspace service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FolderNotification {
    DidUpdateUserWorkspaces = 1,
    DidUpdateWorkspace = 2,
    DidUpdateView = 3,
    DidUpdateTrash = 4,
    DidUpdateFavoriteViews = 5,
    DidUpdateRecentViews = 6,
}

impl NotificationType for FolderNotification {
    const SOURCE: &'static str = "Workspace";

    fn from_tag(tag: i32) -> Option<Self> {
        match tag {
            1 => Some(Self::DidUpdateUserWorkspaces),
            2 => Some(Self::DidUpdateWorkspace),
            3 => Some(Self::DidUpdateView),
            4 => Some(Self::DidUpdateTrash),
            5 => Some(Self::DidUpdateFavoriteViews),
            6 => Some(Self::DidUpdateRecentViews),
            _ => None,
        }
    }

    fn tag(self) -> i32 {
        self as i32
    }
}

/// Notifications emitted by the database (grid/board/calendar) service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseNotification {
    DidUpdateFields = 1,
    DidUpdateRow = 2,
    DidUpdateCalculation = 3,
    DidReloadCalculations = 4,
}

impl NotificationType for DatabaseNotification {
    const SOURCE: &'static str = "Database";

    fn from_tag(tag: i32) -> Option<Self> {
        match tag {
            1 => Some(Self::DidUpdateFields),
            2 => Some(Self::DidUpdateRow),
            3 => Some(Self::DidUpdateCalculation),
            4 => Some(Self::DidReloadCalculations),
            _ => None,
        }
    }

    fn tag(self) -> i32 {
        self as i32
    }
}

/// Filters envelopes by source and object id, then hands matching ones to
/// the handler together with their decoded tag.
pub struct NotificationParser<T, F> {
    object_id: String,
    handler: F,
    _ty: PhantomData<fn() -> T>,
}

impl<T, F> NotificationParser<T, F>
where
    T: NotificationType,
    F: Fn(T, DecodeResult) + Send + Sync,
{
    pub fn new(object_id: impl Into<String>, handler: F) -> Self {
        Self {
            object_id: object_id.into(),
            handler,
            _ty: PhantomData,
        }
    }

    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    /// Returns `true` when the handler was invoked.
    pub fn parse(&self, envelope: &NotificationEnvelope) -> bool {
        if envelope.source != T::SOURCE || envelope.object_id != self.object_id {
            return false;
        }

        let Some(ty) = T::from_tag(envelope.ty) else {
            tracing::trace!(
                "ignoring unknown {} notification tag {} for {}",
                T::SOURCE,
                envelope.ty,
                self.object_id
            );
            return false;
        };

        (self.handler)(ty, envelope.payload.clone());
        true
    }
}

/// Deserialize a notification payload, turning malformed bytes into an error value.
pub fn decode_payload<P: DeserializeOwned>(result: DecodeResult) -> Result<P, ErrorInfo> {
    let bytes = result?;
    serde_json::from_slice(&bytes).map_err(|e| {
        ErrorInfo::with_code(
            ErrorCode::PayloadDecode,
            format!("malformed notification payload: {e}"),
        )
    })
}
