use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::bus::{decode_payload, ErrorInfo, FolderNotification, Listener, ListenerError, NotificationChannel};
use crate::runtime::{ActionResult, Dispatcher, LoadState, Reducer};
use crate::service::ServiceClient;

pub const TRASH_OBJECT_ID: &str = "trash";

const READ_TRASH: &str = "folder.trash.read";
const PUT_BACK: &str = "folder.trash.put_back";
const DELETE_PERMANENTLY: &str = "folder.trash.delete";
const RESTORE_ALL: &str = "folder.trash.restore_all";
const DELETE_ALL: &str = "folder.trash.delete_all";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrashItem {
    pub id: String,
    pub name: String,
    pub modified_time: i64,
    pub create_time: i64,
}

#[derive(Debug, Serialize)]
struct TrashIds<'a> {
    ids: &'a [String],
}

#[derive(Clone)]
pub struct TrashService {
    client: ServiceClient,
}

impl TrashService {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }

    pub async fn read_trash(&self) -> Result<Vec<TrashItem>, ErrorInfo> {
        self.client.call(READ_TRASH, &()).await
    }

    pub async fn put_back(&self, trash_id: &str) -> Result<(), ErrorInfo> {
        self.client
            .call_unit(PUT_BACK, &TrashIds { ids: &[trash_id.to_string()] })
            .await
    }

    pub async fn delete_permanently(&self, ids: &[String]) -> Result<(), ErrorInfo> {
        self.client.call_unit(DELETE_PERMANENTLY, &TrashIds { ids }).await
    }

    pub async fn restore_all(&self) -> Result<(), ErrorInfo> {
        self.client.call_unit(RESTORE_ALL, &()).await
    }

    pub async fn delete_all(&self) -> Result<(), ErrorInfo> {
        self.client.call_unit(DELETE_ALL, &()).await
    }
}

pub struct TrashListener {
    listener: Listener<FolderNotification>,
}

impl TrashListener {
    pub fn new(channel: NotificationChannel) -> Self {
        Self {
            listener: Listener::new(channel, TRASH_OBJECT_ID),
        }
    }

    pub fn start<F>(&self, on_trash_changed: F) -> Result<(), ListenerError>
    where
        F: Fn(Result<Vec<TrashItem>, ErrorInfo>) + Send + Sync + 'static,
    {
        self.listener.start(move |ty, result| {
            if ty == FolderNotification::DidUpdateTrash {
                on_trash_changed(decode_payload(result));
            }
        })
    }

    pub fn stop(&self) {
        self.listener.stop();
    }
}

#[derive(Debug)]
pub enum TrashEvent {
    Initial,
    DidReceiveTrash(Result<Vec<TrashItem>, ErrorInfo>),
    PutBack(String),
    Delete(String),
    RestoreAll,
    DeleteAll,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrashAction {
    Load,
    Sync,
    PutBack(String),
    Delete(String),
    RestoreAll,
    DeleteAll,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrashState {
    pub objects: Vec<TrashItem>,
    pub load: LoadState,
    pub action_result: Option<ActionResult<TrashAction>>,
}

/// Keeps the trash list in sync with backend notifications.
pub struct TrashBloc {
    service: TrashService,
    listener: TrashListener,
}

impl TrashBloc {
    pub fn new(channel: NotificationChannel, client: ServiceClient) -> Self {
        Self {
            service: TrashService::new(client),
            listener: TrashListener::new(channel),
        }
    }
}

#[async_trait]
impl Reducer for TrashBloc {
    type Event = TrashEvent;
    type State = TrashState;

    async fn reduce(
        &mut self,
        state: &TrashState,
        event: TrashEvent,
        dispatcher: &Dispatcher<TrashEvent>,
    ) -> TrashState {
        match event {
            TrashEvent::Initial => {
                let dispatcher = dispatcher.clone();
                if let Err(e) = self.listener.start(move |result| {
                    dispatcher.dispatch(TrashEvent::DidReceiveTrash(result));
                }) {
                    tracing::warn!("trash listener not started: {e}");
                }

                match self.service.read_trash().await {
                    Ok(objects) => TrashState {
                        objects,
                        load: LoadState::Ready,
                        action_result: None,
                    },
                    // Nothing loaded yet, so there is nothing to retain.
                    Err(error) => TrashState {
                        objects: Vec::new(),
                        load: LoadState::Failed(error.clone()),
                        action_result: Some(ActionResult::failed(TrashAction::Load, error)),
                    },
                }
            }
            TrashEvent::DidReceiveTrash(Ok(objects)) => TrashState {
                objects,
                load: LoadState::Ready,
                action_result: state.action_result.clone(),
            },
            TrashEvent::DidReceiveTrash(Err(error)) => TrashState {
                action_result: Some(ActionResult::failed(TrashAction::Sync, error)),
                ..state.clone()
            },
            TrashEvent::PutBack(id) => {
                let result = self.service.put_back(&id).await;
                TrashState {
                    action_result: Some(ActionResult::new(TrashAction::PutBack(id), &result)),
                    ..state.clone()
                }
            }
            TrashEvent::Delete(id) => {
                let result = self.service.delete_permanently(std::slice::from_ref(&id)).await;
                TrashState {
                    action_result: Some(ActionResult::new(TrashAction::Delete(id), &result)),
                    ..state.clone()
                }
            }
            TrashEvent::RestoreAll => {
                let result = self.service.restore_all().await;
                TrashState {
                    action_result: Some(ActionResult::new(TrashAction::RestoreAll, &result)),
                    ..state.clone()
                }
            }
            TrashEvent::DeleteAll => {
                let result = self.service.delete_all().await;
                TrashState {
                    action_result: Some(ActionResult::new(TrashAction::DeleteAll, &result)),
                    ..state.clone()
                }
            }
        }
    }

    async fn on_close(&mut self) {
        self.listener.stop();
    }
}
