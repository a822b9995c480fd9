use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::bus::{decode_payload, ErrorInfo, FolderNotification, Listener, ListenerError, NotificationChannel};
use crate::runtime::{ActionResult, Dispatcher, LoadState, Reducer};
use crate::service::ServiceClient;

pub const FAVORITES_OBJECT_ID: &str = "favorite";

const READ_FAVORITES: &str = "folder.favorites.read";
const TOGGLE_FAVORITE: &str = "folder.favorites.toggle";
const PIN_FAVORITE: &str = "folder.favorites.pin";
const UNPIN_FAVORITE: &str = "folder.favorites.unpin";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoriteView {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_pinned: bool,
}

/// Payload of `DidUpdateFavoriteViews`; the list is re-read on every change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoritesChanged {
    #[serde(default)]
    pub inserted_ids: Vec<String>,
    #[serde(default)]
    pub deleted_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleFavoriteResponse {
    pub view: FavoriteView,
    pub is_favorite: bool,
}

#[derive(Debug, Serialize)]
struct ViewIdPayload<'a> {
    view_id: &'a str,
}

#[derive(Clone)]
pub struct FavoriteService {
    client: ServiceClient,
}

impl FavoriteService {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }

    pub async fn read_favorites(&self) -> Result<Vec<FavoriteView>, ErrorInfo> {
        self.client.call(READ_FAVORITES, &()).await
    }

    pub async fn toggle_favorite(&self, view_id: &str) -> Result<ToggleFavoriteResponse, ErrorInfo> {
        self.client.call(TOGGLE_FAVORITE, &ViewIdPayload { view_id }).await
    }

    pub async fn pin(&self, view_id: &str) -> Result<(), ErrorInfo> {
        self.client.call_unit(PIN_FAVORITE, &ViewIdPayload { view_id }).await
    }

    pub async fn unpin(&self, view_id: &str) -> Result<(), ErrorInfo> {
        self.client.call_unit(UNPIN_FAVORITE, &ViewIdPayload { view_id }).await
    }
}

pub struct FavoriteListener {
    listener: Listener<FolderNotification>,
}

impl FavoriteListener {
    pub fn new(channel: NotificationChannel) -> Self {
        Self {
            listener: Listener::new(channel, FAVORITES_OBJECT_ID),
        }
    }

    pub fn start<F>(&self, on_favorites_changed: F) -> Result<(), ListenerError>
    where
        F: Fn(Result<FavoritesChanged, ErrorInfo>) + Send + Sync + 'static,
    {
        self.listener.start(move |ty, result| {
            if ty == FolderNotification::DidUpdateFavoriteViews {
                on_favorites_changed(decode_payload(result));
            }
        })
    }

    pub fn stop(&self) {
        self.listener.stop();
    }
}

#[derive(Debug)]
pub enum FavoriteEvent {
    Initial,
    Fetch,
    DidFavoriteUpdate(Result<FavoritesChanged, ErrorInfo>),
    Toggle(String),
    Pin(String),
    Unpin(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FavoriteAction {
    Fetch,
    Sync,
    Toggle(String),
    Pin(String),
    Unpin(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FavoriteState {
    pub views: Vec<FavoriteView>,
    pub last_toggled: Option<String>,
    pub load: LoadState,
    pub action_result: Option<ActionResult<FavoriteAction>>,
}

impl FavoriteState {
    pub fn pinned(&self) -> impl Iterator<Item = &FavoriteView> {
        self.views.iter().filter(|view| view.is_pinned)
    }

    pub fn is_favorite(&self, view_id: &str) -> bool {
        self.views.iter().any(|view| view.id == view_id)
    }

    fn with_pinned(&self, view_id: &str, is_pinned: bool) -> Vec<FavoriteView> {
        self.views
            .iter()
            .cloned()
            .map(|mut view| {
                if view.id == view_id {
                    view.is_pinned = is_pinned;
                }
                view
            })
            .collect()
    }
}

pub struct FavoriteBloc {
    service: FavoriteService,
    listener: FavoriteListener,
}

impl FavoriteBloc {
    pub fn new(channel: NotificationChannel, client: ServiceClient) -> Self {
        Self {
            service: FavoriteService::new(client),
            listener: FavoriteListener::new(channel),
        }
    }
}

#[async_trait]
impl Reducer for FavoriteBloc {
    type Event = FavoriteEvent;
    type State = FavoriteState;

    async fn reduce(
        &mut self,
        state: &FavoriteState,
        event: FavoriteEvent,
        dispatcher: &Dispatcher<FavoriteEvent>,
    ) -> FavoriteState {
        match event {
            FavoriteEvent::Initial => {
                let listener_dispatcher = dispatcher.clone();
                if let Err(e) = self.listener.start(move |result| {
                    listener_dispatcher.dispatch(FavoriteEvent::DidFavoriteUpdate(result));
                }) {
                    tracing::warn!("favorite listener not started: {e}");
                }
                dispatcher.dispatch(FavoriteEvent::Fetch);
                FavoriteState {
                    load: LoadState::Loading,
                    ..state.clone()
                }
            }
            FavoriteEvent::Fetch => match self.service.read_favorites().await {
                Ok(views) => FavoriteState {
                    views,
                    load: LoadState::Ready,
                    ..state.clone()
                },
                Err(error) => FavoriteState {
                    load: LoadState::Failed(error.clone()),
                    action_result: Some(ActionResult::failed(FavoriteAction::Fetch, error)),
                    ..state.clone()
                },
            },
            FavoriteEvent::DidFavoriteUpdate(Ok(_)) => {
                dispatcher.dispatch(FavoriteEvent::Fetch);
                state.clone()
            }
            FavoriteEvent::DidFavoriteUpdate(Err(error)) => FavoriteState {
                action_result: Some(ActionResult::failed(FavoriteAction::Sync, error)),
                ..state.clone()
            },
            FavoriteEvent::Toggle(view_id) => match self.service.toggle_favorite(&view_id).await {
                Ok(response) => {
                    let mut views: Vec<FavoriteView> = state
                        .views
                        .iter()
                        .filter(|view| view.id != response.view.id)
                        .cloned()
                        .collect();
                    if response.is_favorite {
                        views.push(response.view);
                    }
                    FavoriteState {
                        views,
                        last_toggled: Some(view_id.clone()),
                        action_result: Some(ActionResult {
                            action: FavoriteAction::Toggle(view_id),
                            result: Ok(()),
                        }),
                        ..state.clone()
                    }
                }
                Err(error) => FavoriteState {
                    action_result: Some(ActionResult::failed(FavoriteAction::Toggle(view_id), error)),
                    ..state.clone()
                },
            },
            FavoriteEvent::Pin(view_id) => {
                let result = self.service.pin(&view_id).await;
                let views = match result {
                    Ok(()) => state.with_pinned(&view_id, true),
                    Err(_) => state.views.clone(),
                };
                FavoriteState {
                    views,
                    action_result: Some(ActionResult::new(FavoriteAction::Pin(view_id), &result)),
                    ..state.clone()
                }
            }
            FavoriteEvent::Unpin(view_id) => {
                let result = self.service.unpin(&view_id).await;
                let views = match result {
                    Ok(()) => state.with_pinned(&view_id, false),
                    Err(_) => state.views.clone(),
                };
                FavoriteState {
                    views,
                    action_result: Some(ActionResult::new(FavoriteAction::Unpin(view_id), &result)),
                    ..state.clone()
                }
            }
        }
    }

    async fn on_close(&mut self) {
        self.listener.stop();
    }
}
