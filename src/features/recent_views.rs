use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::bus::{decode_payload, ErrorInfo, FolderNotification, Listener, ListenerError, NotificationChannel};
use crate::runtime::{ActionResult, Dispatcher, LoadState, Reducer, UserNotice};
use crate::service::ServiceClient;

pub const RECENT_VIEWS_OBJECT_ID: &str = "recent_views";

const READ_RECENT_VIEWS: &str = "folder.recent.read";
const ADD_RECENT_VIEWS: &str = "folder.recent.add";
const REMOVE_RECENT_VIEWS: &str = "folder.recent.remove";
const GET_VIEW: &str = "folder.view.get";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentView {
    pub view_id: String,
    pub name: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub layout: String,
}

#[derive(Debug, Serialize)]
struct ViewIds<'a> {
    view_ids: &'a [String],
}

#[derive(Clone)]
pub struct RecentViewsService {
    client: ServiceClient,
}

impl RecentViewsService {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }

    pub async fn read_recent_views(&self) -> Result<Vec<RecentView>, ErrorInfo> {
        self.client.call(READ_RECENT_VIEWS, &()).await
    }

    pub async fn add_recent_views(&self, view_ids: &[String]) -> Result<(), ErrorInfo> {
        self.client.call_unit(ADD_RECENT_VIEWS, &ViewIds { view_ids }).await
    }

    pub async fn remove_recent_views(&self, view_ids: &[String]) -> Result<(), ErrorInfo> {
        self.client.call_unit(REMOVE_RECENT_VIEWS, &ViewIds { view_ids }).await
    }

    pub async fn get_view(&self, view_id: &str) -> Result<ViewInfo, ErrorInfo> {
        self.client
            .call(GET_VIEW, &serde_json::json!({ "view_id": view_id }))
            .await
    }
}

pub struct RecentViewsListener {
    listener: Listener<FolderNotification>,
}

impl RecentViewsListener {
    pub fn new(channel: NotificationChannel) -> Self {
        Self {
            listener: Listener::new(channel, RECENT_VIEWS_OBJECT_ID),
        }
    }

    pub fn start<F>(&self, on_recent_views_changed: F) -> Result<(), ListenerError>
    where
        F: Fn(Result<Vec<RecentView>, ErrorInfo>) + Send + Sync + 'static,
    {
        self.listener.start(move |ty, result| {
            if ty == FolderNotification::DidUpdateRecentViews {
                on_recent_views_changed(decode_payload(result));
            }
        })
    }

    pub fn stop(&self) {
        self.listener.stop();
    }
}

#[derive(Debug)]
pub enum RecentViewsEvent {
    Initial,
    Fetch,
    Add(Vec<String>),
    Remove(Vec<String>),
    DidUpdate(Result<Vec<RecentView>, ErrorInfo>),
    Open(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecentViewsAction {
    Fetch,
    Sync,
    Add(Vec<String>),
    Remove(Vec<String>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecentViewsState {
    /// Newest first.
    pub views: Vec<RecentView>,
    pub opened: Option<ViewInfo>,
    pub notice: Option<UserNotice>,
    pub load: LoadState,
    pub action_result: Option<ActionResult<RecentViewsAction>>,
}

fn newest_first(mut views: Vec<RecentView>) -> Vec<RecentView> {
    views.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    views
}

pub struct RecentViewsBloc {
    service: RecentViewsService,
    listener: RecentViewsListener,
}

impl RecentViewsBloc {
    pub fn new(channel: NotificationChannel, client: ServiceClient) -> Self {
        Self {
            service: RecentViewsService::new(client),
            listener: RecentViewsListener::new(channel),
        }
    }
}

#[async_trait]
impl Reducer for RecentViewsBloc {
    type Event = RecentViewsEvent;
    type State = RecentViewsState;

    async fn reduce(
        &mut self,
        state: &RecentViewsState,
        event: RecentViewsEvent,
        dispatcher: &Dispatcher<RecentViewsEvent>,
    ) -> RecentViewsState {
        match event {
            RecentViewsEvent::Initial => {
                let listener_dispatcher = dispatcher.clone();
                if let Err(e) = self.listener.start(move |result| {
                    listener_dispatcher.dispatch(RecentViewsEvent::DidUpdate(result));
                }) {
                    tracing::warn!("recent views listener not started: {e}");
                }
                dispatcher.dispatch(RecentViewsEvent::Fetch);
                RecentViewsState {
                    load: LoadState::Loading,
                    ..state.clone()
                }
            }
            RecentViewsEvent::Fetch => match self.service.read_recent_views().await {
                Ok(views) => RecentViewsState {
                    views: newest_first(views),
                    load: LoadState::Ready,
                    ..state.clone()
                },
                Err(error) => RecentViewsState {
                    load: LoadState::Failed(error.clone()),
                    action_result: Some(ActionResult::failed(RecentViewsAction::Fetch, error)),
                    ..state.clone()
                },
            },
            RecentViewsEvent::DidUpdate(Ok(views)) => RecentViewsState {
                views: newest_first(views),
                load: LoadState::Ready,
                ..state.clone()
            },
            RecentViewsEvent::DidUpdate(Err(error)) => RecentViewsState {
                action_result: Some(ActionResult::failed(RecentViewsAction::Sync, error)),
                ..state.clone()
            },
            RecentViewsEvent::Add(view_ids) => {
                let result = self.service.add_recent_views(&view_ids).await;
                RecentViewsState {
                    action_result: Some(ActionResult::new(RecentViewsAction::Add(view_ids), &result)),
                    ..state.clone()
                }
            }
            RecentViewsEvent::Remove(view_ids) => {
                let result = self.service.remove_recent_views(&view_ids).await;
                RecentViewsState {
                    action_result: Some(ActionResult::new(RecentViewsAction::Remove(view_ids), &result)),
                    ..state.clone()
                }
            }
            RecentViewsEvent::Open(view_id) => match self.service.get_view(&view_id).await {
                Ok(view) => RecentViewsState {
                    opened: Some(view),
                    notice: None,
                    ..state.clone()
                },
                Err(error) => RecentViewsState {
                    notice: Some(UserNotice::for_view_error(&view_id, error)),
                    ..state.clone()
                },
            },
        }
    }

    async fn on_close(&mut self) {
        self.listener.stop();
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::runtime::BlocHandle;
    use crate::service::DEFAULT_REQUEST_TIMEOUT;
    use crate::testing::MockBackend;

    fn recent(id: &str, timestamp: i64) -> RecentView {
        RecentView {
            view_id: id.to_string(),
            name: id.to_string(),
            timestamp,
        }
    }

    fn spawn(backend: std::sync::Arc<MockBackend>) -> BlocHandle<RecentViewsBloc> {
        let client = ServiceClient::new(backend, DEFAULT_REQUEST_TIMEOUT);
        BlocHandle::spawn(
            RecentViewsBloc::new(NotificationChannel::new(8), client),
            RecentViewsState::default(),
            16,
        )
    }

    #[tokio::test]
    async fn fetch_orders_newest_first() {
        let backend = MockBackend::new();
        backend.respond(READ_RECENT_VIEWS, &vec![recent("old", 1), recent("new", 9), recent("mid", 5)]);
        let bloc = spawn(backend);
        let mut states = bloc.subscribe();

        bloc.dispatch(RecentViewsEvent::Fetch);
        let ids: Vec<String> = states
            .recv()
            .await
            .unwrap()
            .views
            .into_iter()
            .map(|view| view.view_id)
            .collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
        bloc.close().await;
    }

    #[tokio::test]
    async fn opening_a_deleted_view_reports_not_found() {
        let backend = MockBackend::new();
        backend.fail_once(GET_VIEW, ErrorInfo::not_found("record not found"));
        backend.fail_once(GET_VIEW, ErrorInfo::new(500, "disk"));
        let bloc = spawn(backend);
        let mut states = bloc.subscribe();

        bloc.dispatch(RecentViewsEvent::Open("gone".to_string()));
        bloc.dispatch(RecentViewsEvent::Open("broken".to_string()));

        assert_eq!(
            states.recv().await.unwrap().notice,
            Some(UserNotice::ViewNotFound {
                view_id: "gone".to_string()
            })
        );
        assert_eq!(
            states.recv().await.unwrap().notice,
            Some(UserNotice::Error(ErrorInfo::new(500, "disk")))
        );
        bloc.close().await;
    }

    #[tokio::test]
    async fn failed_refetch_retains_loaded_views() {
        let backend = MockBackend::new();
        backend.respond_once(READ_RECENT_VIEWS, &vec![recent("a", 1)]);
        backend.fail_once(READ_RECENT_VIEWS, ErrorInfo::new(503, "busy"));
        let bloc = spawn(backend);
        let mut states = bloc.subscribe();

        bloc.dispatch(RecentViewsEvent::Fetch);
        bloc.dispatch(RecentViewsEvent::Fetch);

        states.recv().await.unwrap();
        let state = states.recv().await.unwrap();
        assert_eq!(state.views, vec![recent("a", 1)]);
        assert_eq!(state.load, LoadState::Failed(ErrorInfo::new(503, "busy")));
        bloc.close().await;
    }
}
