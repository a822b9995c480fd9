use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::bus::{decode_payload, ErrorInfo, FolderNotification, Listener, ListenerError, NotificationChannel};
use crate::runtime::{ActionResult, Debounce, Dispatcher, LoadState, Reducer};
use crate::service::ServiceClient;

const GET_WORKSPACES: &str = "user.workspaces.get";
const CURRENT_WORKSPACE: &str = "folder.workspace.current";
const CREATE_WORKSPACE: &str = "user.workspaces.create";
const DELETE_WORKSPACE: &str = "user.workspaces.delete";
const OPEN_WORKSPACE: &str = "user.workspaces.open";
const RENAME_WORKSPACE: &str = "user.workspaces.rename";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub workspace_id: String,
    pub name: String,
    #[serde(default)]
    pub created_at: i64,
}

#[derive(Debug, Serialize)]
struct WorkspaceIdPayload<'a> {
    workspace_id: &'a str,
}

#[derive(Debug, Serialize)]
struct RenamePayload<'a> {
    workspace_id: &'a str,
    new_name: &'a str,
}

#[derive(Clone)]
pub struct WorkspaceService {
    client: ServiceClient,
}

impl WorkspaceService {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }

    pub async fn get_workspaces(&self) -> Result<Vec<Workspace>, ErrorInfo> {
        self.client.call(GET_WORKSPACES, &()).await
    }

    pub async fn current_workspace(&self) -> Result<Workspace, ErrorInfo> {
        self.client.call(CURRENT_WORKSPACE, &()).await
    }

    pub async fn create_workspace(&self, name: &str) -> Result<Workspace, ErrorInfo> {
        self.client
            .call(CREATE_WORKSPACE, &serde_json::json!({ "name": name }))
            .await
    }

    pub async fn delete_workspace(&self, workspace_id: &str) -> Result<(), ErrorInfo> {
        self.client
            .call_unit(DELETE_WORKSPACE, &WorkspaceIdPayload { workspace_id })
            .await
    }

    pub async fn open_workspace(&self, workspace_id: &str) -> Result<(), ErrorInfo> {
        self.client
            .call_unit(OPEN_WORKSPACE, &WorkspaceIdPayload { workspace_id })
            .await
    }

    pub async fn rename_workspace(&self, workspace_id: &str, new_name: &str) -> Result<(), ErrorInfo> {
        self.client
            .call_unit(RENAME_WORKSPACE, &RenamePayload { workspace_id, new_name })
            .await
    }
}

pub enum WorkspaceUpdate {
    Workspaces(Result<Vec<Workspace>, ErrorInfo>),
    Workspace(Result<Workspace, ErrorInfo>),
}

/// Listens on the user id for workspace list and workspace changes.
pub struct WorkspaceListener {
    listener: Listener<FolderNotification>,
}

impl WorkspaceListener {
    pub fn new(channel: NotificationChannel, user_id: impl Into<String>) -> Self {
        Self {
            listener: Listener::new(channel, user_id),
        }
    }

    pub fn start<F>(&self, on_update: F) -> Result<(), ListenerError>
    where
        F: Fn(WorkspaceUpdate) + Send + Sync + 'static,
    {
        self.listener.start(move |ty, result| match ty {
            FolderNotification::DidUpdateUserWorkspaces => {
                on_update(WorkspaceUpdate::Workspaces(decode_payload(result)))
            }
            FolderNotification::DidUpdateWorkspace => {
                on_update(WorkspaceUpdate::Workspace(decode_payload(result)))
            }
            _ => {}
        })
    }

    pub fn stop(&self) {
        self.listener.stop();
    }
}

#[derive(Debug)]
pub enum WorkspaceEvent {
    Initial,
    Fetch,
    DidReceiveWorkspaces(Result<Vec<Workspace>, ErrorInfo>),
    DidUpdateWorkspace(Result<Workspace, ErrorInfo>),
    Create(String),
    Delete(String),
    Open(String),
    /// Debounced; a `CommitRename` follows once typing settles.
    Rename {
        workspace_id: String,
        name: String,
    },
    CommitRename {
        workspace_id: String,
        name: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkspaceAction {
    Fetch,
    Sync,
    Create(String),
    Delete(String),
    Open(String),
    Rename(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceState {
    pub workspaces: Vec<Workspace>,
    pub current_workspace_id: Option<String>,
    /// Workspace id -> latest name still waiting for its debounce window.
    pub pending_renames: BTreeMap<String, String>,
    pub load: LoadState,
    pub action_result: Option<ActionResult<WorkspaceAction>>,
}

impl WorkspaceState {
    pub fn current(&self) -> Option<&Workspace> {
        let current = self.current_workspace_id.as_deref()?;
        self.workspaces.iter().find(|ws| ws.workspace_id == current)
    }
}

pub struct WorkspaceBloc {
    service: WorkspaceService,
    listener: WorkspaceListener,
    rename_window: Duration,
    /// One timer per workspace so renaming another workspace never cancels
    /// a pending commit.
    renames: HashMap<String, Debounce>,
}

impl WorkspaceBloc {
    pub fn new(
        channel: NotificationChannel,
        client: ServiceClient,
        user_id: &str,
        rename_window: Duration,
    ) -> Self {
        Self {
            service: WorkspaceService::new(client),
            listener: WorkspaceListener::new(channel, user_id),
            rename_window,
            renames: HashMap::new(),
        }
    }

    async fn fetch(&self, state: &WorkspaceState) -> WorkspaceState {
        let workspaces = match self.service.get_workspaces().await {
            Ok(workspaces) => workspaces,
            Err(error) => {
                return WorkspaceState {
                    load: LoadState::Failed(error.clone()),
                    action_result: Some(ActionResult::failed(WorkspaceAction::Fetch, error)),
                    ..state.clone()
                };
            }
        };

        let current_workspace_id = match self.service.current_workspace().await {
            Ok(current) => Some(current.workspace_id),
            Err(e) => {
                tracing::warn!("current workspace unavailable: {e}");
                state.current_workspace_id.clone()
            }
        };

        WorkspaceState {
            workspaces,
            current_workspace_id,
            load: LoadState::Ready,
            ..state.clone()
        }
    }
}

#[async_trait]
impl Reducer for WorkspaceBloc {
    type Event = WorkspaceEvent;
    type State = WorkspaceState;

    async fn reduce(
        &mut self,
        state: &WorkspaceState,
        event: WorkspaceEvent,
        dispatcher: &Dispatcher<WorkspaceEvent>,
    ) -> WorkspaceState {
        match event {
            WorkspaceEvent::Initial => {
                let listener_dispatcher = dispatcher.clone();
                if let Err(e) = self.listener.start(move |update| {
                    let event = match update {
                        WorkspaceUpdate::Workspaces(result) => WorkspaceEvent::DidReceiveWorkspaces(result),
                        WorkspaceUpdate::Workspace(result) => WorkspaceEvent::DidUpdateWorkspace(result),
                    };
                    listener_dispatcher.dispatch(event);
                }) {
                    tracing::warn!("workspace listener not started: {e}");
                }
                self.fetch(state).await
            }
            WorkspaceEvent::Fetch => self.fetch(state).await,
            WorkspaceEvent::DidReceiveWorkspaces(Ok(workspaces)) => WorkspaceState {
                workspaces,
                load: LoadState::Ready,
                ..state.clone()
            },
            WorkspaceEvent::DidReceiveWorkspaces(Err(error))
            | WorkspaceEvent::DidUpdateWorkspace(Err(error)) => WorkspaceState {
                action_result: Some(ActionResult::failed(WorkspaceAction::Sync, error)),
                ..state.clone()
            },
            WorkspaceEvent::DidUpdateWorkspace(Ok(workspace)) => {
                let mut workspaces = state.workspaces.clone();
                match workspaces
                    .iter_mut()
                    .find(|ws| ws.workspace_id == workspace.workspace_id)
                {
                    Some(slot) => *slot = workspace,
                    None => workspaces.push(workspace),
                }
                WorkspaceState {
                    workspaces,
                    ..state.clone()
                }
            }
            WorkspaceEvent::Create(name) => match self.service.create_workspace(&name).await {
                Ok(workspace) => {
                    let mut workspaces = state.workspaces.clone();
                    workspaces.push(workspace);
                    WorkspaceState {
                        workspaces,
                        action_result: Some(ActionResult {
                            action: WorkspaceAction::Create(name),
                            result: Ok(()),
                        }),
                        ..state.clone()
                    }
                }
                Err(error) => WorkspaceState {
                    action_result: Some(ActionResult::failed(WorkspaceAction::Create(name), error)),
                    ..state.clone()
                },
            },
            WorkspaceEvent::Delete(workspace_id) => {
                let result = self.service.delete_workspace(&workspace_id).await;
                let action_result = Some(ActionResult::new(
                    WorkspaceAction::Delete(workspace_id.clone()),
                    &result,
                ));
                if result.is_err() {
                    return WorkspaceState {
                        action_result,
                        ..state.clone()
                    };
                }

                let workspaces: Vec<Workspace> = state
                    .workspaces
                    .iter()
                    .filter(|ws| ws.workspace_id != workspace_id)
                    .cloned()
                    .collect();
                let current_workspace_id = match state.current_workspace_id.as_deref() {
                    Some(current) if current == workspace_id => {
                        workspaces.first().map(|ws| ws.workspace_id.clone())
                    }
                    _ => state.current_workspace_id.clone(),
                };
                WorkspaceState {
                    workspaces,
                    current_workspace_id,
                    action_result,
                    ..state.clone()
                }
            }
            WorkspaceEvent::Open(workspace_id) => {
                let result = self.service.open_workspace(&workspace_id).await;
                let current_workspace_id = match result {
                    Ok(()) => Some(workspace_id.clone()),
                    Err(_) => state.current_workspace_id.clone(),
                };
                WorkspaceState {
                    current_workspace_id,
                    action_result: Some(ActionResult::new(WorkspaceAction::Open(workspace_id), &result)),
                    ..state.clone()
                }
            }
            WorkspaceEvent::Rename { workspace_id, name } => {
                let mut pending_renames = state.pending_renames.clone();
                pending_renames.insert(workspace_id.clone(), name.clone());

                let window = self.rename_window;
                let timer_dispatcher = dispatcher.clone();
                self.renames
                    .entry(workspace_id.clone())
                    .or_insert_with(|| Debounce::new(window))
                    .schedule(move || {
                        timer_dispatcher.dispatch(WorkspaceEvent::CommitRename { workspace_id, name });
                    });
                WorkspaceState {
                    pending_renames,
                    ..state.clone()
                }
            }
            WorkspaceEvent::CommitRename { workspace_id, name } => {
                let result = self.service.rename_workspace(&workspace_id, &name).await;
                let workspaces = match result {
                    Ok(()) => state
                        .workspaces
                        .iter()
                        .cloned()
                        .map(|mut ws| {
                            if ws.workspace_id == workspace_id {
                                ws.name = name.clone();
                            }
                            ws
                        })
                        .collect(),
                    Err(_) => state.workspaces.clone(),
                };
                // A newer rename queued behind this commit stays pending.
                let mut pending_renames = state.pending_renames.clone();
                if pending_renames.get(&workspace_id) == Some(&name) {
                    pending_renames.remove(&workspace_id);
                }
                WorkspaceState {
                    workspaces,
                    pending_renames,
                    action_result: Some(ActionResult::new(WorkspaceAction::Rename(workspace_id), &result)),
                    ..state.clone()
                }
            }
        }
    }

    async fn on_close(&mut self) {
        self.listener.stop();
        for debounce in self.renames.values() {
            debounce.dispose();
        }
    }
}
