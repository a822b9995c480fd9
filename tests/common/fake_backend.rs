//! In-memory backend that answers workspace and trash commands and pushes
//! change notifications the way the real backend does.

use std::sync::{Arc, Mutex, OnceLock};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use notewire_lib::bus::{ErrorInfo, FolderNotification, NotificationChannel, NotificationType};
use notewire_lib::features::trash::{TrashItem, TRASH_OBJECT_ID};
use notewire_lib::features::workspace::Workspace;
use notewire_lib::service::{Backend, BackendRequest};

#[derive(Default)]
struct Store {
    workspaces: Vec<Workspace>,
    current: Option<String>,
    trash: Vec<TrashItem>,
    next_id: u32,
}

#[derive(Debug, Deserialize)]
struct WorkspaceId {
    workspace_id: String,
}

#[derive(Debug, Deserialize)]
struct Rename {
    workspace_id: String,
    new_name: String,
}

#[derive(Debug, Deserialize)]
struct Create {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Ids {
    ids: Vec<String>,
}

pub struct FakeBackend {
    user_id: String,
    store: Mutex<Store>,
    channel: OnceLock<NotificationChannel>,
    requests: Mutex<Vec<String>>,
}

impl FakeBackend {
    pub fn new(user_id: &str) -> Arc<Self> {
        Arc::new(Self {
            user_id: user_id.to_string(),
            store: Mutex::new(Store::default()),
            channel: OnceLock::new(),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Route change notifications into `channel`.
    pub fn attach(&self, channel: NotificationChannel) {
        let _ = self.channel.set(channel);
    }

    pub fn seed_workspace(&self, workspace_id: &str, name: &str) {
        let mut store = self.store.lock().unwrap();
        let created_at = store.workspaces.len() as i64;
        store.workspaces.push(Workspace {
            workspace_id: workspace_id.to_string(),
            name: name.to_string(),
            created_at,
        });
        if store.current.is_none() {
            store.current = Some(workspace_id.to_string());
        }
    }

    pub fn seed_trash(&self, id: &str) {
        self.store.lock().unwrap().trash.push(TrashItem {
            id: id.to_string(),
            name: format!("page {id}"),
            modified_time: 0,
            create_time: 0,
        });
    }

    pub fn workspace_names(&self) -> Vec<String> {
        let store = self.store.lock().unwrap();
        store.workspaces.iter().map(|ws| ws.name.clone()).collect()
    }

    pub fn requests(&self, command: &str) -> usize {
        let requests = self.requests.lock().unwrap();
        requests.iter().filter(|c| c.as_str() == command).count()
    }

    fn notify(&self, object_id: &str, ty: FolderNotification, value: &impl serde::Serialize) {
        if let Some(channel) = self.channel.get() {
            channel.emit_value(FolderNotification::SOURCE, object_id, ty.tag(), value);
        }
    }

    fn handle(&self, command: &str, payload: &[u8]) -> Result<Value, ErrorInfo> {
        let decode_err = |e: serde_json::Error| ErrorInfo::internal(format!("bad payload: {e}"));
        let mut store = self.store.lock().unwrap();

        match command {
            "user.workspaces.get" => Ok(json!(store.workspaces)),
            "folder.workspace.current" => {
                let current = store.current.clone().unwrap_or_default();
                store
                    .workspaces
                    .iter()
                    .find(|ws| ws.workspace_id == current)
                    .map(|ws| json!(ws))
                    .ok_or_else(|| ErrorInfo::not_found("no current workspace"))
            }
            "user.workspaces.create" => {
                let Create { name } = serde_json::from_slice(payload).map_err(decode_err)?;
                store.next_id += 1;
                let workspace = Workspace {
                    workspace_id: format!("created-{}", store.next_id),
                    name,
                    created_at: 100 + store.next_id as i64,
                };
                store.workspaces.push(workspace.clone());
                let all = store.workspaces.clone();
                drop(store);
                self.notify(&self.user_id, FolderNotification::DidUpdateUserWorkspaces, &all);
                Ok(json!(workspace))
            }
            "user.workspaces.delete" => {
                let WorkspaceId { workspace_id } = serde_json::from_slice(payload).map_err(decode_err)?;
                let before = store.workspaces.len();
                store.workspaces.retain(|ws| ws.workspace_id != workspace_id);
                if store.workspaces.len() == before {
                    return Err(ErrorInfo::not_found(format!("workspace {workspace_id}")));
                }
                let all = store.workspaces.clone();
                drop(store);
                self.notify(&self.user_id, FolderNotification::DidUpdateUserWorkspaces, &all);
                Ok(Value::Null)
            }
            "user.workspaces.open" => {
                let WorkspaceId { workspace_id } = serde_json::from_slice(payload).map_err(decode_err)?;
                if !store.workspaces.iter().any(|ws| ws.workspace_id == workspace_id) {
                    return Err(ErrorInfo::not_found(format!("workspace {workspace_id}")));
                }
                store.current = Some(workspace_id);
                Ok(Value::Null)
            }
            "user.workspaces.rename" => {
                let Rename {
                    workspace_id,
                    new_name,
                } = serde_json::from_slice(payload).map_err(decode_err)?;
                let workspace = store
                    .workspaces
                    .iter_mut()
                    .find(|ws| ws.workspace_id == workspace_id)
                    .ok_or_else(|| ErrorInfo::not_found(format!("workspace {workspace_id}")))?;
                workspace.name = new_name;
                let updated = workspace.clone();
                drop(store);
                self.notify(&self.user_id, FolderNotification::DidUpdateWorkspace, &updated);
                Ok(Value::Null)
            }
            "folder.trash.read" => Ok(json!(store.trash)),
            "folder.trash.put_back" | "folder.trash.delete" => {
                let Ids { ids } = serde_json::from_slice(payload).map_err(decode_err)?;
                store.trash.retain(|item| !ids.contains(&item.id));
                let trash = store.trash.clone();
                drop(store);
                self.notify(TRASH_OBJECT_ID, FolderNotification::DidUpdateTrash, &trash);
                Ok(Value::Null)
            }
            other => Err(ErrorInfo::internal(format!("unsupported command {other}"))),
        }
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn request(&self, request: BackendRequest) -> Result<Vec<u8>, ErrorInfo> {
        self.requests.lock().unwrap().push(request.command.clone());
        let value = self.handle(&request.command, &request.payload)?;
        serde_json::to_vec(&value).map_err(|e| ErrorInfo::internal(e.to_string()))
    }
}
