//! Client-side state synchronization for the workspace app.
//!
//! Backend notifications reach state containers through one pipeline:
//! listener -> parser -> event -> bloc -> state snapshot -> observers.
//!
//! # Architecture
//!
//! - `bus`: notification channel, parser and listener lifecycle
//! - `runtime`: bloc runtime, debounce, shared state markers
//! - `service`: one-shot backend request boundary
//! - `features`: trash, favorites, recent views, calculations, workspaces
//! - `config`: file + environment configuration

pub mod bus;
pub mod config;
pub mod features;
pub mod runtime;
pub mod service;

#[cfg(test)]
mod testing;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use bus::NotificationChannel;
use config::{AppConfig, ConfigError};
use features::{
    CalculationsBloc, CalculationsState, FavoriteBloc, FavoriteState, RecentViewsBloc,
    RecentViewsState, TrashBloc, TrashState, WorkspaceBloc, WorkspaceState,
};
use runtime::{BlocHandle, ExpansionRegistry, VersionChecker};
use service::{Backend, ServiceClient};

// ---------------------------------------------------------------------------
// Shared error type
// ---------------------------------------------------------------------------

/// Failures while assembling the application. Backend errors never surface
/// here; containers carry them in state.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Install the global fmt subscriber. `RUST_LOG` wins over `default_filter`.
/// A second call is a no-op.
pub fn init_tracing(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if tracing_subscriber::fmt().with_env_filter(filter).try_init().is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

// ---------------------------------------------------------------------------
// Application context
// ---------------------------------------------------------------------------

/// Shared collaborators for every container: one notification channel, one
/// backend client, the expansion registry and the version checker.
///
/// The backend adapter publishes incoming notifications into `channel()`.
pub struct AppContext {
    config: AppConfig,
    channel: NotificationChannel,
    client: ServiceClient,
    expansion: Arc<ExpansionRegistry>,
    version_checker: Arc<VersionChecker>,
}

impl AppContext {
    pub fn new(config: AppConfig, backend: Arc<dyn Backend>) -> Result<Self, AppError> {
        config.validate()?;
        let version = config.version()?;

        let channel = NotificationChannel::new(config.channel_capacity);
        let client = ServiceClient::new(backend, config.request_timeout());
        let version_checker = Arc::new(VersionChecker::new(version, client.clone()));

        tracing::info!("app context ready (version {version})");
        Ok(Self {
            config,
            channel,
            client,
            expansion: Arc::new(ExpansionRegistry::new()),
            version_checker,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn channel(&self) -> &NotificationChannel {
        &self.channel
    }

    pub fn client(&self) -> &ServiceClient {
        &self.client
    }

    pub fn expansion(&self) -> &Arc<ExpansionRegistry> {
        &self.expansion
    }

    pub fn version_checker(&self) -> &Arc<VersionChecker> {
        &self.version_checker
    }

    pub fn trash_bloc(&self) -> BlocHandle<TrashBloc> {
        BlocHandle::spawn(
            TrashBloc::new(self.channel.clone(), self.client.clone()),
            TrashState::default(),
            self.config.state_capacity,
        )
    }

    pub fn favorite_bloc(&self) -> BlocHandle<FavoriteBloc> {
        BlocHandle::spawn(
            FavoriteBloc::new(self.channel.clone(), self.client.clone()),
            FavoriteState::default(),
            self.config.state_capacity,
        )
    }

    pub fn recent_views_bloc(&self) -> BlocHandle<RecentViewsBloc> {
        BlocHandle::spawn(
            RecentViewsBloc::new(self.channel.clone(), self.client.clone()),
            RecentViewsState::default(),
            self.config.state_capacity,
        )
    }

    pub fn calculations_bloc(&self, view_id: &str) -> BlocHandle<CalculationsBloc> {
        BlocHandle::spawn(
            CalculationsBloc::new(self.channel.clone(), self.client.clone(), view_id),
            CalculationsState::new(view_id),
            self.config.state_capacity,
        )
    }

    pub fn workspace_bloc(&self, user_id: &str) -> BlocHandle<WorkspaceBloc> {
        BlocHandle::spawn(
            WorkspaceBloc::new(
                self.channel.clone(),
                self.client.clone(),
                user_id,
                self.config.debounce(),
            ),
            WorkspaceState::default(),
            self.config.state_capacity,
        )
    }

    /// Release context-owned state. Containers are closed by their owners.
    pub fn shutdown(&self) {
        self.version_checker.reset();
        tracing::info!("app context shut down");
    }
}
