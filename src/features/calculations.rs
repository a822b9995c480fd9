use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::bus::{
    decode_payload, DatabaseNotification, ErrorInfo, Listener, ListenerError, NotificationChannel,
};
use crate::runtime::{ActionResult, Dispatcher, LoadState, Reducer};
use crate::service::ServiceClient;

const GET_CALCULATIONS: &str = "database.calculations.get";
const UPDATE_CALCULATION: &str = "database.calculations.update";
const REMOVE_CALCULATION: &str = "database.calculations.remove";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationType {
    Average,
    Max,
    Median,
    Min,
    Sum,
    Count,
    CountEmpty,
    CountNonEmpty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calculation {
    pub id: String,
    pub field_id: String,
    pub calculation_type: CalculationType,
    #[serde(default)]
    pub value: String,
}

/// Payload of `DidUpdateCalculation`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculationChanges {
    #[serde(default)]
    pub inserted: Vec<Calculation>,
    #[serde(default)]
    pub updated: Vec<Calculation>,
    #[serde(default)]
    pub deleted: Vec<Calculation>,
}

impl CalculationChanges {
    /// Merge into `current`. One calculation per field: an insert for a
    /// field that already has one replaces it.
    pub fn apply(&self, current: &[Calculation]) -> Vec<Calculation> {
        let mut merged: Vec<Calculation> = current
            .iter()
            .filter(|calc| !self.deleted.iter().any(|gone| gone.id == calc.id))
            .cloned()
            .collect();

        for update in &self.updated {
            if let Some(slot) = merged.iter_mut().find(|calc| calc.id == update.id) {
                *slot = update.clone();
            }
        }

        for insert in &self.inserted {
            match merged.iter_mut().find(|calc| calc.field_id == insert.field_id) {
                Some(slot) => *slot = insert.clone(),
                None => merged.push(insert.clone()),
            }
        }
        merged
    }
}

#[derive(Debug, Serialize)]
struct UpdateCalculationPayload<'a> {
    view_id: &'a str,
    field_id: &'a str,
    calculation_type: CalculationType,
    calculation_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct RemoveCalculationPayload<'a> {
    view_id: &'a str,
    field_id: &'a str,
    calculation_id: &'a str,
}

#[derive(Clone)]
pub struct CalculationsService {
    view_id: String,
    client: ServiceClient,
}

impl CalculationsService {
    pub fn new(view_id: impl Into<String>, client: ServiceClient) -> Self {
        Self {
            view_id: view_id.into(),
            client,
        }
    }

    pub async fn get_calculations(&self) -> Result<Vec<Calculation>, ErrorInfo> {
        self.client
            .call(GET_CALCULATIONS, &serde_json::json!({ "view_id": self.view_id }))
            .await
    }

    pub async fn update_calculation(
        &self,
        field_id: &str,
        calculation_type: CalculationType,
        calculation_id: Option<&str>,
    ) -> Result<(), ErrorInfo> {
        let payload = UpdateCalculationPayload {
            view_id: &self.view_id,
            field_id,
            calculation_type,
            calculation_id,
        };
        self.client.call_unit(UPDATE_CALCULATION, &payload).await
    }

    pub async fn remove_calculation(&self, field_id: &str, calculation_id: &str) -> Result<(), ErrorInfo> {
        let payload = RemoveCalculationPayload {
            view_id: &self.view_id,
            field_id,
            calculation_id,
        };
        self.client.call_unit(REMOVE_CALCULATION, &payload).await
    }
}

pub enum CalculationsUpdate {
    Changes(Result<CalculationChanges, ErrorInfo>),
    Reload,
}

/// Listens on the grid view id for calculation changes.
pub struct CalculationsListener {
    listener: Listener<DatabaseNotification>,
}

impl CalculationsListener {
    pub fn new(channel: NotificationChannel, view_id: impl Into<String>) -> Self {
        Self {
            listener: Listener::new(channel, view_id),
        }
    }

    pub fn start<F>(&self, on_update: F) -> Result<(), ListenerError>
    where
        F: Fn(CalculationsUpdate) + Send + Sync + 'static,
    {
        self.listener.start(move |ty, result| match ty {
            DatabaseNotification::DidUpdateCalculation => {
                on_update(CalculationsUpdate::Changes(decode_payload(result)))
            }
            DatabaseNotification::DidReloadCalculations => on_update(CalculationsUpdate::Reload),
            _ => {}
        })
    }

    pub fn stop(&self) {
        self.listener.stop();
    }
}

#[derive(Debug)]
pub enum CalculationsEvent {
    Initial,
    Fetch,
    DidReceiveChanges(Result<CalculationChanges, ErrorInfo>),
    Add {
        field_id: String,
        calculation_type: CalculationType,
    },
    Remove {
        field_id: String,
        calculation_id: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalculationsAction {
    Fetch,
    Sync,
    Add { field_id: String },
    Remove { field_id: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalculationsState {
    pub view_id: String,
    pub calculations: Vec<Calculation>,
    pub load: LoadState,
    pub action_result: Option<ActionResult<CalculationsAction>>,
}

impl CalculationsState {
    pub fn new(view_id: impl Into<String>) -> Self {
        Self {
            view_id: view_id.into(),
            ..Self::default()
        }
    }

    pub fn for_field(&self, field_id: &str) -> Option<&Calculation> {
        self.calculations.iter().find(|calc| calc.field_id == field_id)
    }
}

pub struct CalculationsBloc {
    service: CalculationsService,
    listener: CalculationsListener,
}

impl CalculationsBloc {
    pub fn new(channel: NotificationChannel, client: ServiceClient, view_id: &str) -> Self {
        Self {
            service: CalculationsService::new(view_id, client),
            listener: CalculationsListener::new(channel, view_id),
        }
    }
}

#[async_trait]
impl Reducer for CalculationsBloc {
    type Event = CalculationsEvent;
    type State = CalculationsState;

    async fn reduce(
        &mut self,
        state: &CalculationsState,
        event: CalculationsEvent,
        dispatcher: &Dispatcher<CalculationsEvent>,
    ) -> CalculationsState {
        match event {
            CalculationsEvent::Initial => {
                let listener_dispatcher = dispatcher.clone();
                if let Err(e) = self.listener.start(move |update| match update {
                    CalculationsUpdate::Changes(changes) => {
                        listener_dispatcher.dispatch(CalculationsEvent::DidReceiveChanges(changes));
                    }
                    CalculationsUpdate::Reload => {
                        listener_dispatcher.dispatch(CalculationsEvent::Fetch);
                    }
                }) {
                    tracing::warn!("calculations listener not started: {e}");
                }
                dispatcher.dispatch(CalculationsEvent::Fetch);
                CalculationsState {
                    load: LoadState::Loading,
                    ..state.clone()
                }
            }
            CalculationsEvent::Fetch => match self.service.get_calculations().await {
                Ok(calculations) => CalculationsState {
                    calculations,
                    load: LoadState::Ready,
                    ..state.clone()
                },
                Err(error) => CalculationsState {
                    load: LoadState::Failed(error.clone()),
                    action_result: Some(ActionResult::failed(CalculationsAction::Fetch, error)),
                    ..state.clone()
                },
            },
            CalculationsEvent::DidReceiveChanges(Ok(changes)) => CalculationsState {
                calculations: changes.apply(&state.calculations),
                ..state.clone()
            },
            CalculationsEvent::DidReceiveChanges(Err(error)) => CalculationsState {
                action_result: Some(ActionResult::failed(CalculationsAction::Sync, error)),
                ..state.clone()
            },
            CalculationsEvent::Add {
                field_id,
                calculation_type,
            } => {
                let existing = state.for_field(&field_id).map(|calc| calc.id.as_str());
                let result = self
                    .service
                    .update_calculation(&field_id, calculation_type, existing)
                    .await;
                CalculationsState {
                    action_result: Some(ActionResult::new(CalculationsAction::Add { field_id }, &result)),
                    ..state.clone()
                }
            }
            CalculationsEvent::Remove {
                field_id,
                calculation_id,
            } => {
                let result = self.service.remove_calculation(&field_id, &calculation_id).await;
                CalculationsState {
                    action_result: Some(ActionResult::new(CalculationsAction::Remove { field_id }, &result)),
                    ..state.clone()
                }
            }
        }
    }

    async fn on_close(&mut self) {
        self.listener.stop();
    }
}
