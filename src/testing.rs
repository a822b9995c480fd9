//! Scripted backend used by unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::bus::ErrorInfo;
use crate::service::{Backend, BackendRequest};

#[derive(Clone)]
struct Scripted {
    delay: Duration,
    response: Result<Vec<u8>, ErrorInfo>,
}

#[derive(Default)]
struct Route {
    once: VecDeque<Scripted>,
    always: Option<Scripted>,
}

/// Answers commands from per-command scripts: queued one-shot responses
/// first, then the standing response. Unscripted commands fail.
#[derive(Default)]
pub struct MockBackend {
    routes: Mutex<HashMap<String, Route>>,
    calls: Mutex<Vec<BackendRequest>>,
}

fn encode<T: Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).expect("mock response serializes")
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn script(&self, command: &str, once: bool, scripted: Scripted) {
        let mut routes = self.routes.lock().unwrap();
        let route = routes.entry(command.to_string()).or_default();
        if once {
            route.once.push_back(scripted);
        } else {
            route.always = Some(scripted);
        }
    }

    pub fn respond<T: Serialize>(&self, command: &str, value: &T) {
        self.respond_after(command, Duration::ZERO, value);
    }

    pub fn respond_raw(&self, command: &str, bytes: Vec<u8>) {
        self.script(
            command,
            false,
            Scripted {
                delay: Duration::ZERO,
                response: Ok(bytes),
            },
        );
    }

    pub fn respond_after<T: Serialize>(&self, command: &str, delay: Duration, value: &T) {
        self.script(
            command,
            false,
            Scripted {
                delay,
                response: Ok(encode(value)),
            },
        );
    }

    pub fn respond_once<T: Serialize>(&self, command: &str, value: &T) {
        self.respond_once_after(command, Duration::ZERO, value);
    }

    pub fn respond_once_after<T: Serialize>(&self, command: &str, delay: Duration, value: &T) {
        self.script(
            command,
            true,
            Scripted {
                delay,
                response: Ok(encode(value)),
            },
        );
    }

    pub fn fail(&self, command: &str, error: ErrorInfo) {
        self.script(
            command,
            false,
            Scripted {
                delay: Duration::ZERO,
                response: Err(error),
            },
        );
    }

    pub fn fail_once(&self, command: &str, error: ErrorInfo) {
        self.script(
            command,
            true,
            Scripted {
                delay: Duration::ZERO,
                response: Err(error),
            },
        );
    }

    /// Command names in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|request| request.command.clone())
            .collect()
    }

    pub fn payloads(&self, command: &str) -> Vec<serde_json::Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|request| request.command == command)
            .map(|request| serde_json::from_slice(&request.payload).unwrap_or_default())
            .collect()
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn request(&self, request: BackendRequest) -> Result<Vec<u8>, ErrorInfo> {
        let scripted = {
            let mut routes = self.routes.lock().unwrap();
            routes.get_mut(&request.command).and_then(|route| {
                route.once.pop_front().or_else(|| route.always.clone())
            })
        };
        let command = request.command.clone();
        self.calls.lock().unwrap().push(request);

        let Some(scripted) = scripted else {
            return Err(ErrorInfo::internal(format!("unhandled command {command}")));
        };
        if !scripted.delay.is_zero() {
            tokio::time::sleep(scripted.delay).await;
        }
        scripted.response
    }
}
