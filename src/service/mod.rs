//! Outbound request boundary.
//!
//! Every backend call is one-shot: a command name plus a serialized payload,
//! answered once with bytes or an [`ErrorInfo`]. Feature services wrap
//! [`ServiceClient`] with typed methods.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::bus::{ErrorCode, ErrorInfo};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendRequest {
    pub command: String,
    pub payload: Vec<u8>,
}

/// The backend dispatcher. Implementations own transport and encoding details.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn request(&self, request: BackendRequest) -> Result<Vec<u8>, ErrorInfo>;
}

#[derive(Clone)]
pub struct ServiceClient {
    backend: Arc<dyn Backend>,
    timeout: Duration,
}

impl ServiceClient {
    pub fn new(backend: Arc<dyn Backend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send `request` and decode the response body.
    pub async fn call<Req, Resp>(&self, command: &str, request: &Req) -> Result<Resp, ErrorInfo>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let bytes = self.send(command, request).await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            ErrorInfo::with_code(
                ErrorCode::PayloadDecode,
                format!("{command}: invalid response: {e}"),
            )
        })
    }

    /// Send `request` and ignore the response body.
    pub async fn call_unit<Req>(&self, command: &str, request: &Req) -> Result<(), ErrorInfo>
    where
        Req: Serialize + ?Sized,
    {
        self.send(command, request).await.map(|_| ())
    }

    async fn send<Req>(&self, command: &str, request: &Req) -> Result<Vec<u8>, ErrorInfo>
    where
        Req: Serialize + ?Sized,
    {
        let payload = serde_json::to_vec(request).map_err(|e| {
            ErrorInfo::with_code(ErrorCode::Serialize, format!("{command}: {e}"))
        })?;

        let started = Instant::now();
        let request = BackendRequest {
            command: command.to_string(),
            payload,
        };
        let result = match tokio::time::timeout(self.timeout, self.backend.request(request)).await {
            Ok(result) => result,
            Err(_) => Err(ErrorInfo::with_code(
                ErrorCode::Timeout,
                format!("{command} timed out after {}ms", self.timeout.as_millis()),
            )),
        };

        match &result {
            Ok(bytes) => tracing::trace!(
                "{command} ok ({} bytes, {}ms)",
                bytes.len(),
                started.elapsed().as_millis()
            ),
            Err(e) => tracing::warn!("{command} failed: {e}"),
        }
        result
    }
}
