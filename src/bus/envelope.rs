use serde::{Deserialize, Serialize};

/// Error value carried across the backend boundary.
///
/// Only `code` and `message` are meaningful; containers treat it as
/// "present vs absent" and hand it to observers unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("[{code}] {message}")]
pub struct ErrorInfo {
    pub code: i32,
    pub message: String,
}

/// Codes produced by this crate. Backend codes pass through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum ErrorCode {
    Internal = 0,
    RecordNotFound = 3,
    PayloadDecode = 1001,
    Serialize = 1002,
    Timeout = 1003,
    Disposed = 1004,
}

impl ErrorCode {
    pub const fn code(self) -> i32 {
        self as i32
    }
}

impl ErrorInfo {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn with_code(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(code.code(), message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_code(ErrorCode::Internal, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::with_code(ErrorCode::RecordNotFound, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.code == ErrorCode::RecordNotFound.code()
    }
}

/// One tagged notification pushed by the backend.
///
/// `payload` is either the serialized body or the error the backend (or
/// the transport) reported for this notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEnvelope {
    pub id: String,
    pub seq: i64,
    pub source: String,
    pub object_id: String,
    pub ty: i32,
    pub payload: Result<Vec<u8>, ErrorInfo>,
    pub created_at: String,
}
