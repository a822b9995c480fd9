use serde::{Deserialize, Serialize};

use crate::bus::ErrorInfo;

/// Progress of a container's primary data load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed(ErrorInfo),
}

/// Outcome of the last user action a container performed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult<A> {
    pub action: A,
    pub result: Result<(), ErrorInfo>,
}

impl<A> ActionResult<A> {
    pub fn new<T>(action: A, result: &Result<T, ErrorInfo>) -> Self {
        Self {
            action,
            result: result.as_ref().map(|_| ()).map_err(Clone::clone),
        }
    }

    pub fn failed(action: A, error: ErrorInfo) -> Self {
        Self {
            action,
            result: Err(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Something the UI should tell the user about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UserNotice {
    ViewNotFound { view_id: String },
    Error(ErrorInfo),
}

impl UserNotice {
    /// Map a failed lookup to the notice the user should see.
    pub fn for_view_error(view_id: &str, error: ErrorInfo) -> Self {
        if error.is_not_found() {
            Self::ViewNotFound {
                view_id: view_id.to_string(),
            }
        } else {
            Self::Error(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_errors_become_a_distinct_notice() {
        assert_eq!(
            UserNotice::for_view_error("v1", ErrorInfo::not_found("gone")),
            UserNotice::ViewNotFound {
                view_id: "v1".to_string()
            }
        );
        assert_eq!(
            UserNotice::for_view_error("v1", ErrorInfo::internal("boom")),
            UserNotice::Error(ErrorInfo::internal("boom"))
        );
    }

    #[test]
    fn action_result_keeps_only_success_marker() {
        let ok: Result<Vec<u8>, ErrorInfo> = Ok(vec![1, 2, 3]);
        let result = ActionResult::new("put_back", &ok);
        assert!(result.is_ok());

        let err: Result<Vec<u8>, ErrorInfo> = Err(ErrorInfo::new(8, "denied"));
        let result = ActionResult::new("put_back", &err);
        assert_eq!(result.result, Err(ErrorInfo::new(8, "denied")));
    }
}
