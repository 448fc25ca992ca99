use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    BadRequest,
    Unauthorized,
    NotFound,
    Validation,
    Internal,
}

/// Failure body of the ordering backend. Routes that only send a bare
/// `{"message": ...}` or `{"error": ...}` leave `code` unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{}{message}", .code.map(|code| format!("{code:?}: ")).unwrap_or_default())]
pub struct ApiError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    #[serde(alias = "error")]
    pub message: String,
}

impl ApiError {
    /// Parses an error body, returning `None` when the backend answered with
    /// something other than a JSON object carrying a message.
    pub fn from_body(body: &str) -> Option<Self> {
        serde_json::from_str(body).ok()
    }
}
