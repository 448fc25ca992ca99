use reqwest::StatusCode;
use shared::domain::InvalidUserType;
use thiserror::Error;

/// Every store operation fails with this type. Stores report each failure
/// once (log + error notification) before handing it back to the caller.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{0}")]
    Validation(String),
    #[error("not logged in: no user in session")]
    NotLoggedIn,
    #[error("invalid client configuration: {0}")]
    Config(String),
    #[error("request to {route} failed: {source}")]
    Transport {
        route: &'static str,
        source: reqwest::Error,
    },
    #[error("{route} answered {status}: {message}")]
    Status {
        route: &'static str,
        status: StatusCode,
        message: String,
    },
    #[error("invalid {route} response: {source}")]
    Decode {
        route: &'static str,
        source: serde_json::Error,
    },
    #[error("session storage failure: {source}")]
    Storage { source: anyhow::Error },
    #[error("corrupt session identity: {source}")]
    CorruptSession { source: serde_json::Error },
    #[error("unknown route '{0}'")]
    UnknownRoute(String),
}

impl From<InvalidUserType> for ClientError {
    fn from(value: InvalidUserType) -> Self {
        Self::Validation(value.to_string())
    }
}

impl ClientError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
