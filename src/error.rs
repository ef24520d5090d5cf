//! Error taxonomy for calls against the remote translation service.
//! Transport failures, non-2xx responses and inputs rejected before dispatch.

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ApiError {
    /// The request never produced an HTTP response (DNS, connect, timeout, ...).
    #[error("network error: {0}")]
    Network(String),

    /// The service answered with a non-2xx status, or with a body we could not decode.
    #[error("{message}")]
    Api {
        message: String,
        status: Option<u16>,
        data: Option<serde_json::Value>,
    },

    /// Rejected locally before anything was sent.
    #[error("invalid input: {0}")]
    Validation(String),
}

impl ApiError {
    pub fn api(message: impl Into<String>, status: Option<u16>) -> Self {
        ApiError::Api {
            message: message.into(),
            status,
            data: None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Api { status, .. } => *status,
            _ => None,
        }
    }

    /// Best-effort machine readable code for the UI.
    pub fn code(&self) -> Option<String> {
        match self {
            ApiError::Network(_) => Some("network".to_string()),
            ApiError::Api { status, .. } => status.map(|s| s.to_string()),
            ApiError::Validation(_) => Some("validation".to_string()),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return ApiError::api(format!("malformed response: {err}"), None);
        }
        match err.status() {
            Some(status) => ApiError::api(err.to_string(), Some(status.as_u16())),
            None => ApiError::Network(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::api(format!("malformed response: {err}"), None)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
