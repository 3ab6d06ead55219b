//! Request layer error types.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Transport error: {0}")]
    Transport(String),

    /// Non-2xx response. `message` is the server's reason.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("Decode error: {0}")]
    Decode(String),
}

impl ApiError {
    /// Build a rejection from a status code and response body.
    ///
    /// The message is taken from `detail.error`, then a string `detail`, then
    /// a top level `error`, falling back to a generic description.
    pub fn rejected(status: u16, body: &str) -> Self {
        let parsed: Option<Value> = serde_json::from_str(body).ok();
        let message = parsed
            .as_ref()
            .and_then(|v| {
                let detail = v.get("detail");
                detail
                    .and_then(|d| d.get("error"))
                    .and_then(Value::as_str)
                    .or_else(|| detail.and_then(Value::as_str))
                    .or_else(|| v.get("error").and_then(Value::as_str))
            })
            .map(str::to_string)
            .unwrap_or_else(|| format!("request failed (HTTP {status})"));
        Self::Rejected { status, message }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
