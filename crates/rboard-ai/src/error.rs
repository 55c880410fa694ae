//! Capability error types.

use thiserror::Error;

pub type AiResult<T> = Result<T, AiError>;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Capability unavailable: {0}")]
    Unavailable(String),

    #[error("Response does not match schema: {0}")]
    Schema(String),

    #[error("Rejected by safety filter: {0}")]
    Safety(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Timed out waiting for result: {0}")]
    Timeout(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AiError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    pub fn safety(msg: impl Into<String>) -> Self {
        Self::Safety(msg.into())
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Timeouts are distinguishable so callers may choose to retry the wait.
    pub fn is_timeout(&self) -> bool {
        matches!(self, AiError::Timeout(_))
    }
}
