//! Engine error types.

use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Planning failed: {0}")]
    PlanningFailed(String),

    #[error("Render failed: {0}")]
    RenderFailed(String),

    #[error("Fix not applicable: {0}")]
    FixFailed(String),

    #[error("Capability error: {0}")]
    Ai(#[from] rboard_ai::AiError),

    #[error("Store error: {0}")]
    Store(#[from] rboard_store::StoreError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn planning_failed(msg: impl Into<String>) -> Self {
        Self::PlanningFailed(msg.into())
    }

    pub fn render_failed(msg: impl Into<String>) -> Self {
        Self::RenderFailed(msg.into())
    }

    pub fn fix_failed(msg: impl Into<String>) -> Self {
        Self::FixFailed(msg.into())
    }

    /// Whether the underlying cause was a bounded-wait timeout, which
    /// callers may choose to retry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, EngineError::Ai(e) if e.is_timeout())
    }
}
