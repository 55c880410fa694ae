//! Job definitions for the in-process registry.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job state. A job starts processing and takes exactly one terminal
/// transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Work is in flight
    #[default]
    Processing,
    /// Finished successfully, result attached
    Completed,
    /// Finished with an error
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

/// Kind of work a job wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    PlanShots,
    RenderShot,
    RenderSequence,
    EditShot,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::PlanShots => "plan_shots",
            JobKind::RenderShot => "render_shot",
            JobKind::RenderSequence => "render_sequence",
            JobKind::EditShot => "edit_shot",
        }
    }
}

/// A tracked unit of asynchronous work.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobRecord {
    pub id: JobId,

    pub kind: JobKind,

    #[serde(default)]
    pub state: JobState,

    /// Progress (0-100)
    #[serde(default)]
    pub progress: u8,

    /// Last progress message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Result payload (present once completed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    /// Error message (present once failed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    /// Create a new processing record.
    pub fn new(kind: JobKind) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            kind,
            state: JobState::Processing,
            progress: 0,
            message: None,
            data: None,
            error: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Update progress on a live job.
    pub fn set_progress(&mut self, progress: u8, message: Option<String>) {
        self.progress = progress.min(100);
        if message.is_some() {
            self.message = message;
        }
        self.updated_at = Utc::now();
    }

    /// Take the completed transition. Returns false (and leaves the record
    /// untouched) if the job is already terminal.
    pub fn complete(&mut self, data: Option<serde_json::Value>) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = JobState::Completed;
        self.progress = 100;
        self.data = data;
        let now = Utc::now();
        self.updated_at = now;
        self.completed_at = Some(now);
        true
    }

    /// Take the failed transition. Returns false if already terminal.
    pub fn fail(&mut self, error: impl Into<String>) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = JobState::Failed;
        self.error = Some(error.into());
        let now = Utc::now();
        self.updated_at = now;
        self.completed_at = Some(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_starts_processing() {
        let record = JobRecord::new(JobKind::PlanShots);
        assert_eq!(record.state, JobState::Processing);
        assert!(!record.state.is_terminal());
    }

    #[test]
    fn test_exactly_one_terminal_transition() {
        let mut record = JobRecord::new(JobKind::RenderShot);
        assert!(record.complete(Some(serde_json::json!({"image_url": "media/a.png"}))));

        // A late failure must not downgrade the completed job.
        assert!(!record.fail("late failure"));
        assert_eq!(record.state, JobState::Completed);
        assert!(record.error.is_none());

        // Nor can it complete twice.
        assert!(!record.complete(None));
    }

    #[test]
    fn test_fail_then_complete_rejected() {
        let mut record = JobRecord::new(JobKind::EditShot);
        assert!(record.fail("capability unavailable"));
        assert!(!record.complete(None));
        assert_eq!(record.state, JobState::Failed);
    }

    #[test]
    fn test_progress_clamped() {
        let mut record = JobRecord::new(JobKind::RenderSequence);
        record.set_progress(250, Some("shot 3/10".to_string()));
        assert_eq!(record.progress, 100);
        assert_eq!(record.message.as_deref(), Some("shot 3/10"));
    }
}
