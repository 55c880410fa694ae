//! Continuity issue definitions.
//!
//! Issues are immutable facts about a snapshot of the shot list; `resolved`
//! is the only mutable field, flipped either by applying the fix or by
//! manual dismissal.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Category of a continuity issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    Outfit,
    Time,
    Location,
    Camera,
    Lighting,
    Other,
}

impl IssueCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCategory::Outfit => "outfit",
            IssueCategory::Time => "time",
            IssueCategory::Location => "location",
            IssueCategory::Camera => "camera",
            IssueCategory::Lighting => "lighting",
            IssueCategory::Other => "other",
        }
    }
}

/// Severity of a continuity issue. None of them block rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Error,
    Warning,
    Info,
}

/// Which breakdown field a mechanical fix targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FixField {
    TimeOfDay,
    Environment,
    AppearanceDescription,
    Position,
}

/// A mechanical field update that silences an issue when applied.
///
/// Applying a fix mutates only the targeted shot's breakdown field and marks
/// the issue resolved; it never regenerates the image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FixData {
    pub field: FixField,
    /// Target character, for character-scoped fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character: Option<String>,
    /// New field value
    pub value: String,
}

/// One advisory inconsistency found in an ordered shot list.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ContinuityIssue {
    /// Deterministic content-derived id: identical inputs yield identical ids
    pub id: String,
    pub shot_id: String,
    pub category: IssueCategory,
    pub severity: IssueSeverity,
    pub message: String,
    /// The texts the rule fired on
    pub evidence: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_fix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_data: Option<FixData>,
    #[serde(default)]
    pub resolved: bool,
}

impl ContinuityIssue {
    /// Create an issue with a deterministic id derived from category, shot
    /// and subject.
    pub fn new(
        shot_id: impl Into<String>,
        subject: &str,
        category: IssueCategory,
        severity: IssueSeverity,
        message: impl Into<String>,
        evidence: impl Into<String>,
    ) -> Self {
        let shot_id = shot_id.into();
        let id = format!("{}:{}:{}", category.as_str(), shot_id, subject);
        Self {
            id,
            shot_id,
            category,
            severity,
            message: message.into(),
            evidence: evidence.into(),
            suggested_fix: None,
            fix_data: None,
            resolved: false,
        }
    }

    pub fn with_suggested_fix(mut self, fix: impl Into<String>) -> Self {
        self.suggested_fix = Some(fix.into());
        self
    }

    pub fn with_fix_data(mut self, fix_data: FixData) -> Self {
        self.fix_data = Some(fix_data);
        self
    }

    /// Mark the issue resolved (fix applied or manually dismissed).
    pub fn resolve(&mut self) {
        self.resolved = true;
    }
}
