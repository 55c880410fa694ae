//! Sequence lifecycle.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::entity::Entity;
use crate::plan::SceneContext;
use crate::shot::ShotPlan;

/// Lifecycle status of a sequence. Transitions are strictly forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum SequenceStatus {
    /// Script present, not yet planned
    #[default]
    Draft,
    /// Shot planning complete
    Analyzed,
    /// All shots rendered
    Storyboarded,
}

impl SequenceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SequenceStatus::Draft => "draft",
            SequenceStatus::Analyzed => "analyzed",
            SequenceStatus::Storyboarded => "storyboarded",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            SequenceStatus::Draft => 0,
            SequenceStatus::Analyzed => 1,
            SequenceStatus::Storyboarded => 2,
        }
    }
}

#[derive(Debug, Error)]
pub enum SequenceError {
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: &'static str, to: &'static str },
}

/// An ordered run of shots planned from one script.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Sequence {
    pub id: String,

    #[serde(default)]
    pub title: String,

    /// The source script text
    pub script: String,

    #[serde(default)]
    pub status: SequenceStatus,

    /// Scene pre-analysis result, set once planning has run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_context: Option<SceneContext>,

    /// Ordered shot plans
    #[serde(default)]
    pub shots: Vec<ShotPlan>,

    /// Sequence-scoped assets
    #[serde(default)]
    pub entities: Vec<Entity>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Sequence {
    pub fn new(title: impl Into<String>, script: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            script: script.into(),
            status: SequenceStatus::Draft,
            scene_context: None,
            shots: Vec::new(),
            entities: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Advance the lifecycle status. Backward transitions are rejected;
    /// advancing to the current status is a no-op.
    pub fn advance_to(&mut self, status: SequenceStatus) -> Result<(), SequenceError> {
        if status.rank() < self.status.rank() {
            return Err(SequenceError::InvalidTransition {
                from: self.status.as_str(),
                to: status.as_str(),
            });
        }
        self.status = status;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Insert a shot at the given position. Does not change sequence status.
    pub fn insert_shot(&mut self, index: usize, shot: ShotPlan) {
        let index = index.min(self.shots.len());
        self.shots.insert(index, shot);
        self.updated_at = Utc::now();
    }

    /// Delete a shot by id. Does not change sequence status.
    pub fn delete_shot(&mut self, shot_id: &str) -> bool {
        let before = self.shots.len();
        self.shots.retain(|s| s.shot_id != shot_id);
        let removed = self.shots.len() != before;
        if removed {
            self.updated_at = Utc::now();
        }
        removed
    }

    /// All shots rendered?
    pub fn fully_rendered(&self) -> bool {
        !self.shots.is_empty() && self.shots.iter().all(|s| s.is_rendered())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shot::{PlanType, ShotRole, VisualBreakdown};

    fn breakdown() -> VisualBreakdown {
        serde_json::from_value(serde_json::json!({
            "scene": {"environment": "kitchen", "time_of_day": "day"},
            "framing": "wide"
        }))
        .unwrap()
    }

    #[test]
    fn test_status_advances_forward_only() {
        let mut seq = Sequence::new("test", "INT. KITCHEN - DAY");

        seq.advance_to(SequenceStatus::Analyzed).unwrap();
        seq.advance_to(SequenceStatus::Storyboarded).unwrap();

        // Reverting is rejected and the status stays put.
        assert!(seq.advance_to(SequenceStatus::Draft).is_err());
        assert_eq!(seq.status, SequenceStatus::Storyboarded);
    }

    #[test]
    fn test_advance_to_same_status_is_noop() {
        let mut seq = Sequence::new("test", "script");
        seq.advance_to(SequenceStatus::Analyzed).unwrap();
        seq.advance_to(SequenceStatus::Analyzed).unwrap();
        assert_eq!(seq.status, SequenceStatus::Analyzed);
    }

    #[test]
    fn test_shot_mutation_keeps_status() {
        let mut seq = Sequence::new("test", "script");
        seq.advance_to(SequenceStatus::Analyzed).unwrap();

        let shot = ShotPlan::new(PlanType::Custom, ShotRole::Sequential, "Ava enters", breakdown());
        let shot_id = shot.shot_id.clone();
        seq.insert_shot(0, shot);
        assert_eq!(seq.status, SequenceStatus::Analyzed);

        assert!(seq.delete_shot(&shot_id));
        assert!(!seq.delete_shot(&shot_id));
        assert_eq!(seq.status, SequenceStatus::Analyzed);
    }
}
