//! Shared data models for the ReelBoard backend.
//!
//! This crate provides Serde-serializable types for:
//! - Visual assets (characters, locations, props) and their reference tags
//! - Shot plans and the structured visual breakdown
//! - Sequences and their lifecycle status
//! - Continuity issues and mechanical fixes
//! - Jobs tracked by the in-process registry

pub mod continuity;
pub mod entity;
pub mod job;
pub mod plan;
pub mod sequence;
pub mod shot;

// Re-export common types
pub use continuity::{ContinuityIssue, FixData, FixField, IssueCategory, IssueSeverity};
pub use entity::{normalize_name, Entity, EntityKind, ImageResource};
pub use job::{JobId, JobKind, JobRecord, JobState};
pub use plan::{
    CharacterContext, IdentifiedEntities, IdentifiedEntity, PlannedShot, SceneContext, ShotDetail,
    ShotListPlan,
};
pub use sequence::{Sequence, SequenceError, SequenceStatus};
pub use shot::{
    Appearance, CameraSpec, CharacterShot, ObjectShot, PlanType, RefMark, SceneSpec, ShotPlan,
    ShotRole, VisualBreakdown,
};
