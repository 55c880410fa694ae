//! Staged planning outputs.
//!
//! These are the structured targets of the text-understanding calls: scene
//! pre-analysis, the shot list, per-shot detail and entity identification.
//! Each derives `JsonSchema` so the schema sent with the call is generated
//! from the type it must parse back into.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::entity::EntityKind;
use crate::shot::VisualBreakdown;

/// Per-character context extracted during scene pre-analysis.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CharacterContext {
    pub name: String,
    /// Outfit description from stage directions (dialogue is invisible here)
    #[serde(default)]
    pub outfit: String,
    #[serde(default)]
    pub accessories: Vec<String>,
}

/// Output of scene pre-analysis (stage 1).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SceneContext {
    pub environment: String,
    pub time_of_day: String,
    #[serde(default)]
    pub mood: String,
    #[serde(default)]
    pub characters: Vec<CharacterContext>,
    /// Persistent props physically present in the scene
    #[serde(default)]
    pub props: Vec<String>,
}

/// One entry of the planned shot list (stage 2).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PlannedShot {
    /// 1-based position in the sequence
    pub index: u32,
    pub summary: String,
    /// The literal action text this shot covers
    pub action_segment: String,
}

/// Output of shot list planning (stage 2). The planning stage decides the
/// shot count itself, driven by narrative beats.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ShotListPlan {
    pub shots: Vec<PlannedShot>,
}

/// Output of per-shot detail expansion (stage 3).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ShotDetail {
    #[serde(default)]
    pub camera_specs: String,
    pub visual_breakdown: VisualBreakdown,
    #[serde(default)]
    pub relevant_entities: Vec<String>,
}

/// One entity found during identification.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IdentifiedEntity {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntityKind,
    #[serde(default)]
    pub description: String,
}

/// Output of entity identification.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IdentifiedEntities {
    pub entities: Vec<IdentifiedEntity>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identified_entity_uses_type_key() {
        let raw = serde_json::json!({"name": "Ava", "type": "character"});
        let entity: IdentifiedEntity = serde_json::from_value(raw).unwrap();
        assert_eq!(entity.kind, EntityKind::Character);
    }

    #[test]
    fn test_scene_context_defaults() {
        let raw = serde_json::json!({"environment": "kitchen", "time_of_day": "day"});
        let ctx: SceneContext = serde_json::from_value(raw).unwrap();
        assert!(ctx.characters.is_empty());
        assert!(ctx.props.is_empty());
    }
}
