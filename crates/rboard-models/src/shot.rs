//! Shot plan definitions.
//!
//! A [`ShotPlan`] is one technical camera shot: the action text it covers,
//! camera specs and the structured [`VisualBreakdown`] the image model is
//! prompted from. Every sub-object that points at visual material carries a
//! [`RefMark`] holding both the current reference tag and, once remapping has
//! happened, the original pre-remap tag.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How the shot was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlanType {
    /// Part of a planned sequence
    #[default]
    Sequence,
    /// Ad-hoc shot inserted independently of the planned sequence
    Custom,
}

/// Continuity role of a shot.
///
/// The master shot anchors spatial layout for the whole sequence. The role is
/// explicit rather than derived from array position, so inserting or
/// reordering shots cannot silently change which shot is the anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ShotRole {
    Master,
    #[default]
    Sequential,
}

/// A reference-image pointer with remap history.
///
/// `reference_image` always holds the tag as it should appear in the next
/// rendered prompt. `original_ref` preserves the tag the shot was first
/// planned with; it is set exactly once, at the first remap, and never
/// overwritten, so a shot can be re-resolved later against the entity pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RefMark {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_ref: Option<String>,
}

impl RefMark {
    /// A mark pointing at the given tag, with no remap history.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            reference_image: Some(tag.into()),
            original_ref: None,
        }
    }

    /// An empty mark (no visual reference).
    pub fn none() -> Self {
        Self::default()
    }

    /// The tag to resolve against the entity pool: the original tag when one
    /// was preserved, otherwise the current tag.
    pub fn lookup_tag(&self) -> Option<&str> {
        self.original_ref
            .as_deref()
            .or(self.reference_image.as_deref())
    }

    /// Point the mark at a new final tag (or clear it when the reference did
    /// not survive budgeting). Preserves the pre-remap tag on first call.
    pub fn remap(&mut self, new_tag: Option<String>) {
        if self.original_ref.is_none() {
            self.original_ref = self.reference_image.take();
        }
        self.reference_image = new_tag;
    }

    pub fn is_empty(&self) -> bool {
        self.reference_image.is_none() && self.original_ref.is_none()
    }
}

/// Scene-level portion of a breakdown.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SceneSpec {
    /// Environment description
    pub environment: String,
    /// Declared time of day, e.g. "day", "dusk"
    pub time_of_day: String,
    #[serde(default)]
    pub mood: String,
    #[serde(default)]
    pub palette: String,
}

/// Appearance of a character within one shot.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Appearance {
    /// Outfit/look description, tracked for continuity
    pub description: String,
    #[serde(default)]
    pub expression: String,
}

/// One character as staged in one shot.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CharacterShot {
    pub name: String,

    #[serde(flatten)]
    pub reference: RefMark,

    /// Free-text position in frame, e.g. "left of frame, seated"
    #[serde(default)]
    pub position: String,

    /// Optional stable blocking marker carried across shots
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocking_id: Option<String>,

    pub appearance: Appearance,

    #[serde(default)]
    pub actions: String,

    #[serde(default)]
    pub lighting_effect: String,
}

impl CharacterShot {
    /// All free text the continuity checker inspects for this character.
    pub fn continuity_text(&self) -> String {
        format!(
            "{} {} {}",
            self.actions, self.appearance.description, self.appearance.expression
        )
    }
}

/// One prop/object as staged in one shot.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ObjectShot {
    pub name: String,

    #[serde(flatten)]
    pub reference: RefMark,

    #[serde(default)]
    pub details: String,

    #[serde(default)]
    pub action: String,
}

/// Camera configuration for a shot.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CameraSpec {
    #[serde(default)]
    pub lens: String,
    #[serde(default)]
    pub settings: String,
}

/// Structured technical spec for one shot.
///
/// This is the target of the per-shot detail expansion call; `environment`,
/// `time_of_day` and `framing` are required so a shape mismatch fails at
/// parse time rather than flowing downstream.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VisualBreakdown {
    pub scene: SceneSpec,

    /// Ordered character staging
    #[serde(default)]
    pub characters: Vec<CharacterShot>,

    /// Ordered object staging
    #[serde(default)]
    pub objects: Vec<ObjectShot>,

    /// Framing and composition
    pub framing: String,

    #[serde(default)]
    pub camera: CameraSpec,

    #[serde(default)]
    pub lighting: String,

    /// Free-text director notes; may embed reference tags
    #[serde(default)]
    pub director_notes: String,
}

/// One planned camera shot.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ShotPlan {
    pub shot_id: String,

    #[serde(default)]
    pub plan_type: PlanType,

    #[serde(default)]
    pub role: ShotRole,

    #[serde(default)]
    pub camera_specs: String,

    /// The literal script text this shot covers
    pub action_segment: String,

    pub visual_breakdown: VisualBreakdown,

    /// Names of entities relevant to this shot
    #[serde(default)]
    pub relevant_entities: Vec<String>,

    /// Locator of the rendered image, once rendered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    /// A render is currently in flight for this shot
    #[serde(default)]
    pub loading: bool,

    /// The shot is open in an editor session
    #[serde(default)]
    pub editing: bool,
}

impl ShotPlan {
    /// Create a shot plan with a fresh id.
    pub fn new(
        plan_type: PlanType,
        role: ShotRole,
        action_segment: impl Into<String>,
        visual_breakdown: VisualBreakdown,
    ) -> Self {
        Self {
            shot_id: Uuid::new_v4().to_string(),
            plan_type,
            role,
            camera_specs: String::new(),
            action_segment: action_segment.into(),
            visual_breakdown,
            relevant_entities: Vec::new(),
            image_url: None,
            loading: false,
            editing: false,
        }
    }

    pub fn is_master(&self) -> bool {
        self.role == ShotRole::Master
    }

    pub fn is_rendered(&self) -> bool {
        self.image_url.is_some()
    }

    /// Attach the rendered image locator and clear the loading flag.
    pub fn mark_rendered(&mut self, locator: impl Into<String>) {
        self.image_url = Some(locator.into());
        self.loading = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refmark_remap_preserves_original_once() {
        let mut mark = RefMark::new("image 5");
        mark.remap(Some("image 2".to_string()));
        assert_eq!(mark.reference_image.as_deref(), Some("image 2"));
        assert_eq!(mark.original_ref.as_deref(), Some("image 5"));

        // A second remap must not overwrite the preserved original.
        mark.remap(Some("image 1".to_string()));
        assert_eq!(mark.reference_image.as_deref(), Some("image 1"));
        assert_eq!(mark.original_ref.as_deref(), Some("image 5"));
    }

    #[test]
    fn test_refmark_remap_to_none_keeps_lookup_tag() {
        let mut mark = RefMark::new("image 7");
        mark.remap(None);
        assert!(mark.reference_image.is_none());
        assert_eq!(mark.lookup_tag(), Some("image 7"));
    }

    #[test]
    fn test_refmark_flattens_into_parent_json() {
        let character = CharacterShot {
            name: "Ava".to_string(),
            reference: RefMark::new("image 3"),
            position: "left of frame".to_string(),
            blocking_id: None,
            appearance: Appearance {
                description: "red coat".to_string(),
                expression: String::new(),
            },
            actions: String::new(),
            lighting_effect: String::new(),
        };

        let json = serde_json::to_value(&character).unwrap();
        assert_eq!(json["reference_image"], "image 3");
        assert!(json.get("original_ref").is_none());
    }

    #[test]
    fn test_breakdown_rejects_missing_required_fields() {
        // No framing: must fail to parse, not default.
        let raw = serde_json::json!({
            "scene": {"environment": "kitchen", "time_of_day": "day"}
        });
        assert!(serde_json::from_value::<VisualBreakdown>(raw).is_err());

        // No time_of_day either.
        let raw = serde_json::json!({
            "scene": {"environment": "kitchen"},
            "framing": "wide"
        });
        assert!(serde_json::from_value::<VisualBreakdown>(raw).is_err());
    }
}
