//! Visual asset definitions.
//!
//! Entities are the named visual assets of a project: characters, locations
//! and props. They exist at two scopes: global (project-wide) and local
//! (sequence-scoped). A local entity may link to a global one instead of
//! duplicating it.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of visual asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A person appearing on screen
    Character,
    /// An environment or set
    Location,
    /// A prop or object
    Item,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Character => "character",
            EntityKind::Location => "location",
            EntityKind::Item => "item",
        }
    }
}

/// Decoded image data for an asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageResource {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// A named visual asset.
///
/// Identity within a scope is by normalized name (see [`normalize_name`]).
/// The `ref_tag` ("image N") is a human-readable pointer that stays valid for
/// as long as the entity exists; tag numbers are never reused.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Entity {
    /// Unique entity ID (UUID)
    pub id: String,

    /// Reference tag, e.g. "image 3", unique within its scope
    pub ref_tag: String,

    /// Display name
    pub name: String,

    /// Asset kind
    pub kind: EntityKind,

    /// Free-text description
    #[serde(default)]
    pub description: String,

    /// Image payload, base64-encoded (text-only entities have none)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_base64: Option<String>,

    /// MIME type of the image payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    /// ID of the global entity this local entity links to, if any.
    /// A link copies image/name but keeps its own lifecycle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_to: Option<String>,
}

impl Entity {
    /// Create a new text-only entity.
    pub fn new(
        name: impl Into<String>,
        kind: EntityKind,
        description: impl Into<String>,
        ref_tag: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            ref_tag: ref_tag.into(),
            name: name.into(),
            kind,
            description: description.into(),
            image_base64: None,
            mime_type: None,
            linked_to: None,
        }
    }

    /// Create a local entity linked to a global one.
    ///
    /// Copies the global entity's name, description and image but gets a
    /// fresh id and its own ref tag. The link is non-owning: deleting the
    /// local copy never touches the global asset.
    pub fn link_from_global(global: &Entity, ref_tag: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            ref_tag: ref_tag.into(),
            name: global.name.clone(),
            kind: global.kind,
            description: global.description.clone(),
            image_base64: global.image_base64.clone(),
            mime_type: global.mime_type.clone(),
            linked_to: Some(global.id.clone()),
        }
    }

    /// Attach an image payload.
    pub fn with_image(mut self, image_base64: impl Into<String>, mime_type: impl Into<String>) -> Self {
        self.image_base64 = Some(image_base64.into());
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Normalized name used for identity comparison within a scope.
    pub fn normalized_name(&self) -> String {
        normalize_name(&self.name)
    }

    /// Whether the entity carries image data.
    pub fn has_image(&self) -> bool {
        self.image_base64.is_some()
    }

    /// Decode the image payload, if present and well-formed.
    pub fn image(&self) -> Option<ImageResource> {
        let encoded = self.image_base64.as_deref()?;
        let bytes = BASE64.decode(encoded.as_bytes()).ok()?;
        Some(ImageResource {
            bytes,
            mime_type: self
                .mime_type
                .clone()
                .unwrap_or_else(|| "image/png".to_string()),
        })
    }
}

/// Normalize a name for identity comparison: lowercase, alphanumerics only.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}
