//! Entity registry.
//!
//! Tracks named visual assets at two scopes: global (project-wide) and local
//! (sequence-scoped). Resolution goes tag first, then exact normalized name,
//! then fuzzy name, always preferring the local scope. Ref tag numbers come
//! from a monotonic counter and are never reused after deletion.

use tracing::{debug, info};

use rboard_ai::{generate, TextCapability};
use rboard_models::{normalize_name, Entity, EntityKind, IdentifiedEntities, ImageResource};

use crate::error::{EngineError, EngineResult};
use crate::prompts;

/// The entity pool a resolution or identification runs against.
pub struct EntityRegistry {
    global: Vec<Entity>,
    local: Vec<Entity>,
    /// Next ref tag number; continues the numbering across both scopes so
    /// tags stay unique within any prompt that mixes them.
    next_ref: u32,
}

fn parse_ref_tag(tag: &str) -> Option<u32> {
    tag.trim()
        .strip_prefix("image ")
        .and_then(|n| n.trim().parse().ok())
}

impl EntityRegistry {
    /// Build a registry over existing pools. The ref counter resumes past
    /// the highest tag number present in either scope.
    pub fn new(global: Vec<Entity>, local: Vec<Entity>) -> Self {
        let next_ref = global
            .iter()
            .chain(local.iter())
            .filter_map(|e| parse_ref_tag(&e.ref_tag))
            .max()
            .map(|n| n + 1)
            .unwrap_or(1);
        Self {
            global,
            local,
            next_ref,
        }
    }

    pub fn global_entities(&self) -> &[Entity] {
        &self.global
    }

    pub fn local_entities(&self) -> &[Entity] {
        &self.local
    }

    fn next_ref_tag(&mut self) -> String {
        let tag = format!("image {}", self.next_ref);
        self.next_ref += 1;
        tag
    }

    /// Find an entity by ref tag or name, local scope first.
    pub fn find_entity(&self, tag_or_name: &str) -> Option<&Entity> {
        let query = tag_or_name.trim();

        // Exact ref tag match.
        for pool in [&self.local, &self.global] {
            if let Some(entity) = pool.iter().find(|e| e.ref_tag == query) {
                return Some(entity);
            }
        }

        // Exact normalized name match.
        let normalized = normalize_name(query);
        if normalized.is_empty() {
            return None;
        }
        for pool in [&self.local, &self.global] {
            if let Some(entity) = pool.iter().find(|e| e.normalized_name() == normalized) {
                return Some(entity);
            }
        }

        // Fuzzy: one normalized name contains the other. Catches lookups
        // like "Kitchen, sunlit" against an entity named "Kitchen".
        for pool in [&self.local, &self.global] {
            if let Some(entity) = pool.iter().find(|e| {
                let name = e.normalized_name();
                !name.is_empty() && (normalized.contains(&name) || name.contains(&normalized))
            }) {
                return Some(entity);
            }
        }

        None
    }

    /// Resolve a tag or name to image data. `None` is not an error: the
    /// entity may not exist, or may be text-only until an image is uploaded.
    pub fn resolve(&self, tag_or_name: &str) -> Option<ImageResource> {
        self.find_entity(tag_or_name).and_then(|e| e.image())
    }

    /// Identify characters/locations/items mentioned in a script, excluding
    /// everything already in the global pool. Newly identified names that
    /// normalize to an existing global entity are linked (copied-by-link)
    /// instead of duplicated. Returns the new local entities; they are also
    /// appended to the local pool.
    pub async fn identify(
        &mut self,
        text: &dyn TextCapability,
        script: &str,
    ) -> EngineResult<Vec<Entity>> {
        if script.trim().is_empty() {
            return Err(EngineError::invalid_input("script is empty"));
        }

        let known_names: Vec<&str> = self.global.iter().map(|e| e.name.as_str()).collect();
        let prompt = prompts::identify_prompt(script, &known_names);

        let identified: IdentifiedEntities = generate(text, &prompt).await?;
        debug!("Identification returned {} entities", identified.entities.len());

        let mut created = Vec::new();
        for found in identified.entities {
            let normalized = normalize_name(&found.name);
            if normalized.is_empty() {
                continue;
            }

            // Already present locally (by normalized name): nothing to do.
            if self
                .local
                .iter()
                .any(|e| e.normalized_name() == normalized)
            {
                continue;
            }

            let ref_tag = self.next_ref_tag();
            let entity = match self
                .global
                .iter()
                .find(|e| e.normalized_name() == normalized)
            {
                Some(global) => {
                    info!("Linking '{}' to existing global entity", found.name);
                    Entity::link_from_global(global, ref_tag)
                }
                None => Entity::new(found.name, found.kind, found.description, ref_tag),
            };

            self.local.push(entity.clone());
            created.push(entity);
        }

        info!("Identification created {} local entities", created.len());
        Ok(created)
    }

    /// Remove a local entity by id. The ref counter never rewinds, so the
    /// deleted tag number is not handed out again.
    pub fn delete_local(&mut self, id: &str) -> bool {
        let before = self.local.len();
        self.local.retain(|e| e.id != id);
        self.local.len() != before
    }

    /// A one-line-per-entity catalog for prompt interpolation.
    pub fn catalog(&self) -> String {
        let mut lines = Vec::new();
        for entity in self.local.iter().chain(self.global.iter()) {
            let kind = match entity.kind {
                EntityKind::Character => "character",
                EntityKind::Location => "location",
                EntityKind::Item => "item",
            };
            let has_image = if entity.has_image() {
                entity.ref_tag.as_str()
            } else {
                "no image"
            };
            lines.push(format!(
                "- {} ({}, {}): {}",
                entity.name, kind, has_image, entity.description
            ));
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine as _;
    use rboard_ai::{AiResult, TextCapability};

    struct FixedText(serde_json::Value);

    #[async_trait]
    impl TextCapability for FixedText {
        async fn generate_structured(
            &self,
            _prompt: &str,
            _schema: serde_json::Value,
        ) -> AiResult<serde_json::Value> {
            Ok(self.0.clone())
        }
    }

    fn entity_with_image(name: &str, kind: EntityKind, tag: &str) -> Entity {
        Entity::new(name, kind, "", tag).with_image(BASE64.encode(name.as_bytes()), "image/png")
    }

    #[test]
    fn test_resolve_prefers_tag_then_name_then_fuzzy() {
        let global = vec![entity_with_image("Ava", EntityKind::Character, "image 1")];
        let local = vec![entity_with_image("Kitchen", EntityKind::Location, "image 2")];
        let registry = EntityRegistry::new(global, local);

        assert!(registry.resolve("image 1").is_some());
        assert!(registry.resolve("ava").is_some());
        assert!(registry.resolve("The Kitchen, sunlit").is_some());
        assert!(registry.resolve("image 9").is_none());
    }

    #[test]
    fn test_resolve_local_scope_wins() {
        let global = vec![entity_with_image("Ava", EntityKind::Character, "image 1")];
        let local = vec![entity_with_image("Ava", EntityKind::Character, "image 2")];
        let registry = EntityRegistry::new(global, local);

        let found = registry.find_entity("Ava").unwrap();
        assert_eq!(found.ref_tag, "image 2");
    }

    #[test]
    fn test_text_only_entity_resolves_to_none() {
        let local = vec![Entity::new("Gun", EntityKind::Item, "revolver", "image 1")];
        let registry = EntityRegistry::new(Vec::new(), local);

        assert!(registry.find_entity("gun").is_some());
        assert!(registry.resolve("gun").is_none());
    }

    #[test]
    fn test_ref_counter_resumes_past_existing_tags() {
        let global = vec![entity_with_image("Ava", EntityKind::Character, "image 3")];
        let mut registry = EntityRegistry::new(global, Vec::new());
        assert_eq!(registry.next_ref_tag(), "image 4");
        assert_eq!(registry.next_ref_tag(), "image 5");
    }

    #[test]
    fn test_deleted_tag_numbers_not_reused() {
        let mut registry = EntityRegistry::new(Vec::new(), Vec::new());
        let tag = registry.next_ref_tag();
        assert_eq!(tag, "image 1");

        let entity = Entity::new("Prop", EntityKind::Item, "", tag);
        let id = entity.id.clone();
        registry.local.push(entity);
        assert!(registry.delete_local(&id));

        assert_eq!(registry.next_ref_tag(), "image 2");
    }

    #[tokio::test]
    async fn test_identify_links_existing_global_instead_of_duplicating() {
        let global = vec![entity_with_image("Ava", EntityKind::Character, "image 1")];
        let global_id = global[0].id.clone();
        let mut registry = EntityRegistry::new(global, Vec::new());

        let text = FixedText(serde_json::json!({
            "entities": [
                {"name": "Ava", "type": "character"},
                {"name": "Kitchen", "type": "location"}
            ]
        }));

        let created = registry.identify(&text, "INT. KITCHEN - DAY\nAva pours coffee.")
            .await
            .unwrap();

        assert_eq!(created.len(), 2);

        let ava: Vec<_> = created.iter().filter(|e| e.name == "Ava").collect();
        assert_eq!(ava.len(), 1);
        assert_eq!(ava[0].linked_to.as_deref(), Some(global_id.as_str()));
        // The link copied the global image.
        assert!(ava[0].has_image());

        let kitchen = created.iter().find(|e| e.name == "Kitchen").unwrap();
        assert!(kitchen.linked_to.is_none());
        assert_eq!(kitchen.ref_tag, "image 3");
    }

    #[tokio::test]
    async fn test_identify_skips_entities_already_local() {
        let local = vec![Entity::new("Ava", EntityKind::Character, "", "image 1")];
        let mut registry = EntityRegistry::new(Vec::new(), local);

        let text = FixedText(serde_json::json!({
            "entities": [{"name": "AVA", "type": "character"}]
        }));

        let created = registry.identify(&text, "Ava enters.").await.unwrap();
        assert!(created.is_empty());
        assert_eq!(registry.local_entities().len(), 1);
    }

    #[tokio::test]
    async fn test_identify_rejects_empty_script() {
        let mut registry = EntityRegistry::new(Vec::new(), Vec::new());
        let text = FixedText(serde_json::json!({"entities": []}));
        let result = registry.identify(&text, "   ").await;
        assert!(matches!(result, Err(EngineError::InvalidInput(_))));
    }
}
