//! Reference-image selection, budgeting and tag remapping.
//!
//! For one shot, collect every candidate reference image (master shot,
//! previous shot, environment, characters, worn objects), rank them by a
//! fixed priority, truncate to the hard cap, then renumber everything so the
//! prompt the image model sees uses a dense `image 1..K` space where every
//! tag is backed by an attached image. The image model cannot be trusted to
//! ignore extra or missing numbered references, so any tag that did not
//! survive truncation is sanitized to a generic placeholder rather than left
//! dangling.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use futures::join;
use regex::Regex;
use tracing::{debug, warn};

use rboard_models::{ImageResource, ShotPlan};
use rboard_store::MediaStore;

use crate::error::EngineResult;
use crate::planner::ShotAnchors;
use crate::registry::EntityRegistry;

/// Hard cap on reference images per generation request.
pub const MAX_REFERENCE_IMAGES: usize = rboard_ai::MAX_IMAGE_PARTS;

/// Synthetic tag for the master-shot anchor image.
pub const REF_MASTER: &str = "REF_MASTER";
/// Synthetic tag for the previous-shot anchor image.
pub const REF_PREVIOUS: &str = "REF_PREVIOUS";

/// Placeholder substituted for any reference that did not survive budgeting.
pub const SANITIZED_REF: &str = "[reference]";

const PRIORITY_MASTER: u8 = 100;
const PRIORITY_PREVIOUS: u8 = 98;
const PRIORITY_CHARACTER: u8 = 95;
const PRIORITY_WORN_OBJECT: u8 = 90;
const PRIORITY_ENVIRONMENT: u8 = 80;
const PRIORITY_OBJECT: u8 = 60;

/// Object names matching these are likely to affect character identity
/// continuity and rank above plain props.
const WORN_KEYWORDS: &[&str] = &[
    "suit", "helmet", "gloves", "outfit", "armor", "armour", "clothing", "uniform", "costume",
    "jacket", "coat", "boots", "mask", "hat", "cape", "dress",
];

/// One candidate reference image, before budgeting.
#[derive(Debug, Clone)]
pub struct RefCandidate {
    /// The tag this candidate is known by in the shot's text/structure
    pub original_tag: String,
    /// A second tag pointing at the same image (e.g. the entity's own ref
    /// tag when the shot used a different one)
    pub alias: Option<String>,
    pub description: String,
    pub image: ImageResource,
    pub priority: u8,
}

/// One surviving reference, renumbered into the dense tag space.
#[derive(Debug, Clone)]
pub struct ReferenceImage {
    /// Final tag, "image 1".."image K"
    pub tag: String,
    pub description: String,
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// Final payload for one shot: images in tag order, the remapped shot, and
/// the fully sanitized prompt text.
#[derive(Debug, Clone)]
pub struct ResolvedReferences {
    pub images: Vec<ReferenceImage>,
    pub shot: ShotPlan,
    pub prompt: String,
    /// original tag -> final tag, for every survivor
    pub mapping: HashMap<String, String>,
}

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bimage\s+(\d+)\b|REF_MASTER|REF_PREVIOUS").expect("valid tag pattern")
    })
}

/// Canonical form of a tag for mapping lookups.
fn canonical_tag(tag: &str) -> String {
    let trimmed = tag.trim();
    if trimmed.eq_ignore_ascii_case(REF_MASTER) {
        return REF_MASTER.to_string();
    }
    if trimmed.eq_ignore_ascii_case(REF_PREVIOUS) {
        return REF_PREVIOUS.to_string();
    }
    match trimmed
        .to_ascii_lowercase()
        .strip_prefix("image")
        .map(|n| n.trim().to_string())
    {
        Some(n) if !n.is_empty() => format!("image {}", n),
        _ => trimmed.to_string(),
    }
}

fn is_worn(name: &str) -> bool {
    let name = name.to_lowercase();
    WORN_KEYWORDS.iter().any(|k| name.contains(k))
}

/// Collect candidates in discovery order: master, previous, environment,
/// characters, objects. Duplicate tags are collected once.
pub fn collect_candidates(
    shot: &ShotPlan,
    registry: &EntityRegistry,
    master: Option<ImageResource>,
    previous: Option<ImageResource>,
) -> Vec<RefCandidate> {
    let mut candidates = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    let mut push = |candidate: RefCandidate, seen: &mut HashSet<String>| {
        if seen.insert(canonical_tag(&candidate.original_tag)) {
            candidates.push(candidate);
        }
    };

    if let Some(image) = master {
        push(
            RefCandidate {
                original_tag: REF_MASTER.to_string(),
                alias: None,
                description: "Master shot: overall spatial layout anchor".to_string(),
                image,
                priority: PRIORITY_MASTER,
            },
            &mut seen,
        );
    }

    if let Some(image) = previous {
        push(
            RefCandidate {
                original_tag: REF_PREVIOUS.to_string(),
                alias: None,
                description: "Previous shot: immediate continuity reference".to_string(),
                image,
                priority: PRIORITY_PREVIOUS,
            },
            &mut seen,
        );
    }

    let breakdown = &shot.visual_breakdown;

    if let Some(entity) = registry.find_entity(&breakdown.scene.environment) {
        if let Some(image) = entity.image() {
            push(
                RefCandidate {
                    original_tag: entity.ref_tag.clone(),
                    alias: None,
                    description: format!("Environment: {}", entity.name),
                    image,
                    priority: PRIORITY_ENVIRONMENT,
                },
                &mut seen,
            );
        }
    }

    for character in &breakdown.characters {
        let entity = character
            .reference
            .lookup_tag()
            .and_then(|tag| registry.find_entity(tag))
            .or_else(|| registry.find_entity(&character.name));

        let Some(entity) = entity else {
            debug!("No entity for character '{}'", character.name);
            continue;
        };
        let Some(image) = entity.image() else {
            continue;
        };

        let original_tag = character
            .reference
            .lookup_tag()
            .unwrap_or(entity.ref_tag.as_str())
            .to_string();
        let alias =
            (canonical_tag(&entity.ref_tag) != canonical_tag(&original_tag)).then(|| entity.ref_tag.clone());

        push(
            RefCandidate {
                original_tag,
                alias,
                description: format!("Character: {}", entity.name),
                image,
                priority: PRIORITY_CHARACTER,
            },
            &mut seen,
        );
    }

    for object in &breakdown.objects {
        let entity = object
            .reference
            .lookup_tag()
            .and_then(|tag| registry.find_entity(tag))
            .or_else(|| registry.find_entity(&object.name));

        let Some(entity) = entity else {
            debug!("No entity for object '{}'", object.name);
            continue;
        };
        let Some(image) = entity.image() else {
            continue;
        };

        let original_tag = object
            .reference
            .lookup_tag()
            .unwrap_or(entity.ref_tag.as_str())
            .to_string();
        let alias =
            (canonical_tag(&entity.ref_tag) != canonical_tag(&original_tag)).then(|| entity.ref_tag.clone());

        let priority = if is_worn(&object.name) {
            PRIORITY_WORN_OBJECT
        } else {
            PRIORITY_OBJECT
        };

        push(
            RefCandidate {
                original_tag,
                alias,
                description: format!("Object: {}", entity.name),
                image,
                priority,
            },
            &mut seen,
        );
    }

    candidates
}

/// Rank, truncate and renumber candidates.
///
/// The sort is stable (priority descending, discovery order on ties), so the
/// same candidate set always yields the same final tag assignment. Returns
/// the survivors in final-tag order plus the original-to-final tag mapping.
pub fn budget_candidates(
    mut candidates: Vec<RefCandidate>,
) -> (Vec<RefCandidate>, HashMap<String, String>) {
    candidates.sort_by(|a, b| b.priority.cmp(&a.priority));

    if candidates.len() > MAX_REFERENCE_IMAGES {
        let dropped: Vec<&str> = candidates[MAX_REFERENCE_IMAGES..]
            .iter()
            .map(|c| c.original_tag.as_str())
            .collect();
        warn!(
            "Reference budget exceeded: dropping {} candidates ({})",
            dropped.len(),
            dropped.join(", ")
        );
        candidates.truncate(MAX_REFERENCE_IMAGES);
    }

    let mut mapping = HashMap::new();
    for (index, candidate) in candidates.iter().enumerate() {
        let final_tag = format!("image {}", index + 1);
        mapping.insert(canonical_tag(&candidate.original_tag), final_tag.clone());
        if let Some(alias) = &candidate.alias {
            mapping.insert(canonical_tag(alias), final_tag.clone());
        }
    }

    (candidates, mapping)
}

/// Rewrite every tag occurrence in one pass: mapped tags become their final
/// tag, everything else becomes the sanitized placeholder. Single-pass
/// replacement means an already-rewritten tag is never rewritten again.
pub fn rewrite_tags(text: &str, mapping: &HashMap<String, String>) -> String {
    tag_regex()
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let whole = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
            mapping
                .get(&canonical_tag(whole))
                .cloned()
                .unwrap_or_else(|| SANITIZED_REF.to_string())
        })
        .into_owned()
}

/// Backstop over assembled prompt text: any numeric tag above the attached
/// image count, and any leftover synthetic tag, is sanitized. Runs after
/// field-level rewriting so nothing the model sees can dangle.
pub fn sanitize_overflow(text: &str, attached: usize) -> String {
    tag_regex()
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let whole = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
            match caps.get(1) {
                Some(number) => match number.as_str().parse::<usize>() {
                    Ok(n) if n >= 1 && n <= attached => whole.to_string(),
                    _ => SANITIZED_REF.to_string(),
                },
                None => SANITIZED_REF.to_string(),
            }
        })
        .into_owned()
}

/// Clone the shot with every structured reference remapped to its final tag
/// and every prose field rewritten. `original_ref` is preserved on first
/// remap so the shot can be re-resolved later.
fn remap_shot(shot: &ShotPlan, mapping: &HashMap<String, String>) -> ShotPlan {
    let mut shot = shot.clone();
    let breakdown = &mut shot.visual_breakdown;

    for character in &mut breakdown.characters {
        if !character.reference.is_empty() {
            let final_tag = character
                .reference
                .lookup_tag()
                .and_then(|tag| mapping.get(&canonical_tag(tag)))
                .cloned();
            character.reference.remap(final_tag);
        }
        character.appearance.description = rewrite_tags(&character.appearance.description, mapping);
        character.actions = rewrite_tags(&character.actions, mapping);
        character.lighting_effect = rewrite_tags(&character.lighting_effect, mapping);
    }

    for object in &mut breakdown.objects {
        if !object.reference.is_empty() {
            let final_tag = object
                .reference
                .lookup_tag()
                .and_then(|tag| mapping.get(&canonical_tag(tag)))
                .cloned();
            object.reference.remap(final_tag);
        }
        object.details = rewrite_tags(&object.details, mapping);
        object.action = rewrite_tags(&object.action, mapping);
    }

    breakdown.framing = rewrite_tags(&breakdown.framing, mapping);
    breakdown.lighting = rewrite_tags(&breakdown.lighting, mapping);
    breakdown.director_notes = rewrite_tags(&breakdown.director_notes, mapping);

    shot
}

/// Assemble the final prompt text from the remapped shot. Reference tags are
/// interpolated into prose only here, after truncation and remapping are
/// frozen.
fn build_prompt(
    shot: &ShotPlan,
    images: &[ReferenceImage],
    mapping: &HashMap<String, String>,
) -> String {
    let breakdown = &shot.visual_breakdown;
    let scene = &breakdown.scene;
    let mut lines = Vec::new();

    lines.push(format!(
        "A storyboard frame. Scene: {}; time of day: {}.",
        scene.environment, scene.time_of_day
    ));
    if !scene.mood.is_empty() {
        lines.push(format!("Mood: {}.", scene.mood));
    }
    if !scene.palette.is_empty() {
        lines.push(format!("Palette: {}.", scene.palette));
    }
    lines.push(format!("Framing: {}.", breakdown.framing));
    if !breakdown.camera.lens.is_empty() || !breakdown.camera.settings.is_empty() {
        lines.push(format!(
            "Camera: {} {}.",
            breakdown.camera.lens, breakdown.camera.settings
        ));
    }
    if !breakdown.lighting.is_empty() {
        lines.push(format!("Lighting: {}.", breakdown.lighting));
    }
    if !shot.camera_specs.is_empty() {
        lines.push(format!("Shot specs: {}.", shot.camera_specs));
    }

    if !breakdown.characters.is_empty() {
        lines.push("Characters:".to_string());
        for character in &breakdown.characters {
            let mut parts = vec![character.name.clone()];
            if let Some(tag) = &character.reference.reference_image {
                parts.push(format!("(see {})", tag));
            }
            if !character.position.is_empty() {
                parts.push(format!("at {}", character.position));
            }
            if !character.appearance.description.is_empty() {
                parts.push(format!("wearing {}", character.appearance.description));
            }
            if !character.appearance.expression.is_empty() {
                parts.push(format!("expression {}", character.appearance.expression));
            }
            if !character.actions.is_empty() {
                parts.push(character.actions.clone());
            }
            if !character.lighting_effect.is_empty() {
                parts.push(format!("lit by {}", character.lighting_effect));
            }
            lines.push(format!("- {}", parts.join(", ")));
        }
    }

    if !breakdown.objects.is_empty() {
        lines.push("Objects:".to_string());
        for object in &breakdown.objects {
            let mut parts = vec![object.name.clone()];
            if let Some(tag) = &object.reference.reference_image {
                parts.push(format!("(see {})", tag));
            }
            if !object.details.is_empty() {
                parts.push(object.details.clone());
            }
            if !object.action.is_empty() {
                parts.push(object.action.clone());
            }
            lines.push(format!("- {}", parts.join(", ")));
        }
    }

    if let Some(tag) = mapping.get(REF_MASTER) {
        lines.push(format!(
            "Match the overall spatial layout of {} (the master shot).",
            tag
        ));
    }
    if let Some(tag) = mapping.get(REF_PREVIOUS) {
        lines.push(format!(
            "Maintain continuity with {} (the previous frame).",
            tag
        ));
    }

    if !breakdown.director_notes.is_empty() {
        lines.push(format!("Notes: {}", breakdown.director_notes));
    }

    if !images.is_empty() {
        lines.push("Attached references:".to_string());
        for image in images {
            lines.push(format!("- {}: {}", image.tag, image.description));
        }
    }

    sanitize_overflow(&lines.join("\n"), images.len())
}

async fn fetch_anchor(store: &dyn MediaStore, locator: Option<&str>) -> Option<ImageResource> {
    let locator = locator?;
    match store.get(locator).await {
        Ok(object) => Some(ImageResource {
            bytes: object.bytes,
            mime_type: object.mime_type,
        }),
        Err(e) => {
            // An anchor that no longer resolves drops out of the candidate
            // set; the shot still renders without it.
            warn!("Anchor {} unavailable: {}", locator, e);
            None
        }
    }
}

/// Resolve one shot's references end to end: fetch anchors, collect and
/// budget candidates, remap the shot, and emit the final image-plus-text
/// payload in tag order.
pub async fn resolve_references(
    shot: &ShotPlan,
    registry: &EntityRegistry,
    store: &dyn MediaStore,
    anchors: &ShotAnchors,
) -> EngineResult<ResolvedReferences> {
    // Anchor fetches are independent reads; only assembly is ordered.
    let (master, previous) = join!(
        fetch_anchor(store, anchors.master_url.as_deref()),
        fetch_anchor(store, anchors.previous_url.as_deref()),
    );

    let candidates = collect_candidates(shot, registry, master, previous);
    let (survivors, mapping) = budget_candidates(candidates);

    let images: Vec<ReferenceImage> = survivors
        .into_iter()
        .enumerate()
        .map(|(index, candidate)| ReferenceImage {
            tag: format!("image {}", index + 1),
            description: candidate.description,
            bytes: candidate.image.bytes,
            mime_type: candidate.image.mime_type,
        })
        .collect();

    let remapped = remap_shot(shot, &mapping);
    let prompt = build_prompt(&remapped, &images, &mapping);

    debug!(
        "Resolved {} reference images for shot {}",
        images.len(),
        shot.shot_id
    );

    Ok(ResolvedReferences {
        images,
        shot: remapped,
        prompt,
        mapping,
    })
}
