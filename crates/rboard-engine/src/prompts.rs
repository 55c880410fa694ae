//! Prompt construction for the staged analysis calls.
//!
//! Wording here is deliberately plain; the structural rules that downstream
//! code depends on (dialogue invisibility, previous-shot grounding, the
//! synthetic anchor tags) are stated in the prompt because they are enforced
//! by construction, not re-validated from the responses.

use rboard_models::{PlannedShot, SceneContext};

use crate::refs::{REF_MASTER, REF_PREVIOUS};

/// Entity identification prompt. Known global entities are excluded up
/// front; the dialogue rule keeps spoken-about objects out of the pool.
pub fn identify_prompt(script: &str, known_names: &[&str]) -> String {
    let known = if known_names.is_empty() {
        "none".to_string()
    } else {
        known_names.join(", ")
    };

    format!(
        r#"Identify every character, location and item that is VISUALLY PRESENT in this film script.

Rules:
- Content inside quoted dialogue is invisible: something merely spoken about is NOT present. Only stage directions and action text establish physical presence.
- Do not include any of these already-known entities: {known}.
- Use type "character" for people, "location" for environments, "item" for props.

SCRIPT:
{script}
"#
    )
}

/// Stage 1: scene pre-analysis.
pub fn scene_analysis_prompt(script: &str) -> String {
    format!(
        r#"Analyze this film script for visual production planning.

Extract:
- The environment and time of day.
- For each character: outfit and accessory descriptions as established by stage directions.
- Persistent props physically present in the scene.

Content inside quoted dialogue is invisible to this analysis: an object a character talks about is not physically present unless the action text says so.

SCRIPT:
{script}
"#
    )
}

/// Stage 2: shot list planning.
pub fn shot_list_prompt(script: &str, scene: &SceneContext) -> String {
    let scene_json = serde_json::to_string(scene).unwrap_or_default();
    format!(
        r#"Break this script into an ordered list of technical camera shots.

Choose the shot count yourself, driven by narrative beats. For each shot give its 1-based index, a one-line summary, and the literal action text it covers (copy it from the script, do not paraphrase).

SCENE CONTEXT:
{scene_json}

SCRIPT:
{script}
"#
    )
}

/// Stage 3: per-shot detail expansion.
///
/// Every shot after the first receives the previous shot's full JSON so
/// spatial and identity decisions stay grounded in what was already staged.
pub fn shot_detail_prompt(
    planned: &PlannedShot,
    scene: &SceneContext,
    catalog: &str,
    previous_shot_json: Option<&str>,
    has_master_anchor: bool,
    has_previous_anchor: bool,
) -> String {
    let scene_json = serde_json::to_string(scene).unwrap_or_default();

    let mut prompt = format!(
        r#"Produce the full visual breakdown for shot {} of a storyboard sequence.

Shot summary: {}
Action covered:
{}

SCENE CONTEXT:
{}

AVAILABLE REFERENCE IMAGES (use the exact "image N" tag of an entity as its reference_image; leave it out for entities marked "no image"):
{}
"#,
        planned.index, planned.summary, planned.action_segment, scene_json, catalog
    );

    if let Some(previous) = previous_shot_json {
        prompt.push_str(&format!(
            r#"
PREVIOUS SHOT (full breakdown; keep character identity, outfits, lighting and spatial blocking consistent with it unless the action says otherwise):
{previous}
"#
        ));
    } else {
        prompt.push_str(
            "\nThis is the MASTER shot: it anchors the spatial layout for the whole sequence. Establish clear character positions.\n",
        );
    }

    if has_master_anchor {
        prompt.push_str(&format!(
            "\nWhen the layout must match the master shot, refer to it in director_notes as {REF_MASTER}.\n"
        ));
    }
    if has_previous_anchor {
        prompt.push_str(&format!(
            "Refer to the immediately preceding rendered frame as {REF_PREVIOUS} where continuity with it matters.\n"
        ));
    }

    prompt
}

/// Ad-hoc single-shot analysis, independent of any planned sequence.
pub fn custom_shot_prompt(description: &str, catalog: &str) -> String {
    format!(
        r#"Produce the full visual breakdown for a single storyboard shot from this description:

{description}

AVAILABLE REFERENCE IMAGES (use the exact "image N" tag of an entity as its reference_image; leave it out for entities marked "no image"):
{catalog}
"#
    )
}

/// Merge an edit instruction into an existing breakdown.
pub fn edit_breakdown_prompt(instruction: &str, breakdown_json: &str) -> String {
    format!(
        r#"Apply this edit instruction to the shot breakdown below and return the complete updated breakdown. Change only what the instruction requires; keep every other field as-is, including reference_image tags.

INSTRUCTION:
{instruction}

CURRENT BREAKDOWN:
{breakdown_json}
"#
    )
}
