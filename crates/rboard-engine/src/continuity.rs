//! Continuity rule engine.
//!
//! Pure function over the ordered shot list: no side effects, re-derivable
//! at any time from current shot state. Every rule is advisory; nothing here
//! blocks rendering. The rules are keyword heuristics by design, best-effort
//! flags rather than semantic guarantees.

use std::collections::{HashMap, HashSet};

use rboard_models::{
    normalize_name, ContinuityIssue, FixData, FixField, IssueCategory, IssueSeverity, ShotPlan,
};

use crate::error::{EngineError, EngineResult};
use crate::registry::EntityRegistry;

/// Explicit movement phrases that legitimize a position change.
const MOVEMENT_KEYWORDS: &[&str] = &[
    "moves to",
    "moves toward",
    "stands up",
    "sits down",
    "gets out",
    "gets up",
    "walks to",
    "walks over",
    "runs to",
    "switches seat",
    "slides over",
    "changes position",
    "crosses to",
    "steps toward",
];

/// Props tracked for persistence across shots.
const PROP_KEYWORDS: &[&str] = &[
    "helmet", "glasses", "hat", "mask", "backpack", "bag", "jacket",
];

/// Phrases that legitimize a prop disappearing.
const REMOVAL_KEYWORDS: &[&str] = &[
    "remove",
    "removes",
    "removed",
    "take off",
    "takes off",
    "took off",
    "drop",
    "drops",
    "dropped",
    "lose",
    "loses",
    "lost",
    "leaves",
    "sets down",
    "puts down",
];

/// Markers of a profile-type camera perspective.
const SIDE_MARKERS: &[&str] = &["side", "profile"];

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.contains(k))
}

/// Check the ordered shot list for continuity problems.
///
/// Running this twice on the same unchanged shots yields the identical
/// issue set: ids are content-derived and every rule reads only its inputs.
pub fn check_continuity(shots: &[ShotPlan], _assets: &EntityRegistry) -> Vec<ContinuityIssue> {
    let mut issues = Vec::new();
    if shots.is_empty() {
        return issues;
    }

    check_time_of_day(shots, &mut issues);
    check_location(shots, &mut issues);
    check_outfits(shots, &mut issues);
    check_blocking(shots, &mut issues);
    check_camera_axis(shots, &mut issues);
    check_prop_persistence(shots, &mut issues);

    issues
}

/// Time-of-day drift against the first shot's declared time.
fn check_time_of_day(shots: &[ShotPlan], issues: &mut Vec<ContinuityIssue>) {
    let baseline = shots[0].visual_breakdown.scene.time_of_day.trim();
    for shot in &shots[1..] {
        let declared = shot.visual_breakdown.scene.time_of_day.trim();
        if !declared.eq_ignore_ascii_case(baseline) {
            issues.push(
                ContinuityIssue::new(
                    &shot.shot_id,
                    "time",
                    IssueCategory::Time,
                    IssueSeverity::Warning,
                    format!(
                        "Time of day changed from \"{}\" to \"{}\"",
                        baseline, declared
                    ),
                    format!("shot 1: \"{}\", this shot: \"{}\"", baseline, declared),
                )
                .with_suggested_fix(format!("Align time of day to \"{}\"", baseline))
                .with_fix_data(FixData {
                    field: FixField::TimeOfDay,
                    character: None,
                    value: baseline.to_string(),
                }),
            );
        }
    }
}

/// Environment drift against the first shot. Informational only: scene
/// changes are often legitimate.
fn check_location(shots: &[ShotPlan], issues: &mut Vec<ContinuityIssue>) {
    let baseline = shots[0].visual_breakdown.scene.environment.as_str();
    for shot in &shots[1..] {
        let declared = shot.visual_breakdown.scene.environment.as_str();
        if declared != baseline {
            issues.push(
                ContinuityIssue::new(
                    &shot.shot_id,
                    "location",
                    IssueCategory::Location,
                    IssueSeverity::Info,
                    "Environment differs from the establishing shot",
                    format!("shot 1: \"{}\", this shot: \"{}\"", baseline, declared),
                )
                .with_suggested_fix(
                    "Confirm the scene change is intended, or align the environment description",
                ),
            );
        }
    }
}

/// Per-character outfit tracking: an exact-text appearance change with no
/// special handling is an error.
fn check_outfits(shots: &[ShotPlan], issues: &mut Vec<ContinuityIssue>) {
    let mut last_seen: HashMap<String, String> = HashMap::new();

    for shot in shots {
        for character in &shot.visual_breakdown.characters {
            let key = normalize_name(&character.name);
            let current = character.appearance.description.trim().to_string();

            if let Some(previous) = last_seen.get(&key) {
                if *previous != current {
                    issues.push(
                        ContinuityIssue::new(
                            &shot.shot_id,
                            &key,
                            IssueCategory::Outfit,
                            IssueSeverity::Error,
                            format!("{}'s outfit changed without explanation", character.name),
                            format!("was \"{}\", now \"{}\"", previous, current),
                        )
                        .with_suggested_fix(format!("Restore \"{}\"", previous))
                        .with_fix_data(FixData {
                            field: FixField::AppearanceDescription,
                            character: Some(character.name.clone()),
                            value: previous.clone(),
                        }),
                    );
                }
            }
            last_seen.insert(key, current);
        }
    }
}

/// Blocking/position tracking. A changed blocking id is always an error; a
/// changed free-text position is an error unless the shot's text contains an
/// explicit movement phrase.
fn check_blocking(shots: &[ShotPlan], issues: &mut Vec<ContinuityIssue>) {
    let mut last_position: HashMap<String, String> = HashMap::new();
    let mut last_blocking: HashMap<String, String> = HashMap::new();

    for shot in shots {
        for character in &shot.visual_breakdown.characters {
            let key = normalize_name(&character.name);
            let position = character.position.trim().to_string();

            if let Some(blocking_id) = &character.blocking_id {
                if let Some(previous) = last_blocking.get(&key) {
                    if previous != blocking_id {
                        issues.push(ContinuityIssue::new(
                            &shot.shot_id,
                            &format!("{}-blocking", key),
                            IssueCategory::Other,
                            IssueSeverity::Error,
                            format!("{}'s blocking marker changed", character.name),
                            format!("was \"{}\", now \"{}\"", previous, blocking_id),
                        ));
                    }
                }
                last_blocking.insert(key.clone(), blocking_id.clone());
            }

            if !position.is_empty() {
                if let Some(previous) = last_position.get(&key) {
                    let moved = contains_any(
                        &character.continuity_text().to_lowercase(),
                        MOVEMENT_KEYWORDS,
                    );
                    if *previous != position && !moved {
                        issues.push(
                            ContinuityIssue::new(
                                &shot.shot_id,
                                &format!("{}-position", key),
                                IssueCategory::Other,
                                IssueSeverity::Error,
                                format!(
                                    "{} jumped from \"{}\" to \"{}\" with no movement in the action",
                                    character.name, previous, position
                                ),
                                format!("was \"{}\", now \"{}\"", previous, position),
                            )
                            .with_suggested_fix(format!("Restore position \"{}\"", previous))
                            .with_fix_data(FixData {
                                field: FixField::Position,
                                character: Some(character.name.clone()),
                                value: previous.clone(),
                            }),
                        );
                    }
                }
                last_position.insert(key, position);
            }
        }
    }
}

/// Consecutive shots both using a side/profile perspective but with
/// different specific values may sit on opposite sides of the action axis.
/// A heuristic proxy, not a geometric computation.
fn check_camera_axis(shots: &[ShotPlan], issues: &mut Vec<ContinuityIssue>) {
    for pair in shots.windows(2) {
        let describe = |shot: &ShotPlan| {
            format!(
                "{} {}",
                shot.camera_specs, shot.visual_breakdown.framing
            )
            .trim()
            .to_lowercase()
        };
        let previous = describe(&pair[0]);
        let current = describe(&pair[1]);

        if contains_any(&previous, SIDE_MARKERS)
            && contains_any(&current, SIDE_MARKERS)
            && previous != current
        {
            issues.push(ContinuityIssue::new(
                &pair[1].shot_id,
                "axis",
                IssueCategory::Camera,
                IssueSeverity::Warning,
                "Consecutive profile shots differ; possible 180-degree axis cross",
                format!("previous: \"{}\", this shot: \"{}\"", previous, current),
            ));
        }
    }
}

/// Per-character prop persistence: a prop present earlier that is absent
/// with no removal phrase in the shot's text is flagged once per
/// disappearance.
fn check_prop_persistence(shots: &[ShotPlan], issues: &mut Vec<ContinuityIssue>) {
    let mut carried: HashMap<String, HashSet<&'static str>> = HashMap::new();

    for shot in shots {
        let object_text = shot
            .visual_breakdown
            .objects
            .iter()
            .map(|o| o.name.to_lowercase())
            .collect::<Vec<_>>()
            .join(" ");

        for character in &shot.visual_breakdown.characters {
            let key = normalize_name(&character.name);
            let text = character.continuity_text().to_lowercase();
            let shot_text = format!("{} {}", text, shot.action_segment.to_lowercase());

            let present: HashSet<&'static str> = PROP_KEYWORDS
                .iter()
                .filter(|prop| text.contains(*prop) || object_text.contains(*prop))
                .copied()
                .collect();

            let previous = carried.entry(key.clone()).or_default();
            for prop in previous.iter().copied().collect::<Vec<_>>() {
                if present.contains(prop) {
                    continue;
                }
                let removed = contains_any(&shot_text, REMOVAL_KEYWORDS)
                    || shot_text.contains(&format!("{} off", prop));
                if !removed {
                    issues.push(ContinuityIssue::new(
                        &shot.shot_id,
                        &format!("{}-{}", key, prop),
                        IssueCategory::Outfit,
                        IssueSeverity::Warning,
                        format!("{} is missing their {}", character.name, prop),
                        format!("\"{}\" seen in an earlier shot, absent here", prop),
                    ));
                }
                // Dropped from tracking either way: one flag per
                // disappearance, re-armed if the prop comes back.
                previous.remove(prop);
            }

            previous.extend(present);
        }
    }
}

/// Apply a mechanical fix to the targeted shot.
///
/// Mutates only the targeted breakdown field; the caller marks the issue
/// resolved. Never regenerates the image.
pub fn apply_fix(shot: &mut ShotPlan, fix: &FixData) -> EngineResult<()> {
    match fix.field {
        FixField::TimeOfDay => {
            shot.visual_breakdown.scene.time_of_day = fix.value.clone();
            Ok(())
        }
        FixField::Environment => {
            shot.visual_breakdown.scene.environment = fix.value.clone();
            Ok(())
        }
        FixField::AppearanceDescription => {
            let character = fix
                .character
                .as_deref()
                .ok_or_else(|| EngineError::fix_failed("appearance fix needs a character"))?;
            let target = find_character(shot, character)?;
            target.appearance.description = fix.value.clone();
            Ok(())
        }
        FixField::Position => {
            let character = fix
                .character
                .as_deref()
                .ok_or_else(|| EngineError::fix_failed("position fix needs a character"))?;
            let target = find_character(shot, character)?;
            target.position = fix.value.clone();
            Ok(())
        }
    }
}

fn find_character<'a>(
    shot: &'a mut ShotPlan,
    name: &str,
) -> EngineResult<&'a mut rboard_models::CharacterShot> {
    let normalized = normalize_name(name);
    shot.visual_breakdown
        .characters
        .iter_mut()
        .find(|c| normalize_name(&c.name) == normalized)
        .ok_or_else(|| EngineError::fix_failed(format!("character \"{}\" not in shot", name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rboard_models::{
        Appearance, CharacterShot, PlanType, RefMark, ShotRole, VisualBreakdown,
    };
    use rboard_models::ShotPlan;

    fn registry() -> EntityRegistry {
        EntityRegistry::new(Vec::new(), Vec::new())
    }

    fn shot(id: &str, environment: &str, time: &str) -> ShotPlan {
        let breakdown: VisualBreakdown = serde_json::from_value(serde_json::json!({
            "scene": {"environment": environment, "time_of_day": time},
            "framing": "wide"
        }))
        .unwrap();
        let mut plan = ShotPlan::new(PlanType::Sequence, ShotRole::Sequential, "", breakdown);
        plan.shot_id = id.to_string();
        plan
    }

    fn with_character(
        mut plan: ShotPlan,
        name: &str,
        outfit: &str,
        position: &str,
        actions: &str,
    ) -> ShotPlan {
        plan.visual_breakdown.characters.push(CharacterShot {
            name: name.to_string(),
            reference: RefMark::none(),
            position: position.to_string(),
            blocking_id: None,
            appearance: Appearance {
                description: outfit.to_string(),
                expression: String::new(),
            },
            actions: actions.to_string(),
            lighting_effect: String::new(),
        });
        plan
    }

    #[test]
    fn test_idempotent_over_unchanged_shots() {
        let shots = vec![
            with_character(shot("s1", "Kitchen", "day"), "Ava", "red coat", "left", ""),
            with_character(shot("s2", "Kitchen", "night"), "Ava", "blue coat", "left", ""),
        ];

        let first = check_continuity(&shots, &registry());
        let second = check_continuity(&shots, &registry());

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.message, b.message);
            assert_eq!(a.evidence, b.evidence);
        }
    }

    #[test]
    fn test_time_drift_warns_with_fix() {
        let shots = vec![
            shot("s1", "Kitchen", "day"),
            shot("s2", "Kitchen", "night"),
        ];
        let issues = check_continuity(&shots, &registry());

        let time_issues: Vec<_> = issues
            .iter()
            .filter(|i| i.category == IssueCategory::Time)
            .collect();
        assert_eq!(time_issues.len(), 1);
        assert_eq!(time_issues[0].severity, IssueSeverity::Warning);
        assert_eq!(time_issues[0].shot_id, "s2");
        let fix = time_issues[0].fix_data.as_ref().unwrap();
        assert_eq!(fix.field, FixField::TimeOfDay);
        assert_eq!(fix.value, "day");
    }

    #[test]
    fn test_location_drift_is_informational() {
        let shots = vec![shot("s1", "Kitchen", "day"), shot("s2", "Garage", "day")];
        let issues = check_continuity(&shots, &registry());

        let location: Vec<_> = issues
            .iter()
            .filter(|i| i.category == IssueCategory::Location)
            .collect();
        assert_eq!(location.len(), 1);
        assert_eq!(location[0].severity, IssueSeverity::Info);
        assert!(location[0].fix_data.is_none());
    }

    #[test]
    fn test_outfit_mismatch_emits_single_error() {
        let shots = vec![
            with_character(shot("s1", "Kitchen", "day"), "Ava", "red coat", "", ""),
            with_character(shot("s2", "Kitchen", "day"), "Ava", "blue coat", "", ""),
        ];
        let issues = check_continuity(&shots, &registry());

        let outfit: Vec<_> = issues
            .iter()
            .filter(|i| i.category == IssueCategory::Outfit)
            .collect();
        assert_eq!(outfit.len(), 1);
        assert_eq!(outfit[0].severity, IssueSeverity::Error);
        assert_eq!(outfit[0].shot_id, "s2");
        assert_eq!(
            outfit[0].fix_data.as_ref().unwrap().value,
            "red coat"
        );
    }

    #[test]
    fn test_position_jump_is_error_unless_movement_explains_it() {
        // No movement phrase: error.
        let shots = vec![
            with_character(shot("s1", "Car", "day"), "Ben", "suit", "left of frame", ""),
            with_character(shot("s2", "Car", "day"), "Ben", "suit", "right of frame", ""),
        ];
        let issues = check_continuity(&shots, &registry());
        assert!(issues
            .iter()
            .any(|i| i.category == IssueCategory::Other && i.severity == IssueSeverity::Error));

        // With the movement phrase the issue disappears.
        let shots = vec![
            with_character(shot("s1", "Car", "day"), "Ben", "suit", "left of frame", ""),
            with_character(
                shot("s2", "Car", "day"),
                "Ben",
                "suit",
                "right of frame",
                "moves to the window",
            ),
        ];
        let issues = check_continuity(&shots, &registry());
        assert!(!issues
            .iter()
            .any(|i| i.category == IssueCategory::Other));
    }

    #[test]
    fn test_blocking_id_change_always_errors() {
        let mut first = with_character(shot("s1", "Car", "day"), "Ben", "suit", "left", "");
        first.visual_breakdown.characters[0].blocking_id = Some("A".to_string());
        let mut second = with_character(
            shot("s2", "Car", "day"),
            "Ben",
            "suit",
            "left",
            "moves to the window",
        );
        second.visual_breakdown.characters[0].blocking_id = Some("B".to_string());

        let issues = check_continuity(&[first, second], &registry());
        assert!(issues
            .iter()
            .any(|i| i.id == "other:s2:ben-blocking" && i.severity == IssueSeverity::Error));
    }

    #[test]
    fn test_camera_axis_heuristic() {
        let mut first = shot("s1", "Car", "day");
        first.camera_specs = "side profile, facing left".to_string();
        let mut second = shot("s2", "Car", "day");
        second.camera_specs = "side profile, facing right".to_string();

        let issues = check_continuity(&[first, second], &registry());
        let camera: Vec<_> = issues
            .iter()
            .filter(|i| i.category == IssueCategory::Camera)
            .collect();
        assert_eq!(camera.len(), 1);
        assert_eq!(camera[0].severity, IssueSeverity::Warning);
    }

    #[test]
    fn test_prop_persistence_flags_missing_helmet() {
        let shots = vec![
            with_character(shot("s1", "Hangar", "day"), "Ava", "flight suit", "", "adjusts her helmet"),
            with_character(shot("s2", "Hangar", "day"), "Ava", "flight suit", "", "waves"),
        ];
        let issues = check_continuity(&shots, &registry());
        assert!(issues
            .iter()
            .any(|i| i.id == "outfit:s2:ava-helmet" && i.severity == IssueSeverity::Warning));
    }

    #[test]
    fn test_prop_removal_phrase_suppresses_flag() {
        let shots = vec![
            with_character(shot("s1", "Hangar", "day"), "Ava", "flight suit", "", "adjusts her helmet"),
            with_character(
                shot("s2", "Hangar", "day"),
                "Ava",
                "flight suit",
                "",
                "takes off her helmet and waves",
            ),
        ];
        let issues = check_continuity(&shots, &registry());
        assert!(!issues.iter().any(|i| i.id.contains("helmet")));
    }

    #[test]
    fn test_apply_fix_mutates_only_target_field() {
        let mut target = with_character(shot("s2", "Kitchen", "night"), "Ava", "blue coat", "", "");
        let fix = FixData {
            field: FixField::AppearanceDescription,
            character: Some("Ava".to_string()),
            value: "red coat".to_string(),
        };
        apply_fix(&mut target, &fix).unwrap();
        assert_eq!(
            target.visual_breakdown.characters[0].appearance.description,
            "red coat"
        );
        // Nothing else moved.
        assert_eq!(target.visual_breakdown.scene.time_of_day, "night");
        assert!(target.image_url.is_none());
    }

    #[test]
    fn test_apply_fix_unknown_character_fails() {
        let mut target = with_character(shot("s2", "Kitchen", "day"), "Ava", "red coat", "", "");
        let fix = FixData {
            field: FixField::Position,
            character: Some("Ben".to_string()),
            value: "left".to_string(),
        };
        assert!(matches!(
            apply_fix(&mut target, &fix),
            Err(EngineError::FixFailed(_))
        ));
    }
}
