//! Staged shot planning.
//!
//! Three structured calls, each grounded in the prior stage's output:
//! scene pre-analysis, shot list planning, per-shot detail expansion.
//! Any stage whose output fails to parse or misses required fields fails
//! the whole operation for that shot; nothing proceeds on partial data.

use std::sync::Arc;

use tracing::{debug, info};

use rboard_ai::{generate, TextCapability};
use rboard_models::{
    PlanType, PlannedShot, SceneContext, ShotDetail, ShotListPlan, ShotPlan, ShotRole,
};

use crate::error::{EngineError, EngineResult};
use crate::prompts;
use crate::registry::EntityRegistry;

/// Image anchors available when expanding or rendering a shot.
#[derive(Debug, Clone, Default)]
pub struct ShotAnchors {
    /// Locator of the master shot's rendered image
    pub master_url: Option<String>,
    /// Locator of the immediately preceding shot's rendered image
    pub previous_url: Option<String>,
}

/// Result of planning a script: scene context, the planned list, and the
/// shots detailed so far (the master shot; the rest expand on demand).
#[derive(Debug, Clone)]
pub struct PlanOutcome {
    pub scene_context: SceneContext,
    pub shot_plan: Vec<PlannedShot>,
    pub shots: Vec<ShotPlan>,
}

/// Staged shot planner.
pub struct ShotPlanner {
    text: Arc<dyn TextCapability>,
}

impl ShotPlanner {
    pub fn new(text: Arc<dyn TextCapability>) -> Self {
        Self { text }
    }

    /// Stage 1: extract outfits, props, environment and time of day.
    /// Dialogue content is invisible to this extraction by construction.
    pub async fn analyze_scene(&self, script: &str) -> EngineResult<SceneContext> {
        if script.trim().is_empty() {
            return Err(EngineError::invalid_input("script is empty"));
        }

        let scene: SceneContext =
            generate(self.text.as_ref(), &prompts::scene_analysis_prompt(script)).await?;

        if scene.environment.trim().is_empty() || scene.time_of_day.trim().is_empty() {
            return Err(EngineError::planning_failed(
                "scene analysis missing environment or time of day",
            ));
        }

        Ok(scene)
    }

    /// Stage 2: produce the ordered shot list. The stage decides the shot
    /// count itself.
    pub async fn plan_shot_list(
        &self,
        script: &str,
        scene: &SceneContext,
    ) -> EngineResult<Vec<PlannedShot>> {
        let plan: ShotListPlan =
            generate(self.text.as_ref(), &prompts::shot_list_prompt(script, scene)).await?;

        if plan.shots.is_empty() {
            return Err(EngineError::planning_failed("shot list is empty"));
        }

        let mut shots = plan.shots;
        shots.sort_by_key(|s| s.index);
        Ok(shots)
    }

    /// Stage 3: expand one planned shot into its full breakdown.
    ///
    /// Each shot after the first receives the previous shot's full JSON and,
    /// where available, the master/previous anchor images, to preserve
    /// spatial and identity continuity. The first shot is the master and has
    /// no predecessor context.
    pub async fn expand_shot(
        &self,
        planned: &PlannedShot,
        scene: &SceneContext,
        registry: &EntityRegistry,
        previous: Option<&ShotPlan>,
        anchors: &ShotAnchors,
    ) -> EngineResult<ShotPlan> {
        let previous_json = match previous {
            Some(shot) => Some(serde_json::to_string(shot)?),
            None => None,
        };

        let prompt = prompts::shot_detail_prompt(
            planned,
            scene,
            &registry.catalog(),
            previous_json.as_deref(),
            anchors.master_url.is_some(),
            anchors.previous_url.is_some(),
        );

        debug!("Expanding shot {} ({})", planned.index, planned.summary);
        let detail: ShotDetail = generate(self.text.as_ref(), &prompt).await?;
        validate_detail(&detail)?;

        let role = if previous.is_none() && planned.index <= 1 {
            ShotRole::Master
        } else {
            ShotRole::Sequential
        };

        let mut shot = ShotPlan::new(
            PlanType::Sequence,
            role,
            planned.action_segment.clone(),
            detail.visual_breakdown,
        );
        shot.camera_specs = detail.camera_specs;
        shot.relevant_entities = detail.relevant_entities;
        Ok(shot)
    }

    /// Full planning pass: stages 1 and 2, plus detail for the master shot.
    /// Subsequent shots are expanded on demand, in order, each with its
    /// predecessor's output.
    pub async fn plan(&self, script: &str, registry: &EntityRegistry) -> EngineResult<PlanOutcome> {
        let scene_context = self.analyze_scene(script).await?;
        let shot_plan = self.plan_shot_list(script, &scene_context).await?;
        info!("Planned {} shots", shot_plan.len());

        let first = self
            .expand_shot(
                &shot_plan[0],
                &scene_context,
                registry,
                None,
                &ShotAnchors::default(),
            )
            .await?;

        Ok(PlanOutcome {
            scene_context,
            shot_plan,
            shots: vec![first],
        })
    }

    /// Analyze a single ad-hoc shot from a free-text description,
    /// independent of the planned sequence.
    pub async fn analyze_custom_shot(
        &self,
        description: &str,
        registry: &EntityRegistry,
    ) -> EngineResult<ShotPlan> {
        if description.trim().is_empty() {
            return Err(EngineError::invalid_input("shot description is empty"));
        }

        let prompt = prompts::custom_shot_prompt(description, &registry.catalog());
        let detail: ShotDetail = generate(self.text.as_ref(), &prompt).await?;
        validate_detail(&detail)?;

        let mut shot = ShotPlan::new(
            PlanType::Custom,
            ShotRole::Sequential,
            description,
            detail.visual_breakdown,
        );
        shot.camera_specs = detail.camera_specs;
        shot.relevant_entities = detail.relevant_entities;
        Ok(shot)
    }
}

fn validate_detail(detail: &ShotDetail) -> EngineResult<()> {
    let breakdown = &detail.visual_breakdown;
    if breakdown.scene.environment.trim().is_empty() {
        return Err(EngineError::planning_failed(
            "shot detail missing scene environment",
        ));
    }
    if breakdown.scene.time_of_day.trim().is_empty() {
        return Err(EngineError::planning_failed(
            "shot detail missing time of day",
        ));
    }
    if breakdown.framing.trim().is_empty() {
        return Err(EngineError::planning_failed("shot detail missing framing"));
    }
    Ok(())
}
