//! Shot planning handlers.
//!
//! Full-script planning is slow (three staged capability calls), so it runs
//! as a job polled by id. Single-shot expansion and ad-hoc custom shots are
//! one call each and answer inline.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use rboard_engine::{EntityRegistry, ShotAnchors, ShotPlanner};
use rboard_models::{Entity, JobKind, PlannedShot, SceneContext, ShotPlan};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Response returned when a job has been submitted.
#[derive(Serialize)]
pub struct JobSubmittedResponse {
    pub job_id: String,
}

// ============================================================================
// Plan Sequence
// ============================================================================

/// Request to plan a script into shots.
#[derive(Debug, Deserialize, Validate)]
pub struct PlanRequest {
    #[validate(length(min = 1, max = 200_000))]
    pub script: String,

    #[serde(default)]
    pub global_entities: Vec<Entity>,

    #[serde(default)]
    pub local_entities: Vec<Entity>,
}

/// Job result payload for a completed planning run. The master shot is
/// fully detailed; later shots are expanded on demand.
#[derive(Serialize)]
struct PlanShotsResult {
    scene_context: SceneContext,
    shot_plan: Vec<PlannedShot>,
    shots: Vec<ShotPlan>,
}

/// Start an async planning job. Returns a job id to poll.
pub async fn plan_sequence(
    State(state): State<AppState>,
    Json(request): Json<PlanRequest>,
) -> ApiResult<Json<JobSubmittedResponse>> {
    request
        .validate()
        .map_err(|e| ApiError::validation(e.to_string()))?;

    let handle = state.jobs.submit(JobKind::PlanShots).await;
    let job_id = handle.id().to_string();
    let text = Arc::clone(&state.text);

    tokio::spawn(async move {
        let registry = EntityRegistry::new(request.global_entities, request.local_entities);
        let planner = ShotPlanner::new(text);

        handle.progress(10, "analyzing scene").await;
        match planner.plan(&request.script, &registry).await {
            Ok(outcome) => {
                let result = PlanShotsResult {
                    scene_context: outcome.scene_context,
                    shot_plan: outcome.shot_plan,
                    shots: outcome.shots,
                };
                match serde_json::to_value(&result) {
                    Ok(value) => handle.complete(Some(value)).await,
                    Err(e) => handle.fail(format!("failed to serialize plan: {}", e)).await,
                }
            }
            Err(e) => handle.fail(e.to_string()).await,
        }
    });

    info!("Submitted planning job {}", job_id);
    Ok(Json(JobSubmittedResponse { job_id }))
}

// ============================================================================
// Expand Shot
// ============================================================================

/// Request to expand one planned shot into its full breakdown.
#[derive(Debug, Deserialize)]
pub struct ExpandShotRequest {
    pub planned: PlannedShot,
    pub scene_context: SceneContext,

    /// The immediately preceding shot's full plan, for continuity grounding
    #[serde(default)]
    pub previous: Option<ShotPlan>,

    #[serde(default)]
    pub master_url: Option<String>,

    #[serde(default)]
    pub previous_url: Option<String>,

    #[serde(default)]
    pub global_entities: Vec<Entity>,

    #[serde(default)]
    pub local_entities: Vec<Entity>,
}

/// Expand a single planned shot. Inline: one structured call.
pub async fn expand_shot(
    State(state): State<AppState>,
    Json(request): Json<ExpandShotRequest>,
) -> ApiResult<Json<ShotPlan>> {
    let registry = EntityRegistry::new(request.global_entities, request.local_entities);
    let planner = ShotPlanner::new(Arc::clone(&state.text));
    let anchors = ShotAnchors {
        master_url: request.master_url,
        previous_url: request.previous_url,
    };

    let shot = planner
        .expand_shot(
            &request.planned,
            &request.scene_context,
            &registry,
            request.previous.as_ref(),
            &anchors,
        )
        .await?;

    Ok(Json(shot))
}

// ============================================================================
// Custom Shot
// ============================================================================

/// Request to analyze a single ad-hoc shot.
#[derive(Debug, Deserialize, Validate)]
pub struct CustomShotRequest {
    #[validate(length(min = 1, max = 10_000))]
    pub description: String,

    #[serde(default)]
    pub global_entities: Vec<Entity>,

    #[serde(default)]
    pub local_entities: Vec<Entity>,
}

/// Analyze a custom shot description, independent of the planned sequence.
pub async fn analyze_custom_shot(
    State(state): State<AppState>,
    Json(request): Json<CustomShotRequest>,
) -> ApiResult<Json<ShotPlan>> {
    request
        .validate()
        .map_err(|e| ApiError::validation(e.to_string()))?;

    let registry = EntityRegistry::new(request.global_entities, request.local_entities);
    let planner = ShotPlanner::new(Arc::clone(&state.text));

    let shot = planner
        .analyze_custom_shot(&request.description, &registry)
        .await?;

    Ok(Json(shot))
}
