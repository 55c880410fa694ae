//! Continuity check and fix handlers.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use rboard_engine::{apply_fix, check_continuity, EntityRegistry};
use rboard_models::{ContinuityIssue, Entity, ShotPlan};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Request to check a shot list for continuity problems.
#[derive(Debug, Deserialize)]
pub struct CheckContinuityRequest {
    pub shots: Vec<ShotPlan>,

    #[serde(default)]
    pub global_entities: Vec<Entity>,

    #[serde(default)]
    pub local_entities: Vec<Entity>,
}

/// Response with the advisory issues found.
#[derive(Serialize)]
pub struct CheckContinuityResponse {
    pub issues: Vec<ContinuityIssue>,
}

/// Run the continuity checker. Pure and inline: same shots in, same issues
/// out, nothing is blocked by the results.
pub async fn check(
    State(_state): State<AppState>,
    Json(request): Json<CheckContinuityRequest>,
) -> ApiResult<Json<CheckContinuityResponse>> {
    let registry = EntityRegistry::new(request.global_entities, request.local_entities);
    let issues = check_continuity(&request.shots, &registry);
    Ok(Json(CheckContinuityResponse { issues }))
}

/// Request to apply an issue's mechanical fix to a shot.
#[derive(Debug, Deserialize)]
pub struct ApplyFixRequest {
    pub shot: ShotPlan,
    pub issue: ContinuityIssue,
}

/// Response with the fixed shot and the resolved issue.
#[derive(Serialize)]
pub struct ApplyFixResponse {
    pub shot: ShotPlan,
    pub issue: ContinuityIssue,
}

/// Apply the issue's fix data to the shot and mark the issue resolved.
/// Mutates only the targeted breakdown field; never regenerates the image.
pub async fn fix(
    State(_state): State<AppState>,
    Json(request): Json<ApplyFixRequest>,
) -> ApiResult<Json<ApplyFixResponse>> {
    let mut shot = request.shot;
    let mut issue = request.issue;

    let fix_data = issue
        .fix_data
        .clone()
        .ok_or_else(|| ApiError::bad_request("issue carries no mechanical fix"))?;

    if issue.shot_id != shot.shot_id {
        return Err(ApiError::bad_request("issue does not target this shot"));
    }

    apply_fix(&mut shot, &fix_data)?;
    issue.resolve();

    Ok(Json(ApplyFixResponse { shot, issue }))
}
