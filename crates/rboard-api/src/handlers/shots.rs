//! Shot rendering and editing handlers.
//!
//! Image generation is slow and runs behind the job registry; callers poll
//! the returned job id. Batch sequence rendering reports per-shot progress
//! and isolates per-shot failures.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use validator::Validate;

use rboard_engine::{EntityRegistry, ShotAnchors, ShotRenderer};
use rboard_models::{Entity, JobKind, ShotPlan};

use crate::error::{ApiError, ApiResult};
use crate::handlers::planning::JobSubmittedResponse;
use crate::state::AppState;

fn default_aspect() -> String {
    "16:9".to_string()
}

fn renderer_for(state: &AppState, aspect: &str) -> ShotRenderer {
    ShotRenderer::new(
        Arc::clone(&state.text),
        Arc::clone(&state.image),
        Arc::clone(&state.store),
    )
    .with_aspect(aspect)
}

// ============================================================================
// Render One Shot
// ============================================================================

/// Request to render a single shot.
#[derive(Debug, Deserialize)]
pub struct RenderShotRequest {
    pub shot: ShotPlan,

    #[serde(default)]
    pub global_entities: Vec<Entity>,

    #[serde(default)]
    pub local_entities: Vec<Entity>,

    /// Locator of the master shot's rendered frame, if any
    #[serde(default)]
    pub master_url: Option<String>,

    /// Locator of the previous shot's rendered frame, if any
    #[serde(default)]
    pub previous_url: Option<String>,

    #[serde(default = "default_aspect")]
    pub aspect: String,
}

/// Start an async render job for one shot.
pub async fn render_shot(
    State(state): State<AppState>,
    Json(request): Json<RenderShotRequest>,
) -> ApiResult<Json<JobSubmittedResponse>> {
    let handle = state.jobs.submit(JobKind::RenderShot).await;
    let job_id = handle.id().to_string();
    let renderer = renderer_for(&state, &request.aspect);

    tokio::spawn(async move {
        let registry = EntityRegistry::new(request.global_entities, request.local_entities);
        let anchors = ShotAnchors {
            master_url: request.master_url,
            previous_url: request.previous_url,
        };

        handle.progress(10, "resolving references").await;
        match renderer.render_shot(&request.shot, &registry, &anchors).await {
            Ok(rendered) => match serde_json::to_value(&rendered.shot) {
                Ok(shot) => {
                    handle
                        .complete(Some(json!({
                            "image_url": rendered.locator,
                            "shot": shot,
                        })))
                        .await
                }
                Err(e) => handle.fail(format!("failed to serialize shot: {}", e)).await,
            },
            Err(e) => handle.fail(e.to_string()).await,
        }
    });

    info!("Submitted render job {}", job_id);
    Ok(Json(JobSubmittedResponse { job_id }))
}

// ============================================================================
// Render Sequence
// ============================================================================

/// Request to render every unrendered shot of a sequence, in order.
#[derive(Debug, Deserialize)]
pub struct RenderSequenceRequest {
    pub shots: Vec<ShotPlan>,

    #[serde(default)]
    pub global_entities: Vec<Entity>,

    #[serde(default)]
    pub local_entities: Vec<Entity>,

    #[serde(default = "default_aspect")]
    pub aspect: String,
}

/// Per-shot entry of a completed sequence render.
#[derive(Serialize)]
struct ShotOutcome {
    shot: ShotPlan,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Job result payload for a completed sequence render.
#[derive(Serialize)]
struct SequenceRenderResult {
    shots: Vec<ShotOutcome>,
    failures: usize,
}

/// Start an async batch render. Shots render strictly in order, each
/// anchored on its predecessor's frame; one shot failing does not abort the
/// rest, and the per-shot outcomes land in the job result.
pub async fn render_sequence(
    State(state): State<AppState>,
    Json(request): Json<RenderSequenceRequest>,
) -> ApiResult<Json<JobSubmittedResponse>> {
    if request.shots.is_empty() {
        return Err(ApiError::bad_request("no shots to render"));
    }

    let handle = state.jobs.submit(JobKind::RenderSequence).await;
    let job_id = handle.id().to_string();
    let renderer = renderer_for(&state, &request.aspect);

    tokio::spawn(async move {
        let registry = EntityRegistry::new(request.global_entities, request.local_entities);

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<(usize, usize)>();
        let progress_cb: rboard_engine::render::ProgressFn = Box::new(move |done, total| {
            let _ = tx.send((done, total));
        });

        let render_fut = renderer.render_sequence(&request.shots, &registry, Some(progress_cb));
        let progress_fut = async {
            while let Some((done, total)) = rx.recv().await {
                let pct = ((done * 100) / total.max(1)) as u8;
                handle.progress(pct, format!("shot {}/{}", done, total)).await;
            }
        };

        let (results, _) = tokio::join!(render_fut, progress_fut);

        let failures = results.iter().filter(|r| r.error.is_some()).count();
        let result = SequenceRenderResult {
            shots: results
                .into_iter()
                .map(|r| ShotOutcome {
                    shot: r.shot,
                    error: r.error,
                })
                .collect(),
            failures,
        };

        match serde_json::to_value(&result) {
            Ok(value) => handle.complete(Some(value)).await,
            Err(e) => handle.fail(format!("failed to serialize results: {}", e)).await,
        }
    });

    info!("Submitted sequence render job {}", job_id);
    Ok(Json(JobSubmittedResponse { job_id }))
}

// ============================================================================
// Edit Shot
// ============================================================================

/// Request to edit an already-rendered shot.
#[derive(Debug, Deserialize, Validate)]
pub struct EditShotRequest {
    /// Locator of the current rendered frame
    #[validate(length(min = 1))]
    pub image_url: String,

    #[validate(length(min = 1, max = 10_000))]
    pub instruction: String,

    pub shot: ShotPlan,

    #[serde(default = "default_aspect")]
    pub aspect: String,
}

/// Start an async edit job: new image from the current frame plus the
/// instruction, and the breakdown updated to match.
pub async fn edit_shot(
    State(state): State<AppState>,
    Json(request): Json<EditShotRequest>,
) -> ApiResult<Json<JobSubmittedResponse>> {
    request
        .validate()
        .map_err(|e| ApiError::validation(e.to_string()))?;

    let handle = state.jobs.submit(JobKind::EditShot).await;
    let job_id = handle.id().to_string();
    let renderer = renderer_for(&state, &request.aspect);

    tokio::spawn(async move {
        handle.progress(10, "editing frame").await;
        match renderer
            .edit_shot(&request.image_url, &request.instruction, &request.shot)
            .await
        {
            Ok(edited) => match serde_json::to_value(&edited.visual_breakdown) {
                Ok(breakdown) => {
                    handle
                        .complete(Some(json!({
                            "image_url": edited.locator,
                            "visual_breakdown": breakdown,
                        })))
                        .await
                }
                Err(e) => handle.fail(format!("failed to serialize breakdown: {}", e)).await,
            },
            Err(e) => handle.fail(e.to_string()).await,
        }
    });

    info!("Submitted edit job {}", job_id);
    Ok(Json(JobSubmittedResponse { job_id }))
}
