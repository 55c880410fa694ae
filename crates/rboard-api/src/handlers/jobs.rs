//! Job polling handlers.

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use rboard_models::{JobId, JobKind, JobState};

use crate::error::ApiResult;
use crate::state::AppState;

/// Response for polling a job.
#[derive(Serialize)]
pub struct JobStatusResponse {
    pub job_id: String,
    pub kind: JobKind,
    pub status: JobState,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Poll a job by id. Terminal jobs keep answering until evicted; unknown
/// ids are 404.
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobStatusResponse>> {
    let record = state.jobs.poll(&JobId::from_string(&job_id)).await?;

    Ok(Json(JobStatusResponse {
        job_id: record.id.to_string(),
        kind: record.kind,
        status: record.state,
        progress: record.progress,
        message: record.message,
        data: record.data,
        error: record.error,
    }))
}
