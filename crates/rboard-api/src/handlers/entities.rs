//! Entity identification handlers.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use rboard_engine::EntityRegistry;
use rboard_models::Entity;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Request to identify entities in a script.
#[derive(Debug, Deserialize, Validate)]
pub struct IdentifyRequest {
    /// Script text to analyze
    #[validate(length(min = 1, max = 200_000))]
    pub script: String,

    /// Project-wide entities already known (matched by normalized name)
    #[serde(default)]
    pub global_entities: Vec<Entity>,

    /// Entities already identified for this sequence
    #[serde(default)]
    pub local_entities: Vec<Entity>,
}

/// Response with the newly created local entities.
#[derive(Serialize)]
pub struct IdentifyResponse {
    pub entities: Vec<Entity>,
}

/// Identify characters/locations/items mentioned in a script.
///
/// Names matching an existing global entity come back as links (copied
/// image/name, fresh local id) rather than duplicates. Persisting the new
/// entities into the sequence document is the caller's job.
pub async fn identify_entities(
    State(state): State<AppState>,
    Json(request): Json<IdentifyRequest>,
) -> ApiResult<Json<IdentifyResponse>> {
    request
        .validate()
        .map_err(|e| ApiError::validation(e.to_string()))?;

    let mut registry = EntityRegistry::new(request.global_entities, request.local_entities);
    let entities = registry
        .identify(state.text.as_ref(), &request.script)
        .await?;

    info!("Identified {} new entities", entities.len());
    Ok(Json(IdentifyResponse { entities }))
}
