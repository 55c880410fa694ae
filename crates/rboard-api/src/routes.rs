//! API routes.

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::continuity::{check, fix};
use crate::handlers::entities::identify_entities;
use crate::handlers::health::{health, ready};
use crate::handlers::jobs::get_job;
use crate::handlers::planning::{analyze_custom_shot, expand_shot, plan_sequence};
use crate::handlers::shots::{edit_shot, render_sequence, render_shot};
use crate::middleware::{cors_layer, request_id, request_logging};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    let entity_routes = Router::new().route("/entities/identify", post(identify_entities));

    let sequence_routes = Router::new()
        // Plan a script into shots (async job)
        .route("/sequences/plan", post(plan_sequence))
        // Batch render (async job, per-shot progress)
        .route("/sequences/render", post(render_sequence));

    let shot_routes = Router::new()
        // On-demand detail expansion of one planned shot
        .route("/shots/expand", post(expand_shot))
        // Ad-hoc shot insertion
        .route("/shots/custom", post(analyze_custom_shot))
        // Single shot render (async job)
        .route("/shots/render", post(render_shot))
        // Edit an already-rendered shot (async job)
        .route("/shots/edit", post(edit_shot));

    let continuity_routes = Router::new()
        .route("/continuity/check", post(check))
        .route("/continuity/fix", post(fix));

    let job_routes = Router::new().route("/jobs/:job_id", get(get_job));

    let api_routes = Router::new()
        .merge(entity_routes)
        .merge(sequence_routes)
        .merge(shot_routes)
        .merge(continuity_routes)
        .merge(job_routes);

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ready", get(ready));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
