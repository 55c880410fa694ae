//! API integration tests against stub capabilities.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use rboard_ai::{AiError, AiResult, ImageCapability, ImageOutput, PromptPart, TextCapability};
use rboard_api::{create_router, ApiConfig, AppState};
use rboard_jobs::{JobRegistry, JobsConfig};
use rboard_store::MemoryMediaStore;

struct StubText;

#[async_trait]
impl TextCapability for StubText {
    async fn generate_structured(
        &self,
        prompt: &str,
        _schema: serde_json::Value,
    ) -> AiResult<serde_json::Value> {
        if prompt.contains("Identify every character") {
            return Ok(serde_json::json!({"entities": [
                {"name": "Ava", "type": "character", "description": "lead"}
            ]}));
        }
        if prompt.contains("Analyze this film script") {
            return Ok(serde_json::json!({
                "environment": "Kitchen",
                "time_of_day": "day"
            }));
        }
        if prompt.contains("Break this script") {
            return Ok(serde_json::json!({"shots": [
                {"index": 1, "summary": "establishing", "action_segment": "Ava pours coffee."}
            ]}));
        }
        if prompt.contains("Produce the full visual breakdown") {
            return Ok(serde_json::json!({
                "visual_breakdown": {
                    "scene": {"environment": "Kitchen", "time_of_day": "day"},
                    "framing": "wide"
                }
            }));
        }
        Err(AiError::unavailable("unexpected prompt"))
    }
}

struct StubImage;

#[async_trait]
impl ImageCapability for StubImage {
    async fn generate_image(&self, _parts: &[PromptPart], _aspect: &str) -> AiResult<ImageOutput> {
        Ok(ImageOutput::Bytes {
            data: b"frame".to_vec(),
            mime_type: "image/png".to_string(),
        })
    }
}

fn test_app() -> Router {
    let state = AppState::with_components(
        ApiConfig::default(),
        Arc::new(StubText),
        Arc::new(StubImage),
        Arc::new(MemoryMediaStore::new()),
        Arc::new(JobRegistry::new(JobsConfig::default())),
    );
    create_router(state)
}

async fn request_json(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let request = match body {
        Some(json) => Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = test_app();
    let (status, body) = request_json(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_unknown_job_is_404() {
    let app = test_app();
    let (status, _) = request_json(&app, "GET", "/api/jobs/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_identify_entities_inline() {
    let app = test_app();
    let (status, body) = request_json(
        &app,
        "POST",
        "/api/entities/identify",
        Some(serde_json::json!({"script": "INT. KITCHEN - DAY\nAva pours coffee."})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let entities = body["entities"].as_array().unwrap();
    assert_eq!(entities.len(), 1);
    assert_eq!(entities[0]["name"], "Ava");
    assert_eq!(entities[0]["ref_tag"], "image 1");
}

#[tokio::test]
async fn test_identify_rejects_empty_script() {
    let app = test_app();
    let (status, _) = request_json(
        &app,
        "POST",
        "/api/entities/identify",
        Some(serde_json::json!({"script": ""})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_continuity_check_inline() {
    let app = test_app();

    let shot = |id: &str, outfit: &str| {
        serde_json::json!({
            "shot_id": id,
            "action_segment": "",
            "visual_breakdown": {
                "scene": {"environment": "Kitchen", "time_of_day": "day"},
                "characters": [{
                    "name": "Ava",
                    "position": "left",
                    "appearance": {"description": outfit}
                }],
                "framing": "wide"
            }
        })
    };

    let (status, body) = request_json(
        &app,
        "POST",
        "/api/continuity/check",
        Some(serde_json::json!({"shots": [shot("s1", "red coat"), shot("s2", "blue coat")]})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let issues = body["issues"].as_array().unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0]["category"], "outfit");
    assert_eq!(issues[0]["severity"], "error");
    assert_eq!(issues[0]["shot_id"], "s2");
}

#[tokio::test]
async fn test_continuity_fix_roundtrip() {
    let app = test_app();

    let shots = serde_json::json!({"shots": [
        {
            "shot_id": "s1",
            "action_segment": "",
            "visual_breakdown": {
                "scene": {"environment": "Kitchen", "time_of_day": "day"},
                "framing": "wide"
            }
        },
        {
            "shot_id": "s2",
            "action_segment": "",
            "visual_breakdown": {
                "scene": {"environment": "Kitchen", "time_of_day": "night"},
                "framing": "wide"
            }
        }
    ]});

    let (_, body) = request_json(&app, "POST", "/api/continuity/check", Some(shots.clone())).await;
    let issue = body["issues"][0].clone();
    assert_eq!(issue["category"], "time");

    let (status, body) = request_json(
        &app,
        "POST",
        "/api/continuity/fix",
        Some(serde_json::json!({
            "shot": shots["shots"][1],
            "issue": issue,
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["shot"]["visual_breakdown"]["scene"]["time_of_day"],
        "day"
    );
    assert_eq!(body["issue"]["resolved"], true);
}

/// Poll a job until it leaves the processing state.
async fn await_job(app: &Router, job_id: &str) -> serde_json::Value {
    for _ in 0..100 {
        let (status, body) =
            request_json(app, "GET", &format!("/api/jobs/{}", job_id), None).await;
        assert_eq!(status, StatusCode::OK);
        if body["status"] != "processing" {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {} never finished", job_id);
}

#[tokio::test]
async fn test_plan_job_flow() {
    let app = test_app();

    let (status, body) = request_json(
        &app,
        "POST",
        "/api/sequences/plan",
        Some(serde_json::json!({"script": "INT. KITCHEN - DAY\nAva pours coffee."})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let job_id = body["job_id"].as_str().unwrap().to_string();
    let job = await_job(&app, &job_id).await;

    assert_eq!(job["status"], "completed");
    let shots = job["data"]["shots"].as_array().unwrap();
    assert_eq!(shots.len(), 1);
    assert_eq!(job["data"]["shot_plan"].as_array().unwrap().len(), 1);
    assert_eq!(shots[0]["role"], "master");
}

#[tokio::test]
async fn test_render_sequence_job_flow() {
    let app = test_app();

    let shot = serde_json::json!({
        "shot_id": "s1",
        "role": "master",
        "action_segment": "Ava pours coffee.",
        "visual_breakdown": {
            "scene": {"environment": "Kitchen", "time_of_day": "day"},
            "framing": "wide"
        }
    });

    let (status, body) = request_json(
        &app,
        "POST",
        "/api/sequences/render",
        Some(serde_json::json!({"shots": [shot]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let job_id = body["job_id"].as_str().unwrap().to_string();
    let job = await_job(&app, &job_id).await;

    assert_eq!(job["status"], "completed");
    assert_eq!(job["data"]["failures"], 0);
    let rendered = &job["data"]["shots"][0]["shot"];
    assert!(rendered["image_url"].as_str().unwrap().starts_with("mem://"));
}
