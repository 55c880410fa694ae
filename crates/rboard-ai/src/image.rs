//! Image-generation capability.
//!
//! Two backends behind one trait: [`GeminiImage`] answers synchronously with
//! inline image bytes; [`PolledImage`] submits a job and polls a status
//! endpoint with a bounded attempt budget. Callers always await a final
//! [`ImageOutput`] and never see which backend answered.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{AiError, AiResult};

/// Hard cap on image parts per generation request. The reference budgeter
/// upstream guarantees it; the client refuses anything beyond it.
pub const MAX_IMAGE_PARTS: usize = 8;

/// One part of an image-generation prompt, in payload order.
#[derive(Debug, Clone)]
pub enum PromptPart {
    Text(String),
    Image { bytes: Vec<u8>, mime_type: String },
}

impl PromptPart {
    pub fn is_image(&self) -> bool {
        matches!(self, PromptPart::Image { .. })
    }
}

/// Result of an image generation call.
#[derive(Debug, Clone)]
pub enum ImageOutput {
    /// Raw image bytes, to be persisted by the caller
    Bytes { data: Vec<u8>, mime_type: String },
    /// An external URL hosting the result
    Url(String),
}

/// Image generation capability.
#[async_trait]
pub trait ImageCapability: Send + Sync {
    /// Generate an image from ordered prompt parts at the given aspect
    /// ratio (e.g. "16:9").
    async fn generate_image(&self, parts: &[PromptPart], aspect: &str) -> AiResult<ImageOutput>;
}

fn check_image_budget(parts: &[PromptPart]) -> AiResult<()> {
    let image_count = parts.iter().filter(|p| p.is_image()).count();
    if image_count > MAX_IMAGE_PARTS {
        return Err(AiError::invalid_request(format!(
            "{} image parts exceeds the cap of {}",
            image_count, MAX_IMAGE_PARTS
        )));
    }
    Ok(())
}

// ============================================================================
// Synchronous Gemini backend
// ============================================================================

/// Configuration for the Gemini image client.
#[derive(Debug, Clone)]
pub struct GeminiImageConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl GeminiImageConfig {
    /// Create config from environment variables.
    pub fn from_env() -> AiResult<Self> {
        Ok(Self {
            api_key: std::env::var("GEMINI_API_KEY")
                .map_err(|_| AiError::config("GEMINI_API_KEY not set"))?,
            model: std::env::var("GEMINI_IMAGE_MODEL")
                .unwrap_or_else(|_| "gemini-2.5-flash-image".to_string()),
            base_url: std::env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string()),
        })
    }
}

/// Synchronous Gemini image client (inline data in, inline data out).
pub struct GeminiImage {
    config: GeminiImageConfig,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ImageRequest {
    contents: Vec<ImageContent>,
    #[serde(rename = "generationConfig")]
    generation_config: ImageGenerationConfig,
}

#[derive(Debug, Serialize)]
struct ImageContent {
    parts: Vec<ImageRequestPart>,
}

#[derive(Debug, Serialize)]
struct ImageRequestPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "inlineData", skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct ImageGenerationConfig {
    #[serde(rename = "responseModalities")]
    response_modalities: Vec<String>,
    #[serde(rename = "imageConfig")]
    image_config: ImageConfig,
}

#[derive(Debug, Serialize)]
struct ImageConfig {
    #[serde(rename = "aspectRatio")]
    aspect_ratio: String,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    #[serde(default)]
    candidates: Vec<ImageCandidate>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<ImagePromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct ImageCandidate {
    content: ImageResponseContent,
}

#[derive(Debug, Deserialize)]
struct ImageResponseContent {
    parts: Vec<ImageResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ImageResponsePart {
    #[serde(rename = "inlineData")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
struct ImagePromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}

impl GeminiImage {
    pub fn new(config: GeminiImageConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_env() -> AiResult<Self> {
        Ok(Self::new(GeminiImageConfig::from_env()?))
    }
}

#[async_trait]
impl ImageCapability for GeminiImage {
    async fn generate_image(&self, parts: &[PromptPart], aspect: &str) -> AiResult<ImageOutput> {
        check_image_budget(parts)?;

        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.config.base_url, self.config.model, self.config.api_key
        );

        let request_parts: Vec<ImageRequestPart> = parts
            .iter()
            .map(|part| match part {
                PromptPart::Text(text) => ImageRequestPart {
                    text: Some(text.clone()),
                    inline_data: None,
                },
                PromptPart::Image { bytes, mime_type } => ImageRequestPart {
                    text: None,
                    inline_data: Some(InlineData {
                        mime_type: mime_type.clone(),
                        data: BASE64.encode(bytes),
                    }),
                },
            })
            .collect();

        let request = ImageRequest {
            contents: vec![ImageContent {
                parts: request_parts,
            }],
            generation_config: ImageGenerationConfig {
                response_modalities: vec!["IMAGE".to_string()],
                image_config: ImageConfig {
                    aspect_ratio: aspect.to_string(),
                },
            },
        };

        debug!(
            "Calling image model {} with {} parts",
            self.config.model,
            parts.len()
        );

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AiError::unavailable(format!("image capability request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            warn!("Image capability returned {}: {}", status, error_text);
            return Err(AiError::unavailable(format!(
                "image capability returned {}: {}",
                status, error_text
            )));
        }

        let image_response: ImageResponse = response
            .json()
            .await
            .map_err(|e| AiError::schema(format!("unparseable image response: {}", e)))?;

        if let Some(feedback) = &image_response.prompt_feedback {
            if let Some(reason) = &feedback.block_reason {
                return Err(AiError::safety(reason.clone()));
            }
        }

        let inline = image_response
            .candidates
            .first()
            .and_then(|c| c.content.parts.iter().find_map(|p| p.inline_data.as_ref()))
            .ok_or_else(|| AiError::schema("no image data in capability response"))?;

        let data = BASE64
            .decode(inline.data.as_bytes())
            .map_err(|e| AiError::schema(format!("image payload is not valid base64: {}", e)))?;

        Ok(ImageOutput::Bytes {
            data,
            mime_type: inline.mime_type.clone(),
        })
    }
}

// ============================================================================
// Submit-then-poll backend
// ============================================================================

/// Configuration for the polled image backend.
#[derive(Debug, Clone)]
pub struct PolledImageConfig {
    /// Base URL of the generation service
    pub base_url: String,
    /// API key sent as a bearer token
    pub api_key: String,
    /// Delay between poll attempts
    pub poll_interval: Duration,
    /// Maximum poll attempts before surfacing a timeout
    pub max_attempts: u32,
}

impl PolledImageConfig {
    /// Create config from environment variables.
    pub fn from_env() -> AiResult<Self> {
        Ok(Self {
            base_url: std::env::var("IMAGE_SERVICE_URL")
                .map_err(|_| AiError::config("IMAGE_SERVICE_URL not set"))?,
            api_key: std::env::var("IMAGE_SERVICE_KEY")
                .map_err(|_| AiError::config("IMAGE_SERVICE_KEY not set"))?,
            poll_interval: Duration::from_millis(
                std::env::var("IMAGE_POLL_INTERVAL_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2000),
            ),
            max_attempts: std::env::var("IMAGE_POLL_MAX_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(90),
        })
    }
}

/// Image backend that submits a generation job and polls for the result.
pub struct PolledImage {
    config: PolledImageConfig,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct SubmitRequest {
    prompt: String,
    /// Base64-encoded reference images, in payload order
    images: Vec<SubmitImage>,
    aspect: String,
}

#[derive(Debug, Serialize)]
struct SubmitImage {
    data: String,
    mime_type: String,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    job_id: String,
}

#[derive(Debug, Deserialize)]
struct PollResponse {
    status: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl PolledImage {
    pub fn new(config: PolledImageConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_env() -> AiResult<Self> {
        Ok(Self::new(PolledImageConfig::from_env()?))
    }

    /// Submit the generation job, returning its id.
    async fn submit(&self, parts: &[PromptPart], aspect: &str) -> AiResult<String> {
        let prompt = parts
            .iter()
            .filter_map(|p| match p {
                PromptPart::Text(text) => Some(text.as_str()),
                PromptPart::Image { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        let images = parts
            .iter()
            .filter_map(|p| match p {
                PromptPart::Image { bytes, mime_type } => Some(SubmitImage {
                    data: BASE64.encode(bytes),
                    mime_type: mime_type.clone(),
                }),
                PromptPart::Text(_) => None,
            })
            .collect();

        let response = self
            .client
            .post(format!("{}/v1/generations", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&SubmitRequest {
                prompt,
                images,
                aspect: aspect.to_string(),
            })
            .send()
            .await
            .map_err(|e| AiError::unavailable(format!("image submit failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AiError::unavailable(format!(
                "image service returned {}: {}",
                status, error_text
            )));
        }

        let submitted: SubmitResponse = response
            .json()
            .await
            .map_err(|e| AiError::schema(format!("unparseable submit response: {}", e)))?;

        Ok(submitted.job_id)
    }

    /// Poll the job once.
    async fn poll(&self, job_id: &str) -> AiResult<PollResponse> {
        let response = self
            .client
            .get(format!(
                "{}/v1/generations/{}",
                self.config.base_url, job_id
            ))
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|e| AiError::unavailable(format!("image poll failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AiError::unavailable(format!(
                "image status endpoint returned {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AiError::schema(format!("unparseable poll response: {}", e)))
    }
}

#[async_trait]
impl ImageCapability for PolledImage {
    async fn generate_image(&self, parts: &[PromptPart], aspect: &str) -> AiResult<ImageOutput> {
        check_image_budget(parts)?;

        let job_id = self.submit(parts, aspect).await?;
        info!("Submitted image generation job {}", job_id);

        for attempt in 0..self.config.max_attempts {
            tokio::time::sleep(self.config.poll_interval).await;

            let status = self.poll(&job_id).await?;
            match status.status.as_str() {
                "completed" => {
                    let url = status
                        .url
                        .ok_or_else(|| AiError::schema("completed job has no result URL"))?;
                    info!("Image job {} completed after {} polls", job_id, attempt + 1);
                    return Ok(ImageOutput::Url(url));
                }
                "failed" => {
                    let message = status.error.unwrap_or_else(|| "unknown error".to_string());
                    return Err(AiError::unavailable(format!(
                        "image job {} failed: {}",
                        job_id, message
                    )));
                }
                _ => {
                    debug!("Image job {} still {}", job_id, status.status);
                }
            }
        }

        // The wait budget is exhausted, not the call itself failed; callers
        // may retry the wait.
        Err(AiError::timeout(format!(
            "image job {} still running after {} polls",
            job_id, self.config.max_attempts
        )))
    }
}

/// Select an image backend from the environment (`IMAGE_BACKEND=gemini`
/// (default) or `polled`).
pub fn image_capability_from_env() -> AiResult<Arc<dyn ImageCapability>> {
    let backend = std::env::var("IMAGE_BACKEND").unwrap_or_else(|_| "gemini".to_string());
    match backend.as_str() {
        "gemini" => Ok(Arc::new(GeminiImage::from_env()?)),
        "polled" => Ok(Arc::new(PolledImage::from_env()?)),
        other => Err(AiError::config(format!(
            "unknown IMAGE_BACKEND '{}' (expected 'gemini' or 'polled')",
            other
        ))),
    }
}
