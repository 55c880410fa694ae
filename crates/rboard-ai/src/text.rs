//! Text-understanding capability.
//!
//! One method: given a prompt and a strict output schema, return JSON
//! conforming to that schema or fail. The typed [`generate`] helper derives
//! the schema from a Rust type and parses the response back into it; a shape
//! mismatch is an error, never silently-defaulted content.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{AiError, AiResult};

/// Structured text generation capability.
#[async_trait]
pub trait TextCapability: Send + Sync {
    /// Generate JSON conforming to `schema` from `prompt`.
    async fn generate_structured(
        &self,
        prompt: &str,
        schema: serde_json::Value,
    ) -> AiResult<serde_json::Value>;
}

/// Typed wrapper: derive the schema from `T`, call the capability, parse
/// strictly into `T`.
pub async fn generate<T>(capability: &dyn TextCapability, prompt: &str) -> AiResult<T>
where
    T: DeserializeOwned + JsonSchema,
{
    let schema = serde_json::to_value(schemars::schema_for!(T))?;
    let value = capability.generate_structured(prompt, schema).await?;
    serde_json::from_value(value)
        .map_err(|e| AiError::schema(format!("structured response failed to parse: {}", e)))
}

/// Configuration for the Gemini text client.
#[derive(Debug, Clone)]
pub struct GeminiTextConfig {
    /// API key
    pub api_key: String,
    /// Model name, e.g. "gemini-2.5-flash"
    pub model: String,
    /// API base URL (overridable for tests)
    pub base_url: String,
}

impl GeminiTextConfig {
    /// Create config from environment variables.
    pub fn from_env() -> AiResult<Self> {
        Ok(Self {
            api_key: std::env::var("GEMINI_API_KEY")
                .map_err(|_| AiError::config("GEMINI_API_KEY not set"))?,
            model: std::env::var("GEMINI_TEXT_MODEL")
                .unwrap_or_else(|_| "gemini-2.5-flash".to_string()),
            base_url: std::env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string()),
        })
    }
}

/// Gemini structured-output text client.
pub struct GeminiText {
    config: GeminiTextConfig,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
    #[serde(rename = "responseSchema")]
    response_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct PromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}

impl GeminiText {
    pub fn new(config: GeminiTextConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> AiResult<Self> {
        Ok(Self::new(GeminiTextConfig::from_env()?))
    }
}

#[async_trait]
impl TextCapability for GeminiText {
    async fn generate_structured(
        &self,
        prompt: &str,
        schema: serde_json::Value,
    ) -> AiResult<serde_json::Value> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.config.base_url, self.config.model, self.config.api_key
        );

        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: schema,
            },
        };

        debug!("Calling text model {}", self.config.model);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AiError::unavailable(format!("text capability request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            warn!("Text capability returned {}: {}", status, error_text);
            return Err(AiError::unavailable(format!(
                "text capability returned {}: {}",
                status, error_text
            )));
        }

        let gemini_response: GeminiResponse = response
            .json()
            .await
            .map_err(|e| AiError::schema(format!("unparseable capability response: {}", e)))?;

        if let Some(feedback) = &gemini_response.prompt_feedback {
            if let Some(reason) = &feedback.block_reason {
                return Err(AiError::safety(reason.clone()));
            }
        }

        let text = gemini_response
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.as_str())
            .ok_or_else(|| AiError::schema("no content in capability response"))?;

        // Some models wrap JSON in markdown code fences despite the mime type.
        let text = text.trim();
        let text = text.strip_prefix("```json").unwrap_or(text);
        let text = text.strip_suffix("```").unwrap_or(text);

        serde_json::from_str(text.trim())
            .map_err(|e| AiError::schema(format!("capability returned invalid JSON: {}", e)))
    }
}
