//! Google Gemini vision engine.
//!
//! Uses the generateContent endpoint with an inline base64 image and the
//! language-specific extraction prompt. Requires GEMINI_API_KEY.

use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use super::engine::{image_mime_type, EngineError, EngineKind, EngineResult, ExtractionEngine};
use super::prompts;
use super::response::{parse_structured_response, FALLBACK_CONFIDENCE_VISION};
use crate::retry::retry_external;

const DEFAULT_MODEL: &str = "gemini-2.0-flash";

const MAX_OUTPUT_TOKENS: u32 = 4096;

/// Gemini vision engine.
pub struct GeminiEngine {
    api_key: Option<String>,
    model: String,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text { text: String },
    InlineData { inline_data: GeminiInlineData },
}

#[derive(Debug, Serialize)]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiApiError>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiResponseContent,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiApiError {
    message: String,
}

impl GeminiEngine {
    pub fn new(api_key: Option<String>, model: Option<String>, timeout: Duration) -> Self {
        Self {
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            timeout,
        }
    }

    fn create_client(&self) -> Result<reqwest::Client, EngineError> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| EngineError::Failed(format!("failed to create HTTP client: {}", e)))
    }

    fn build_request(&self, image_base64: String, mime_type: &str, language: &str) -> GeminiRequest {
        GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![
                    GeminiPart::Text {
                        text: prompts::extraction_prompt(language).to_string(),
                    },
                    GeminiPart::InlineData {
                        inline_data: GeminiInlineData {
                            mime_type: mime_type.to_string(),
                            data: image_base64,
                        },
                    },
                ],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: 0.1,
                max_output_tokens: MAX_OUTPUT_TOKENS,
            },
        }
    }

    async fn request_content(&self, request: &GeminiRequest) -> Result<String, EngineError> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            EngineError::Unavailable(
                "GEMINI_API_KEY not set. Get an API key from https://ai.google.dev/".to_string(),
            )
        })?;

        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, api_key
        );
        let client = self.create_client()?;

        let response = client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| EngineError::from_reqwest(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed: GeminiResponse = response
            .json()
            .await
            .map_err(|e| EngineError::Transport(format!("failed to read response body: {}", e)))?;

        if let Some(error) = parsed.error {
            return Err(EngineError::Failed(format!("Gemini API error: {}", error.message)));
        }

        parsed
            .candidates
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.content.parts.into_iter().next())
            .and_then(|p| p.text)
            .ok_or_else(|| EngineError::Failed("response carried no candidates".to_string()))
    }
}

#[async_trait]
impl ExtractionEngine for GeminiEngine {
    fn name(&self) -> &str {
        "gemini"
    }

    fn kind(&self) -> EngineKind {
        EngineKind::VisionLlm
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    fn availability_hint(&self) -> String {
        if self.api_key.is_some() {
            format!("Gemini vision is available (model: {})", self.model)
        } else {
            "GEMINI_API_KEY not set. Get an API key from https://ai.google.dev/".to_string()
        }
    }

    async fn extract(
        &self,
        image_path: &Path,
        language_hint: &str,
    ) -> Result<EngineResult, EngineError> {
        let start = Instant::now();

        let image_bytes = tokio::fs::read(image_path).await?;
        let image_base64 = base64::engine::general_purpose::STANDARD.encode(&image_bytes);
        let request = self.build_request(image_base64, image_mime_type(image_path), language_hint);

        let content = retry_external("gemini", || self.request_content(&request)).await?;

        let extraction = parse_structured_response(&content, FALLBACK_CONFIDENCE_VISION);
        let text = if extraction.description.is_empty() {
            content.trim().to_string()
        } else {
            extraction.description.clone()
        };

        Ok(EngineResult {
            text,
            confidence: extraction.confidence,
            structured: Some(extraction),
            engine: self.name().to_string(),
            processing_time_ms: start.elapsed().as_secs_f64() * 1000.0,
        })
    }
}
