//! Together AI vision engine.
//!
//! Sends the image (base64 data URI) plus a language-specific JSON-schema
//! prompt to Together's chat completions API and parses the structured
//! response. Requires TOGETHER_API_KEY.

use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use super::engine::{image_mime_type, EngineError, EngineKind, EngineResult, ExtractionEngine};
use super::prompts;
use super::response::{parse_structured_response, FALLBACK_CONFIDENCE_VISION};
use crate::retry::retry_external;

const API_URL: &str = "https://api.together.xyz/v1/chat/completions";

const DEFAULT_MODEL: &str = "meta-llama/Llama-4-Scout-17B-16E-Instruct";

const MAX_TOKENS: u32 = 4096;

/// Together AI vision engine.
pub struct TogetherEngine {
    api_key: Option<String>,
    model: String,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct TogetherRequest {
    model: String,
    messages: Vec<TogetherMessage>,
    max_tokens: u32,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct TogetherMessage {
    role: &'static str,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct TogetherResponse {
    #[serde(default)]
    choices: Vec<TogetherChoice>,
}

#[derive(Debug, Deserialize)]
struct TogetherChoice {
    message: TogetherResponseMessage,
}

#[derive(Debug, Deserialize)]
struct TogetherResponseMessage {
    #[serde(default)]
    content: String,
}

impl TogetherEngine {
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

    fn build_request(&self, image_base64: String, mime_type: &str, language: &str) -> TogetherRequest {
        TogetherRequest {
            model: self.model.clone(),
            messages: vec![
                TogetherMessage {
                    role: "system",
                    content: MessageContent::Text(prompts::SYSTEM_PROMPT.to_string()),
                },
                TogetherMessage {
                    role: "user",
                    content: MessageContent::Parts(vec![
                        ContentPart::Text {
                            text: prompts::extraction_prompt(language).to_string(),
                        },
                        ContentPart::ImageUrl {
                            image_url: ImageUrl {
                                url: format!("data:{};base64,{}", mime_type, image_base64),
                            },
                        },
                    ]),
                },
            ],
            max_tokens: MAX_TOKENS,
            temperature: 0.1,
            response_format: ResponseFormat { kind: "json_object" },
        }
    }

    async fn request_content(&self, request: &TogetherRequest) -> Result<String, EngineError> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            EngineError::Unavailable("TOGETHER_API_KEY not set".to_string())
        })?;
        let client = self.create_client()?;

        let response = client
            .post(API_URL)
            .bearer_auth(api_key)
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

        let parsed: TogetherResponse = response
            .json()
            .await
            .map_err(|e| EngineError::Transport(format!("failed to read response body: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| EngineError::Failed("response carried no choices".to_string()))
    }
}

#[async_trait]
impl ExtractionEngine for TogetherEngine {
    fn name(&self) -> &str {
        "together"
    }

    fn kind(&self) -> EngineKind {
        EngineKind::VisionLlm
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    fn availability_hint(&self) -> String {
        if self.api_key.is_some() {
            format!("Together AI vision is available (model: {})", self.model)
        } else {
            "TOGETHER_API_KEY not set. Get an API key from https://api.together.xyz/".to_string()
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

        let content = retry_external("together", || self.request_content(&request)).await?;

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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_embeds_image_and_prompt() {
        let engine = TogetherEngine::new(Some("k".into()), None, Duration::from_secs(60));
        let request = engine.build_request("QUJD".into(), "image/png", "en");
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["model"], DEFAULT_MODEL);
        assert_eq!(json["messages"][0]["role"], "system");
        let image_url = json["messages"][1]["content"][1]["image_url"]["url"]
            .as_str()
            .unwrap();
        assert!(image_url.starts_with("data:image/png;base64,QUJD"));
        assert_eq!(json["response_format"]["type"], "json_object");
    }

    #[test]
    fn unavailable_without_key() {
        let engine = TogetherEngine::new(None, None, Duration::from_secs(60));
        assert!(!engine.is_available());
        assert!(engine.availability_hint().contains("TOGETHER_API_KEY"));
    }
}
