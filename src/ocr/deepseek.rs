//! DeepSeek text engine.
//!
//! Text-only LLM used to upgrade raw OCR text into a structured record on
//! the traditional path. Homework text routinely contains student, parent
//! and school names, so everything sent here passes through the PII redactor
//! in aggressive mode first — the raw text never leaves the process.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::engine::EngineError;
use super::prompts;
use super::response::{parse_structured_response, FALLBACK_CONFIDENCE_TEXT};
use crate::extraction::HomeworkExtraction;
use crate::pii::PiiRedactor;
use crate::retry::retry_external;

const API_URL: &str = "https://api.deepseek.com/v1/chat/completions";

const DEFAULT_MODEL: &str = "deepseek-chat";

const MAX_TOKENS: u32 = 2048;

/// DeepSeek-backed text enhancer.
pub struct DeepSeekEnhancer {
    api_key: Option<String>,
    model: String,
    timeout: Duration,
    redactor: Arc<PiiRedactor>,
}

#[derive(Debug, Serialize)]
struct DeepSeekRequest {
    model: String,
    messages: Vec<DeepSeekMessage>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct DeepSeekMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct DeepSeekResponse {
    #[serde(default)]
    choices: Vec<DeepSeekChoice>,
}

#[derive(Debug, Deserialize)]
struct DeepSeekChoice {
    message: DeepSeekResponseMessage,
}

#[derive(Debug, Deserialize)]
struct DeepSeekResponseMessage {
    #[serde(default)]
    content: String,
}

impl DeepSeekEnhancer {
    pub fn new(api_key: Option<String>, timeout: Duration, redactor: Arc<PiiRedactor>) -> Self {
        Self {
            api_key,
            model: DEFAULT_MODEL.to_string(),
            timeout,
            redactor,
        }
    }

    pub fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    /// Structure already-OCR'd text into a homework record.
    ///
    /// The text is redacted before transmission; a malformed model response
    /// degrades to a low-confidence record instead of failing.
    pub async fn extract_from_text(
        &self,
        ocr_text: &str,
        language: &str,
    ) -> Result<HomeworkExtraction, EngineError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| EngineError::Unavailable("DEEPSEEK_API_KEY not set".to_string()))?;

        let (redacted, report) = self.redactor.redact(ocr_text, true);
        if report.total() > 0 {
            debug!("redacted {} PII item(s) before text enhancement", report.total());
        }

        let request = DeepSeekRequest {
            model: self.model.clone(),
            messages: vec![DeepSeekMessage {
                role: "user",
                content: prompts::text_extraction_prompt(language, &redacted),
            }],
            max_tokens: MAX_TOKENS,
        };

        let content = retry_external("deepseek", || self.request_content(api_key, &request)).await?;

        let mut extraction = parse_structured_response(&content, FALLBACK_CONFIDENCE_TEXT);
        // Keep the (redacted) source text for the audit trail; the model's
        // echo of it is not trustworthy.
        extraction.raw_text = redacted;
        Ok(extraction)
    }

    async fn request_content(
        &self,
        api_key: &str,
        request: &DeepSeekRequest,
    ) -> Result<String, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| EngineError::Failed(format!("failed to create HTTP client: {}", e)))?;

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

        let parsed: DeepSeekResponse = response
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
