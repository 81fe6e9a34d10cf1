//! Extraction engine abstraction.
//!
//! Every backend — traditional OCR or vision LLM — implements one contract:
//! [`ExtractionEngine::extract`]. Engines are registered in a typed list
//! ([`EngineRegistry`]) rather than probed for optional attributes, and the
//! selector decides which of them to invoke.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::extraction::HomeworkExtraction;

/// Errors from extraction engines.
///
/// A malformed-but-present model response is NOT an error: adapters degrade
/// that case into a low-confidence result internally. These variants cover
/// transport and configuration failures only — fail loud, never partial.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine not available: {0}")]
    Unavailable(String),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("extraction failed: {0}")]
    Failed(String),

    #[error("image error: {0}")]
    Image(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Whether the standard retry policy applies to this failure.
    pub fn is_transient(&self) -> bool {
        match self {
            EngineError::Transport(_) | EngineError::Timeout(_) => true,
            EngineError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Map a reqwest error onto the engine taxonomy.
    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            EngineError::Timeout(timeout)
        } else {
            EngineError::Transport(err.to_string())
        }
    }
}

/// The two engine families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineKind {
    /// Box-level local OCR: raw text plus per-box confidences, no structure.
    TraditionalOcr,
    /// Multimodal LLM: image in, structured JSON out.
    VisionLlm,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::TraditionalOcr => "traditional",
            EngineKind::VisionLlm => "vision",
        }
    }
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One adapter's output. Immutable once produced.
#[derive(Debug, Clone, Serialize)]
pub struct EngineResult {
    /// Extracted raw text.
    pub text: String,
    /// Structured record, when the engine produces one (vision engines only;
    /// traditional OCR leaves this `None` and heuristics fill it later).
    pub structured: Option<HomeworkExtraction>,
    /// Confidence score in [0, 1].
    pub confidence: f32,
    /// Which engine produced this result.
    pub engine: String,
    /// Processing time in milliseconds.
    pub processing_time_ms: f64,
}

/// Trait implemented by every extraction backend.
#[async_trait]
pub trait ExtractionEngine: Send + Sync {
    /// Stable engine name ("tesseract", "together", ...).
    fn name(&self) -> &str;

    /// Which family this engine belongs to.
    fn kind(&self) -> EngineKind;

    /// Whether the engine can run (binary installed, API key present, ...).
    fn is_available(&self) -> bool;

    /// Human-readable description of what is needed to make it available.
    fn availability_hint(&self) -> String;

    /// Run extraction on an image file.
    async fn extract(
        &self,
        image_path: &Path,
        language_hint: &str,
    ) -> Result<EngineResult, EngineError>;
}

/// MIME type for an image path, from its extension. JPEG when unknown.
pub fn image_mime_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}

/// Typed list of registered engines, split by family, preserving
/// registration order (which doubles as fallback order).
#[derive(Default, Clone)]
pub struct EngineRegistry {
    vision: Vec<Arc<dyn ExtractionEngine>>,
    traditional: Vec<Arc<dyn ExtractionEngine>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an engine. Placement follows the engine's declared kind.
    pub fn register(&mut self, engine: Arc<dyn ExtractionEngine>) {
        match engine.kind() {
            EngineKind::VisionLlm => self.vision.push(engine),
            EngineKind::TraditionalOcr => self.traditional.push(engine),
        }
    }

    /// Vision engines in registration order.
    pub fn vision_engines(&self) -> &[Arc<dyn ExtractionEngine>] {
        &self.vision
    }

    /// Traditional OCR engines in registration order.
    pub fn traditional_engines(&self) -> &[Arc<dyn ExtractionEngine>] {
        &self.traditional
    }

    /// Vision engines that can actually run right now.
    pub fn available_vision(&self) -> Vec<Arc<dyn ExtractionEngine>> {
        self.vision.iter().filter(|e| e.is_available()).cloned().collect()
    }

    /// Traditional engines that can actually run right now.
    pub fn available_traditional(&self) -> Vec<Arc<dyn ExtractionEngine>> {
        self.traditional.iter().filter(|e| e.is_available()).cloned().collect()
    }

    /// All registered engines, vision first.
    pub fn all(&self) -> impl Iterator<Item = &Arc<dyn ExtractionEngine>> {
        self.vision.iter().chain(self.traditional.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.vision.is_empty() && self.traditional.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(EngineError::Transport("reset".into()).is_transient());
        assert!(EngineError::Timeout(Duration::from_secs(60)).is_transient());
        assert!(EngineError::Api { status: 429, message: "slow down".into() }.is_transient());
        assert!(EngineError::Api { status: 503, message: "overloaded".into() }.is_transient());
        assert!(!EngineError::Api { status: 401, message: "bad key".into() }.is_transient());
        assert!(!EngineError::Unavailable("no key".into()).is_transient());
        assert!(!EngineError::Failed("bad output".into()).is_transient());
    }
}
