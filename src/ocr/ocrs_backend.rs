//! OCRS engine: pure-Rust OCR via the ocrs crate.
//!
//! No external binaries; models are loaded once into a process-wide cache.
//! Models must be present in one of the standard directories (see
//! `ModelDirConfig`) — set HWX_MODEL_DIR to override.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Instant;

use async_trait::async_trait;

use super::engine::{EngineError, EngineKind, EngineResult, ExtractionEngine};
use super::model_utils::ModelDirConfig;

/// Global cached OcrEngine instance (initialized once, reused for all calls).
/// OcrEngine is Send+Sync and its methods take &self, so no Mutex needed.
static OCR_ENGINE: OnceLock<ocrs::OcrEngine> = OnceLock::new();

const MODEL_CONFIG: ModelDirConfig = ModelDirConfig {
    subdir: "ocrs",
    required_files: &["text-detection.rten", "text-recognition.rten"],
};

/// ocrs exposes no per-box scores through the text API; results carry this
/// fixed confidence.
const OCRS_CONFIDENCE: f32 = 0.75;

/// OCRS OCR engine (traditional, local, pure Rust).
pub struct OcrsEngine {
    model_dir: Option<PathBuf>,
}

impl OcrsEngine {
    pub fn new() -> Self {
        Self { model_dir: None }
    }

    /// Use an explicit model directory instead of the standard locations.
    pub fn with_model_dir(model_dir: PathBuf) -> Self {
        Self {
            model_dir: Some(model_dir),
        }
    }

    fn find_model_dir(&self) -> Option<PathBuf> {
        if let Some(ref dir) = self.model_dir {
            if MODEL_CONFIG.has_required_files(dir) {
                return Some(dir.clone());
            }
        }
        MODEL_CONFIG.find()
    }

    fn get_or_init_engine(&self) -> Result<&'static ocrs::OcrEngine, EngineError> {
        if let Some(engine) = OCR_ENGINE.get() {
            return Ok(engine);
        }

        let model_dir = self.find_model_dir().ok_or_else(|| {
            EngineError::Unavailable(format!(
                "ocrs models not found; place {:?} under one of {:?}",
                MODEL_CONFIG.required_files,
                MODEL_CONFIG.candidate_dirs()
            ))
        })?;

        let detection_model = rten::Model::load_file(model_dir.join("text-detection.rten"))
            .map_err(|e| EngineError::Failed(format!("failed to load detection model: {}", e)))?;
        let recognition_model = rten::Model::load_file(model_dir.join("text-recognition.rten"))
            .map_err(|e| EngineError::Failed(format!("failed to load recognition model: {}", e)))?;

        let engine = ocrs::OcrEngine::new(ocrs::OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            ..Default::default()
        })
        .map_err(|e| EngineError::Failed(format!("failed to create ocrs engine: {}", e)))?;

        // If another task won the initialization race, use its engine.
        let _ = OCR_ENGINE.set(engine);
        OCR_ENGINE
            .get()
            .ok_or_else(|| EngineError::Failed("failed to cache ocrs engine".to_string()))
    }

    fn run_ocrs(&self, image_path: &Path) -> Result<String, EngineError> {
        let engine = self.get_or_init_engine()?;

        let img = image::open(image_path)
            .map_err(|e| EngineError::Image(format!("failed to load image: {}", e)))?;
        let rgb_img = img.to_rgb8();
        let (width, height) = rgb_img.dimensions();

        let img_source = ocrs::ImageSource::from_bytes(rgb_img.as_raw(), (width, height))
            .map_err(|e| EngineError::Image(format!("failed to convert image: {}", e)))?;

        let input = engine
            .prepare_input(img_source)
            .map_err(|e| EngineError::Failed(format!("failed to prepare input: {}", e)))?;

        engine
            .get_text(&input)
            .map_err(|e| EngineError::Failed(format!("failed to extract text: {}", e)))
    }
}

impl Default for OcrsEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExtractionEngine for OcrsEngine {
    fn name(&self) -> &str {
        "ocrs"
    }

    fn kind(&self) -> EngineKind {
        EngineKind::TraditionalOcr
    }

    fn is_available(&self) -> bool {
        self.find_model_dir().is_some()
    }

    fn availability_hint(&self) -> String {
        match self.find_model_dir() {
            Some(path) => format!("ocrs models found at {:?}", path),
            None => format!(
                "ocrs models missing; place {:?} under one of the model directories \
                 or set HWX_MODEL_DIR",
                MODEL_CONFIG.required_files
            ),
        }
    }

    async fn extract(
        &self,
        image_path: &Path,
        _language_hint: &str,
    ) -> Result<EngineResult, EngineError> {
        let start = Instant::now();
        let path = image_path.to_path_buf();
        let model_dir = self.model_dir.clone();

        let text = tokio::task::spawn_blocking(move || {
            let engine = match model_dir {
                Some(dir) => OcrsEngine::with_model_dir(dir),
                None => OcrsEngine::new(),
            };
            engine.run_ocrs(&path)
        })
        .await
        .map_err(|e| EngineError::Failed(format!("ocrs task panicked: {}", e)))??;

        Ok(EngineResult {
            text,
            structured: None,
            confidence: OCRS_CONFIDENCE,
            engine: self.name().to_string(),
            processing_time_ms: start.elapsed().as_secs_f64() * 1000.0,
        })
    }
}
