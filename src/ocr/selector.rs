//! Engine selection and fallback.
//!
//! Picks which engines to invoke for a given extraction based on the
//! configured mode and what is actually available, and walks a fixed
//! fallback order when the primary path fails:
//! ensemble -> single vision engines (configuration order) -> traditional OCR.
//!
//! Ensemble calls run concurrently; one engine's failure never cancels its
//! siblings — failed engines are logged and excluded from the merge input.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::deepseek::DeepSeekEnhancer;
use super::engine::{EngineError, EngineRegistry, EngineResult, ExtractionEngine};
use super::ensemble::{merge, MergeError};
use super::heuristics;
use super::preprocess::ImagePreprocessor;

/// Engine selection mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMode {
    /// Best available: ensemble of >=2 vision engines, else a single vision
    /// engine, else traditional OCR.
    #[default]
    Auto,
    /// Force multi-engine voting when possible; degrades to single vision.
    Ensemble,
    /// Single best vision engine.
    Vision,
    /// Traditional OCR only.
    Traditional,
}

impl ExtractionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMode::Auto => "auto",
            ExtractionMode::Ensemble => "ensemble",
            ExtractionMode::Vision => "vision",
            ExtractionMode::Traditional => "traditional",
        }
    }
}

impl FromStr for ExtractionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(ExtractionMode::Auto),
            "ensemble" => Ok(ExtractionMode::Ensemble),
            "vision" => Ok(ExtractionMode::Vision),
            "traditional" | "ocr" => Ok(ExtractionMode::Traditional),
            other => Err(format!("unknown extraction mode: {}", other)),
        }
    }
}

impl std::fmt::Display for ExtractionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why one engine (or one fallback step) failed.
#[derive(Debug, Clone)]
pub struct FailureReason {
    pub engine: String,
    pub message: String,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.engine, self.message)
    }
}

#[derive(Debug, Error)]
pub enum SelectorError {
    /// Raised at construction time, never deferred to first use.
    #[error("no extraction engines configured or available")]
    NoEnginesConfigured,

    /// Every step of the fallback chain failed.
    #[error("all extraction engines failed: [{}]", format_failures(.0))]
    AllEnginesFailed(Vec<FailureReason>),

    #[error(transparent)]
    Merge(#[from] MergeError),
}

fn format_failures(failures: &[FailureReason]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// One step of the extraction plan.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Attempt {
    Ensemble,
    Vision(usize),
    Traditional,
}

/// Chooses engines and walks the fallback chain.
pub struct EngineSelector {
    registry: EngineRegistry,
    enhancer: Option<DeepSeekEnhancer>,
    preprocessor: ImagePreprocessor,
    mode: ExtractionMode,
    enable_ensemble: bool,
    preprocess_enabled: bool,
    max_image_size: (u32, u32),
}

impl EngineSelector {
    pub fn new(
        registry: EngineRegistry,
        enhancer: Option<DeepSeekEnhancer>,
        preprocessor: ImagePreprocessor,
        mode: ExtractionMode,
        enable_ensemble: bool,
        preprocess_enabled: bool,
        max_image_size: (u32, u32),
    ) -> Result<Self, SelectorError> {
        if registry.is_empty() {
            return Err(SelectorError::NoEnginesConfigured);
        }
        Ok(Self {
            registry,
            enhancer,
            preprocessor,
            mode,
            enable_ensemble,
            preprocess_enabled,
            max_image_size,
        })
    }

    pub fn mode(&self) -> ExtractionMode {
        self.mode
    }

    pub fn registry(&self) -> &EngineRegistry {
        &self.registry
    }

    /// The ordered attempts for the configured mode: the preferred path
    /// first, then the standard fallback chain.
    fn plan(&self) -> Vec<Attempt> {
        let vision = self.registry.available_vision();
        let has_traditional = !self.registry.available_traditional().is_empty();
        let mut attempts = Vec::new();

        match self.mode {
            ExtractionMode::Traditional => {
                if has_traditional {
                    attempts.push(Attempt::Traditional);
                }
            }
            ExtractionMode::Vision => {
                for i in 0..vision.len() {
                    attempts.push(Attempt::Vision(i));
                }
                if has_traditional {
                    attempts.push(Attempt::Traditional);
                }
            }
            ExtractionMode::Auto | ExtractionMode::Ensemble => {
                if self.enable_ensemble && vision.len() >= 2 {
                    attempts.push(Attempt::Ensemble);
                }
                for i in 0..vision.len() {
                    attempts.push(Attempt::Vision(i));
                }
                if has_traditional {
                    attempts.push(Attempt::Traditional);
                }
            }
        }
        attempts
    }

    /// Run the extraction, walking the fallback chain until an attempt
    /// succeeds. Returns an [`EngineResult`] whose `structured` is always
    /// populated.
    pub async fn extract(
        &self,
        image_path: &Path,
        language_hint: &str,
    ) -> Result<EngineResult, SelectorError> {
        let attempts = self.plan();
        if attempts.is_empty() {
            return Err(SelectorError::AllEnginesFailed(vec![FailureReason {
                engine: "selector".to_string(),
                message: "no engine available for the configured mode".to_string(),
            }]));
        }

        let mut failures: Vec<FailureReason> = Vec::new();

        for attempt in attempts {
            match attempt {
                Attempt::Ensemble => {
                    debug!("trying ensemble extraction");
                    match self.run_ensemble(image_path, language_hint, &mut failures).await {
                        Some(result) => return Ok(result),
                        None => continue,
                    }
                }
                Attempt::Vision(index) => {
                    let engines = self.registry.available_vision();
                    let engine = &engines[index];
                    debug!("trying vision engine {}", engine.name());
                    match engine.extract(image_path, language_hint).await {
                        Ok(result) => return Ok(self.ensure_structured(result)),
                        Err(err) => {
                            warn!("vision engine {} failed: {}", engine.name(), err);
                            failures.push(FailureReason {
                                engine: engine.name().to_string(),
                                message: err.to_string(),
                            });
                        }
                    }
                }
                Attempt::Traditional => {
                    debug!("trying traditional OCR");
                    match self.run_traditional(image_path, language_hint, &mut failures).await {
                        Some(result) => return Ok(result),
                        None => continue,
                    }
                }
            }
        }

        Err(SelectorError::AllEnginesFailed(failures))
    }

    /// Launch every available vision engine concurrently and merge whatever
    /// succeeded. Individual failures are recorded, not propagated.
    async fn run_ensemble(
        &self,
        image_path: &Path,
        language_hint: &str,
        failures: &mut Vec<FailureReason>,
    ) -> Option<EngineResult> {
        let engines = self.registry.available_vision();
        let calls = engines
            .iter()
            .map(|engine| engine.extract(image_path, language_hint));
        let outcomes = join_all(calls).await;

        let mut results: Vec<EngineResult> = Vec::new();
        for (engine, outcome) in engines.iter().zip(outcomes) {
            match outcome {
                Ok(result) => results.push(result),
                Err(err) => {
                    warn!("ensemble engine {} failed: {}", engine.name(), err);
                    failures.push(FailureReason {
                        engine: engine.name().to_string(),
                        message: err.to_string(),
                    });
                }
            }
        }

        if results.is_empty() {
            return None;
        }

        let engine_label = format!(
            "ensemble({})",
            results.iter().map(|r| r.engine.as_str()).collect::<Vec<_>>().join(",")
        );
        let merged = merge(&results).ok()?;
        info!(
            "ensemble extraction merged {} engine result(s) (confidence {:.2})",
            results.len(),
            merged.confidence
        );

        Some(EngineResult {
            text: merged.description.clone(),
            confidence: merged.confidence,
            structured: Some(merged),
            engine: engine_label,
            processing_time_ms: results.iter().map(|r| r.processing_time_ms).sum(),
        })
    }

    /// Preprocess, run the first traditional engine that succeeds, then
    /// structure the raw text — via the text LLM when configured, else via
    /// the heuristics.
    async fn run_traditional(
        &self,
        image_path: &Path,
        language_hint: &str,
        failures: &mut Vec<FailureReason>,
    ) -> Option<EngineResult> {
        // Keep the temp dir alive until OCR is done with the processed file.
        let mut _temp_dir: Option<tempfile::TempDir> = None;
        let ocr_path = if self.preprocess_enabled {
            match tempfile::tempdir() {
                Ok(dir) => {
                    match self.preprocessor.preprocess_to_png(
                        image_path,
                        dir.path(),
                        self.max_image_size,
                    ) {
                        Ok(path) => {
                            _temp_dir = Some(dir);
                            path
                        }
                        Err(err) => {
                            warn!("preprocessing failed, using original image: {}", err);
                            image_path.to_path_buf()
                        }
                    }
                }
                Err(err) => {
                    warn!("failed to create temp dir, using original image: {}", err);
                    image_path.to_path_buf()
                }
            }
        } else {
            image_path.to_path_buf()
        };

        let mut ocr_result: Option<EngineResult> = None;
        for engine in self.registry.available_traditional() {
            match engine.extract(&ocr_path, language_hint).await {
                Ok(result) => {
                    ocr_result = Some(result);
                    break;
                }
                Err(err) => {
                    warn!("traditional engine {} failed: {}", engine.name(), err);
                    failures.push(FailureReason {
                        engine: engine.name().to_string(),
                        message: err.to_string(),
                    });
                }
            }
        }
        let mut result = ocr_result?;

        debug!(
            "traditional OCR text looks like '{}'",
            heuristics::detect_language(&result.text)
        );
        result.structured = Some(self.structure_text(&result.text, language_hint).await);
        Some(result)
    }

    /// Structure raw OCR text: text-LLM enhancement when available (text is
    /// redacted inside the enhancer before transmission), heuristics
    /// otherwise or on enhancement failure.
    async fn structure_text(
        &self,
        text: &str,
        language_hint: &str,
    ) -> crate::extraction::HomeworkExtraction {
        if let Some(enhancer) = self.enhancer.as_ref().filter(|e| e.is_available()) {
            match enhancer.extract_from_text(text, language_hint).await {
                Ok(extraction) => return extraction,
                Err(err) => {
                    warn!("text enhancement failed, falling back to heuristics: {}", err);
                }
            }
        }
        heuristics::parse_homework_from_text(text)
    }

    /// Vision adapters always return structured output, but the contract is
    /// enforced here so downstream code never sees `structured == None`.
    fn ensure_structured(&self, mut result: EngineResult) -> EngineResult {
        if result.structured.is_none() {
            result.structured = Some(heuristics::parse_homework_from_text(&result.text));
        }
        result
    }

    /// Availability summary, one line per registered engine.
    pub fn engine_report(&self) -> Vec<(String, bool, String)> {
        self.registry
            .all()
            .map(|e| (e.name().to_string(), e.is_available(), e.availability_hint()))
            .collect()
    }
}

/// Convenience used by tests and the CLI to register a boxed engine list.
pub fn registry_from_engines(engines: Vec<Arc<dyn ExtractionEngine>>) -> EngineRegistry {
    let mut registry = EngineRegistry::new();
    for engine in engines {
        registry.register(engine);
    }
    registry
}
