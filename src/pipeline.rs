//! The extraction pipeline facade.
//!
//! Wires configuration into engines, selector and validator, and exposes the
//! one call the rest of the world uses: image path in, structured record
//! plus validation result out. Engine availability is checked here, at
//! construction — a misconfigured pipeline fails before the first image.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::config::PipelineConfig;
use crate::extraction::HomeworkExtraction;
use crate::ocr::deepseek::DeepSeekEnhancer;
use crate::ocr::engine::{EngineRegistry, EngineResult};
use crate::ocr::gemini::GeminiEngine;
use crate::ocr::preprocess::ImagePreprocessor;
use crate::ocr::selector::{EngineSelector, SelectorError};
use crate::ocr::tesseract::TesseractEngine;
use crate::ocr::together::TogetherEngine;
use crate::pii::PiiRedactor;
use crate::validator::{ValidationResult, Validator};

#[cfg(feature = "ocr-ocrs")]
use crate::ocr::ocrs_backend::OcrsEngine;

/// Everything one extraction produces.
#[derive(Debug, Clone)]
pub struct ExtractionOutcome {
    /// The winning engine's (or ensemble's) raw result.
    pub engine_result: EngineResult,
    /// The structured record, merged and normalized.
    pub extraction: HomeworkExtraction,
    /// Domain validation of the record.
    pub validation: ValidationResult,
}

/// The assembled pipeline.
pub struct HomeworkPipeline {
    selector: EngineSelector,
    validator: Validator,
}

impl HomeworkPipeline {
    /// Build the pipeline from configuration: vision engines for every
    /// credential present, the local OCR engines, the PII-redacting text
    /// enhancer, preprocessor and validator.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, SelectorError> {
        let timeout = config.request_timeout();
        let mut registry = EngineRegistry::new();

        if config.credentials.together_api_key.is_some() {
            registry.register(Arc::new(TogetherEngine::new(
                config.credentials.together_api_key.clone(),
                config.together_model.clone(),
                timeout,
            )));
        }
        if config.credentials.gemini_api_key.is_some() {
            registry.register(Arc::new(GeminiEngine::new(
                config.credentials.gemini_api_key.clone(),
                config.gemini_model.clone(),
                timeout,
            )));
        }

        registry.register(Arc::new(TesseractEngine::new(config.languages.clone())));
        #[cfg(feature = "ocr-ocrs")]
        registry.register(Arc::new(OcrsEngine::new()));

        // No engine can actually run: surface it now, not on first use.
        if !registry.all().any(|e| e.is_available()) {
            return Err(SelectorError::NoEnginesConfigured);
        }

        let redactor = Arc::new(PiiRedactor::new());
        let enhancer = config
            .credentials
            .deepseek_api_key
            .as_ref()
            .map(|key| DeepSeekEnhancer::new(Some(key.clone()), timeout, redactor));

        let selector = EngineSelector::new(
            registry,
            enhancer,
            ImagePreprocessor::new(config.preprocess.clone()),
            config.preferred_mode,
            config.enable_ensemble,
            config.preprocess.enabled,
            config.max_image_size,
        )?;

        info!("pipeline ready (mode: {})", config.preferred_mode);
        Ok(Self {
            selector,
            validator: Validator::new(config.min_confidence),
        })
    }

    /// Assemble from parts. Used by tests and callers with custom engines.
    pub fn from_parts(selector: EngineSelector, validator: Validator) -> Self {
        Self { selector, validator }
    }

    pub fn selector(&self) -> &EngineSelector {
        &self.selector
    }

    /// Run one extraction end to end: select/extract, then validate.
    pub async fn extract(
        &self,
        image_path: &Path,
        language_hint: &str,
    ) -> Result<ExtractionOutcome, SelectorError> {
        let engine_result = self.selector.extract(image_path, language_hint).await?;

        // The selector guarantees structured output.
        let extraction = engine_result
            .structured
            .clone()
            .unwrap_or_default()
            .normalized();
        let validation = self.validator.validate(&extraction, &engine_result.text);

        Ok(ExtractionOutcome {
            engine_result,
            extraction,
            validation,
        })
    }
}
