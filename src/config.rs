//! Pipeline configuration.
//!
//! Every field has a documented default so the pipeline is usable with zero
//! configuration beyond provider credentials. Loadable from a TOML file or
//! from the environment.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ocr::selector::ExtractionMode;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Image preprocessing settings for the traditional OCR path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Run preprocessing at all before traditional OCR.
    pub enabled: bool,
    /// Denoise strength; 0 disables denoising.
    pub denoise_strength: u32,
    /// Apply the fixed ~1.5x contrast enhancement.
    pub contrast_enhancement: bool,
    /// Detect and correct text skew.
    pub deskew_enabled: bool,
    /// Apply adaptive binarization as the final step.
    pub binarize_enabled: bool,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            denoise_strength: 10,
            contrast_enhancement: true,
            deskew_enabled: true,
            binarize_enabled: true,
        }
    }
}

/// API credentials for the external vision/LLM providers. An engine with no
/// credential is simply not registered.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderCredentials {
    pub together_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub deepseek_api_key: Option<String>,
}

impl ProviderCredentials {
    /// Read credentials from the conventional environment variables.
    pub fn from_env() -> Self {
        Self {
            together_api_key: std::env::var("TOGETHER_API_KEY").ok(),
            gemini_api_key: std::env::var("GEMINI_API_KEY").ok(),
            deepseek_api_key: std::env::var("DEEPSEEK_API_KEY").ok(),
        }
    }
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Engine selection mode: auto, ensemble, vision or traditional.
    pub preferred_mode: ExtractionMode,
    /// Allow multi-engine voting when two or more vision engines exist.
    pub enable_ensemble: bool,
    /// Maximum concurrently-processed batch items.
    pub max_concurrency: usize,
    /// Confidence floor below which the validator raises a warning.
    pub min_confidence: f32,
    /// Tesseract language set, joined with '+' when invoking the binary.
    pub languages: Vec<String>,
    /// Wall-clock timeout for each external engine call, in seconds.
    pub request_timeout_secs: u64,
    /// Images larger than this (either dimension) are downscaled first.
    pub max_image_size: (u32, u32),
    /// Vision model overrides; the adapter defaults apply when unset.
    pub together_model: Option<String>,
    pub gemini_model: Option<String>,
    pub preprocess: PreprocessConfig,
    /// Credentials come from the environment, never from the config file.
    #[serde(skip)]
    pub credentials: ProviderCredentials,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            preferred_mode: ExtractionMode::Auto,
            enable_ensemble: true,
            max_concurrency: 4,
            min_confidence: 0.6,
            languages: vec!["eng".to_string()],
            request_timeout_secs: 60,
            max_image_size: (4096, 4096),
            together_model: None,
            gemini_model: None,
            preprocess: PreprocessConfig::default(),
            credentials: ProviderCredentials::default(),
        }
    }
}

impl PipelineConfig {
    /// Load from a TOML file, with credentials taken from the environment.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let mut config: PipelineConfig = toml::from_str(&raw)?;
        config.credentials = ProviderCredentials::from_env();
        Ok(config)
    }

    /// Build a configuration purely from the environment.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(mode) = std::env::var("HWX_MODE") {
            if let Ok(parsed) = mode.parse() {
                config.preferred_mode = parsed;
            }
        }
        if let Ok(langs) = std::env::var("HWX_OCR_LANGUAGES") {
            config.languages = langs.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(workers) = std::env::var("HWX_WORKERS") {
            if let Ok(n) = workers.parse() {
                config.max_concurrency = n;
            }
        }
        config.credentials = ProviderCredentials::from_env();
        config
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }
}
