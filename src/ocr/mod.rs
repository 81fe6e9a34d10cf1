//! OCR and structured extraction engines.
//!
//! Extracts homework data from images using:
//! - Tesseract for box-level OCR with per-word confidences (default)
//! - OCRS for pure-Rust OCR (feature: ocr-ocrs)
//! - Together AI and Gemini vision models for structured extraction
//! - DeepSeek as a text-only enhancer for OCR'd text (behind PII redaction)
//!
//! Engines implement one contract ([`engine::ExtractionEngine`]) and are
//! registered in an [`engine::EngineRegistry`]. The [`selector`] decides
//! which to run and walks the fallback chain; the [`ensemble`] merger
//! reconciles multi-engine output.

pub mod deepseek;
pub mod engine;
pub mod ensemble;
pub mod gemini;
pub mod heuristics;
pub mod model_utils;
pub mod preprocess;
pub mod prompts;
pub mod response;
pub mod selector;
pub mod tesseract;
pub mod together;

#[cfg(feature = "ocr-ocrs")]
pub mod ocrs_backend;

pub use engine::{EngineError, EngineKind, EngineRegistry, EngineResult, ExtractionEngine};
pub use ensemble::{merge, MergeError};
pub use preprocess::ImagePreprocessor;
pub use selector::{EngineSelector, ExtractionMode, SelectorError};
pub use tesseract::TesseractEngine;

#[cfg(feature = "ocr-ocrs")]
pub use ocrs_backend::OcrsEngine;
