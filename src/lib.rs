//! hwextract - homework photo extraction pipeline.
//!
//! Turns photographs of handwritten or printed homework into structured
//! records by orchestrating traditional OCR engines and vision LLMs,
//! reconciling their outputs with field-level voting, redacting PII before
//! anything reaches an external AI service, and validating the merged
//! record against domain rules.
//!
//! Typical use:
//!
//! ```no_run
//! use hwextract::config::PipelineConfig;
//! use hwextract::pipeline::HomeworkPipeline;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = PipelineConfig::from_env();
//! let pipeline = HomeworkPipeline::from_config(&config)?;
//! let outcome = pipeline.extract("photo.jpg".as_ref(), "en").await?;
//! println!("{}: {}", outcome.extraction.subject, outcome.extraction.title);
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod config;
pub mod extraction;
pub mod ocr;
pub mod pii;
pub mod pipeline;
pub mod retry;
pub mod validator;

pub use batch::{BatchProcessor, BatchRequest, BatchResult, BatchStatus};
pub use config::PipelineConfig;
pub use extraction::{Assignment, HomeworkExtraction, Priority};
pub use ocr::{EngineError, EngineResult, ExtractionEngine, ExtractionMode, SelectorError};
pub use pii::{PiiRedactor, RedactionReport};
pub use pipeline::{ExtractionOutcome, HomeworkPipeline};
pub use validator::{ValidationIssue, ValidationResult, Validator};
