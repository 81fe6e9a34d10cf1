//! End-to-end pipeline scenarios with stub engines.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use hwextract::config::PreprocessConfig;
use hwextract::extraction::HomeworkExtraction;
use hwextract::ocr::engine::{EngineError, EngineKind, EngineRegistry, EngineResult, ExtractionEngine};
use hwextract::ocr::preprocess::ImagePreprocessor;
use hwextract::ocr::selector::{EngineSelector, ExtractionMode, SelectorError};
use hwextract::pipeline::HomeworkPipeline;
use hwextract::validator::Validator;

struct StubEngine {
    name: &'static str,
    kind: EngineKind,
    outcome: Result<EngineResult, &'static str>,
}

#[async_trait]
impl ExtractionEngine for StubEngine {
    fn name(&self) -> &str {
        self.name
    }
    fn kind(&self) -> EngineKind {
        self.kind
    }
    fn is_available(&self) -> bool {
        true
    }
    fn availability_hint(&self) -> String {
        "stub".to_string()
    }
    async fn extract(&self, _: &Path, _: &str) -> Result<EngineResult, EngineError> {
        match &self.outcome {
            Ok(result) => Ok(result.clone()),
            Err(message) => Err(EngineError::Failed(message.to_string())),
        }
    }
}

fn pipeline_with(engines: Vec<Arc<dyn ExtractionEngine>>, mode: ExtractionMode) -> HomeworkPipeline {
    let mut registry = EngineRegistry::new();
    for engine in engines {
        registry.register(engine);
    }
    let selector = EngineSelector::new(
        registry,
        None,
        ImagePreprocessor::new(PreprocessConfig { enabled: false, ..Default::default() }),
        mode,
        true,
        false,
        (4096, 4096),
    )
    .unwrap();
    HomeworkPipeline::from_parts(selector, Validator::default())
}

fn vision_result(engine: &str, subject: &str, title: &str, due_date: &str) -> EngineResult {
    let structured = HomeworkExtraction {
        subject: subject.to_string(),
        title: title.to_string(),
        description: format!("{}: {}", subject, title),
        due_date: Some(due_date.to_string()),
        confidence: 0.9,
        ..Default::default()
    };
    EngineResult {
        text: structured.description.clone(),
        structured: Some(structured),
        confidence: 0.9,
        engine: engine.to_string(),
        processing_time_ms: 5.0,
    }
}

/// Scenario A: a single traditional engine; heuristics derive the structure.
#[tokio::test]
async fn traditional_only_heuristic_extraction() {
    let ocr = Arc::new(StubEngine {
        name: "tesseract",
        kind: EngineKind::TraditionalOcr,
        outcome: Ok(EngineResult {
            text: "Math Exercise 2.3, due 25/12/2024".to_string(),
            structured: None,
            confidence: 0.7,
            engine: "tesseract".to_string(),
            processing_time_ms: 12.0,
        }),
    }) as Arc<dyn ExtractionEngine>;
    let pipeline = pipeline_with(vec![ocr], ExtractionMode::Traditional);

    let outcome = pipeline.extract(Path::new("homework.jpg"), "en").await.unwrap();

    // "math" buried in the line is not a subject match.
    assert!(outcome.extraction.subject.is_empty());
    assert_eq!(outcome.extraction.due_date.as_deref(), Some("25/12/2024"));
    assert_eq!(outcome.extraction.title, "Math Exercise 2.3, due 25/12/2024");

    // Missing subject is an error, so the record is invalid.
    assert!(!outcome.validation.valid);
    assert!(outcome
        .validation
        .issues
        .iter()
        .any(|i| i.field == "subject"));
}

/// Scenario B: two agreeing vision engines; first-seen tie-break on the
/// disagreeing due date; both engines recorded in the metadata.
#[tokio::test]
async fn ensemble_merges_two_vision_engines() {
    let pipeline = pipeline_with(
        vec![
            Arc::new(StubEngine {
                name: "together",
                kind: EngineKind::VisionLlm,
                outcome: Ok(vision_result("together", "Mathematics", "Algebra Homework", "2024-12-25")),
            }) as Arc<dyn ExtractionEngine>,
            Arc::new(StubEngine {
                name: "gemini",
                kind: EngineKind::VisionLlm,
                outcome: Ok(vision_result("gemini", "Mathematics", "Algebra Homework", "2024-12-26")),
            }),
        ],
        ExtractionMode::Ensemble,
    );

    let outcome = pipeline.extract(Path::new("homework.jpg"), "en").await.unwrap();
    let extraction = &outcome.extraction;

    assert_eq!(extraction.subject, "Mathematics");
    assert_eq!(extraction.title, "Algebra Homework");
    assert_eq!(extraction.due_date.as_deref(), Some("2024-12-25"));
    assert_eq!(extraction.confidence, 0.95);

    let engines: Vec<&str> = extraction.extraction_metadata["engines_used"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert_eq!(engines, vec!["together", "gemini"]);
    assert!(outcome.engine_result.engine.starts_with("ensemble("));
}

/// Scenario C: every engine fails; the error names each engine and reason,
/// and no partial record is returned.
#[tokio::test]
async fn all_engines_failed_is_a_terminal_error() {
    let pipeline = pipeline_with(
        vec![
            Arc::new(StubEngine {
                name: "together",
                kind: EngineKind::VisionLlm,
                outcome: Err("quota exhausted"),
            }) as Arc<dyn ExtractionEngine>,
            Arc::new(StubEngine {
                name: "gemini",
                kind: EngineKind::VisionLlm,
                outcome: Err("connection refused"),
            }),
        ],
        ExtractionMode::Auto,
    );

    let err = pipeline.extract(Path::new("homework.jpg"), "en").await.unwrap_err();
    match err {
        SelectorError::AllEnginesFailed(failures) => {
            let engines: Vec<&str> = failures.iter().map(|f| f.engine.as_str()).collect();
            assert!(engines.contains(&"together"));
            assert!(engines.contains(&"gemini"));
            assert!(failures.iter().any(|f| f.message.contains("quota exhausted")));
            assert!(failures.iter().any(|f| f.message.contains("connection refused")));
        }
        other => panic!("expected AllEnginesFailed, got {:?}", other),
    }
}

/// The merged record is byte-identical across repeated pipeline runs.
#[tokio::test]
async fn repeated_extraction_is_deterministic() {
    let build = || {
        pipeline_with(
            vec![
                Arc::new(StubEngine {
                    name: "together",
                    kind: EngineKind::VisionLlm,
                    outcome: Ok(vision_result("together", "Science", "Lab Report", "2026-09-01")),
                }) as Arc<dyn ExtractionEngine>,
                Arc::new(StubEngine {
                    name: "gemini",
                    kind: EngineKind::VisionLlm,
                    outcome: Ok(vision_result("gemini", "Science", "Lab Report Draft", "2026-09-01")),
                }),
            ],
            ExtractionMode::Ensemble,
        )
    };

    let first = build().extract(Path::new("a.jpg"), "en").await.unwrap();
    let second = build().extract(Path::new("a.jpg"), "en").await.unwrap();

    assert_eq!(
        serde_json::to_vec(&first.extraction).unwrap(),
        serde_json::to_vec(&second.extraction).unwrap()
    );
}

/// Vision failure falls back to traditional OCR and still yields a record.
#[tokio::test]
async fn vision_failure_falls_back_to_traditional() {
    let pipeline = pipeline_with(
        vec![
            Arc::new(StubEngine {
                name: "together",
                kind: EngineKind::VisionLlm,
                outcome: Err("upstream down"),
            }) as Arc<dyn ExtractionEngine>,
            Arc::new(StubEngine {
                name: "tesseract",
                kind: EngineKind::TraditionalOcr,
                outcome: Ok(EngineResult {
                    text: "Mathematics\nFinish exercises on page 12\ndue: 2026-08-20".to_string(),
                    structured: None,
                    confidence: 0.8,
                    engine: "tesseract".to_string(),
                    processing_time_ms: 20.0,
                }),
            }),
        ],
        ExtractionMode::Auto,
    );

    let outcome = pipeline.extract(Path::new("homework.jpg"), "en").await.unwrap();
    assert_eq!(outcome.engine_result.engine, "tesseract");
    // "Mathematics" alone on its line qualifies as a subject.
    assert_eq!(outcome.extraction.subject, "Mathematics");
    assert_eq!(outcome.extraction.due_date.as_deref(), Some("2026-08-20"));
}
