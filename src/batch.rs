//! Batch processing of many extraction jobs.
//!
//! Items flow through the pipeline independently under a counting permit:
//! at most `max_concurrency` items are in flight, the rest wait. One item's
//! failure is recorded on that item and never aborts its siblings. Batch
//! statistics are derived strictly from the item states afterwards, so they
//! cannot drift from what actually happened.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Semaphore;
use tracing::{error, info};
use uuid::Uuid;

use crate::extraction::HomeworkExtraction;
use crate::ocr::engine::EngineResult;
use crate::pipeline::HomeworkPipeline;
use crate::validator::ValidationResult;

/// Fired after each item reaches a terminal state, with
/// (completed_count, total_count). Ordering across concurrent completions is
/// not guaranteed; the completed count is monotonic.
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// What the caller enqueues.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    /// Stable id; generated when absent.
    pub id: Option<String>,
    pub image_path: PathBuf,
    pub user_id: String,
    pub metadata: Map<String, Value>,
}

impl BatchRequest {
    pub fn new(image_path: impl Into<PathBuf>, user_id: impl Into<String>) -> Self {
        Self {
            id: None,
            image_path: image_path.into(),
            user_id: user_id.into(),
            metadata: Map::new(),
        }
    }
}

/// Lifecycle of one batch item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// One item, owned exclusively by its worker for its lifetime.
#[derive(Debug, Clone, Serialize)]
pub struct BatchItem {
    pub id: String,
    pub image_path: PathBuf,
    pub user_id: String,
    pub metadata: Map<String, Value>,
    pub ocr_result: Option<EngineResult>,
    pub extraction: Option<HomeworkExtraction>,
    pub validation: Option<ValidationResult>,
    pub status: BatchStatus,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl BatchItem {
    fn from_request(request: BatchRequest) -> Self {
        Self {
            id: request.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            image_path: request.image_path,
            user_id: request.user_id,
            metadata: request.metadata,
            ocr_result: None,
            extraction: None,
            validation: None,
            status: BatchStatus::Pending,
            error: None,
            started_at: None,
            completed_at: None,
        }
    }
}

/// Aggregate over a completed batch. Read-only; counts are derived from the
/// items.
#[derive(Debug)]
pub struct BatchResult {
    pub batch_id: String,
    pub items: Vec<BatchItem>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub processing_time_ms: f64,
}

/// Human-readable batch summary.
#[derive(Debug, Serialize)]
pub struct BatchSummary {
    pub batch_id: String,
    pub total_processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub success_rate: String,
    pub processing_time_sec: f64,
    pub items_per_second: f64,
}

impl BatchResult {
    pub fn summary(&self) -> BatchSummary {
        let seconds = self.processing_time_ms / 1000.0;
        BatchSummary {
            batch_id: self.batch_id.clone(),
            total_processed: self.total,
            successful: self.successful,
            failed: self.failed,
            success_rate: if self.total > 0 {
                format!("{:.1}%", self.successful as f64 / self.total as f64 * 100.0)
            } else {
                "N/A".to_string()
            },
            processing_time_sec: (seconds * 100.0).round() / 100.0,
            items_per_second: if seconds > 0.0 {
                ((self.total as f64 / seconds) * 100.0).round() / 100.0
            } else {
                0.0
            },
        }
    }

    /// Failed items, for a retry pass.
    pub fn failed_items(&self) -> Vec<&BatchItem> {
        self.items.iter().filter(|i| i.status == BatchStatus::Failed).collect()
    }
}

/// Runs many independent extractions with bounded concurrency.
pub struct BatchProcessor {
    pipeline: Arc<HomeworkPipeline>,
    max_concurrency: usize,
}

impl BatchProcessor {
    pub fn new(pipeline: Arc<HomeworkPipeline>, max_concurrency: usize) -> Self {
        Self {
            pipeline,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Process a batch. Every item is attempted; failures are contained to
    /// their item and reported in the result, never re-raised.
    pub async fn process_batch(
        &self,
        requests: Vec<BatchRequest>,
        language_hint: &str,
        progress: Option<ProgressCallback>,
    ) -> BatchResult {
        let clock = Instant::now();
        let batch_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let total = requests.len();

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let completed = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::with_capacity(total);
        for request in requests {
            let pipeline = self.pipeline.clone();
            let semaphore = semaphore.clone();
            let completed = completed.clone();
            let progress = progress.clone();
            let language = language_hint.to_string();

            // The fallback item covers the (never expected) case of the
            // worker task itself dying.
            let fallback = BatchItem::from_request(request.clone());

            let handle = tokio::spawn(async move {
                // A closed semaphore is impossible here; treat it as a
                // failed item rather than unwrapping.
                let permit = semaphore.acquire_owned().await;
                let mut item = BatchItem::from_request(request);
                match permit {
                    Ok(_permit) => process_item(&pipeline, &mut item, &language).await,
                    Err(e) => {
                        item.status = BatchStatus::Failed;
                        item.error = Some(format!("worker pool closed: {}", e));
                        item.completed_at = Some(Utc::now());
                    }
                }

                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                if let Some(callback) = progress {
                    callback(done, total);
                }
                item
            });
            handles.push((handle, fallback));
        }

        let mut items = Vec::with_capacity(total);
        for (handle, fallback) in handles {
            match handle.await {
                Ok(item) => items.push(item),
                Err(join_err) => {
                    error!("batch worker panicked: {}", join_err);
                    let mut item = fallback;
                    item.status = BatchStatus::Failed;
                    item.error = Some(format!("worker panicked: {}", join_err));
                    item.completed_at = Some(Utc::now());
                    items.push(item);
                }
            }
        }

        let successful = items.iter().filter(|i| i.status == BatchStatus::Completed).count();
        let failed = items.iter().filter(|i| i.status == BatchStatus::Failed).count();

        let result = BatchResult {
            batch_id,
            started_at,
            completed_at: Utc::now(),
            total,
            successful,
            failed,
            processing_time_ms: clock.elapsed().as_secs_f64() * 1000.0,
            items,
        };

        info!(
            "batch {} complete: {}/{} successful",
            result.batch_id, result.successful, result.total
        );
        result
    }
}

async fn process_item(pipeline: &HomeworkPipeline, item: &mut BatchItem, language: &str) {
    item.status = BatchStatus::Processing;
    item.started_at = Some(Utc::now());

    match pipeline.extract(&item.image_path, language).await {
        Ok(outcome) => {
            item.ocr_result = Some(outcome.engine_result);
            item.extraction = Some(outcome.extraction);
            item.validation = Some(outcome.validation);
            item.status = BatchStatus::Completed;
        }
        Err(err) => {
            error!("failed to process item {}: {}", item.id, err);
            item.status = BatchStatus::Failed;
            item.error = Some(err.to_string());
        }
    }

    item.completed_at = Some(Utc::now());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PreprocessConfig;
    use crate::extraction::HomeworkExtraction;
    use crate::ocr::engine::{EngineError, EngineKind, ExtractionEngine};
    use crate::ocr::preprocess::ImagePreprocessor;
    use crate::ocr::selector::{registry_from_engines, EngineSelector, ExtractionMode};
    use crate::validator::Validator;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::AtomicUsize;

    /// Engine that fails for image paths containing a marker string.
    struct MarkedEngine {
        in_flight: Arc<AtomicUsize>,
        max_in_flight: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ExtractionEngine for MarkedEngine {
        fn name(&self) -> &str {
            "marked"
        }
        fn kind(&self) -> EngineKind {
            EngineKind::VisionLlm
        }
        fn is_available(&self) -> bool {
            true
        }
        fn availability_hint(&self) -> String {
            "always".to_string()
        }
        async fn extract(&self, path: &Path, _: &str) -> Result<EngineResult, EngineError> {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if path.to_string_lossy().contains("broken") {
                return Err(EngineError::Failed("engine always raises".to_string()));
            }
            Ok(EngineResult {
                text: "Mathematics homework".to_string(),
                structured: Some(HomeworkExtraction {
                    subject: "Mathematics".to_string(),
                    title: "Homework".to_string(),
                    description: "Mathematics homework".to_string(),
                    confidence: 0.9,
                    ..Default::default()
                }),
                confidence: 0.9,
                engine: "marked".to_string(),
                processing_time_ms: 1.0,
            })
        }
    }

    fn test_pipeline(max_in_flight: Arc<AtomicUsize>) -> Arc<HomeworkPipeline> {
        let engine = Arc::new(MarkedEngine {
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight,
        }) as Arc<dyn ExtractionEngine>;
        let selector = EngineSelector::new(
            registry_from_engines(vec![engine]),
            None,
            ImagePreprocessor::new(PreprocessConfig { enabled: false, ..Default::default() }),
            ExtractionMode::Auto,
            true,
            false,
            (4096, 4096),
        )
        .unwrap();
        Arc::new(HomeworkPipeline::from_parts(selector, Validator::default()))
    }

    fn requests() -> Vec<BatchRequest> {
        (1..=5)
            .map(|i| {
                let name = if i == 3 { "broken-3.jpg" } else { "ok.jpg" };
                BatchRequest {
                    id: Some(format!("item-{}", i)),
                    image_path: PathBuf::from(format!("{}-{}", i, name)),
                    user_id: "user".to_string(),
                    metadata: Map::new(),
                }
            })
            .collect()
    }

    #[tokio::test]
    async fn failure_is_isolated_to_its_item_at_any_concurrency() {
        for concurrency in 1..=5 {
            let max_seen = Arc::new(AtomicUsize::new(0));
            let processor = BatchProcessor::new(test_pipeline(max_seen.clone()), concurrency);
            let result = processor.process_batch(requests(), "en", None).await;

            assert_eq!(result.total, 5);
            assert_eq!(result.failed, 1, "concurrency {}", concurrency);
            assert_eq!(result.successful, 4, "concurrency {}", concurrency);
            assert!(max_seen.load(Ordering::SeqCst) <= concurrency);

            let broken = result.items.iter().find(|i| i.id == "item-3").unwrap();
            assert_eq!(broken.status, BatchStatus::Failed);
            assert!(broken.error.as_deref().unwrap().contains("engine always raises"));
            assert!(broken.started_at.is_some() && broken.completed_at.is_some());

            for item in result.items.iter().filter(|i| i.id != "item-3") {
                assert_eq!(item.status, BatchStatus::Completed);
                assert_eq!(item.extraction.as_ref().unwrap().subject, "Mathematics");
                assert!(item.validation.as_ref().unwrap().valid);
            }
        }
    }

    #[tokio::test]
    async fn progress_callback_counts_monotonically_to_total() {
        let processor = BatchProcessor::new(test_pipeline(Arc::new(AtomicUsize::new(0))), 2);
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen_cb = seen.clone();
        let callback: ProgressCallback = Arc::new(move |done, total| {
            seen_cb.lock().unwrap().push((done, total));
        });

        let result = processor
            .process_batch(requests(), "en", Some(callback))
            .await;
        assert_eq!(result.total, 5);

        let calls = seen.lock().unwrap();
        assert_eq!(calls.len(), 5);
        let mut counts: Vec<usize> = calls.iter().map(|(done, _)| *done).collect();
        counts.sort_unstable();
        assert_eq!(counts, vec![1, 2, 3, 4, 5]);
        assert!(calls.iter().all(|(_, total)| *total == 5));
    }

    #[tokio::test]
    async fn summary_derives_from_item_states() {
        let processor = BatchProcessor::new(test_pipeline(Arc::new(AtomicUsize::new(0))), 4);
        let result = processor.process_batch(requests(), "en", None).await;
        let summary = result.summary();
        assert_eq!(summary.total_processed, 5);
        assert_eq!(summary.successful, 4);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.success_rate, "80.0%");
        assert_eq!(result.failed_items().len(), 1);
    }

    #[tokio::test]
    async fn empty_batch_completes_immediately() {
        let processor = BatchProcessor::new(test_pipeline(Arc::new(AtomicUsize::new(0))), 4);
        let result = processor.process_batch(Vec::new(), "en", None).await;
        assert_eq!(result.total, 0);
        assert_eq!(result.summary().success_rate, "N/A");
    }
}
