//! CLI commands implementation.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use hwextract::batch::{BatchProcessor, BatchRequest, ProgressCallback};
use hwextract::config::PipelineConfig;
use hwextract::ocr::selector::ExtractionMode;
use hwextract::pii::PiiRedactor;
use hwextract::pipeline::HomeworkPipeline;

#[derive(Parser)]
#[command(name = "hwx")]
#[command(about = "Homework photo extraction pipeline")]
#[command(version)]
pub struct Cli {
    /// Config file (TOML); environment-only config when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Extract structured homework data from one image
    Extract {
        /// Path to the homework photo
        image: PathBuf,
        /// Language hint (en, zh, ms)
        #[arg(short, long, default_value = "en")]
        language: String,
        /// Engine mode override: auto, ensemble, vision, traditional
        #[arg(short, long)]
        mode: Option<ExtractionMode>,
        /// Emit the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Extract every image in a directory with bounded concurrency
    Batch {
        /// Directory containing homework photos
        dir: PathBuf,
        /// Number of concurrent extractions
        #[arg(short, long, default_value = "4")]
        workers: usize,
        /// Language hint (en, zh, ms)
        #[arg(short, long, default_value = "en")]
        language: String,
        /// Emit per-item results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show which extraction engines are available
    Engines,

    /// Preview PII redaction on a piece of text
    Redact {
        /// Text to redact
        text: String,
        /// Also redact name and school-name heuristics
        #[arg(short, long)]
        aggressive: bool,
    },
}

fn load_config(cli: &Cli) -> anyhow::Result<PipelineConfig> {
    match &cli.config {
        Some(path) => Ok(PipelineConfig::load(path)?),
        None => Ok(PipelineConfig::from_env()),
    }
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(&cli)?;

    match cli.command {
        Commands::Extract { image, language, mode, json } => {
            if let Some(mode) = mode {
                config.preferred_mode = mode;
            }
            let pipeline = HomeworkPipeline::from_config(&config)?;
            let outcome = pipeline.extract(&image, &language).await?;

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "engine": outcome.engine_result.engine,
                        "processing_time_ms": outcome.engine_result.processing_time_ms,
                        "extraction": outcome.extraction,
                        "validation": outcome.validation,
                    }))?
                );
            } else {
                print_outcome(&outcome);
            }
        }

        Commands::Batch { dir, workers, language, json } => {
            let requests = collect_images(&dir)?;
            if requests.is_empty() {
                println!("No images found in {}", dir.display());
                return Ok(());
            }

            let pipeline = Arc::new(HomeworkPipeline::from_config(&config)?);
            let processor = BatchProcessor::new(pipeline, workers);

            let bar = ProgressBar::new(requests.len() as u64);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap()
                    .progress_chars("#>-"),
            );
            let bar_cb = bar.clone();
            let progress: ProgressCallback = Arc::new(move |done, _total| {
                bar_cb.set_position(done as u64);
            });

            let result = processor.process_batch(requests, &language, Some(progress)).await;
            bar.finish_and_clear();

            if json {
                println!("{}", serde_json::to_string_pretty(&result.items)?);
            } else {
                let summary = result.summary();
                println!(
                    "Batch {}: {}/{} successful ({}) in {:.2}s ({:.2} items/s)",
                    summary.batch_id,
                    summary.successful,
                    summary.total_processed,
                    summary.success_rate,
                    summary.processing_time_sec,
                    summary.items_per_second,
                );
                for item in result.failed_items() {
                    println!(
                        "  failed: {} ({})",
                        item.image_path.display(),
                        item.error.as_deref().unwrap_or("unknown error")
                    );
                }
            }
        }

        Commands::Engines => {
            let pipeline = HomeworkPipeline::from_config(&config)?;
            for (name, available, hint) in pipeline.selector().engine_report() {
                let marker = if available { "+" } else { "-" };
                println!("{} {:<12} {}", marker, name, hint);
            }
        }

        Commands::Redact { text, aggressive } => {
            let redactor = PiiRedactor::new();
            let (redacted, report) = redactor.redact(&text, aggressive);
            println!("{}", redacted);
            if report.total() > 0 {
                eprintln!("redacted {} item(s):", report.total());
                for (category, count) in &report.redacted_count {
                    eprintln!("  {}: {}", category, count);
                }
            }
        }
    }

    Ok(())
}

/// Collect supported image files from a directory, sorted by name.
fn collect_images(dir: &PathBuf) -> anyhow::Result<Vec<BatchRequest>> {
    const EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .map(|e| EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();

    Ok(paths
        .into_iter()
        .map(|path| BatchRequest::new(path, "cli"))
        .collect())
}

fn print_outcome(outcome: &hwextract::pipeline::ExtractionOutcome) {
    let extraction = &outcome.extraction;
    println!("Engine:     {}", outcome.engine_result.engine);
    println!("Confidence: {:.2}", extraction.confidence);
    println!("Subject:    {}", or_dash(&extraction.subject));
    println!("Title:      {}", or_dash(&extraction.title));
    if let Some(due) = &extraction.due_date {
        let normalized = extraction
            .due_date_normalized
            .as_deref()
            .map(|d| format!(" ({})", d))
            .unwrap_or_default();
        println!("Due:        {}{}", due, normalized);
    }
    if !extraction.assignments.is_empty() {
        println!("Tasks:");
        for assignment in &extraction.assignments {
            println!("  - {}", assignment.task);
        }
    }
    if !extraction.materials_needed.is_empty() {
        println!("Materials:  {}", extraction.materials_needed.join(", "));
    }
    println!("Priority:   {}", extraction.priority);

    if !outcome.validation.valid || !outcome.validation.issues.is_empty() {
        println!(
            "Validation: {}",
            if outcome.validation.valid { "ok (with notes)" } else { "INVALID" }
        );
        for issue in &outcome.validation.issues {
            println!("  [{:?}] {}: {}", issue.severity, issue.field, issue.message);
        }
        for suggestion in &outcome.validation.suggestions {
            println!("  > {}", suggestion);
        }
    }
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}
