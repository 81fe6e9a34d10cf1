//! Tesseract OCR engine.
//!
//! Invokes the tesseract binary in TSV mode to get box-level detections with
//! per-word confidences. Boxes below the confidence floor are dropped; the
//! result confidence is the unweighted mean over the surviving boxes.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

use async_trait::async_trait;

use super::engine::{EngineError, EngineKind, EngineResult, ExtractionEngine};
use super::model_utils::check_binary;

/// Per-box confidence floor (tesseract reports 0-100).
const MIN_BOX_CONFIDENCE: f32 = 30.0;

/// Tesseract OCR engine (traditional, local, box-confidence).
pub struct TesseractEngine {
    /// Languages joined with '+' when invoking the binary.
    languages: Vec<String>,
}

impl TesseractEngine {
    pub fn new(languages: Vec<String>) -> Self {
        let languages = if languages.is_empty() {
            vec!["eng".to_string()]
        } else {
            languages
        };
        Self { languages }
    }

    /// Map an ISO-ish language hint onto a tesseract language code; unknown
    /// hints fall back to the configured language set.
    fn language_arg(&self, hint: &str) -> String {
        match hint {
            "en" => "eng".to_string(),
            "zh" | "chi_sim" => "chi_sim".to_string(),
            "chi_tra" => "chi_tra".to_string(),
            "ms" | "msa" => "msa".to_string(),
            _ => self.languages.join("+"),
        }
    }

    fn run_tesseract(image_path: &Path, lang: &str) -> Result<(String, f32), EngineError> {
        let output = Command::new("tesseract")
            .arg(image_path)
            .arg("stdout")
            .args(["-l", lang, "--oem", "3", "--psm", "6", "tsv"])
            .output();

        match output {
            Ok(output) if output.status.success() => {
                Ok(parse_tsv(&String::from_utf8_lossy(&output.stdout)))
            }
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(EngineError::Failed(format!("tesseract failed: {}", stderr)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(EngineError::Unavailable(
                "tesseract not found (install tesseract-ocr)".to_string(),
            )),
            Err(e) => Err(EngineError::Io(e)),
        }
    }
}

/// Parse tesseract TSV output into (text, mean confidence in [0,1]).
///
/// TSV columns: level page block par line word left top width height conf text.
/// Non-word rows carry conf -1 and are skipped.
fn parse_tsv(tsv: &str) -> (String, f32) {
    let mut words: Vec<String> = Vec::new();
    let mut confidences: Vec<f32> = Vec::new();

    for line in tsv.lines().skip(1) {
        let columns: Vec<&str> = line.split('\t').collect();
        if columns.len() < 12 {
            continue;
        }
        let Ok(conf) = columns[10].parse::<f32>() else {
            continue;
        };
        let text = columns[11].trim();
        if conf > MIN_BOX_CONFIDENCE && !text.is_empty() {
            words.push(text.to_string());
            confidences.push(conf / 100.0);
        }
    }

    let mean = if confidences.is_empty() {
        0.0
    } else {
        confidences.iter().sum::<f32>() / confidences.len() as f32
    };
    (words.join(" "), mean)
}

#[async_trait]
impl ExtractionEngine for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn kind(&self) -> EngineKind {
        EngineKind::TraditionalOcr
    }

    fn is_available(&self) -> bool {
        check_binary("tesseract")
    }

    fn availability_hint(&self) -> String {
        if check_binary("tesseract") {
            "Tesseract is available".to_string()
        } else {
            "Tesseract not installed. Install with: apt install tesseract-ocr".to_string()
        }
    }

    async fn extract(
        &self,
        image_path: &Path,
        language_hint: &str,
    ) -> Result<EngineResult, EngineError> {
        let start = Instant::now();
        let lang = self.language_arg(language_hint);
        let path: PathBuf = image_path.to_path_buf();

        let (text, confidence) =
            tokio::task::spawn_blocking(move || Self::run_tesseract(&path, &lang))
                .await
                .map_err(|e| EngineError::Failed(format!("tesseract task panicked: {}", e)))??;

        Ok(EngineResult {
            text,
            structured: None,
            confidence,
            engine: self.name().to_string(),
            processing_time_ms: start.elapsed().as_secs_f64() * 1000.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tsv_filters_low_confidence_boxes() {
        let tsv = "level\tpage\tblock\tpar\tline\tword\tleft\ttop\twidth\theight\tconf\ttext\n\
                   5\t1\t1\t1\t1\t1\t10\t10\t40\t12\t91\tMath\n\
                   5\t1\t1\t1\t1\t2\t55\t10\t60\t12\t12\tsmudge\n\
                   5\t1\t1\t1\t1\t3\t120\t10\t70\t12\t85\tExercise\n\
                   4\t1\t1\t1\t1\t0\t0\t0\t0\t0\t-1\t\n";
        let (text, confidence) = parse_tsv(tsv);
        assert_eq!(text, "Math Exercise");
        assert!((confidence - 0.88).abs() < 1e-4);
    }

    #[test]
    fn tsv_empty_output_yields_zero_confidence() {
        let (text, confidence) = parse_tsv("header only\n");
        assert_eq!(text, "");
        assert_eq!(confidence, 0.0);
    }

    #[test]
    fn language_hints_map_to_tesseract_codes() {
        let engine = TesseractEngine::new(vec!["eng".into(), "msa".into()]);
        assert_eq!(engine.language_arg("en"), "eng");
        assert_eq!(engine.language_arg("zh"), "chi_sim");
        assert_eq!(engine.language_arg("ms"), "msa");
        assert_eq!(engine.language_arg("xx"), "eng+msa");
    }
}
