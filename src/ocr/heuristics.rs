//! Heuristic structuring of raw OCR text.
//!
//! Traditional OCR engines return text only; when no vision engine is
//! available to do real structured extraction, these heuristics derive a
//! best-effort record from the raw text.
//!
//! Known weakness: the subject and due-date rules are keyword and regex
//! matches over lowered text. They over- and under-match on real-world
//! phrasing, but their behavior is documented and relied upon, so they are
//! kept as-is rather than tightened.

use std::sync::OnceLock;

use regex::Regex;

use crate::extraction::HomeworkExtraction;

/// Confidence assigned to heuristically derived records.
const HEURISTIC_CONFIDENCE: f32 = 0.6;

/// Subjects the line-equality rule recognizes.
const SUBJECT_KEYWORDS: &[&str] = &[
    "math",
    "mathematics",
    "matematik",
    "science",
    "sains",
    "english",
    "chinese",
    "malay",
    "bahasa melayu",
    "bahasa",
    "history",
    "sejarah",
    "geography",
    "geografi",
    "physics",
    "chemistry",
    "biology",
];

fn due_date_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(?:due|submit|deadline|by)\b\s*:?\s*(.+)$").unwrap())
}

/// Derive a structured record from raw OCR text.
///
/// - title: first line of 5-100 characters
/// - subject: a line that, lowered and trimmed, is exactly a known subject
///   keyword ("math" buried inside a longer line does not count)
/// - due date: trailing fragment after a due/submit/deadline/by marker
pub fn parse_homework_from_text(text: &str) -> HomeworkExtraction {
    let mut extraction = HomeworkExtraction {
        raw_text: text.to_string(),
        confidence: HEURISTIC_CONFIDENCE,
        ..Default::default()
    };

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let line_lower = line.to_lowercase();

        if extraction.subject.is_empty() && SUBJECT_KEYWORDS.contains(&line_lower.as_str()) {
            extraction.subject = line.to_string();
        }

        if extraction.due_date.is_none() {
            if let Some(captures) = due_date_pattern().captures(&line_lower) {
                let fragment = captures[1].trim().to_string();
                if !fragment.is_empty() {
                    extraction.due_date = Some(fragment);
                }
            }
        }
    }

    for line in text.lines() {
        let line = line.trim();
        if line.len() > 5 && line.len() < 100 {
            extraction.title = line.to_string();
            break;
        }
    }

    extraction.description = text.to_string();
    extraction
}

/// Crude text-language detection: CJK character ratio, then Malay keyword
/// count, else English.
pub fn detect_language(text: &str) -> &'static str {
    let total_chars = text.trim().chars().count();
    if total_chars == 0 {
        return "unknown";
    }

    let cjk_chars = text
        .chars()
        .filter(|c| ('\u{4e00}'..='\u{9fff}').contains(c))
        .count();
    if cjk_chars as f64 / total_chars as f64 > 0.3 {
        return "zh";
    }

    const MALAY_KEYWORDS: &[&str] = &["dan", "atau", "yang", "untuk", "dari", "pada", "dengan"];
    let text_lower = text.to_lowercase();
    let malay_hits = MALAY_KEYWORDS
        .iter()
        .filter(|word| text_lower.contains(*word))
        .count();
    if malay_hits >= 2 {
        return "ms";
    }

    "en"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_is_first_qualifying_line() {
        let extraction = parse_homework_from_text("ab\nFinish exercises 1 to 5\nmore text");
        assert_eq!(extraction.title, "Finish exercises 1 to 5");
    }

    #[test]
    fn subject_requires_exact_keyword_line() {
        // "math" buried in a longer line does not set the subject.
        let extraction = parse_homework_from_text("Math Exercise 2.3, due 25/12/2024");
        assert!(extraction.subject.is_empty());

        let extraction = parse_homework_from_text("Mathematics\nFinish page 42");
        assert_eq!(extraction.subject, "Mathematics");
    }

    #[test]
    fn due_date_fragment_is_captured() {
        let extraction = parse_homework_from_text("Math Exercise 2.3, due 25/12/2024");
        assert_eq!(extraction.due_date.as_deref(), Some("25/12/2024"));

        let extraction = parse_homework_from_text("Submit: Friday next week");
        assert_eq!(extraction.due_date.as_deref(), Some("friday next week"));
    }

    #[test]
    fn no_due_marker_means_no_due_date() {
        let extraction = parse_homework_from_text("Finish chapter 3 questions");
        assert!(extraction.due_date.is_none());
    }

    #[test]
    fn description_carries_full_text() {
        let text = "Science\nRead pages 10-12\nAnswer all questions";
        let extraction = parse_homework_from_text(text);
        assert_eq!(extraction.description, text);
        assert_eq!(extraction.raw_text, text);
        assert_eq!(extraction.confidence, HEURISTIC_CONFIDENCE);
    }

    #[test]
    fn language_detection() {
        assert_eq!(detect_language("Finish the homework by Friday"), "en");
        assert_eq!(detect_language("完成数学作业第五章练习"), "zh");
        assert_eq!(detect_language("Siapkan kerja rumah dan hantar pada hari Jumaat"), "ms");
        assert_eq!(detect_language("   "), "unknown");
    }
}
