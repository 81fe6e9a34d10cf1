//! Tolerant parsing of LLM extraction responses.
//!
//! Vision models are asked for bare JSON but routinely wrap it in a markdown
//! fence or stray prose. A response that is present but malformed is a
//! recoverable condition: it degrades to a low-confidence record carrying
//! the text as the description. Only transport failures are errors.

use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::extraction::{Assignment, HomeworkExtraction, Priority};

/// Confidence for a response that parsed into the requested schema.
pub const PARSED_CONFIDENCE: f32 = 0.9;

/// Confidence for a free-text response from a vision model.
pub const FALLBACK_CONFIDENCE_VISION: f32 = 0.7;

/// Confidence for a free-text response from a text-only model.
pub const FALLBACK_CONFIDENCE_TEXT: f32 = 0.5;

/// Accept a JSON string or number where a string is expected. Vision models
/// freely emit `"page_numbers": 45`.
fn opt_stringlike<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringLike {
        Str(String),
        Num(f64),
        None,
    }

    Ok(match Option::<StringLike>::deserialize(deserializer)? {
        Some(StringLike::Str(s)) if !s.trim().is_empty() => Some(s),
        Some(StringLike::Num(n)) => Some(if n.fract() == 0.0 {
            format!("{}", n as i64)
        } else {
            format!("{}", n)
        }),
        _ => None,
    })
}

#[derive(Debug, Deserialize, Default)]
struct AssignmentPayload {
    #[serde(default)]
    task: String,
    #[serde(default, deserialize_with = "opt_stringlike")]
    page_numbers: Option<String>,
    #[serde(default, deserialize_with = "opt_stringlike")]
    questions: Option<String>,
}

/// The JSON schema the prompts request.
#[derive(Debug, Deserialize, Default)]
struct ExtractionPayload {
    #[serde(default)]
    subject: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default, deserialize_with = "opt_stringlike")]
    due_date: Option<String>,
    #[serde(default, deserialize_with = "opt_stringlike")]
    due_date_normalized: Option<String>,
    #[serde(default)]
    assignments: Vec<AssignmentPayload>,
    #[serde(default)]
    materials_needed: Vec<String>,
    #[serde(default, deserialize_with = "opt_stringlike")]
    estimated_time: Option<String>,
    #[serde(default, deserialize_with = "opt_stringlike")]
    priority: Option<String>,
    #[serde(default, deserialize_with = "opt_stringlike")]
    homework_type: Option<String>,
    #[serde(default, deserialize_with = "opt_stringlike")]
    homework_type_display: Option<String>,
    #[serde(default)]
    potential_names: Vec<String>,
    #[serde(default, deserialize_with = "opt_stringlike")]
    what_to_achieve: Option<String>,
    #[serde(default)]
    exercises_list: Vec<String>,
    #[serde(default, deserialize_with = "opt_stringlike")]
    page_numbers: Option<String>,
    #[serde(default, deserialize_with = "opt_stringlike")]
    textbook_title: Option<String>,
    #[serde(default, deserialize_with = "opt_stringlike")]
    workbook_title: Option<String>,
}

impl ExtractionPayload {
    fn into_extraction(self, raw: &str) -> HomeworkExtraction {
        HomeworkExtraction {
            subject: self.subject,
            title: self.title,
            description: self.description,
            due_date: self.due_date,
            due_date_normalized: self.due_date_normalized,
            assignments: self
                .assignments
                .into_iter()
                .map(|a| Assignment {
                    task: a.task,
                    page_numbers: a.page_numbers,
                    questions: a.questions,
                })
                .collect(),
            materials_needed: self.materials_needed,
            estimated_time: self.estimated_time,
            priority: self
                .priority
                .as_deref()
                .map(Priority::parse_lenient)
                .unwrap_or_default(),
            homework_type: self.homework_type,
            homework_type_display: self.homework_type_display,
            potential_names: self.potential_names,
            what_to_achieve: self.what_to_achieve,
            exercises_list: self.exercises_list,
            page_numbers: self.page_numbers,
            textbook_title: self.textbook_title,
            workbook_title: self.workbook_title,
            raw_text: raw.to_string(),
            confidence: PARSED_CONFIDENCE,
            extraction_metadata: Default::default(),
        }
        .normalized()
    }
}

/// Strip a markdown code fence (with optional `json` tag) wrapping `content`.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.trim_start_matches(['\r', '\n', ' ']);
    rest.strip_suffix("```").map(str::trim_end).unwrap_or(rest)
}

/// Parse a model response into a structured record.
///
/// On success the record carries [`PARSED_CONFIDENCE`]; on malformed JSON it
/// degrades to `fallback_confidence` with the whole response as description.
/// This never fails: malformed-but-present output is expected from LLMs.
pub fn parse_structured_response(content: &str, fallback_confidence: f32) -> HomeworkExtraction {
    let candidate = strip_code_fence(content);

    match serde_json::from_str::<ExtractionPayload>(candidate) {
        Ok(payload) => payload.into_extraction(candidate),
        Err(err) => {
            debug!("structured response did not parse as JSON ({}), degrading", err);
            HomeworkExtraction {
                description: content.trim().to_string(),
                raw_text: content.trim().to_string(),
                confidence: fallback_confidence,
                ..Default::default()
            }
            .normalized()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: &str = r#"{
        "subject": "Mathematics",
        "title": "Algebra Homework",
        "description": "Solve all equations on page 42",
        "due_date": "next Friday",
        "due_date_normalized": "2026-08-14",
        "assignments": [{"task": "Solve equations", "page_numbers": 42, "questions": "1-10"}],
        "materials_needed": ["Calculator", "calculator"],
        "priority": "high"
    }"#;

    #[test]
    fn parses_plain_json() {
        let extraction = parse_structured_response(GOOD, FALLBACK_CONFIDENCE_VISION);
        assert_eq!(extraction.subject, "Mathematics");
        assert_eq!(extraction.title, "Algebra Homework");
        assert_eq!(extraction.due_date_normalized.as_deref(), Some("2026-08-14"));
        assert_eq!(extraction.priority, Priority::High);
        assert_eq!(extraction.confidence, PARSED_CONFIDENCE);
        // Numeric page number tolerated, materials deduplicated.
        assert_eq!(extraction.assignments[0].page_numbers.as_deref(), Some("42"));
        assert_eq!(extraction.materials_needed, vec!["Calculator"]);
    }

    #[test]
    fn strips_markdown_fence() {
        let fenced = format!("```json\n{}\n```", GOOD);
        let extraction = parse_structured_response(&fenced, FALLBACK_CONFIDENCE_VISION);
        assert_eq!(extraction.subject, "Mathematics");
        assert_eq!(extraction.confidence, PARSED_CONFIDENCE);
    }

    #[test]
    fn strips_untagged_fence() {
        let fenced = format!("```\n{}\n```", GOOD);
        let extraction = parse_structured_response(&fenced, FALLBACK_CONFIDENCE_VISION);
        assert_eq!(extraction.subject, "Mathematics");
    }

    #[test]
    fn malformed_json_degrades_never_fails() {
        let content = "The homework says: finish chapter 5 by Friday.";
        let extraction = parse_structured_response(content, FALLBACK_CONFIDENCE_VISION);
        assert_eq!(extraction.description, content);
        assert_eq!(extraction.confidence, FALLBACK_CONFIDENCE_VISION);
        assert!(extraction.subject.is_empty());
    }

    #[test]
    fn unknown_priority_becomes_normal() {
        let extraction = parse_structured_response(
            r#"{"subject": "Science", "priority": "asap"}"#,
            FALLBACK_CONFIDENCE_VISION,
        );
        assert_eq!(extraction.priority, Priority::Normal);
    }
}
