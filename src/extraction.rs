//! Canonical structured homework record.
//!
//! Every extraction engine ultimately produces (or has derived for it) a
//! `HomeworkExtraction`. The ensemble merger reconciles several of them into
//! one; the validator checks the merged record against domain rules.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Priority of a homework item. Ordering follows urgency, so `max()` over a
/// set of reported priorities picks the most urgent one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }

    /// Parse a priority name, accepting anything the vision models emit.
    /// Unknown values map to `Normal` rather than failing the extraction.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "low" => Priority::Low,
            "high" => Priority::High,
            "urgent" => Priority::Urgent,
            _ => Priority::Normal,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One task within a homework item, as broken down by a vision engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Assignment {
    /// Individual task description.
    #[serde(default)]
    pub task: String,
    /// Page numbers if specified (kept verbatim, e.g. "45-47").
    #[serde(default)]
    pub page_numbers: Option<String>,
    /// Specific questions to answer.
    #[serde(default)]
    pub questions: Option<String>,
}

/// Structured homework extraction result.
///
/// `due_date` is the date as written in the image; `due_date_normalized` is
/// the ISO 8601 form when an engine managed to normalize it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct HomeworkExtraction {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub due_date_normalized: Option<String>,
    #[serde(default)]
    pub assignments: Vec<Assignment>,
    #[serde(default)]
    pub materials_needed: Vec<String>,
    #[serde(default)]
    pub estimated_time: Option<String>,
    #[serde(default)]
    pub priority: Priority,

    // Enrichment fields. All optional; only the vision engines fill these.
    #[serde(default)]
    pub homework_type: Option<String>,
    #[serde(default)]
    pub homework_type_display: Option<String>,
    #[serde(default)]
    pub potential_names: Vec<String>,
    #[serde(default)]
    pub what_to_achieve: Option<String>,
    #[serde(default)]
    pub exercises_list: Vec<String>,
    #[serde(default)]
    pub page_numbers: Option<String>,
    #[serde(default)]
    pub textbook_title: Option<String>,
    #[serde(default)]
    pub workbook_title: Option<String>,

    #[serde(default)]
    pub raw_text: String,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub extraction_metadata: Map<String, Value>,
}

impl HomeworkExtraction {
    /// Enforce the record invariants: confidence in [0,1], no empty
    /// assignment tasks, materials deduplicated case-insensitively with the
    /// first-seen casing kept.
    pub fn normalized(mut self) -> Self {
        self.confidence = clamp_confidence(self.confidence);
        self.assignments.retain(|a| !a.task.trim().is_empty());
        self.materials_needed = dedupe_case_insensitive(self.materials_needed);
        self.potential_names.retain(|n| !n.trim().is_empty());
        self.exercises_list.retain(|e| !e.trim().is_empty());
        self
    }
}

/// Clamp a confidence score into [0, 1]. NaN maps to 0.
pub fn clamp_confidence(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Deduplicate case-insensitively, preserving order and first-seen casing.
/// Empty entries are dropped.
pub fn dedupe_case_insensitive(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        if item.trim().is_empty() {
            continue;
        }
        if seen.insert(item.to_lowercase()) {
            out.push(item);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_ordering_follows_urgency() {
        assert!(Priority::Urgent > Priority::High);
        assert!(Priority::High > Priority::Normal);
        assert!(Priority::Normal > Priority::Low);
        let reported = [Priority::Normal, Priority::Urgent, Priority::High];
        assert_eq!(reported.iter().max(), Some(&Priority::Urgent));
    }

    #[test]
    fn priority_parse_is_lenient() {
        assert_eq!(Priority::parse_lenient("URGENT"), Priority::Urgent);
        assert_eq!(Priority::parse_lenient(" high "), Priority::High);
        assert_eq!(Priority::parse_lenient("whatever"), Priority::Normal);
        assert_eq!(Priority::parse_lenient(""), Priority::Normal);
    }

    #[test]
    fn priority_serde_uses_lowercase_names() {
        assert_eq!(serde_json::to_string(&Priority::Urgent).unwrap(), "\"urgent\"");
        let p: Priority = serde_json::from_str("\"low\"").unwrap();
        assert_eq!(p, Priority::Low);
    }

    #[test]
    fn dedupe_keeps_first_seen_casing() {
        let items = vec![
            "Ruler".to_string(),
            "ruler".to_string(),
            "Calculator".to_string(),
            "RULER".to_string(),
            "".to_string(),
        ];
        assert_eq!(dedupe_case_insensitive(items), vec!["Ruler", "Calculator"]);
    }

    #[test]
    fn normalized_clamps_and_filters() {
        let record = HomeworkExtraction {
            confidence: 1.7,
            assignments: vec![
                Assignment { task: "Read chapter 4".into(), ..Default::default() },
                Assignment { task: "  ".into(), ..Default::default() },
            ],
            materials_needed: vec!["Pencil".into(), "pencil".into()],
            ..Default::default()
        }
        .normalized();

        assert_eq!(record.confidence, 1.0);
        assert_eq!(record.assignments.len(), 1);
        assert_eq!(record.materials_needed, vec!["Pencil"]);
    }

    #[test]
    fn extraction_deserializes_with_missing_fields() {
        let record: HomeworkExtraction =
            serde_json::from_str(r#"{"subject":"Mathematics","title":"Algebra"}"#).unwrap();
        assert_eq!(record.subject, "Mathematics");
        assert_eq!(record.priority, Priority::Normal);
        assert!(record.assignments.is_empty());
        assert!(record.due_date.is_none());
    }
}
