//! Domain validation of merged extraction records.
//!
//! Validation issues are data, not errors: they are returned alongside the
//! record so the caller decides whether to block on them. `valid` is true
//! exactly when no issue has `Error` severity.

use chrono::{Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::extraction::HomeworkExtraction;

/// How serious a validation issue is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// One finding about one field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
    pub severity: Severity,
}

impl ValidationIssue {
    fn new(field: &str, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
            severity,
        }
    }
}

/// The outcome of validating one record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub issues: Vec<ValidationIssue>,
    pub confidence_score: f32,
    /// Human-readable suggestions for the end user, derived from the issues.
    pub suggestions: Vec<String>,
}

/// Subjects the validator recognizes without a warning.
const KNOWN_SUBJECTS: &[&str] = &[
    "mathematics",
    "math",
    "matematik",
    "english",
    "science",
    "sains",
    "physics",
    "chemistry",
    "biology",
    "history",
    "sejarah",
    "geography",
    "geografi",
    "chinese",
    "malay",
    "bahasa melayu",
    "tamil",
    "art",
    "music",
    "pe",
    "computer",
    "programming",
];

/// Maximum days in the future a due date may be without a warning.
const MAX_FUTURE_DAYS: i64 = 365;

pub struct Validator {
    min_confidence: f32,
}

impl Validator {
    pub fn new(min_confidence: f32) -> Self {
        Self { min_confidence }
    }

    /// Validate a record against today's date.
    pub fn validate(&self, extraction: &HomeworkExtraction, raw_text: &str) -> ValidationResult {
        self.validate_with_today(extraction, raw_text, Local::now().date_naive())
    }

    /// Validation with an explicit "today", so date boundaries are testable.
    pub fn validate_with_today(
        &self,
        extraction: &HomeworkExtraction,
        raw_text: &str,
        today: NaiveDate,
    ) -> ValidationResult {
        let mut issues = Vec::new();

        self.check_subject(extraction, &mut issues);
        self.check_title(extraction, &mut issues);
        self.check_description(extraction, raw_text, &mut issues);
        self.check_due_date(extraction, today, &mut issues);

        if extraction.confidence < self.min_confidence {
            issues.push(ValidationIssue::new(
                "confidence",
                format!("Low confidence score: {:.2}", extraction.confidence),
                Severity::Warning,
            ));
        }

        let valid = !issues.iter().any(|i| i.severity == Severity::Error);
        let suggestions = self.suggestions(extraction, &issues);

        ValidationResult {
            valid,
            issues,
            confidence_score: extraction.confidence,
            suggestions,
        }
    }

    fn check_subject(&self, extraction: &HomeworkExtraction, issues: &mut Vec<ValidationIssue>) {
        if extraction.subject.is_empty() {
            issues.push(ValidationIssue::new("subject", "Subject is missing", Severity::Error));
            return;
        }
        if !KNOWN_SUBJECTS.contains(&extraction.subject.to_lowercase().as_str()) {
            issues.push(ValidationIssue::new(
                "subject",
                format!("Unrecognized subject: {}", extraction.subject),
                Severity::Warning,
            ));
        }
    }

    fn check_title(&self, extraction: &HomeworkExtraction, issues: &mut Vec<ValidationIssue>) {
        if extraction.title.is_empty() {
            issues.push(ValidationIssue::new("title", "Title is missing", Severity::Error));
            return;
        }
        if extraction.title.len() < 3 {
            issues.push(ValidationIssue::new("title", "Title is too short", Severity::Warning));
        }
        if extraction.title.len() > 200 {
            issues.push(ValidationIssue::new(
                "title",
                "Title is too long (max 200 chars)",
                Severity::Warning,
            ));
        }
    }

    fn check_description(
        &self,
        extraction: &HomeworkExtraction,
        raw_text: &str,
        issues: &mut Vec<ValidationIssue>,
    ) {
        if extraction.description.is_empty() {
            issues.push(ValidationIssue::new(
                "description",
                "Description is missing",
                Severity::Warning,
            ));
        }
        if extraction.description.len() * 2 < raw_text.len() {
            issues.push(ValidationIssue::new(
                "description",
                "Description may be incomplete",
                Severity::Info,
            ));
        }
    }

    fn check_due_date(
        &self,
        extraction: &HomeworkExtraction,
        today: NaiveDate,
        issues: &mut Vec<ValidationIssue>,
    ) {
        let Some(due_date) = extraction.due_date.as_deref() else {
            return; // optional field
        };

        match NaiveDate::parse_from_str(due_date, "%Y-%m-%d") {
            Ok(date) => {
                if date < today {
                    issues.push(ValidationIssue::new(
                        "due_date",
                        "Due date is in the past",
                        Severity::Warning,
                    ));
                }
                if date > today + Duration::days(MAX_FUTURE_DAYS) {
                    issues.push(ValidationIssue::new(
                        "due_date",
                        "Due date is more than 1 year away",
                        Severity::Warning,
                    ));
                }
            }
            Err(_) => {
                issues.push(ValidationIssue::new(
                    "due_date",
                    format!("Invalid date format: {}", due_date),
                    Severity::Error,
                ));
            }
        }
    }

    /// User-facing suggestions, derived 1:1 from the findings.
    fn suggestions(
        &self,
        extraction: &HomeworkExtraction,
        issues: &[ValidationIssue],
    ) -> Vec<String> {
        let mut suggestions = Vec::new();

        if extraction.subject.is_empty() {
            suggestions.push("Please specify the subject".to_string());
        }
        if extraction.due_date.is_none() {
            suggestions.push("Consider adding a due date".to_string());
        }
        if extraction.confidence < 0.7 {
            suggestions.push("Please review the extracted information for accuracy".to_string());
        }
        for issue in issues {
            if issue.field == "subject" && issue.severity == Severity::Warning {
                suggestions.push(format!("Verify subject name: {}", extraction.subject));
            }
        }

        suggestions
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(0.6)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extraction(subject: &str, title: &str, due: Option<&str>) -> HomeworkExtraction {
        HomeworkExtraction {
            subject: subject.to_string(),
            title: title.to_string(),
            description: "A complete description of the homework".to_string(),
            due_date: due.map(str::to_string),
            confidence: 0.9,
            ..Default::default()
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 6).unwrap()
    }

    fn validate(record: &HomeworkExtraction) -> ValidationResult {
        Validator::default().validate_with_today(record, &record.description.clone(), today())
    }

    #[test]
    fn missing_subject_is_an_error() {
        let result = validate(&extraction("", "Algebra", None));
        assert!(!result.valid);
        assert!(result
            .issues
            .iter()
            .any(|i| i.field == "subject" && i.severity == Severity::Error));
        assert!(result.suggestions.iter().any(|s| s.contains("specify the subject")));
    }

    #[test]
    fn unknown_subject_is_only_a_warning() {
        let result = validate(&extraction("Alchemy", "Potions", None));
        assert!(result.valid);
        assert!(result
            .issues
            .iter()
            .any(|i| i.field == "subject" && i.severity == Severity::Warning));
        assert!(result.suggestions.iter().any(|s| s.contains("Verify subject name")));
    }

    #[test]
    fn missing_title_is_an_error() {
        let result = validate(&extraction("Mathematics", "", None));
        assert!(!result.valid);
    }

    #[test]
    fn short_and_long_titles_warn() {
        let result = validate(&extraction("Mathematics", "Ab", None));
        assert!(result.valid);
        assert!(result.issues.iter().any(|i| i.message.contains("too short")));

        let result = validate(&extraction("Mathematics", &"x".repeat(201), None));
        assert!(result.issues.iter().any(|i| i.message.contains("too long")));
    }

    #[test]
    fn unparseable_due_date_is_an_error() {
        let result = validate(&extraction("Mathematics", "Algebra", Some("25/12/2024")));
        assert!(!result.valid);
        assert!(result
            .issues
            .iter()
            .any(|i| i.field == "due_date" && i.severity == Severity::Error));
    }

    #[test]
    fn due_date_boundaries() {
        let v = Validator::default();
        let base = extraction("Mathematics", "Algebra", None);
        let past_issue = |due: &str| {
            let mut record = base.clone();
            record.due_date = Some(due.to_string());
            v.validate_with_today(&record, &record.description.clone(), today())
                .issues
                .iter()
                .any(|i| i.message.contains("in the past"))
        };
        // Exactly today is not in the past; yesterday is.
        assert!(!past_issue("2026-08-06"));
        assert!(past_issue("2026-08-05"));

        let future_issue = |due: &str| {
            let mut record = base.clone();
            record.due_date = Some(due.to_string());
            v.validate_with_today(&record, &record.description.clone(), today())
                .issues
                .iter()
                .any(|i| i.message.contains("1 year away"))
        };
        // 365 days out is fine; 366 is flagged.
        assert!(!future_issue("2027-08-06"));
        assert!(future_issue("2027-08-07"));
    }

    #[test]
    fn short_description_is_informational() {
        let record = extraction("Mathematics", "Algebra", None);
        let raw = "x".repeat(200);
        let result = Validator::default().validate_with_today(&record, &raw, today());
        assert!(result
            .issues
            .iter()
            .any(|i| i.severity == Severity::Info && i.message.contains("incomplete")));
        assert!(result.valid);
    }

    #[test]
    fn low_confidence_warns_and_suggests_review() {
        let mut record = extraction("Mathematics", "Algebra", None);
        record.confidence = 0.4;
        let result = validate(&record);
        assert!(result.valid);
        assert!(result.issues.iter().any(|i| i.field == "confidence"));
        assert!(result.suggestions.iter().any(|s| s.contains("review the extracted")));
        assert_eq!(result.confidence_score, 0.4);
    }
}
