//! PII detection and redaction.
//!
//! Scrubs personally identifiable information from text before it is sent to
//! any external AI service. Redaction is lossy and irreversible: the pipeline
//! never needs the original text back after an external call, so nothing is
//! stored that could restore it.
//!
//! The redactor is an explicitly constructed component, injected into the
//! adapters that need it.

use std::collections::BTreeMap;

use regex::Regex;
use tracing::info;

/// PII categories the redactor knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PiiCategory {
    /// National identity numbers (6-2-4 digit format).
    IdNumber,
    /// Phone numbers in common local formats.
    Phone,
    /// Email addresses.
    Email,
    /// Keyword-prefixed street addresses.
    Address,
    /// Standalone 5-digit postal codes.
    PostalCode,
    /// URLs.
    Url,
    /// Sequences of 2-4 consecutive capitalized words (name heuristic).
    Name,
    /// Keyword-prefixed school names.
    School,
}

impl PiiCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PiiCategory::IdNumber => "id_number",
            PiiCategory::Phone => "phone",
            PiiCategory::Email => "email",
            PiiCategory::Address => "address",
            PiiCategory::PostalCode => "postal_code",
            PiiCategory::Url => "url",
            PiiCategory::Name => "name",
            PiiCategory::School => "school",
        }
    }

    fn placeholder(&self) -> &'static str {
        match self {
            PiiCategory::IdNumber => "[ID]",
            PiiCategory::Phone => "[PHONE]",
            PiiCategory::Email => "[EMAIL]",
            PiiCategory::Address => "[ADDRESS]",
            PiiCategory::PostalCode => "[POSTCODE]",
            PiiCategory::Url => "[URL]",
            PiiCategory::Name => "[NAME]",
            PiiCategory::School => "[SCHOOL]",
        }
    }
}

impl std::fmt::Display for PiiCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a redaction pass did: per-category match counts, never the values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RedactionReport {
    /// Number of replacements performed, per category.
    pub redacted_count: BTreeMap<PiiCategory, usize>,
    pub original_length: usize,
    pub redacted_length: usize,
    pub aggressive: bool,
}

impl RedactionReport {
    /// Total replacements across all categories.
    pub fn total(&self) -> usize {
        self.redacted_count.values().sum()
    }
}

/// Pattern-based PII scrubber.
pub struct PiiRedactor {
    patterns: Vec<(PiiCategory, Regex)>,
}

/// Categories redacted regardless of mode.
const ALWAYS_ON: &[PiiCategory] = &[
    PiiCategory::IdNumber,
    PiiCategory::Phone,
    PiiCategory::Email,
    PiiCategory::Address,
    PiiCategory::PostalCode,
    PiiCategory::Url,
];

/// Categories added in aggressive mode. Name runs before school so that a
/// school name already swallowed by the name heuristic stays redacted.
const AGGRESSIVE: &[PiiCategory] = &[PiiCategory::Name, PiiCategory::School];

impl PiiRedactor {
    pub fn new() -> Self {
        let specs: &[(PiiCategory, &str)] = &[
            (PiiCategory::IdNumber, r"\b\d{6}-?\d{2}-?\d{4}\b"),
            (
                PiiCategory::Phone,
                r"(?i)\b(?:\+?6?01[0-46-9]-?\d{7,8}|\+?60[0-46-9]-?\d{7,8})\b",
            ),
            (
                PiiCategory::Email,
                r"(?i)\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
            ),
            (
                PiiCategory::Address,
                r"(?i)\b(?:No\.?\s*\d+\s*,?\s*)?(?:Jalan|Lorong|Persiaran|Lebuh|Jln|Lrg)\s+[A-Za-z0-9 ]+",
            ),
            (PiiCategory::PostalCode, r"\b\d{5}\b"),
            (
                PiiCategory::Url,
                r"(?i)https?://[-\w.]+(?::\d+)?(?:/[\w/_.%-]*)?(?:\?[\w&=%.-]*)?(?:#[\w.-]*)?",
            ),
            // Capitalized-word runs; deliberately case sensitive.
            (PiiCategory::Name, r"\b[A-Z][a-z]+(?:\s+[A-Z][a-z]+){1,3}\b"),
            (
                PiiCategory::School,
                r"\b(?:SK|SMK|SJK|SM|Sekolah)\s+[A-Za-z0-9 ]+",
            ),
        ];

        let patterns = specs
            .iter()
            .map(|(category, pattern)| {
                // Patterns are fixed at compile time; a failure here is a
                // programming error caught by the unit tests.
                (*category, Regex::new(pattern).unwrap())
            })
            .collect();

        Self { patterns }
    }

    fn pattern(&self, category: PiiCategory) -> &Regex {
        self.patterns
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, re)| re)
            .expect("every category has a registered pattern")
    }

    /// Redact PII from `text`.
    ///
    /// Always scrubs the high-confidence categories (ids, phones, emails,
    /// addresses, postcodes, URLs). With `aggressive` — used whenever the
    /// text is homework-derived, since it routinely contains student, parent
    /// and school names — also scrubs capitalized-name runs and school names.
    pub fn redact(&self, text: &str, aggressive: bool) -> (String, RedactionReport) {
        let mut report = RedactionReport {
            original_length: text.len(),
            aggressive,
            ..Default::default()
        };

        if text.is_empty() {
            report.redacted_length = 0;
            return (String::new(), report);
        }

        let mut redacted = text.to_string();
        for &category in ALWAYS_ON {
            redacted = self.apply(&mut report, category, redacted);
        }
        if aggressive {
            for &category in AGGRESSIVE {
                redacted = self.apply(&mut report, category, redacted);
            }
        }

        report.redacted_length = redacted.len();
        if report.total() > 0 {
            info!(
                "PII redaction: {} item(s) across {:?}",
                report.total(),
                report.redacted_count.keys().collect::<Vec<_>>()
            );
        }
        (redacted, report)
    }

    fn apply(&self, report: &mut RedactionReport, category: PiiCategory, text: String) -> String {
        let re = self.pattern(category);
        let count = re.find_iter(&text).count();
        if count == 0 {
            return text;
        }
        *report.redacted_count.entry(category).or_insert(0) += count;
        re.replace_all(&text, category.placeholder()).into_owned()
    }

    /// Pre-flight check: does `text` contain potential PII, and of what kinds?
    /// Checks every category, including the aggressive ones.
    pub fn contains_pii(&self, text: &str) -> (bool, Vec<PiiCategory>) {
        let categories: Vec<PiiCategory> = self
            .patterns
            .iter()
            .filter(|(_, re)| re.is_match(text))
            .map(|(c, _)| *c)
            .collect();
        (!categories.is_empty(), categories)
    }

    /// Convenience: aggressive redaction for homework text bound for an AI
    /// service, discarding the report.
    pub fn redact_for_ai(&self, text: &str) -> String {
        self.redact(text, true).0
    }
}

impl Default for PiiRedactor {
    fn default() -> Self {
        Self::new()
    }
}
