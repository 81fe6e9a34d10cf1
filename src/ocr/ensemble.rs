//! Ensemble reconciliation of multiple engine results.
//!
//! Field-level voting over the structured records that independent engines
//! produced for the same image. The vote heuristics are deliberately simple
//! (plurality, longest-string, fixed precedence): they are documented,
//! testable behavior, not placeholders for something cleverer.
//!
//! `merge` is a pure function: the same ordered input always produces an
//! identical record.

use serde_json::{json, Map, Value};
use thiserror::Error;

use super::engine::EngineResult;
use crate::extraction::{dedupe_case_insensitive, Assignment, HomeworkExtraction, Priority};

/// Consensus confidence: base for any ensemble, plus a bonus per
/// contributing engine, capped below certainty.
const CONSENSUS_BASE: f32 = 0.8;
const CONSENSUS_PER_ENGINE: f32 = 0.1;
const CONSENSUS_CAP: f32 = 0.95;

#[derive(Debug, Error, PartialEq)]
pub enum MergeError {
    /// Calling merge with no results is a caller bug, not a data condition.
    #[error("merge invoked with an empty result set")]
    NoResults,
}

/// Reconcile N engine results into one structured record.
///
/// - one result: its structured record passes through unchanged
/// - N results: field-level voting (see module docs), confidence
///   `min(0.95, 0.8 + 0.1 * N)`, audit metadata recording the engines used
pub fn merge(results: &[EngineResult]) -> Result<HomeworkExtraction, MergeError> {
    match results {
        [] => Err(MergeError::NoResults),
        [single] => Ok(single
            .structured
            .clone()
            .unwrap_or_else(|| HomeworkExtraction {
                raw_text: single.text.clone(),
                confidence: single.confidence,
                ..Default::default()
            })),
        many => Ok(merge_many(many)),
    }
}

fn merge_many(results: &[EngineResult]) -> HomeworkExtraction {
    let records: Vec<&HomeworkExtraction> = results
        .iter()
        .filter_map(|r| r.structured.as_ref())
        .collect();

    let subjects: Vec<&str> = non_empty(records.iter().map(|r| r.subject.as_str()));
    let titles: Vec<&str> = non_empty(records.iter().map(|r| r.title.as_str()));
    let descriptions: Vec<&str> = non_empty(records.iter().map(|r| r.description.as_str()));
    let due_dates: Vec<&str> = non_empty(records.iter().map(|r| r.due_date.as_deref().unwrap_or("")));
    let estimated: Vec<&str> =
        non_empty(records.iter().map(|r| r.estimated_time.as_deref().unwrap_or("")));

    let mut metadata = Map::new();
    metadata.insert(
        "engines_used".to_string(),
        Value::Array(results.iter().map(|r| json!(r.engine)).collect()),
    );
    metadata.insert(
        "vote_counts".to_string(),
        json!({
            "subject": subjects.len(),
            "title": titles.len(),
            "description": descriptions.len(),
        }),
    );

    let raw_text = results
        .iter()
        .map(|r| format!("[{}]: {}", r.engine, r.text))
        .collect::<Vec<_>>()
        .join("\n\n");

    HomeworkExtraction {
        subject: vote_plurality(&subjects),
        title: vote_plurality(&titles),
        description: vote_longest(&descriptions),
        due_date: none_if_empty(vote_plurality(&due_dates)),
        due_date_normalized: records
            .iter()
            .find_map(|r| r.due_date_normalized.clone().filter(|d| !d.is_empty())),
        assignments: merge_assignments(&records),
        materials_needed: dedupe_case_insensitive(
            records
                .iter()
                .flat_map(|r| r.materials_needed.iter().cloned())
                .collect(),
        ),
        estimated_time: none_if_empty(vote_plurality(&estimated)),
        priority: records
            .iter()
            .map(|r| r.priority)
            .max()
            .unwrap_or(Priority::Normal),
        homework_type: first_some(&records, |r| r.homework_type.clone()),
        homework_type_display: first_some(&records, |r| r.homework_type_display.clone()),
        potential_names: dedupe_case_insensitive(
            records
                .iter()
                .flat_map(|r| r.potential_names.iter().cloned())
                .collect(),
        ),
        what_to_achieve: first_some(&records, |r| r.what_to_achieve.clone()),
        exercises_list: dedupe_case_insensitive(
            records
                .iter()
                .flat_map(|r| r.exercises_list.iter().cloned())
                .collect(),
        ),
        page_numbers: first_some(&records, |r| r.page_numbers.clone()),
        textbook_title: first_some(&records, |r| r.textbook_title.clone()),
        workbook_title: first_some(&records, |r| r.workbook_title.clone()),
        raw_text,
        confidence: consensus_confidence(results.len()),
        extraction_metadata: metadata,
    }
    .normalized()
}

/// Consensus across more engines increases confidence, capped below
/// certainty: `min(0.95, 0.8 + 0.1 * N)`.
pub fn consensus_confidence(engine_count: usize) -> f32 {
    (CONSENSUS_BASE + CONSENSUS_PER_ENGINE * engine_count as f32).min(CONSENSUS_CAP)
}

fn non_empty<'a>(values: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    values.filter(|v| !v.is_empty()).collect()
}

fn none_if_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Most frequent value; ties broken by engine output order (first seen wins).
fn vote_plurality(values: &[&str]) -> String {
    let mut tally: Vec<(&str, usize)> = Vec::new();
    for &value in values {
        match tally.iter_mut().find(|(v, _)| *v == value) {
            Some((_, count)) => *count += 1,
            None => tally.push((value, 1)),
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for &(value, count) in &tally {
        if best.map(|(_, c)| count > c).unwrap_or(true) {
            best = Some((value, count));
        }
    }
    best.map(|(v, _)| v.to_string()).unwrap_or_default()
}

/// Longest candidate wins: length correlates with completeness.
fn vote_longest(values: &[&str]) -> String {
    values
        .iter()
        .max_by_key(|v| v.len())
        .map(|v| v.to_string())
        .unwrap_or_default()
}

fn first_some<T, F>(records: &[&HomeworkExtraction], get: F) -> Option<T>
where
    F: Fn(&HomeworkExtraction) -> Option<T>,
{
    records.iter().find_map(|r| get(r))
}

/// Union of assignments, de-duplicated by exact task match, first seen wins.
fn merge_assignments(records: &[&HomeworkExtraction]) -> Vec<Assignment> {
    let mut seen = std::collections::HashSet::new();
    let mut merged = Vec::new();
    for record in records {
        for assignment in &record.assignments {
            if !assignment.task.is_empty() && seen.insert(assignment.task.clone()) {
                merged.push(assignment.clone());
            }
        }
    }
    merged
}
