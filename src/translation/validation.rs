/*!
 * Coverage validation for parsed model payloads.
 *
 * A payload is only accepted when it holds exactly one non-empty record for
 * every requested focus group and nothing else. Every discrepancy is
 * collected, not just the first, so the diagnostic names all of them.
 */

use log::debug;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

use crate::errors::{AttemptError, CoverageMismatch};

/// Translated text keyed by group id, covering exactly one window's focus
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TranslationResult {
    lines: BTreeMap<usize, String>,
}

impl TranslationResult {
    pub fn get(&self, group_id: usize) -> Option<&str> {
        self.lines.get(&group_id).map(String::as_str)
    }

    pub fn group_ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.lines.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn into_inner(self) -> BTreeMap<usize, String> {
        self.lines
    }
}

impl IntoIterator for TranslationResult {
    type Item = (usize, String);
    type IntoIter = std::collections::btree_map::IntoIter<usize, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.into_iter()
    }
}

// @returns: The record array of either accepted payload shape
fn records(payload: &Value) -> Option<&Vec<Value>> {
    match payload {
        Value::Array(records) => Some(records),
        Value::Object(map) => map.get("translations").and_then(Value::as_array),
        _ => None,
    }
}

fn id_from(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// `group_id` first; otherwise the first integer that names an expected group
fn record_id(record: &Map<String, Value>, expected: &BTreeSet<usize>) -> Option<usize> {
    if let Some(id) = record.get("group_id").and_then(id_from) {
        return Some(id);
    }
    record
        .values()
        .filter_map(|value| value.as_u64().and_then(|n| usize::try_from(n).ok()))
        .find(|id| expected.contains(id))
}

fn record_text(record: &Map<String, Value>) -> Option<&str> {
    if let Some(line) = record.get("line").and_then(Value::as_str) {
        return Some(line);
    }
    record.values().find_map(Value::as_str)
}

/// Check a payload against the focus group ids of the window that requested it
pub fn validate_coverage(payload: &Value, focus_ids: &[usize]) -> Result<TranslationResult, AttemptError> {
    let expected: BTreeSet<usize> = focus_ids.iter().copied().collect();
    let mut mismatch = CoverageMismatch::default();
    let mut lines = BTreeMap::new();

    let Some(records) = records(payload) else {
        mismatch.missing = expected.into_iter().collect();
        return Err(AttemptError::ValidationError(mismatch));
    };

    for record in records {
        let Some(record) = record.as_object() else {
            mismatch.malformed += 1;
            continue;
        };
        let (Some(id), Some(text)) = (record_id(record, &expected), record_text(record)) else {
            mismatch.malformed += 1;
            continue;
        };

        if !expected.contains(&id) {
            mismatch.extra.push(id);
            continue;
        }
        if lines.contains_key(&id) {
            if !mismatch.duplicates.contains(&id) {
                mismatch.duplicates.push(id);
            }
            continue;
        }
        let text = text.trim();
        if text.is_empty() {
            mismatch.empty.push(id);
        }
        lines.insert(id, text.to_string());
    }

    mismatch.missing = expected.iter().copied().filter(|id| !lines.contains_key(id)).collect();

    if mismatch.is_clean() {
        Ok(TranslationResult { lines })
    } else {
        debug!("Coverage mismatch for focus {:?}: {}", focus_ids, mismatch);
        Err(AttemptError::ValidationError(mismatch))
    }
}
