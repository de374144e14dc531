/*!
 * Sentence grouping.
 *
 * Merges consecutive items into translation units along sentence-like
 * boundaries so the model never has to continue a thought across an
 * artificial cue split. Groups partition the item sequence exactly.
 */

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::app_config::GroupingConfig;
use super::items::Item;
use super::sentence::SentenceRules;

// @const: Two speakers on one line, "- Hi. - Hello."
static MULTI_SPEAKER_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s[-\u{2013}\u{2014}]\s").unwrap());

/// Music marker that is always translated as itself
pub const MUSIC_NOTE: &str = "\u{266a}";

/// A sentence-safe translation unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    /// 1-based, in file order
    pub group_id: usize,
    /// Positions of the covered items, consecutive and ascending
    pub item_positions: Vec<usize>,
    /// Non-empty item texts joined by single spaces
    pub source_text: String,
}

impl Group {
    // @returns: Number of characters in the source text
    pub fn char_len(&self) -> usize {
        self.source_text.chars().count()
    }

    pub fn is_music(&self) -> bool {
        self.source_text.trim() == MUSIC_NOTE
    }
}

/// Size limits for one group
///
/// `max_group_lines` counts lines that carry text. Empty lines never reach the
/// prompt, so they ride along with their neighbours and a group may cover more
/// item positions than the limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupingLimits {
    pub max_group_lines: usize,
    pub max_group_chars: usize,
    pub min_group_text_chars: usize,
    pub min_group_words: usize,
}

impl From<&GroupingConfig> for GroupingLimits {
    fn from(config: &GroupingConfig) -> Self {
        Self {
            max_group_lines: config.max_group_lines.max(1),
            max_group_chars: config.max_group_chars.max(1),
            min_group_text_chars: config.min_group_text_chars,
            min_group_words: config.min_group_words,
        }
    }
}

impl Default for GroupingLimits {
    fn default() -> Self {
        Self::from(&GroupingConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DraftKind {
    Plain,
    /// Starts with a speaker dash
    Turn,
    /// Lone music marker
    Music,
    /// Two speakers on one line
    Dialogue,
}

#[derive(Debug)]
struct Draft<'a> {
    items: Vec<&'a Item>,
    kind: DraftKind,
}

impl<'a> Draft<'a> {
    fn new() -> Self {
        Self { items: Vec::new(), kind: DraftKind::Plain }
    }

    fn texts(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.items.iter().copied().map(|item: &'a Item| item.text.as_str()).filter(|t| !t.is_empty())
    }

    // Empty lines do not count towards the limits
    fn line_count(&self) -> usize {
        self.texts().count()
    }

    fn char_count(&self) -> usize {
        let texts: Vec<&str> = self.texts().collect();
        texts.iter().map(|t| t.chars().count()).sum::<usize>() + texts.len().saturating_sub(1)
    }

    fn word_count(&self) -> usize {
        self.texts().map(|t| t.split_whitespace().count()).sum()
    }

    fn last_text(&self) -> Option<&'a str> {
        self.texts().last()
    }

    fn has_text(&self) -> bool {
        self.texts().next().is_some()
    }
}

fn starts_turn(text: &str) -> bool {
    text.starts_with('-') || text.starts_with('\u{2013}') || text.starts_with('\u{2014}')
}

// One leading dash is the first speaker's; a second one inside the line is the next speaker's
fn is_multi_speaker(text: &str) -> bool {
    let text = text.trim();
    let rest = text
        .strip_prefix(['-', '\u{2013}', '\u{2014}'])
        .unwrap_or(text);
    MULTI_SPEAKER_REGEX.is_match(rest)
}

// The following line opens a new turn, or there is none
fn next_is_new_turn(next: Option<&Item>) -> bool {
    next.map(|item| item.text.trim())
        .is_none_or(|text| text.is_empty() || text == MUSIC_NOTE || starts_turn(text))
}

/// Walks items and cuts them into groups
#[derive(Debug, Clone)]
pub struct SentenceGrouper {
    limits: GroupingLimits,
    rules: SentenceRules,
}

impl SentenceGrouper {
    pub fn new(limits: GroupingLimits) -> Self {
        Self { limits, rules: SentenceRules::default() }
    }

    pub fn with_rules(mut self, rules: SentenceRules) -> Self {
        self.rules = rules;
        self
    }

    fn meets_minimum(&self, draft: &Draft) -> bool {
        draft.char_count() >= self.limits.min_group_text_chars && draft.word_count() >= self.limits.min_group_words
    }

    fn would_overflow(&self, draft: &Draft, text: &str) -> bool {
        if text.is_empty() || !draft.has_text() {
            return false;
        }
        draft.line_count() + 1 > self.limits.max_group_lines
            || draft.char_count() + 1 + text.chars().count() > self.limits.max_group_chars
    }

    fn is_full(&self, draft: &Draft) -> bool {
        draft.line_count() >= self.limits.max_group_lines || draft.char_count() >= self.limits.max_group_chars
    }

    /// Partition items into groups
    pub fn group(&self, items: &[Item]) -> Vec<Group> {
        let mut drafts: Vec<Draft> = Vec::new();
        let mut current = Draft::new();

        for (i, item) in items.iter().enumerate() {
            let text = item.text.as_str();

            if text.is_empty() {
                current.items.push(item);
                continue;
            }

            if text == MUSIC_NOTE {
                flush(&mut current, &mut drafts);
                drafts.push(Draft { items: vec![item], kind: DraftKind::Music });
                continue;
            }

            if is_multi_speaker(text) {
                if next_is_new_turn(items.get(i + 1)) || self.rules.ends_sentence(text) {
                    flush(&mut current, &mut drafts);
                    drafts.push(Draft { items: vec![item], kind: DraftKind::Dialogue });
                    continue;
                }
            }

            if starts_turn(text) && current.has_text() && !current.last_text().is_some_and(starts_turn) {
                flush(&mut current, &mut drafts);
            }

            if self.would_overflow(&current, text) {
                flush(&mut current, &mut drafts);
            }

            if !current.has_text() && starts_turn(text) {
                current.kind = DraftKind::Turn;
            }
            current.items.push(item);

            let sentence_done = self.rules.ends_sentence(text) && self.meets_minimum(&current);
            if sentence_done || self.is_full(&current) {
                flush(&mut current, &mut drafts);
            }
        }
        flush(&mut current, &mut drafts);

        let drafts = self.merge_fragments(drafts);
        let groups = assign_ids(drafts);
        debug!("Grouped {} items into {} groups", items.len(), groups.len());
        groups
    }

    /// Fold groups below the minimums into the previous group when that keeps meaning and limits intact
    fn merge_fragments<'a>(&self, drafts: Vec<Draft<'a>>) -> Vec<Draft<'a>> {
        let mut merged: Vec<Draft<'a>> = Vec::with_capacity(drafts.len());

        for draft in drafts {
            let Some(prev) = merged.last_mut() else {
                merged.push(draft);
                continue;
            };

            // Lines without text ride along with whatever came before
            if !draft.has_text() {
                prev.items.extend(draft.items);
                continue;
            }
            if !prev.has_text() && prev.kind == DraftKind::Plain {
                let mut draft = draft;
                let mut items = std::mem::take(&mut prev.items);
                items.extend(draft.items);
                draft.items = items;
                *prev = draft;
                continue;
            }

            let mergeable = draft.kind == DraftKind::Plain
                && !draft.texts().any(is_multi_speaker)
                && prev.kind != DraftKind::Music
                && prev.kind != DraftKind::Dialogue
                && !self.meets_minimum(&draft)
                && !prev.last_text().is_some_and(|t| self.rules.ends_sentence(t))
                && prev.line_count() + draft.line_count() <= self.limits.max_group_lines
                && prev.char_count() + 1 + draft.char_count() <= self.limits.max_group_chars;

            if mergeable {
                prev.items.extend(draft.items);
            } else {
                merged.push(draft);
            }
        }

        merged
    }
}

fn flush<'a>(current: &mut Draft<'a>, drafts: &mut Vec<Draft<'a>>) {
    if !current.items.is_empty() {
        drafts.push(std::mem::replace(current, Draft::new()));
    }
}

fn assign_ids(drafts: Vec<Draft>) -> Vec<Group> {
    drafts
        .into_iter()
        .enumerate()
        .map(|(i, draft)| Group {
            group_id: i + 1,
            item_positions: draft.items.iter().map(|item| item.position).collect(),
            source_text: draft.texts().collect::<Vec<_>>().join(" "),
        })
        .collect()
}

/// One group per item, used when sentence grouping is disabled
pub fn one_to_one(items: &[Item]) -> Vec<Group> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| Group {
            group_id: i + 1,
            item_positions: vec![item.position],
            source_text: item.text.clone(),
        })
        .collect()
}
