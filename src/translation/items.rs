/*!
 * Item flattening.
 *
 * Every cue line becomes one positionally addressable item. Positions are
 * global, 1-based and strictly increasing across the file; each item keeps
 * the cue and line it came from so translated text can be put back later.
 */

use crate::subtitle_processor::Cue;

/// Smallest duration used for weighting, so zero-length cues still get a share
const MIN_CUE_SECONDS: f64 = 0.01;

/// One line of source text at a fixed position
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    /// Global ordinal, starting at 1
    pub position: usize,
    /// Index of the cue in the input sequence
    pub cue_index: usize,
    /// Index of the line within the cue
    pub line_index: usize,
    /// Line text with surrounding whitespace removed
    pub text: String,
    /// Character range of `text` within the cue's normalized text
    pub char_span: (usize, usize),
    /// Share of the cue duration, in seconds, attributed to this line
    pub duration_share: f64,
}

/// Flatten cues into items.
///
/// `duration_share` splits the cue duration between its lines in proportion
/// to their character length; lines of an empty cue share it equally.
pub fn flatten(cues: &[Cue]) -> Vec<Item> {
    let mut items = Vec::new();
    let mut position = 1;

    for (cue_index, cue) in cues.iter().enumerate() {
        let duration = (cue.duration_ms() as f64 / 1000.0).max(MIN_CUE_SECONDS);
        let texts: Vec<&str> = cue.lines.iter().map(|line| line.trim()).collect();
        let texts = if texts.is_empty() { vec![""] } else { texts };
        let cue_chars: usize = texts.iter().map(|t| t.chars().count()).sum();

        let mut offset = 0;
        for (line_index, text) in texts.iter().enumerate() {
            let len = text.chars().count();
            let weight = if cue_chars == 0 {
                1.0 / texts.len() as f64
            } else {
                len as f64 / cue_chars as f64
            };

            items.push(Item {
                position,
                cue_index,
                line_index,
                text: text.to_string(),
                char_span: (offset, offset + len),
                duration_share: duration * weight,
            });

            position += 1;
            // newline between lines
            offset += len + 1;
        }
    }

    items
}

/// Normalized text of a cue: trimmed lines joined by newlines
pub fn normalized_cue_text(cue: &Cue) -> String {
    cue.lines.iter().map(|line| line.trim()).collect::<Vec<_>>().join("\n")
}

/// Rebuild each cue's lines from item texts.
///
/// `texts` is indexed by position - 1; the result has one entry per cue, in
/// cue order, with lines in their original order.
pub fn restore_lines(cue_count: usize, items: &[Item], texts: &[String]) -> Vec<Vec<String>> {
    let mut restored: Vec<Vec<String>> = vec![Vec::new(); cue_count];
    for item in items {
        if let Some(lines) = restored.get_mut(item.cue_index) {
            let text = texts.get(item.position - 1).cloned().unwrap_or_default();
            if lines.len() <= item.line_index {
                lines.resize(item.line_index + 1, String::new());
            }
            lines[item.line_index] = text;
        }
    }
    restored
}

/// Items of each cue, as index ranges into the item slice
pub fn items_by_cue(cue_count: usize, items: &[Item]) -> Vec<std::ops::Range<usize>> {
    let mut ranges = vec![0..0; cue_count];
    let mut start = 0;
    while start < items.len() {
        let cue_index = items[start].cue_index;
        let mut end = start + 1;
        while end < items.len() && items[end].cue_index == cue_index {
            end += 1;
        }
        if let Some(range) = ranges.get_mut(cue_index) {
            *range = start..end;
        }
        start = end;
    }
    ranges
}
