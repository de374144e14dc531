/*!
 * Split-back reconstruction.
 *
 * Distributes one group's translated text over the item positions the group
 * covers. Cuts land on word starts nearest to the duration-weighted targets,
 * and fragments are plain slices of the text, so concatenating them in order
 * gives back the translated text verbatim.
 */

use log::debug;

use crate::errors::ReconstructionError;
use super::grouping::MUSIC_NOTE;

/// Fragments for each covered position, in position order
#[derive(Debug, Clone, PartialEq)]
pub struct SplitBack {
    pub fragments: Vec<String>,
    /// Set when the minimum chunk size forced a merge or some position got no text
    pub note: Option<ReconstructionError>,
}

// @returns: (byte offset, char offset) of every word start
fn word_starts(text: &str) -> Vec<(usize, usize)> {
    let mut starts = Vec::new();
    let mut previous_space = true;
    for (char_offset, (byte_offset, ch)) in text.char_indices().enumerate() {
        let space = ch.is_whitespace();
        if previous_space && !space {
            starts.push((byte_offset, char_offset));
        }
        previous_space = space;
    }
    starts
}

fn normalized_weights(weights: &[f64]) -> Vec<f64> {
    let clean: Vec<f64> = weights.iter().map(|w| if w.is_finite() { w.max(0.0) } else { 0.0 }).collect();
    let sum: f64 = clean.iter().sum();
    if sum <= 0.0 {
        return vec![1.0 / clean.len() as f64; clean.len()];
    }
    clean.iter().map(|w| w / sum).collect()
}

fn trimmed_len(fragment: &str) -> usize {
    fragment.trim().chars().count()
}

/// Split `text` over `weights.len()` positions.
///
/// `weights` are the items' duration shares. A position receives at least one
/// word whenever the text has enough words. If the text is shorter than
/// `min_chunk_chars` per position, undersized fragments are folded into their
/// richer neighbour and a note is returned.
pub fn split_group(group_id: usize, text: &str, weights: &[f64], min_chunk_chars: usize) -> SplitBack {
    let n = weights.len();
    if n == 0 {
        return SplitBack { fragments: Vec::new(), note: None };
    }
    if n == 1 {
        return SplitBack { fragments: vec![text.to_string()], note: None };
    }
    if text.trim() == MUSIC_NOTE {
        let mut fragments = vec![String::new(); n];
        fragments[0] = text.to_string();
        return SplitBack { fragments, note: None };
    }

    let starts = word_starts(text);
    let word_count = starts.len();
    let total_chars = text.chars().count();
    let weights = normalized_weights(weights);

    // cut j means "before word j"; j == word_count means the end of the text
    let char_at = |j: usize| if j < word_count { starts[j].1 } else { total_chars };
    let byte_at = |j: usize| if j < word_count { starts[j].0 } else { text.len() };

    let mut cuts = Vec::with_capacity(n - 1);
    let mut cumulative = 0.0;
    let mut previous = 0;
    for k in 1..n {
        cumulative += weights[k - 1];
        let target = total_chars as f64 * cumulative;
        let (low, high) = if word_count >= n {
            ((previous + 1).max(k), word_count - (n - k))
        } else {
            (previous.max(1).min(word_count), word_count)
        };
        let cut = (low..=high)
            .min_by(|a, b| {
                let da = (char_at(*a) as f64 - target).abs();
                let db = (char_at(*b) as f64 - target).abs();
                da.total_cmp(&db)
            })
            .unwrap_or(low);
        cuts.push(cut);
        previous = cut;
    }

    let mut fragments = Vec::with_capacity(n);
    let mut from = 0;
    for cut in cuts {
        let to = byte_at(cut);
        fragments.push(text[from..to].to_string());
        from = to;
    }
    fragments.push(text[from..].to_string());

    let text_chars = trimmed_len(text);
    let merged = if text_chars < n * min_chunk_chars {
        merge_small_fragments(&mut fragments, min_chunk_chars)
    } else {
        0
    };
    let empty = fragments.iter().filter(|f| trimmed_len(f) == 0).count();

    let note = if merged > 0 || (empty > 0 && text_chars > 0) {
        let detail = format!(
            "{} chars cannot fill {} positions at {} chars each; {} merged, {} left empty",
            text_chars, n, min_chunk_chars, merged, empty
        );
        debug!("Split-back of group {}: {}", group_id, detail);
        Some(ReconstructionError { group_id, detail })
    } else {
        None
    };

    SplitBack { fragments, note }
}

/// Fold fragments below the floor into their richer non-empty neighbour, smallest first
fn merge_small_fragments(fragments: &mut [String], min_chunk_chars: usize) -> usize {
    let mut merges = 0;
    loop {
        let non_empty: Vec<usize> = (0..fragments.len()).filter(|&i| trimmed_len(&fragments[i]) > 0).collect();
        if non_empty.len() < 2 {
            return merges;
        }
        let Some(&smallest) = non_empty
            .iter()
            .filter(|&&i| trimmed_len(&fragments[i]) < min_chunk_chars)
            .min_by_key(|&&i| trimmed_len(&fragments[i]))
        else {
            return merges;
        };

        let slot = non_empty.iter().position(|&i| i == smallest).unwrap_or(0);
        let left = slot.checked_sub(1).map(|s| non_empty[s]);
        let right = non_empty.get(slot + 1).copied();
        let target = match (left, right) {
            (Some(l), Some(r)) if trimmed_len(&fragments[r]) > trimmed_len(&fragments[l]) => r,
            (Some(l), _) => l,
            (None, Some(r)) => r,
            (None, None) => return merges,
        };

        // Only empty fragments lie between the two, so moving the boundary keeps the order
        let moved = std::mem::take(&mut fragments[smallest]);
        if target < smallest {
            fragments[target].push_str(&moved);
        } else {
            fragments[target].insert_str(0, &moved);
        }
        merges += 1;
    }
}
