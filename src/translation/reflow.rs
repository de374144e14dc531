/*!
 * Cue reflow.
 *
 * Re-wraps a cue's translated text into exactly as many lines as the source
 * cue had. Line count is the hard contract; the per-line character bound
 * gives way first when both cannot hold.
 */

use super::grouping::MUSIC_NOTE;

fn char_len(s: &str) -> usize {
    s.chars().count()
}

// Greedy word wrap at `width`; a word longer than the width gets a line of its own
fn greedy_wrap(words: &[&str], width: usize) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    for word in words {
        if !current.is_empty() && char_len(&current) + 1 + char_len(word) > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

// Split a multi-word line at the space closest to its middle
fn split_near_middle(line: &str) -> Option<(String, String)> {
    let middle = line.len() / 2;
    let cut = line
        .match_indices(' ')
        .map(|(i, _)| i)
        .min_by_key(|&i| i.abs_diff(middle))?;
    Some((line[..cut].to_string(), line[cut + 1..].to_string()))
}

/// Wrap `text` into exactly `n_lines` lines of at most `max_chars` where possible.
///
/// Picks the narrowest width that fits, which keeps lines balanced instead of
/// leaving a short ragged tail. When nothing fits, the last line takes the
/// overflow. Missing lines are made by splitting the longest line, then padded
/// with empty strings.
pub fn reflow_lines(text: &str, n_lines: usize, max_chars: usize) -> Vec<String> {
    if n_lines == 0 {
        return Vec::new();
    }
    let words: Vec<&str> = text.split_whitespace().collect();
    let joined = words.join(" ");
    if n_lines == 1 {
        return vec![joined];
    }
    if joined.is_empty() || joined == MUSIC_NOTE {
        let mut lines = vec![String::new(); n_lines];
        lines[0] = joined;
        return lines;
    }

    let max_chars = max_chars.max(1);
    let start_width = char_len(&joined).div_ceil(n_lines);
    let fitted = (start_width..=max_chars)
        .map(|width| greedy_wrap(&words, width))
        .find(|lines| lines.len() <= n_lines);

    let mut lines = match fitted {
        Some(lines) => lines,
        None => {
            let mut lines = greedy_wrap(&words, max_chars);
            if lines.len() > n_lines {
                let overflow = lines.split_off(n_lines - 1);
                lines.push(overflow.join(" "));
            }
            lines
        }
    };

    while lines.len() < n_lines {
        let longest = lines
            .iter()
            .enumerate()
            .filter(|(_, line)| line.contains(' '))
            .max_by_key(|(i, line)| (char_len(line), std::cmp::Reverse(*i)))
            .map(|(i, _)| i);
        let Some(index) = longest else {
            break;
        };
        let Some((head, tail)) = split_near_middle(&lines[index]) else {
            break;
        };
        lines[index] = head;
        lines.insert(index + 1, tail);
    }
    lines.resize(n_lines, String::new());
    lines
}
