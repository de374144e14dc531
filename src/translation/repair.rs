/*!
 * Response repair.
 *
 * Model output is parsed as JSON first. Only when that fails are the named
 * repair rules applied, in order, re-trying the parse after each rule that
 * changed the text. Every rule leaves well-formed JSON untouched, so repair is
 * a no-op on valid payloads. New failure patterns get a new rule rather than a
 * looser parser.
 */

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::fmt;

use crate::errors::AttemptError;

// @const: Opening of a "line" string value
static LINE_VALUE_START_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r#""line"\s*:\s*""#).unwrap());

// @const: A complete fenced block
static FENCED_BLOCK_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\n?(.*?)```").unwrap());

/// Known repairable failure patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepairRule {
    /// Byte-order mark and markdown code fences around the payload
    StripWrappers,
    /// `// ...` comment lines
    StripLineComments,
    /// Prose before or after the first JSON value
    ExtractFirstValue,
    /// Literal `"` inside a `"line"` value
    EscapeLineQuotes,
    /// Missing closing brackets at the end of truncated output
    BalanceDelimiters,
}

impl RepairRule {
    /// All rules in application order
    pub const ALL: [RepairRule; 5] = [
        RepairRule::StripWrappers,
        RepairRule::StripLineComments,
        RepairRule::ExtractFirstValue,
        RepairRule::EscapeLineQuotes,
        RepairRule::BalanceDelimiters,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::StripWrappers => "strip-wrappers",
            Self::StripLineComments => "strip-line-comments",
            Self::ExtractFirstValue => "extract-first-value",
            Self::EscapeLineQuotes => "escape-line-quotes",
            Self::BalanceDelimiters => "balance-delimiters",
        }
    }

    /// Apply the rule, returning the new text only if it changed
    pub fn apply(&self, text: &str) -> Option<String> {
        let repaired = match self {
            Self::StripWrappers => strip_wrappers(text),
            Self::StripLineComments => strip_line_comments(text),
            Self::ExtractFirstValue => extract_first_value(text)?,
            Self::EscapeLineQuotes => escape_line_quotes(text),
            Self::BalanceDelimiters => balance_delimiters(text)?,
        };
        (repaired != text).then_some(repaired)
    }
}

impl fmt::Display for RepairRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parsed payload and the rules that were needed to get it
#[derive(Debug, Clone, PartialEq)]
pub struct Repaired {
    pub value: Value,
    pub applied: Vec<RepairRule>,
}

/// Parse model output, repairing known failure patterns when needed
pub fn parse_with_repair(raw: &str) -> Result<Repaired, AttemptError> {
    let first_error = match serde_json::from_str::<Value>(raw.trim()) {
        Ok(value) => return Ok(Repaired { value, applied: Vec::new() }),
        Err(e) => e,
    };

    let mut text = raw.to_string();
    let mut applied = Vec::new();
    for rule in RepairRule::ALL {
        let Some(repaired) = rule.apply(&text) else {
            continue;
        };
        applied.push(rule);
        text = repaired;
        if let Ok(value) = serde_json::from_str::<Value>(text.trim()) {
            debug!(
                "Repaired model output with {}",
                applied.iter().map(|r| r.name()).collect::<Vec<_>>().join(", ")
            );
            return Ok(Repaired { value, applied });
        }
    }

    Err(AttemptError::ParseError(format!(
        "{} (after trying {} repair rule(s))",
        first_error,
        applied.len()
    )))
}

fn strip_wrappers(text: &str) -> String {
    let trimmed = text.trim_start_matches('\u{feff}').trim();
    if let Some(caps) = FENCED_BLOCK_REGEX.captures(trimmed) {
        if let Some(inner) = caps.get(1) {
            return inner.as_str().trim().to_string();
        }
    }
    // An opening fence without a closing one: truncated output
    if let Some(rest) = trimmed.strip_prefix("```") {
        let body = rest.split_once('\n').map_or("", |(_, body)| body);
        return body.trim().to_string();
    }
    trimmed.to_string()
}

fn strip_line_comments(text: &str) -> String {
    if !text.lines().any(|line| line.trim_start().starts_with("//")) {
        return text.to_string();
    }
    text.lines()
        .filter(|line| !line.trim_start().starts_with("//"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// First `{...}` or `[...]` by bracket matching; from the opener to the end when it never closes
fn extract_first_value(text: &str) -> Option<String> {
    let start = text.find(['{', '['])?;
    let bytes = text.as_bytes();
    let (open, close) = if bytes[start] == b'{' { (b'{', b'}') } else { (b'[', b']') };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        if b == b'"' {
            in_string = true;
        } else if b == open {
            depth += 1;
        } else if b == close {
            depth -= 1;
            if depth == 0 {
                return Some(text[start..start + offset + 1].to_string());
            }
        }
    }
    Some(text[start..].to_string())
}

/// Escape quotes inside `"line"` values that are not followed by `,` `}` `]` or the end
fn escape_line_quotes(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut pos = 0;

    while let Some(m) = LINE_VALUE_START_REGEX.find_at(text, pos) {
        out.push_str(&text[pos..m.end()]);
        let mut chars = text[m.end()..].char_indices();
        let mut consumed = text.len() - m.end();

        while let Some((offset, ch)) = chars.next() {
            match ch {
                '\\' => {
                    out.push(ch);
                    if let Some((_, next)) = chars.next() {
                        out.push(next);
                    }
                }
                '"' => {
                    let rest = &text[m.end() + offset + 1..];
                    let terminates = rest
                        .trim_start()
                        .chars()
                        .next()
                        .is_none_or(|next| matches!(next, ',' | '}' | ']'));
                    if terminates {
                        out.push('"');
                        consumed = offset + 1;
                        break;
                    }
                    out.push_str("\\\"");
                }
                _ => out.push(ch),
            }
        }
        pos = m.end() + consumed;
    }

    out.push_str(&text[pos..]);
    out
}

/// Append missing closers; gives up when the text ends inside a string or closers mismatch
fn balance_delimiters(text: &str) -> Option<String> {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for ch in text.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.pop() != Some(ch) {
                    return None;
                }
            }
            _ => {}
        }
    }

    if in_string || stack.is_empty() {
        return None;
    }

    let mut balanced = text.trim_end().trim_end_matches(',').to_string();
    balanced.extend(stack.iter().rev());
    Some(balanced)
}
