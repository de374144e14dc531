/*!
 * Sentence boundary heuristic.
 *
 * Decides whether a subtitle line closes a sentence. The rules are data so
 * they can be tuned per language; the defaults target English sources.
 */

use once_cell::sync::Lazy;

/// Characters that may follow terminal punctuation, e.g. `"Stop!"` or `(sighs.)`
const CLOSERS: &[char] = &['"', '\'', '\u{201d}', '\u{2019}', ')', ']', '\u{bb}', '*'];

/// Characters that may precede the last word, e.g. `"Dr.` or `(Mr.`
const OPENERS: &[char] = &['"', '\'', '\u{201c}', '\u{2018}', '(', '[', '\u{ab}', '-', '\u{bf}', '\u{a1}'];

static DEFAULT_RULES: Lazy<SentenceRules> = Lazy::new(SentenceRules::default);

/// Tunable sentence-end rules
#[derive(Debug, Clone, PartialEq)]
pub struct SentenceRules {
    /// Lowercase words, without the final period, that never end a sentence
    pub abbreviations: Vec<String>,
    /// A trailing ellipsis marks an unfinished thought
    pub ellipsis_continues: bool,
    /// A single capital letter followed by a period is an initial
    pub initials_continue: bool,
}

impl Default for SentenceRules {
    fn default() -> Self {
        let abbreviations = [
            "mr", "mrs", "ms", "dr", "st", "jr", "sr", "prof", "vs", "mt", "sgt", "lt", "capt", "col", "gen",
            "e.g", "i.e",
        ];
        Self {
            abbreviations: abbreviations.iter().map(|a| a.to_string()).collect(),
            ellipsis_continues: true,
            initials_continue: true,
        }
    }
}

impl SentenceRules {
    /// Whether `text` ends a sentence
    pub fn ends_sentence(&self, text: &str) -> bool {
        let core = text.trim_end().trim_end_matches(CLOSERS);
        if core.is_empty() {
            return false;
        }

        if core.ends_with('\u{2026}') || core.ends_with("...") {
            return !self.ellipsis_continues;
        }

        match core.chars().last() {
            Some('!') | Some('?') => true,
            Some('.') => {
                let last_word = core
                    .rsplit(char::is_whitespace)
                    .next()
                    .unwrap_or(core)
                    .trim_start_matches(OPENERS);
                let stem = last_word.trim_end_matches('.').to_lowercase();

                if self.abbreviations.iter().any(|abbr| *abbr == stem) {
                    return false;
                }
                if self.initials_continue {
                    let mut chars = last_word.trim_end_matches('.').chars();
                    if let (Some(c), None) = (chars.next(), chars.next()) {
                        // "Neither did I." still ends
                        if c.is_uppercase() && c != 'I' {
                            return false;
                        }
                    }
                }
                true
            }
            _ => false,
        }
    }
}

/// Sentence-end check with the default rules
pub fn ends_sentence(text: &str) -> bool {
    DEFAULT_RULES.ends_sentence(text)
}
