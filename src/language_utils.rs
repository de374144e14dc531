use anyhow::{anyhow, Result};
use isolang::Language;

/// Language utilities for prompt labels
///
/// The prompt names languages in plain English ("Finnish"), while users and
/// file names often carry ISO 639-1 or ISO 639-2 codes ("fi", "fin", "fre").
/// These helpers turn either form into the label the model sees.

/// Map an ISO 639-2/B code to its ISO 639-2/T equivalent
fn part2b_to_part2t(code: &str) -> Option<&'static str> {
    match code {
        "fre" => Some("fra"),
        "ger" => Some("deu"),
        "dut" => Some("nld"),
        "gre" => Some("ell"),
        "chi" => Some("zho"),
        "cze" => Some("ces"),
        "ice" => Some("isl"),
        "alb" => Some("sqi"),
        "arm" => Some("hye"),
        "baq" => Some("eus"),
        "bur" => Some("mya"),
        "per" => Some("fas"),
        "geo" => Some("kat"),
        "may" => Some("msa"),
        "mac" => Some("mkd"),
        "rum" => Some("ron"),
        "slo" => Some("slk"),
        "wel" => Some("cym"),
        _ => None,
    }
}

/// Resolve an ISO 639-1 or ISO 639-2 code to a language
pub fn language_from_code(code: &str) -> Option<Language> {
    let normalized_code = code.trim().to_lowercase();
    match normalized_code.len() {
        2 => Language::from_639_1(&normalized_code),
        3 => {
            let part2t = part2b_to_part2t(&normalized_code).unwrap_or(&normalized_code);
            Language::from_639_3(part2t)
        }
        _ => None,
    }
}

/// Get the English language name from a code
pub fn get_language_name(code: &str) -> Result<String> {
    language_from_code(code)
        .map(|lang| lang.to_name().to_string())
        .ok_or_else(|| anyhow!("Invalid language code: {}", code))
}

/// Label used in the prompt for a configured language.
///
/// Codes are expanded to English names; anything else is taken as a name already.
pub fn prompt_label(language: &str) -> Result<String> {
    let trimmed = language.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("Language label cannot be empty"));
    }
    if trimmed.len() <= 3 && trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
        if let Ok(name) = get_language_name(trimmed) {
            return Ok(name);
        }
    }
    Ok(trimmed.to_string())
}

/// Short file name tag for a language: "Finnish", "fin" and "fi" all give "fi".
///
/// Labels isolang does not know are lowercased as they are.
pub fn file_tag(language: &str) -> String {
    let trimmed = language.trim();
    language_from_code(trimmed)
        .or_else(|| Language::from_name(trimmed))
        .and_then(|lang| lang.to_639_1())
        .map(str::to_string)
        .unwrap_or_else(|| trimmed.to_lowercase())
}
