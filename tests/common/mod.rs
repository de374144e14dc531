/*!
 * Common test utilities for the yasts test suite
 */

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use yasts::app_config::Config;
use yasts::providers::Provider;
use yasts::subtitle_processor::Cue;
use yasts::translation::TranslationService;

/// Two cues carrying one sentence, the smallest realistic input
pub const TWO_CUE_SRT: &str = "1
00:00:01,000 --> 00:00:03,000
I told you that we
should never come back.

2
00:00:03,500 --> 00:00:05,000
Now look where
we ended up tonight.
";

/// Route engine logs to the test output, set RUST_LOG to see them
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    if let Some(parent) = file_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Creates a sample subtitle file for testing
pub fn create_test_subtitle(dir: &Path, filename: &str) -> Result<PathBuf> {
    create_test_file(dir, filename, TWO_CUE_SRT)
}

/// Cue `index` (1-based), two seconds apart
pub fn cue(index: usize, lines: &[&str]) -> Cue {
    let start = index as u64 * 2000;
    Cue::new(index, start, start + 1800, lines.iter().map(|s| s.to_string()).collect())
}

/// Configuration with sentence grouping off and no transport retries
pub fn one_group_per_line_config() -> Config {
    let mut config = Config::default();
    config.grouping.enabled = false;
    config.endpoint.retry_count = 0;
    config
}

pub fn service_with<P: Provider + 'static>(config: Config, provider: P) -> TranslationService {
    TranslationService::with_provider(config, Arc::new(provider))
}

/// Seeded generator so failures reproduce
pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

const WORDS: &[&str] = &[
    "I", "told", "you", "we", "should", "never", "come", "back", "Mr.", "Smith", "said",
    "so...", "well", "\"really?\"", "yes.", "no!", "3.5", "percent", "tänne", "takaisin,",
];

/// Random subtitle line of 1..=max_words words
pub fn random_line(rng: &mut StdRng, max_words: usize) -> String {
    let count = rng.random_range(1..=max_words.max(1));
    (0..count)
        .map(|_| WORDS[rng.random_range(0..WORDS.len())])
        .collect::<Vec<_>>()
        .join(" ")
}

/// Random cues with 1..=3 lines; some lines empty, some dialogue or music
pub fn random_cues(rng: &mut StdRng, count: usize) -> Vec<Cue> {
    (1..=count)
        .map(|index| {
            let line_count = rng.random_range(1..=3);
            let lines: Vec<String> = (0..line_count)
                .map(|_| match rng.random_range(0..10) {
                    0 => String::new(),
                    1 => "\u{266a}".to_string(),
                    2 => format!("- {}", random_line(rng, 4)),
                    _ => random_line(rng, 8),
                })
                .collect();
            let start = index as u64 * 1500;
            let length = rng.random_range(0..3000);
            Cue::new(index, start, start + length, lines)
        })
        .collect()
}
