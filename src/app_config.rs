use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use url::Url;

/// Application configuration module
/// This module handles the run configuration: loading, validating and saving.
/// A `Config` is built once per run and handed to every component by reference.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// Source language label or ISO code
    #[serde(default = "default_source_language")]
    pub source_language: String,

    /// Target language label or ISO code
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Completion endpoint settings
    #[serde(default)]
    pub endpoint: EndpointConfig,

    /// Sampling parameters sent with each completion
    #[serde(default)]
    pub sampling: SamplingConfig,

    /// Sentence grouping thresholds
    #[serde(default)]
    pub grouping: GroupingConfig,

    /// Split-back and reflow thresholds
    #[serde(default)]
    pub splitback: SplitBackConfig,

    /// Windowing parameters
    #[serde(default)]
    pub window: WindowConfig,

    /// Retry and shrink parameters
    #[serde(default)]
    pub retry: RetryConfig,

    /// Maximum number of windows in flight
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Chat wrapper used around the system and user messages
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChatTemplate {
    // @template: <start_of_turn> wrappers
    #[default]
    Gemma3,
    // @template: <|start_header_id|> wrappers
    Llama3,
    // @template: <|im_start|> wrappers
    Qwen3,
}

impl ChatTemplate {
    // @returns: Lowercase template identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::Gemma3 => "gemma3".to_string(),
            Self::Llama3 => "llama3".to_string(),
            Self::Qwen3 => "qwen3".to_string(),
        }
    }
}

impl std::fmt::Display for ChatTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

impl std::str::FromStr for ChatTemplate {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "gemma3" => Ok(Self::Gemma3),
            "llama3" => Ok(Self::Llama3),
            "qwen3" => Ok(Self::Qwen3),
            _ => Err(anyhow!("Invalid prompt template: {}", s)),
        }
    }
}

/// Completion endpoint configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct EndpointConfig {
    // @field: Full URL of the llama.cpp /completion endpoint
    #[serde(default = "default_completion_url")]
    pub url: String,

    // @field: Prompt wrapper
    #[serde(default)]
    pub template: ChatTemplate,

    // @field: Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    // @field: Transport-level retries for a single request
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    // @field: Base backoff, doubled on each transport retry
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            url: default_completion_url(),
            template: ChatTemplate::default(),
            timeout_secs: default_timeout_secs(),
            retry_count: default_retry_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

/// Sampling configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SamplingConfig {
    /// Maximum tokens to predict (n_predict)
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    #[serde(default = "default_repeat_penalty")]
    pub repeat_penalty: f32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            repeat_penalty: default_repeat_penalty(),
        }
    }
}

/// Sentence grouping thresholds
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GroupingConfig {
    /// When false every item becomes its own group
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_max_group_lines")]
    pub max_group_lines: usize,

    #[serde(default = "default_max_group_chars")]
    pub max_group_chars: usize,

    #[serde(default = "default_min_group_text_chars")]
    pub min_group_text_chars: usize,

    #[serde(default = "default_min_group_words")]
    pub min_group_words: usize,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_group_lines: default_max_group_lines(),
            max_group_chars: default_max_group_chars(),
            min_group_text_chars: default_min_group_text_chars(),
            min_group_words: default_min_group_words(),
        }
    }
}

/// Split-back and reflow thresholds
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SplitBackConfig {
    /// Soft per-line character bound used by reflow
    #[serde(default = "default_split_max_line_chars")]
    pub split_max_line_chars: usize,

    /// Smallest fragment worth keeping on its own position
    #[serde(default = "default_min_chunk_chars")]
    pub min_chunk_chars: usize,
}

impl Default for SplitBackConfig {
    fn default() -> Self {
        Self {
            split_max_line_chars: default_split_max_line_chars(),
            min_chunk_chars: default_min_chunk_chars(),
        }
    }
}

/// Windowing parameters
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WindowConfig {
    /// Budget for focus and context text of one request
    #[serde(default = "default_max_window_chars")]
    pub max_window_chars: usize,

    #[serde(default = "default_context_groups")]
    pub context_pre_groups: usize,

    #[serde(default = "default_context_groups")]
    pub context_post_groups: usize,

    /// Optional cap on focus groups per window; the character budget decides when unset
    #[serde(default)]
    pub max_focus_groups: Option<usize>,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            max_window_chars: default_max_window_chars(),
            context_pre_groups: default_context_groups(),
            context_post_groups: default_context_groups(),
            max_focus_groups: None,
        }
    }
}

/// Retry and shrink parameters
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RetryConfig {
    /// Attempts allowed at one focus size before shrinking
    #[serde(default = "default_max_retries_per_window")]
    pub max_retries_per_window: u32,

    #[serde(default = "default_true")]
    pub shrink_focus_on_retry: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries_per_window: default_max_retries_per_window(),
            shrink_focus_on_retry: true,
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_source_language() -> String {
    "English".to_string()
}

fn default_target_language() -> String {
    "Finnish".to_string()
}

fn default_completion_url() -> String {
    "http://127.0.0.1:8671/completion".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_retry_count() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    750 // doubled on each retry
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_temperature() -> f32 {
    0.1
}

fn default_top_p() -> f32 {
    0.9
}

fn default_repeat_penalty() -> f32 {
    1.0
}

fn default_true() -> bool {
    true
}

fn default_max_group_lines() -> usize {
    8
}

fn default_max_group_chars() -> usize {
    360
}

fn default_min_group_text_chars() -> usize {
    10
}

fn default_min_group_words() -> usize {
    2
}

fn default_split_max_line_chars() -> usize {
    42
}

fn default_min_chunk_chars() -> usize {
    10
}

fn default_max_window_chars() -> usize {
    2000
}

fn default_context_groups() -> usize {
    2
}

fn default_max_retries_per_window() -> u32 {
    2
}

fn default_concurrency() -> usize {
    1
}

/// Smallest window budget that still leaves room for a focus group next to the prompt overhead
pub const MIN_WINDOW_CHARS: usize = 200;

impl Config {
    /// Load a configuration file, writing a default one first when it does not exist
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<(Self, bool)> {
        let path = path.as_ref();
        if path.exists() {
            let file = File::open(path)
                .with_context(|| format!("Failed to open config file: {}", path.display()))?;
            let config: Config = serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            return Ok((config, false));
        }

        let config = Config::default();
        let config_json = serde_json::to_string_pretty(&config)
            .context("Failed to serialize default config to JSON")?;
        std::fs::write(path, config_json)
            .with_context(|| format!("Failed to write default config to file: {}", path.display()))?;
        Ok((config, true))
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        crate::language_utils::prompt_label(&self.source_language)
            .context("Invalid source language")?;
        crate::language_utils::prompt_label(&self.target_language)
            .context("Invalid target language")?;

        Url::parse(&self.endpoint.url)
            .with_context(|| format!("Invalid completion endpoint URL: {}", self.endpoint.url))?;
        if self.endpoint.timeout_secs == 0 {
            return Err(anyhow!("Request timeout must be at least one second"));
        }

        if self.sampling.max_tokens == 0 {
            return Err(anyhow!("max_tokens must be greater than zero"));
        }
        if !(0.0..=2.0).contains(&self.sampling.temperature) {
            return Err(anyhow!("temperature must be within 0.0..=2.0, got {}", self.sampling.temperature));
        }
        if !(self.sampling.top_p > 0.0 && self.sampling.top_p <= 1.0) {
            return Err(anyhow!("top_p must be within (0.0, 1.0], got {}", self.sampling.top_p));
        }

        if self.grouping.max_group_lines == 0 || self.grouping.max_group_chars == 0 {
            return Err(anyhow!("Group limits must be greater than zero"));
        }
        if self.splitback.split_max_line_chars == 0 {
            return Err(anyhow!("split_max_line_chars must be greater than zero"));
        }

        if self.window.max_window_chars <= MIN_WINDOW_CHARS {
            return Err(anyhow!(
                "max_window_chars must be greater than {}, got {}",
                MIN_WINDOW_CHARS,
                self.window.max_window_chars
            ));
        }
        if self.window.max_focus_groups == Some(0) {
            return Err(anyhow!("max_focus_groups must be at least 1 when set"));
        }

        if self.retry.max_retries_per_window == 0 {
            return Err(anyhow!("max_retries_per_window must be at least 1"));
        }
        if self.concurrency == 0 {
            return Err(anyhow!("concurrency must be at least 1"));
        }

        Ok(())
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            source_language: default_source_language(),
            target_language: default_target_language(),
            endpoint: EndpointConfig::default(),
            sampling: SamplingConfig::default(),
            grouping: GroupingConfig::default(),
            splitback: SplitBackConfig::default(),
            window: WindowConfig::default(),
            retry: RetryConfig::default(),
            concurrency: default_concurrency(),
            log_level: LogLevel::default(),
        }
    }
}
