// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{anyhow, Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use log::{info, warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;
use std::path::{Path, PathBuf};

use yasts::app_config::{self, ChatTemplate, Config};
use yasts::app_controller::{Controller, FileOutcome, FolderOptions};
use yasts::file_utils::{self, SubtitleNaming};
use yasts::language_utils;

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

/// CLI Wrapper for ChatTemplate to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliTemplate {
    Gemma3,
    Llama3,
    Qwen3,
}

impl From<CliTemplate> for ChatTemplate {
    fn from(cli_template: CliTemplate) -> Self {
        match cli_template {
            CliTemplate::Gemma3 => ChatTemplate::Gemma3,
            CliTemplate::Llama3 => ChatTemplate::Llama3,
            CliTemplate::Qwen3 => ChatTemplate::Qwen3,
        }
    }
}

/// yasts - Yet Another Subtitle Translator with Sentences
///
/// Translates SRT subtitles sentence by sentence with a local llama.cpp server,
/// keeping every cue's timing and line count.
#[derive(Parser, Debug)]
#[command(name = "yasts")]
#[command(version)]
#[command(about = "Sentence-aware subtitle translation with a local LLM")]
#[command(long_about = "yasts groups subtitle lines into sentences, translates them with a llama.cpp
/completion endpoint and puts the translation back into the original cues.

EXAMPLES:
    yasts translate movie.en.srt                    # Writes movie.fi.srt with conf.json settings
    yasts translate -t German in.srt out.srt        # Explicit target language and output
    yasts translate --max-window-chars 1200 in.srt  # Smaller requests for a small model
    yasts folder /movies --skip-hi --dry-run        # List what folder mode would translate
    yasts completions bash > yasts.bash             # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default one
    will be created automatically. Command line flags override the file.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate one SRT file
    Translate(TranslateArgs),

    /// Translate every source subtitle under a directory
    Folder(FolderArgs),

    /// Generate shell completions for yasts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Settings shared by `translate` and `folder`, each overriding conf.json
#[derive(Args, Debug, Clone, Default)]
struct EngineArgs {
    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,

    /// Source language name or code (e.g. 'English', 'en')
    #[arg(short, long)]
    source_language: Option<String>,

    /// Target language name or code (e.g. 'Finnish', 'fi')
    #[arg(short, long)]
    target_language: Option<String>,

    /// llama.cpp /completion URL
    #[arg(long)]
    url: Option<String>,

    /// Chat template wrapped around the prompt
    #[arg(long, value_enum)]
    template: Option<CliTemplate>,

    /// Maximum tokens to predict per request
    #[arg(long)]
    n_predict: Option<u32>,

    #[arg(long)]
    temperature: Option<f32>,

    #[arg(long)]
    top_p: Option<f32>,

    #[arg(long)]
    repeat_penalty: Option<f32>,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Send every subtitle line as its own group
    #[arg(long)]
    no_phrase_grouping: bool,

    #[arg(long)]
    max_group_lines: Option<usize>,

    #[arg(long)]
    max_group_chars: Option<usize>,

    #[arg(long)]
    min_group_text_chars: Option<usize>,

    #[arg(long)]
    min_group_words: Option<usize>,

    /// Soft line length used when reflowing translated cues
    #[arg(long)]
    split_max_line_chars: Option<usize>,

    #[arg(long)]
    min_chunk_chars: Option<usize>,

    /// Character budget for one request's focus and context text
    #[arg(long)]
    max_window_chars: Option<usize>,

    #[arg(long)]
    context_pre: Option<usize>,

    #[arg(long)]
    context_post: Option<usize>,

    /// Cap on focus groups per window
    #[arg(long)]
    max_focus_groups: Option<usize>,

    /// Attempts per focus size before shrinking
    #[arg(long)]
    max_retries: Option<u32>,

    /// Give up on a window instead of halving its focus
    #[arg(long)]
    no_shrink: bool,

    /// Windows in flight at once
    #[arg(long)]
    concurrency: Option<usize>,
}

impl EngineArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(level) = &self.log_level {
            config.log_level = level.clone().into();
        }
        if let Some(source) = &self.source_language {
            config.source_language = source.clone();
        }
        if let Some(target) = &self.target_language {
            config.target_language = target.clone();
        }
        if let Some(url) = &self.url {
            config.endpoint.url = url.clone();
        }
        if let Some(template) = &self.template {
            config.endpoint.template = template.clone().into();
        }
        if let Some(timeout) = self.timeout {
            config.endpoint.timeout_secs = timeout;
        }
        if let Some(n) = self.n_predict {
            config.sampling.max_tokens = n;
        }
        if let Some(t) = self.temperature {
            config.sampling.temperature = t;
        }
        if let Some(p) = self.top_p {
            config.sampling.top_p = p;
        }
        if let Some(r) = self.repeat_penalty {
            config.sampling.repeat_penalty = r;
        }
        if self.no_phrase_grouping {
            config.grouping.enabled = false;
        }
        if let Some(v) = self.max_group_lines {
            config.grouping.max_group_lines = v;
        }
        if let Some(v) = self.max_group_chars {
            config.grouping.max_group_chars = v;
        }
        if let Some(v) = self.min_group_text_chars {
            config.grouping.min_group_text_chars = v;
        }
        if let Some(v) = self.min_group_words {
            config.grouping.min_group_words = v;
        }
        if let Some(v) = self.split_max_line_chars {
            config.splitback.split_max_line_chars = v;
        }
        if let Some(v) = self.min_chunk_chars {
            config.splitback.min_chunk_chars = v;
        }
        if let Some(v) = self.max_window_chars {
            config.window.max_window_chars = v;
        }
        if let Some(v) = self.context_pre {
            config.window.context_pre_groups = v;
        }
        if let Some(v) = self.context_post {
            config.window.context_post_groups = v;
        }
        if self.max_focus_groups.is_some() {
            config.window.max_focus_groups = self.max_focus_groups;
        }
        if let Some(v) = self.max_retries {
            config.retry.max_retries_per_window = v;
        }
        if self.no_shrink {
            config.retry.shrink_focus_on_retry = false;
        }
        if let Some(v) = self.concurrency {
            config.concurrency = v;
        }
    }
}

#[derive(Args, Debug)]
struct TranslateArgs {
    /// Input SRT file
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output SRT file, derived from the input name when omitted
    #[arg(value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// Force overwrite of an existing output file
    #[arg(short, long)]
    force_overwrite: bool,

    #[command(flatten)]
    engine: EngineArgs,
}

#[derive(Args, Debug)]
struct FolderArgs {
    /// Directory searched recursively for source subtitles
    #[arg(value_name = "DIR")]
    dir: PathBuf,

    /// Ignore hearing-impaired sources
    #[arg(long)]
    skip_hi: bool,

    /// Only translate subtitles that have a video with the same prefix
    #[arg(long)]
    require_video: bool,

    /// Video extensions for --require-video, repeatable or comma separated
    #[arg(long, default_value = "mkv,mp4,avi,mov,m4v,webm")]
    video_ext: Vec<String>,

    /// Translate at most this many files
    #[arg(long)]
    limit: Option<usize>,

    /// List what would be translated without calling the endpoint
    #[arg(long)]
    dry_run: bool,

    /// Translate even when a target subtitle already exists
    #[arg(short, long)]
    force_overwrite: bool,

    /// Source language tag in file names, from the source language when omitted
    #[arg(long)]
    src_tag: Option<String>,

    /// Target language tag in file names, from the target language when omitted
    #[arg(long)]
    tgt_tag: Option<String>,

    /// Hearing-impaired tag in file names
    #[arg(long, default_value = "hi")]
    hi_tag: String,

    /// Marker added to generated file names, empty to disable
    #[arg(long, default_value = "ai")]
    ai_tag: String,

    #[command(flatten)]
    engine: EngineArgs,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger::new(level)))?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Emoji and ANSI color for a level
    fn decoration(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("❌", "1;31"),
            Level::Warn => ("🚧", "1;33"),
            Level::Info => ("  ", "1;32"),
            Level::Debug => ("🔍", "1;36"),
            Level::Trace => ("📋", "1;35"),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let now = chrono::Local::now().format("%H:%M:%S.%3f");
        let (emoji, color) = Self::decoration(record.level());
        let _ = writeln!(std::io::stderr(), "\x1B[{}m{} {} {}\x1B[0m", color, now, emoji, record.args());
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Most verbose level here; the configured level is applied with set_max_level later
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();
    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "yasts", &mut std::io::stdout());
            Ok(())
        }
        Commands::Translate(args) => run_translate(args).await,
        Commands::Folder(args) => run_folder(args).await,
    }
}

/// Load conf.json (creating it when missing), apply flags and validate
fn load_config(engine: &EngineArgs) -> Result<Config> {
    let (mut config, created) = Config::load_or_create(&engine.config_path)?;
    if created {
        warn!("Config file not found at '{}', created a default one", engine.config_path);
    }
    engine.apply(&mut config);
    config.validate().context("Configuration validation failed")?;
    log::set_max_level(config.log_level.to_level_filter());

    info!(
        "{} -> {} | {} ({}) | window {} chars, context {}/{} | concurrency {}",
        config.source_language,
        config.target_language,
        config.endpoint.url,
        config.endpoint.template,
        config.window.max_window_chars,
        config.window.context_pre_groups,
        config.window.context_post_groups,
        config.concurrency
    );
    Ok(config)
}

async fn run_translate(args: TranslateArgs) -> Result<()> {
    let config = load_config(&args.engine)?;
    let controller = Controller::with_config(config)?;
    let output = args.output.clone().unwrap_or_else(|| controller.default_output_path(&args.input));

    if output.exists() && !args.force_overwrite {
        warn!("Output file already exists: {}. Use -f to force overwrite.", output.display());
        return Ok(());
    }
    controller.test_connection().await?;

    match controller.run_file(&args.input, &output, args.force_overwrite).await? {
        FileOutcome::Written { failed_groups, .. } if !failed_groups.is_empty() => {
            warn!("{} group(s) kept their source text: {:?}", failed_groups.len(), failed_groups);
        }
        _ => {}
    }
    Ok(())
}

async fn run_folder(args: FolderArgs) -> Result<()> {
    let config = load_config(&args.engine)?;
    if !args.dir.is_dir() {
        return Err(anyhow!("Input directory does not exist: {}", args.dir.display()));
    }

    let naming = SubtitleNaming {
        source_tag: tag_or_language(args.src_tag.as_deref(), &config.source_language),
        target_tag: tag_or_language(args.tgt_tag.as_deref(), &config.target_language),
        hi_tag: args.hi_tag.clone(),
        ai_tag: args.ai_tag.clone(),
    };
    let options = FolderOptions {
        naming,
        skip_hi: args.skip_hi,
        require_video: args.require_video,
        video_extensions: file_utils::parse_video_extensions(&args.video_ext),
        limit: args.limit,
        dry_run: args.dry_run,
        force: args.force_overwrite,
    };

    let controller = Controller::with_config(config)?;
    if !options.dry_run {
        controller.test_connection().await?;
    }
    let summary = controller.run_folder(Path::new(&args.dir), &options).await?;
    if summary.failed > 0 {
        warn!("{} file(s) failed, see the log above", summary.failed);
    }
    Ok(())
}

fn tag_or_language(tag: Option<&str>, language: &str) -> String {
    tag.map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| language_utils::file_tag(language))
}
