use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::app_config::Config;
use crate::errors::AppError;
use crate::file_utils::{self, FileManager, SourceSubtitle, SubtitleNaming};
use crate::language_utils;
use crate::subtitle_processor::SubtitleCollection;
use crate::translation::{format_eta, ProgressUpdate, TranslationOutcome, TranslationService};

// @module: Application controller for subtitle processing

/// Name of the per-directory file collecting untranslated groups
pub const ISSUES_LOG_NAME: &str = "yasts.issues.log";

/// What happened to one input file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Output written; `failed_groups` kept their source text
    Written { output: PathBuf, failed_groups: Vec<usize> },
    /// Output already existed and `force` was not set
    Skipped { output: PathBuf },
}

/// Folder mode switches
#[derive(Debug, Clone)]
pub struct FolderOptions {
    pub naming: SubtitleNaming,
    /// Ignore hearing-impaired sources
    pub skip_hi: bool,
    /// Only translate subtitles that sit next to a video with the same prefix
    pub require_video: bool,
    pub video_extensions: Vec<String>,
    /// Translate at most this many files
    pub limit: Option<usize>,
    /// List the work without calling the endpoint
    pub dry_run: bool,
    pub force: bool,
}

impl Default for FolderOptions {
    fn default() -> Self {
        Self {
            naming: SubtitleNaming::default(),
            skip_hi: false,
            require_video: false,
            video_extensions: file_utils::parse_video_extensions(&["mkv,mp4,avi,mov,m4v,webm".to_string()]),
            limit: None,
            dry_run: false,
            force: false,
        }
    }
}

/// Counters for a folder run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderSummary {
    pub translated: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Files a dry run would have translated
    pub planned: Vec<PathBuf>,
}

/// Main application controller for subtitle translation
#[derive(Debug, Clone)]
pub struct Controller {
    // @field: App configuration
    config: Config,

    // @field: Engine shared by every file of the run
    service: TranslationService,
}

impl Controller {
    // @method: Create a controller talking to the configured endpoint
    pub fn with_config(config: Config) -> Result<Self> {
        let service = TranslationService::new(config.clone())?;
        Ok(Self { config, service })
    }

    /// Create a controller around an existing service, typically one with a mock provider
    pub fn with_service(service: TranslationService) -> Self {
        Self { config: service.config.clone(), service }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Probe the endpoint before starting a long run
    pub async fn test_connection(&self) -> Result<()> {
        self.service.test_connection().await
    }

    /// Output path used when `translate` gets no explicit output.
    ///
    /// `Movie.en.srt` becomes `Movie.fi.srt`; other names get the target tag appended.
    pub fn default_output_path(&self, input: &Path) -> PathBuf {
        let naming = SubtitleNaming {
            source_tag: language_utils::file_tag(&self.config.source_language),
            target_tag: language_utils::file_tag(&self.config.target_language),
            ai_tag: String::new(),
            ..SubtitleNaming::default()
        };
        if let Some(source) = naming.match_source(input) {
            return naming.output_path(&source);
        }
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "subtitles".to_string());
        input.with_file_name(format!("{}.{}.srt", stem, naming.target_tag))
    }

    /// Translate one SRT file into `output`
    pub async fn run_file(&self, input: &Path, output: &Path, force: bool) -> Result<FileOutcome> {
        if !input.is_file() {
            return Err(AppError::File(format!("Input file does not exist: {}", input.display())).into());
        }
        if output.exists() && !force {
            warn!("Skipping {}, output already exists (use -f to force overwrite)", output.display());
            return Ok(FileOutcome::Skipped { output: output.to_path_buf() });
        }

        let start_time = Instant::now();
        let subtitles = SubtitleCollection::from_srt_file(input)?;
        info!(
            "Translating {} ({} cues) from {} to {}",
            input.display(),
            subtitles.cues.len(),
            self.config.source_language,
            self.config.target_language
        );
        debug!("Endpoint: {} at {}", self.service.provider_name(), self.config.endpoint.url);

        let progress_bar = Self::progress_bar();
        let outcome = self
            .service
            .translate_cues(&subtitles.cues, |update: &ProgressUpdate| {
                progress_bar.set_length(update.groups_total as u64);
                progress_bar.set_position(update.groups_done as u64);
                let tps = update.tokens_per_second.map_or("?".to_string(), |tps| format!("{:.1}", tps));
                progress_bar.set_message(format!("{} tok/s ETA {}", tps, update.eta_label()));
            })
            .await
            .with_context(|| format!("Translation failed for {}", input.display()))?;
        progress_bar.finish_and_clear();

        let translated = SubtitleCollection::new(output.to_path_buf(), outcome.cues.clone());
        translated
            .write_to_srt(output)
            .with_context(|| format!("Failed to write translated subtitles: {}", output.display()))?;

        self.report(input, output, &outcome);
        info!("Success: {} ({})", output.display(), format_eta(start_time.elapsed()));

        Ok(FileOutcome::Written { output: output.to_path_buf(), failed_groups: outcome.failed_groups })
    }

    fn progress_bar() -> ProgressBar {
        let progress_bar = ProgressBar::new(0);
        let template_result = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} groups ({percent}%) {msg}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(template_result.progress_chars("█▓▒░"));
        progress_bar
    }

    // Summary to the log, untranslated groups to the issues file next to the output
    fn report(&self, input: &Path, output: &Path, outcome: &TranslationOutcome) {
        info!(
            "{} groups in {} windows, {} untranslated",
            outcome.group_count,
            outcome.window_count,
            outcome.failed_groups.len()
        );
        info!("{}", outcome.stats.summary());
        for note in &outcome.notes {
            debug!("Split-back note: {}", note);
        }

        if outcome.is_complete() {
            return;
        }

        let mut content = format!(
            "Input: {}\nOutput: {}\nUntranslated groups (source text kept): {:?}\n",
            input.display(),
            output.display(),
            outcome.failed_groups
        );
        for failure in &outcome.failures {
            content.push_str(&format!("  {}\n", failure));
        }
        content.push_str("Re-running with a smaller max_window_chars may help.");

        let log_path = output.parent().unwrap_or_else(|| Path::new(".")).join(ISSUES_LOG_NAME);
        match FileManager::append_to_log_file(&log_path, &content) {
            Ok(()) => warn!("Untranslated groups listed in {}", log_path.display()),
            Err(e) => warn!("Failed to write issues log: {}", e),
        }
    }

    /// Translate every source subtitle under `root`.
    ///
    /// A file that fails is logged and counted; the folder run carries on.
    pub async fn run_folder(&self, root: &Path, options: &FolderOptions) -> Result<FolderSummary> {
        if !root.is_dir() {
            return Err(anyhow!("Input directory does not exist: {}", root.display()));
        }

        let start_time = Instant::now();
        let mut summary = FolderSummary::default();
        let candidates = self.find_sources(root, options)?;
        info!("Found {} source subtitle(s) under {}", candidates.len(), root.display());

        let folder_pb = Self::progress_bar();
        folder_pb.set_length(candidates.len() as u64);

        for source in candidates {
            folder_pb.inc(1);
            let dir = source.path.parent().unwrap_or(root);

            if !options.force {
                if let Some(existing) = options.naming.existing_target(dir, &source.prefix) {
                    debug!("Skipping {}, found {}", source.path.display(), existing.display());
                    summary.skipped += 1;
                    continue;
                }
            }

            let output = options.naming.output_path(&source);
            if !options.force && output.exists() {
                debug!("Skipping {}, {} already exists", source.path.display(), output.display());
                summary.skipped += 1;
                continue;
            }

            if options.limit.is_some_and(|limit| summary.translated + summary.planned.len() >= limit) {
                debug!("Limit reached, leaving {} for a later run", source.path.display());
                summary.skipped += 1;
                continue;
            }

            if options.dry_run {
                info!("Would translate {} -> {}", source.path.display(), output.display());
                summary.planned.push(source.path.clone());
                continue;
            }

            folder_pb.set_message(source.prefix.clone());
            match self.run_file(&source.path, &output, options.force).await {
                Ok(FileOutcome::Written { .. }) => summary.translated += 1,
                Ok(FileOutcome::Skipped { .. }) => summary.skipped += 1,
                Err(e) => {
                    error!("Error processing {}: {:#}", source.path.display(), e);
                    summary.failed += 1;
                }
            }
        }
        folder_pb.finish_and_clear();

        info!(
            "Folder processing completed: {} translated, {} skipped, {} errors, {} planned ({})",
            summary.translated,
            summary.skipped,
            summary.failed,
            summary.planned.len(),
            format_eta(start_time.elapsed())
        );
        Ok(summary)
    }

    // Candidate sources in stable order; HI variants are dropped when a plain one exists for the prefix
    fn find_sources(&self, root: &Path, options: &FolderOptions) -> Result<Vec<SourceSubtitle>> {
        let mut sources: Vec<SourceSubtitle> = FileManager::find_files(root, "srt")?
            .iter()
            .filter_map(|path| options.naming.match_source(path))
            .filter(|source| !(options.skip_hi && source.is_hi))
            .collect();

        let plain: Vec<(PathBuf, String)> = sources
            .iter()
            .filter(|s| !s.is_hi)
            .map(|s| (s.path.parent().map(Path::to_path_buf).unwrap_or_default(), s.prefix.clone()))
            .collect();
        sources.retain(|s| {
            !s.is_hi || !plain.contains(&(s.path.parent().map(Path::to_path_buf).unwrap_or_default(), s.prefix.clone()))
        });

        if options.require_video {
            sources.retain(|s| {
                let dir = s.path.parent().unwrap_or(root);
                let found = file_utils::has_matching_video(dir, &s.prefix, &options.video_extensions);
                if !found {
                    debug!("No video next to {}", s.path.display());
                }
                found
            });
        }

        Ok(sources)
    }
}
