use anyhow::{Context, Result};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::SubtitleError;
use crate::file_utils::FileManager;

// @module: SRT reading and writing

// @const: SRT timing line, cue settings after the end time are tolerated
static TIMESTAMP_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d{1,2}):(\d{2}):(\d{2})[,.](\d{1,3})\s*-->\s*(\d{1,2}):(\d{2}):(\d{2})[,.](\d{1,3})")
        .unwrap()
});

// @const: Blank line separating cue blocks
static BLOCK_SEPARATOR_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*\n").unwrap());

// @struct: Single subtitle cue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue {
    // @field: Sequence number
    pub index: usize,

    // @field: Start time in ms
    pub start_time_ms: u64,

    // @field: End time in ms
    pub end_time_ms: u64,

    // @field: Display lines, in order
    pub lines: Vec<String>,
}

impl Cue {
    pub fn new(index: usize, start_time_ms: u64, end_time_ms: u64, lines: Vec<String>) -> Self {
        Cue {
            index,
            start_time_ms,
            end_time_ms,
            lines,
        }
    }

    /// A cue with the same index and timing but different lines
    pub fn with_lines(&self, lines: Vec<String>) -> Self {
        Cue {
            index: self.index,
            start_time_ms: self.start_time_ms,
            end_time_ms: self.end_time_ms,
            lines,
        }
    }

    // @returns: Cue duration, zero when the timing is inverted
    pub fn duration_ms(&self) -> u64 {
        self.end_time_ms.saturating_sub(self.start_time_ms)
    }

    // @returns: Lines joined with newlines
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Parse an SRT timestamp to milliseconds
    pub fn parse_timestamp(timestamp: &str) -> Result<u64, SubtitleError> {
        let parts: Vec<&str> = timestamp.trim().split(&[':', ',', '.'][..]).collect();
        if parts.len() != 4 {
            return Err(SubtitleError::InvalidTimestamp(timestamp.to_string()));
        }

        let parse = |s: &str| s.parse::<u64>().map_err(|_| SubtitleError::InvalidTimestamp(timestamp.to_string()));
        let hours = parse(parts[0])?;
        let minutes = parse(parts[1])?;
        let seconds = parse(parts[2])?;
        let millis = parse(parts[3])?;

        if minutes >= 60 || seconds >= 60 || millis >= 1000 {
            return Err(SubtitleError::InvalidTimestamp(timestamp.to_string()));
        }

        Ok(hours * 3_600_000 + minutes * 60_000 + seconds * 1_000 + millis)
    }

    /// Format a timestamp in milliseconds to SRT format (HH:MM:SS,mmm)
    pub fn format_timestamp(ms: u64) -> String {
        let hours = ms / 3_600_000;
        let minutes = (ms % 3_600_000) / 60_000;
        let seconds = (ms % 60_000) / 1_000;
        let millis = ms % 1_000;

        format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
    }
}

impl fmt::Display for Cue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", self.index)?;
        writeln!(
            f,
            "{} --> {}",
            Self::format_timestamp(self.start_time_ms),
            Self::format_timestamp(self.end_time_ms)
        )?;
        // A blank line would terminate the cue early, so padding lines are not written
        for line in self.lines.iter().filter(|line| !line.trim().is_empty()) {
            writeln!(f, "{}", line)?;
        }
        writeln!(f)
    }
}

/// Collection of cues read from one SRT file
#[derive(Debug, Clone)]
pub struct SubtitleCollection {
    /// Source filename
    pub source_file: PathBuf,

    /// Cues in file order
    pub cues: Vec<Cue>,
}

impl SubtitleCollection {
    pub fn new(source_file: PathBuf, cues: Vec<Cue>) -> Self {
        SubtitleCollection { source_file, cues }
    }

    /// Read and parse an SRT file
    pub fn from_srt_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read(path).with_context(|| format!("Failed to read subtitle file: {}", path.display()))?;
        let content = String::from_utf8_lossy(&raw);
        let cues = Self::parse_srt_string(&content)
            .with_context(|| format!("Failed to parse subtitle file: {}", path.display()))?;
        debug!("Parsed {} cues from {}", cues.len(), path.display());
        Ok(Self::new(path.to_path_buf(), cues))
    }

    /// Parse SRT content into cues.
    ///
    /// Blocks are separated by blank lines, the numeric index line is optional
    /// and blocks without a timing line are skipped with a warning.
    pub fn parse_srt_string(content: &str) -> Result<Vec<Cue>, SubtitleError> {
        let normalized = content
            .trim_start_matches('\u{feff}')
            .replace("\r\n", "\n")
            .replace('\r', "\n");

        let mut cues = Vec::new();
        for (block_number, block) in BLOCK_SEPARATOR_REGEX.split(normalized.trim()).enumerate() {
            let lines: Vec<&str> = block.lines().collect();
            if lines.iter().all(|line| line.trim().is_empty()) {
                continue;
            }

            let timing_at = if TIMESTAMP_REGEX.is_match(lines[0]) {
                0
            } else if lines.len() > 1 && TIMESTAMP_REGEX.is_match(lines[1]) {
                1
            } else {
                warn!("Skipping subtitle block {} without a timing line", block_number + 1);
                continue;
            };

            let Some(caps) = TIMESTAMP_REGEX.captures(lines[timing_at]) else {
                continue;
            };
            let start_time_ms = Self::parse_timestamp_to_ms(&caps, 1);
            let end_time_ms = Self::parse_timestamp_to_ms(&caps, 5);
            if end_time_ms <= start_time_ms {
                warn!(
                    "Cue {} has end time {} not after start time {}",
                    cues.len() + 1,
                    Cue::format_timestamp(end_time_ms),
                    Cue::format_timestamp(start_time_ms)
                );
            }

            let mut text_lines: Vec<String> = lines[timing_at + 1..]
                .iter()
                .map(|line| line.trim_end().to_string())
                .collect();
            if text_lines.is_empty() {
                text_lines.push(String::new());
            }

            cues.push(Cue::new(cues.len() + 1, start_time_ms, end_time_ms, text_lines));
        }

        if cues.is_empty() {
            return Err(SubtitleError::NoCues);
        }
        Ok(cues)
    }

    /// Render all cues as SRT, renumbered from 1
    pub fn to_srt_string(&self) -> String {
        let mut out = String::new();
        for (i, cue) in self.cues.iter().enumerate() {
            let numbered = Cue { index: i + 1, ..cue.clone() };
            out.push_str(&numbered.to_string());
        }
        out
    }

    /// Write subtitles to an SRT file
    pub fn write_to_srt<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        FileManager::write_atomically(path, &self.to_srt_string())
    }

    /// Parse timestamp captures to milliseconds
    fn parse_timestamp_to_ms(caps: &regex::Captures, start_idx: usize) -> u64 {
        let field = |offset: usize| {
            caps.get(start_idx + offset)
                .map_or(0, |m| m.as_str().parse::<u64>().unwrap_or(0))
        };
        // "5" and "500" both mean half a second
        let millis_str = caps.get(start_idx + 3).map_or("0", |m| m.as_str());
        let millis = field(3) * 10u64.pow(3 - millis_str.len().min(3) as u32);

        (field(0) * 3600 + field(1) * 60 + field(2)) * 1000 + millis
    }
}

impl fmt::Display for SubtitleCollection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Subtitle Collection")?;
        writeln!(f, "Source: {:?}", self.source_file)?;
        writeln!(f, "Cues: {}", self.cues.len())?;
        Ok(())
    }
}
