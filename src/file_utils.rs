use anyhow::{Context, Result};
use chrono::Local;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

// @module: File and directory utilities

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.as_os_str().is_empty() && !path.exists() {
            fs::create_dir_all(path)
                .with_context(|| format!("Failed to create directory: {}", path.display()))?;
        }
        Ok(())
    }

    /// Find files with a specific extension, recursively and in a stable order
    pub fn find_files<P: AsRef<Path>>(dir: P, extension: &str) -> Result<Vec<PathBuf>> {
        let wanted = extension.trim_start_matches('.');
        let mut result = Vec::new();

        for entry in WalkDir::new(dir.as_ref()).follow_links(true).sort_by_file_name() {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();
            if path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(wanted))
            {
                result.push(path.to_path_buf());
            }
        }

        Ok(result)
    }

    /// Write content through a temporary file in the same directory, then rename it into place
    pub fn write_atomically<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
        let path = path.as_ref();
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        Self::ensure_dir(parent)?;
        let dir = if parent.as_os_str().is_empty() { Path::new(".") } else { parent };

        let mut temp = NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
        temp.write_all(content.as_bytes())
            .with_context(|| format!("Failed to write subtitle data for {}", path.display()))?;
        temp.persist(path)
            .with_context(|| format!("Failed to move subtitle file into place: {}", path.display()))?;
        Ok(())
    }

    /// Append a timestamped section to a log file
    pub fn append_to_log_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
        let path = path.as_ref();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file: {}", path.display()))?;

        writeln!(file, "=== {} ===", Local::now().format("%Y-%m-%d %H:%M:%S"))?;
        writeln!(file, "{}", content)?;
        Ok(())
    }
}

/// A source-language subtitle found while scanning a folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSubtitle {
    pub path: PathBuf,
    /// File name without the language/HI tags and extension
    pub prefix: String,
    /// Whether the source is a hearing-impaired variant
    pub is_hi: bool,
}

/// File name tags used by folder mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleNaming {
    pub source_tag: String,
    pub target_tag: String,
    pub hi_tag: String,
    /// Marker appended to generated files, empty to disable
    pub ai_tag: String,
}

impl Default for SubtitleNaming {
    fn default() -> Self {
        Self {
            source_tag: "en".to_string(),
            target_tag: "fi".to_string(),
            hi_tag: "hi".to_string(),
            ai_tag: "ai".to_string(),
        }
    }
}

impl SubtitleNaming {
    /// Classify a file as `prefix.<src>.srt`, `prefix.<src>.<hi>.srt` or `prefix.<hi>.<src>.srt`
    pub fn match_source(&self, path: &Path) -> Option<SourceSubtitle> {
        let name = path.file_name()?.to_string_lossy().to_string();
        let hi_after = format!(".{}.{}.srt", self.source_tag, self.hi_tag);
        let hi_before = format!(".{}.{}.srt", self.hi_tag, self.source_tag);
        let plain = format!(".{}.srt", self.source_tag);

        // Most specific suffix first
        let (suffix, is_hi) = if name.ends_with(&hi_after) {
            (hi_after, true)
        } else if name.ends_with(&hi_before) {
            (hi_before, true)
        } else if name.ends_with(&plain) {
            (plain, false)
        } else {
            return None;
        };

        let prefix = name[..name.len() - suffix.len()].to_string();
        if prefix.is_empty() {
            return None;
        }
        Some(SourceSubtitle {
            path: path.to_path_buf(),
            prefix,
            is_hi,
        })
    }

    /// First existing target subtitle among `prefix.<tgt>.srt`, `prefix.<hi>.<tgt>.srt`, `prefix.<tgt>.<hi>.srt`
    pub fn existing_target(&self, dir: &Path, prefix: &str) -> Option<PathBuf> {
        [
            format!("{}.{}.srt", prefix, self.target_tag),
            format!("{}.{}.{}.srt", prefix, self.hi_tag, self.target_tag),
            format!("{}.{}.{}.srt", prefix, self.target_tag, self.hi_tag),
        ]
        .into_iter()
        .map(|name| dir.join(name))
        .find(|candidate| candidate.exists())
    }

    // @returns: prefix.[<hi>.]<tgt>[.<ai>].srt next to the source
    pub fn output_path(&self, source: &SourceSubtitle) -> PathBuf {
        let dir = source.path.parent().unwrap_or_else(|| Path::new("."));
        let mut name = source.prefix.clone();
        if source.is_hi {
            name.push('.');
            name.push_str(&self.hi_tag);
        }
        name.push('.');
        name.push_str(&self.target_tag);
        if !self.ai_tag.is_empty() {
            name.push('.');
            name.push_str(&self.ai_tag);
        }
        name.push_str(".srt");
        dir.join(name)
    }
}

/// Whether a video named `prefix.<ext>` sits next to the subtitle
pub fn has_matching_video(dir: &Path, prefix: &str, video_extensions: &[String]) -> bool {
    video_extensions
        .iter()
        .map(|ext| ext.trim().trim_start_matches('.'))
        .filter(|ext| !ext.is_empty())
        .any(|ext| dir.join(format!("{}.{}", prefix, ext)).exists())
}

/// Split repeated and comma-separated extension lists, dropping duplicates
pub fn parse_video_extensions(values: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for ext in values.iter().flat_map(|v| v.split(',')) {
        let ext = ext.trim().trim_start_matches('.').to_lowercase();
        if !ext.is_empty() && !out.contains(&ext) {
            out.push(ext);
        }
    }
    out
}
