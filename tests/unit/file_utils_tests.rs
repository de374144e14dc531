/*!
 * Tests for file helpers and folder-mode naming
 */

use anyhow::Result;
use std::fs;
use yasts::file_utils::{has_matching_video, FileManager, SubtitleNaming};
use crate::common;

#[test]
fn test_findFiles_shouldRecurseInStableOrder() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let root = temp_dir.path();
    common::create_test_file(root, "b.en.srt", "")?;
    common::create_test_file(root, "season1/a.en.SRT", "")?;
    common::create_test_file(root, "notes.txt", "")?;

    let found = FileManager::find_files(root, "srt")?;
    let names: Vec<String> = found
        .iter()
        .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
        .collect();
    assert_eq!(names, vec!["b.en.srt", "season1/a.en.SRT"]);
    Ok(())
}

#[test]
fn test_existingTarget_shouldFindAnyNamingVariant() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let naming = SubtitleNaming::default();
    assert!(naming.existing_target(temp_dir.path(), "Movie").is_none());

    let variant = common::create_test_file(temp_dir.path(), "Movie.fi.hi.srt", "")?;
    assert_eq!(naming.existing_target(temp_dir.path(), "Movie"), Some(variant));
    Ok(())
}

#[test]
fn test_hasMatchingVideo_shouldCheckEachExtension() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    common::create_test_file(temp_dir.path(), "Movie.mkv", "")?;
    let exts = vec!["mp4".to_string(), ".mkv".to_string()];
    assert!(has_matching_video(temp_dir.path(), "Movie", &exts));
    assert!(!has_matching_video(temp_dir.path(), "Other", &exts));
    Ok(())
}

#[test]
fn test_writeAtomically_shouldReplaceContent() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("out.srt");
    FileManager::write_atomically(&path, "first")?;
    FileManager::write_atomically(&path, "second")?;
    assert_eq!(fs::read_to_string(&path)?, "second");
    Ok(())
}

#[test]
fn test_appendToLogFile_shouldKeepEarlierSections() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("yasts.issues.log");
    FileManager::append_to_log_file(&path, "run one")?;
    FileManager::append_to_log_file(&path, "run two")?;
    let content = fs::read_to_string(&path)?;
    assert!(content.find("run one") < content.find("run two"));
    assert_eq!(content.matches("=== ").count(), 2);
    Ok(())
}
