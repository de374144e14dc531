/*!
 * File and folder runs through the controller with a mock endpoint
 */

use anyhow::Result;
use std::fs;
use std::path::Path;

use yasts::app_controller::{Controller, FileOutcome, FolderOptions, ISSUES_LOG_NAME};
use yasts::providers::MockProvider;
use yasts::SubtitleCollection;
use crate::common;

fn controller(provider: MockProvider) -> Controller {
    Controller::with_service(common::service_with(yasts::Config::default(), provider))
}

fn write_srt(dir: &Path, name: &str) -> Result<()> {
    common::create_test_subtitle(dir, name)?;
    Ok(())
}

#[tokio::test]
async fn test_runFile_shouldWriteSameCuesAndTiming() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "Movie.en.srt")?;
    let output = temp_dir.path().join("Movie.fi.srt");
    let controller = controller(MockProvider::working());

    let outcome = controller.run_file(&input, &output, false).await?;

    assert_eq!(outcome, FileOutcome::Written { output: output.clone(), failed_groups: vec![] });
    let source = SubtitleCollection::from_srt_file(&input)?;
    let translated = SubtitleCollection::from_srt_file(&output)?;
    assert_eq!(translated.cues.len(), source.cues.len());
    for (s, t) in source.cues.iter().zip(&translated.cues) {
        assert_eq!((s.start_time_ms, s.end_time_ms), (t.start_time_ms, t.end_time_ms));
        assert_eq!(s.lines.len(), t.lines.len());
    }
    assert!(translated.cues[0].text().starts_with("[fi]"));
    assert!(!temp_dir.path().join(ISSUES_LOG_NAME).exists());
    Ok(())
}

#[tokio::test]
async fn test_runFile_withExistingOutput_shouldSkipUnlessForced() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "Movie.en.srt")?;
    let output = common::create_test_file(temp_dir.path(), "Movie.fi.srt", "keep me")?;
    let provider = MockProvider::working();
    let controller = controller(provider.clone());

    let outcome = controller.run_file(&input, &output, false).await?;
    assert_eq!(outcome, FileOutcome::Skipped { output: output.clone() });
    assert_eq!(fs::read_to_string(&output)?, "keep me");
    assert_eq!(provider.request_count(), 0);

    let outcome = controller.run_file(&input, &output, true).await?;
    assert!(matches!(outcome, FileOutcome::Written { .. }));
    assert_ne!(fs::read_to_string(&output)?, "keep me");
    Ok(())
}

#[tokio::test]
async fn test_runFile_withUntranslatableGroup_shouldWriteIssuesLog() -> Result<()> {
    common::init_test_logging();
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "Movie.en.srt")?;
    let output = temp_dir.path().join("out").join("Movie.fi.srt");
    let controller = controller(MockProvider::working().with_broken_groups(vec![2]));

    let outcome = controller.run_file(&input, &output, false).await?;

    assert_eq!(outcome, FileOutcome::Written { output: output.clone(), failed_groups: vec![2] });
    let translated = SubtitleCollection::from_srt_file(&output)?;
    assert_eq!(translated.cues[1].lines, vec!["Now look where", "we ended up tonight."]);

    let log = fs::read_to_string(temp_dir.path().join("out").join(ISSUES_LOG_NAME))?;
    assert!(log.contains("Movie.en.srt"));
    assert!(log.contains("Untranslated groups (source text kept): [2]"));
    Ok(())
}

#[tokio::test]
async fn test_runFolder_shouldPreferPlainSourceAndSkipExistingTargets() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let root = temp_dir.path();
    write_srt(root, "Movie.en.srt")?;
    write_srt(root, "Movie.en.hi.srt")?;
    write_srt(root, "Show/Ep1.en.srt")?;
    write_srt(root, "Show/Ep1.fi.srt")?;
    write_srt(root, "Other.de.srt")?;
    let controller = controller(MockProvider::working());

    let summary = controller.run_folder(root, &FolderOptions::default()).await?;

    assert_eq!((summary.translated, summary.skipped, summary.failed), (1, 1, 0));
    assert!(root.join("Movie.fi.ai.srt").exists());
    assert!(!root.join("Movie.hi.fi.ai.srt").exists());
    assert!(!root.join("Show/Ep1.fi.ai.srt").exists());
    assert!(!root.join("Other.fi.ai.srt").exists());

    // Second run finds its own output and does nothing
    let again = controller.run_folder(root, &FolderOptions::default()).await?;
    assert_eq!((again.translated, again.skipped), (0, 2));
    Ok(())
}

#[tokio::test]
async fn test_runFolder_withDryRun_shouldOnlyPlan() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let root = temp_dir.path();
    write_srt(root, "A.en.srt")?;
    write_srt(root, "nested/B.en.srt")?;
    let provider = MockProvider::working();
    let controller = controller(provider.clone());
    let options = FolderOptions { dry_run: true, ..FolderOptions::default() };

    let summary = controller.run_folder(root, &options).await?;

    assert_eq!(summary.translated, 0);
    assert_eq!(summary.planned.len(), 2);
    assert!(summary.planned.contains(&root.join("nested/B.en.srt")));
    assert_eq!(provider.request_count(), 0);
    assert!(!root.join("A.fi.ai.srt").exists());
    Ok(())
}

#[tokio::test]
async fn test_runFolder_withHiOnlySource_shouldHonourSkipHi() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let root = temp_dir.path();
    write_srt(root, "Only.en.hi.srt")?;
    let controller = controller(MockProvider::working());

    let skipped = controller
        .run_folder(root, &FolderOptions { skip_hi: true, ..FolderOptions::default() })
        .await?;
    assert_eq!(skipped.translated, 0);

    let summary = controller.run_folder(root, &FolderOptions::default()).await?;
    assert_eq!(summary.translated, 1);
    assert!(root.join("Only.hi.fi.ai.srt").exists());
    Ok(())
}

#[tokio::test]
async fn test_runFolder_withRequireVideo_shouldIgnoreLoneSubtitles() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let root = temp_dir.path();
    write_srt(root, "WithVideo.en.srt")?;
    common::create_test_file(root, "WithVideo.mkv", "")?;
    write_srt(root, "Lonely.en.srt")?;
    let controller = controller(MockProvider::working());
    let options = FolderOptions { require_video: true, ..FolderOptions::default() };

    let summary = controller.run_folder(root, &options).await?;

    assert_eq!(summary.translated, 1);
    assert!(root.join("WithVideo.fi.ai.srt").exists());
    assert!(!root.join("Lonely.fi.ai.srt").exists());
    Ok(())
}

#[tokio::test]
async fn test_runFolder_withLimitAndBrokenFile_shouldCountAndContinue() -> Result<()> {
    common::init_test_logging();
    let temp_dir = common::create_temp_dir()?;
    let root = temp_dir.path();
    common::create_test_file(root, "A.en.srt", "this is not a subtitle file")?;
    write_srt(root, "B.en.srt")?;
    write_srt(root, "C.en.srt")?;
    let controller = controller(MockProvider::working());
    let options = FolderOptions { limit: Some(1), ..FolderOptions::default() };

    let summary = controller.run_folder(root, &options).await?;

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.translated, 1);
    assert_eq!(summary.skipped, 1);
    assert!(root.join("B.fi.ai.srt").exists());
    assert!(!root.join("C.fi.ai.srt").exists());
    Ok(())
}

#[tokio::test]
async fn test_runFolder_withMissingDirectory_shouldFail() {
    let controller = controller(MockProvider::working());
    let result = controller
        .run_folder(Path::new("/definitely/not/here"), &FolderOptions::default())
        .await;
    assert!(result.is_err());
}
