/*!
 * Tests for SRT reading and writing
 */

use anyhow::Result;
use yasts::errors::SubtitleError;
use yasts::subtitle_processor::{Cue, SubtitleCollection};
use crate::common;

#[test]
fn test_timestamp_parsing_withValidTimestamp_shouldParseAndFormat() {
    let ms = Cue::parse_timestamp("01:23:45,678").unwrap();
    assert_eq!(ms, 5_025_678);
    assert_eq!(Cue::format_timestamp(ms), "01:23:45,678");
    assert!(Cue::parse_timestamp("1:2").is_err());
}

#[test]
fn test_fromSrtFile_withSample_shouldKeepLineStructure() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_subtitle(temp_dir.path(), "sample.en.srt")?;

    let collection = SubtitleCollection::from_srt_file(&path)?;
    assert_eq!(collection.cues.len(), 2);
    assert_eq!(collection.cues[0].lines, vec!["I told you that we", "should never come back."]);
    assert_eq!(collection.cues[1].start_time_ms, 3500);
    assert_eq!(collection.cues[1].end_time_ms, 5000);
    Ok(())
}

#[test]
fn test_writeToSrt_thenRead_shouldPreserveTimingAndLines() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let cues = vec![
        Cue::new(1, 0, 1250, vec!["- Mitä?".to_string(), "- Ei mitään.".to_string()]),
        Cue::new(2, 3_600_000, 3_601_001, vec!["\u{266a}".to_string()]),
    ];
    let path = temp_dir.path().join("nested").join("out.fi.srt");
    SubtitleCollection::new(path.clone(), cues.clone()).write_to_srt(&path)?;

    let reread = SubtitleCollection::from_srt_file(&path)?;
    assert_eq!(reread.cues, cues);
    Ok(())
}

#[test]
fn test_parseSrtString_withMillisecondShorthand_shouldScale() -> Result<()> {
    let cues = SubtitleCollection::parse_srt_string("1\n00:00:01.5 --> 00:00:02.25\nShort\n")?;
    assert_eq!(cues[0].start_time_ms, 1500);
    assert_eq!(cues[0].end_time_ms, 2250);
    Ok(())
}

#[test]
fn test_parseSrtString_withNoCues_shouldReportNoCues() {
    let err = SubtitleCollection::parse_srt_string("just some text\n\nmore text").unwrap_err();
    assert!(matches!(err, SubtitleError::NoCues));
}

#[test]
fn test_parseSrtString_withBrokenBlock_shouldSkipIt() -> Result<()> {
    let content = "1\n00:00:01,000 --> 00:00:02,000\nKept\n\n2\nno timing here\n\n3\n00:00:05,000 --> 00:00:06,000\nAlso kept\n";
    let cues = SubtitleCollection::parse_srt_string(content)?;
    assert_eq!(cues.iter().map(Cue::text).collect::<Vec<_>>(), vec!["Kept", "Also kept"]);
    assert_eq!(cues[1].index, 2);
    Ok(())
}
