/*!
 * End-to-end translation runs against the mock provider
 */

use anyhow::Result;
use parking_lot::Mutex;
use yasts::providers::{MockBehavior, MockProvider};
use yasts::translation::prompts::GroupRole;
use yasts::translation::ProgressUpdate;
use crate::common::{self, cue};

#[tokio::test]
async fn test_translateCues_withTwoCueSentence_shouldKeepStructure() -> Result<()> {
    let cues = vec![
        cue(1, &["I told you that we", "should never"]),
        cue(2, &["ever come back", "to this place."]),
    ];
    let provider = MockProvider::working();
    let service = common::service_with(yasts::Config::default(), provider.clone());

    let outcome = service.translate_cues(&cues, |_| {}).await?;

    assert!(outcome.is_complete());
    assert_eq!(outcome.group_count, 1);
    assert_eq!(provider.request_count(), 1);
    assert_eq!(outcome.cues.len(), 2);
    for (input, output) in cues.iter().zip(&outcome.cues) {
        assert_eq!((input.start_time_ms, input.end_time_ms), (output.start_time_ms, output.end_time_ms));
        assert_eq!(output.lines.len(), 2);
        assert!(output.lines.iter().all(|line| !line.trim().is_empty()), "{:?}", output.lines);
    }

    let words: Vec<String> = outcome
        .cues
        .iter()
        .flat_map(|c| c.lines.iter().flat_map(|l| l.split_whitespace().map(str::to_string)))
        .collect();
    assert_eq!(words.join(" "), "[fi] I told you that we should never ever come back to this place.");
    Ok(())
}

#[tokio::test]
async fn test_translateCues_withUnescapedQuotes_shouldRepairAndValidate() -> Result<()> {
    let cues = vec![cue(1, &["It is true, but power is theirs."])];
    let service = common::service_with(yasts::Config::default(), MockProvider::new(MockBehavior::UnescapedQuotes));

    let outcome = service.translate_cues(&cues, |_| {}).await?;

    assert!(outcome.is_complete());
    assert_eq!(outcome.cues[0].lines.len(), 1);
    assert!(outcome.cues[0].lines[0].ends_with("mutta \"valta\" on heillä."), "{:?}", outcome.cues[0].lines);
    Ok(())
}

#[tokio::test]
async fn test_translateCues_withFourGroupWindowFailing_shouldShrinkToTwo() -> Result<()> {
    let cues = vec![
        cue(1, &["Line one is here."]),
        cue(2, &["Line two is here."]),
        cue(3, &["Line three is here."]),
        cue(4, &["Line four is here."]),
    ];
    let mut config = common::one_group_per_line_config();
    config.window.max_focus_groups = Some(4);
    let provider = MockProvider::new(MockBehavior::FailWhenFocusAbove { max_focus: 2 });
    let service = common::service_with(config, provider.clone());

    let outcome = service.translate_cues(&cues, |_| {}).await?;

    assert!(outcome.is_complete());
    assert_eq!(
        provider.focus_history(),
        vec![vec![1, 2, 3, 4], vec![1, 2, 3, 4], vec![1, 2], vec![3, 4]]
    );
    for (input, output) in cues.iter().zip(&outcome.cues) {
        assert_eq!(output.lines, vec![format!("[fi] {}", input.lines[0])]);
    }

    // The shrunk window still shows the rest of the range as context
    let shrunk = MockProvider::prompt_groups(&provider.prompts()[2]);
    let context: Vec<usize> = shrunk.iter().filter(|g| g.role == GroupRole::Context).map(|g| g.group_id).collect();
    assert_eq!(context, vec![3, 4]);
    Ok(())
}

#[tokio::test]
async fn test_translateCues_withOneBrokenGroup_shouldKeepItsSourceText() -> Result<()> {
    common::init_test_logging();
    let cues = vec![
        cue(1, &["First line here."]),
        cue(2, &["Second line here."]),
        cue(3, &["Third line here."]),
    ];
    let provider = MockProvider::working().with_broken_groups(vec![2]);
    let service = common::service_with(common::one_group_per_line_config(), provider.clone());

    let outcome = service.translate_cues(&cues, |_| {}).await?;

    assert_eq!(outcome.failed_groups, vec![2]);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].group_ids, vec![2]);
    assert_eq!(outcome.failures[0].last_error.kind(), "ValidationError");
    assert_eq!(
        provider.focus_history(),
        vec![vec![1, 2, 3], vec![1, 2, 3], vec![1], vec![2], vec![2], vec![3]]
    );

    assert_eq!(outcome.cues.len(), 3);
    assert_eq!(outcome.cues[0].lines, vec!["[fi] First line here."]);
    assert_eq!(outcome.cues[1], cues[1]);
    assert_eq!(outcome.cues[2].lines, vec!["[fi] Third line here."]);
    Ok(())
}

#[tokio::test]
async fn test_translateCues_withConcurrency_shouldBoundInFlightRequests() -> Result<()> {
    let cues: Vec<_> = (1..=12).map(|i| cue(i, &["Some words on a line."])).collect();
    let mut config = common::one_group_per_line_config();
    config.window.max_focus_groups = Some(2);
    config.concurrency = 3;
    let provider = MockProvider::new(MockBehavior::Slow { delay_ms: 30 });
    let service = common::service_with(config, provider.clone());

    let updates = Mutex::new(Vec::<ProgressUpdate>::new());
    let outcome = service.translate_cues(&cues, |update| updates.lock().push(update.clone())).await?;

    assert!(outcome.is_complete());
    assert_eq!(outcome.window_count, 6);
    assert_eq!(provider.request_count(), 6);
    assert!(provider.max_in_flight() <= 3);
    assert!(provider.max_in_flight() >= 2);

    let updates = updates.into_inner();
    assert_eq!(updates.len(), 6);
    let last = updates.last().unwrap();
    assert_eq!((last.windows_done, last.windows_total), (6, 6));
    assert_eq!((last.groups_done, last.groups_total), (12, 12));
    assert!(last.tokens_per_second.is_some());
    assert!(outcome.stats.total_tokens() > 0);
    Ok(())
}

#[tokio::test]
async fn test_translateCues_withIntermittentFailures_shouldRetryAndFinish() -> Result<()> {
    let cues: Vec<_> = (1..=4).map(|i| cue(i, &["Short sentence here."])).collect();
    let mut config = common::one_group_per_line_config();
    config.window.max_focus_groups = Some(1);
    let provider = MockProvider::new(MockBehavior::Intermittent { fail_every: 2 });
    let service = common::service_with(config, provider.clone());

    let outcome = service.translate_cues(&cues, |_| {}).await?;

    assert!(outcome.is_complete());
    assert!(provider.request_count() > 4);
    assert!(outcome.cues.iter().all(|c| c.text().starts_with("[fi] ")));
    Ok(())
}

#[tokio::test]
async fn test_translateCues_withNoShrink_shouldFailWholeWindow() -> Result<()> {
    let cues: Vec<_> = (1..=3).map(|i| cue(i, &["Another line of text."])).collect();
    let mut config = common::one_group_per_line_config();
    config.retry.shrink_focus_on_retry = false;
    let provider = MockProvider::working().with_broken_groups(vec![3]);
    let service = common::service_with(config, provider.clone());

    let outcome = service.translate_cues(&cues, |_| {}).await?;

    assert_eq!(outcome.failed_groups, vec![1, 2, 3]);
    assert_eq!(provider.request_count(), 2);
    assert_eq!(outcome.cues, cues);
    Ok(())
}

#[tokio::test]
async fn test_translateCues_withMusicAndEmptyCues_shouldKeepThemInPlace() -> Result<()> {
    let cues = vec![
        cue(1, &["\u{266a}"]),
        cue(2, &[""]),
        cue(3, &["We should go home now.", "It is getting late."]),
    ];
    let service = common::service_with(yasts::Config::default(), MockProvider::working());

    let outcome = service.translate_cues(&cues, |_| {}).await?;

    assert!(outcome.is_complete());
    assert_eq!(outcome.cues.len(), 3);
    assert_eq!(outcome.cues[1].lines, vec![String::new()]);
    assert_eq!(outcome.cues[2].lines.len(), 2);
    Ok(())
}
