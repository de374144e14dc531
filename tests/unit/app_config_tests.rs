/*!
 * Tests for configuration loading and validation
 */

use anyhow::Result;
use yasts::app_config::{ChatTemplate, Config, LogLevel};
use crate::common;

#[test]
fn test_loadOrCreate_withMissingFile_shouldWriteDefaults() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("conf.json");

    let (config, created) = Config::load_or_create(&path)?;
    assert!(created);
    assert!(path.exists());
    assert_eq!(config, Config::default());

    let (reloaded, created_again) = Config::load_or_create(&path)?;
    assert!(!created_again);
    assert_eq!(reloaded, config);
    Ok(())
}

#[test]
fn test_loadOrCreate_withPartialFile_shouldKeepDefaultsForMissingKeys() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(
        temp_dir.path(),
        "conf.json",
        r#"{"source_language":"en","endpoint":{"url":"http://10.0.0.2:8080/completion","template":"llama3"},"log_level":"debug"}"#,
    )?;

    let (config, created) = Config::load_or_create(&path)?;
    assert!(!created);
    assert_eq!(config.source_language, "en");
    assert_eq!(config.endpoint.template, ChatTemplate::Llama3);
    assert_eq!(config.endpoint.timeout_secs, 120);
    assert_eq!(config.log_level, LogLevel::Debug);
    assert_eq!(config.splitback.split_max_line_chars, 42);
    config.validate()?;
    Ok(())
}

#[test]
fn test_loadOrCreate_withBrokenJson_shouldNameTheFile() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(temp_dir.path(), "conf.json", "{ not json")?;
    let err = Config::load_or_create(&path).unwrap_err();
    assert!(format!("{:#}", err).contains("conf.json"));
    Ok(())
}

#[test]
fn test_validate_withBadValues_shouldFail() {
    let cases: Vec<fn(&mut Config)> = vec![
        |c| c.endpoint.url = "not a url".to_string(),
        |c| c.sampling.temperature = 3.0,
        |c| c.sampling.top_p = 0.0,
        |c| c.grouping.max_group_chars = 0,
        |c| c.window.max_focus_groups = Some(0),
        |c| c.retry.max_retries_per_window = 0,
        |c| c.target_language = " ".to_string(),
    ];
    for (i, mutate) in cases.into_iter().enumerate() {
        let mut config = Config::default();
        mutate(&mut config);
        assert!(config.validate().is_err(), "case {} should be rejected", i);
    }
}

#[test]
fn test_chatTemplate_fromStr_shouldBeCaseInsensitive() {
    assert_eq!("Qwen3".parse::<ChatTemplate>().unwrap(), ChatTemplate::Qwen3);
    assert!("mistral".parse::<ChatTemplate>().is_err());
    assert_eq!(ChatTemplate::Gemma3.to_string(), "gemma3");
}
