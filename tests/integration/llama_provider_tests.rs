/*!
 * llama.cpp client tests against a local HTTP stub
 */

use anyhow::Result;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use yasts::app_config::{Config, EndpointConfig, SamplingConfig};
use yasts::errors::ProviderError;
use yasts::providers::{CompletionRequest, LlamaCpp, MockProvider, Provider};
use yasts::translation::prompts::GroupRole;
use yasts::translation::TranslationService;
use crate::common::cue;

type Handler = Arc<dyn Fn(&str, &str) -> (u16, String) + Send + Sync>;

/// Minimal HTTP/1.1 server answering each connection through `handler(request_line, body)`
struct StubServer {
    base_url: String,
    requests: Arc<Mutex<Vec<(String, String)>>>,
}

impl StubServer {
    async fn start(handler: Handler) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let base_url = format!("http://{}", listener.local_addr()?);
        let requests = Arc::new(Mutex::new(Vec::new()));

        let seen = Arc::clone(&requests);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let handler = Arc::clone(&handler);
                let seen = Arc::clone(&seen);
                tokio::spawn(async move {
                    let _ = handle(stream, handler, seen).await;
                });
            }
        });

        Ok(Self { base_url, requests })
    }

    fn completion_url(&self) -> String {
        format!("{}/completion", self.base_url)
    }

    fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().clone()
    }
}

async fn handle(mut stream: TcpStream, handler: Handler, seen: Arc<Mutex<Vec<(String, String)>>>) -> Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let request_line = head.lines().next().unwrap_or_default().to_string();
    let body = String::from_utf8_lossy(&buf[header_end..]).to_string();
    seen.lock().push((request_line.clone(), body.clone()));

    let (status, response_body) = handler(&request_line, &body);
    let response = format!(
        "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        response_body.len(),
        response_body
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}

fn endpoint(url: String, retry_count: u32) -> EndpointConfig {
    EndpointConfig { url, timeout_secs: 5, retry_count, retry_backoff_ms: 1, ..EndpointConfig::default() }
}

fn request(prompt: &str) -> CompletionRequest {
    CompletionRequest::new(prompt.to_string(), &SamplingConfig::default())
}

#[tokio::test]
async fn test_complete_shouldSendSamplingAndReadTimings() -> Result<()> {
    let server = StubServer::start(Arc::new(|_, _| {
        let body = json!({
            "content": "{\"translations\":[]}",
            "timings": {"prompt_n": 100, "predicted_n": 20, "prompt_ms": 500.0, "predicted_ms": 1500.0}
        });
        (200, body.to_string())
    }))
    .await?;
    let client = LlamaCpp::new(&endpoint(server.completion_url(), 0));

    let completion = client.complete(request("hello")).await?;

    assert_eq!(completion.text, "{\"translations\":[]}");
    let stats = completion.stats.expect("timings");
    assert_eq!((stats.prompt_tokens, stats.predicted_tokens), (100, 20));
    assert_eq!(stats.tokens_per_second(), Some(60.0));

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].0.starts_with("POST /completion"));
    let sent: Value = serde_json::from_str(&requests[0].1)?;
    assert_eq!(sent["prompt"], "hello");
    assert_eq!(sent["n_predict"], 2048);
    assert!(sent.get("temperature").is_some() && sent.get("repeat_penalty").is_some());
    Ok(())
}

#[tokio::test]
async fn test_complete_withServerError_shouldRetryThenSucceed() -> Result<()> {
    let calls = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&calls);
    let server = StubServer::start(Arc::new(move |_, _| {
        let mut calls = counter.lock();
        *calls += 1;
        if *calls == 1 {
            (503, "{\"error\":\"loading model\"}".to_string())
        } else {
            (200, json!({"choices": [{"text": "ok"}]}).to_string())
        }
    }))
    .await?;
    let client = LlamaCpp::new(&endpoint(server.completion_url(), 2));

    let completion = client.complete(request("x")).await?;

    assert_eq!(completion.text, "ok");
    assert!(completion.stats.is_none());
    assert_eq!(server.requests().len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_complete_withClientError_shouldNotRetry() -> Result<()> {
    let server = StubServer::start(Arc::new(|_, _| (400, "{\"error\":\"bad prompt\"}".to_string()))).await?;
    let client = LlamaCpp::new(&endpoint(server.completion_url(), 3));

    let err = client.complete(request("x")).await.unwrap_err();

    assert!(matches!(err, ProviderError::ApiError { status_code: 400, .. }), "{:?}", err);
    assert_eq!(server.requests().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_complete_withUnknownResponseShape_shouldReportParseError() -> Result<()> {
    let server = StubServer::start(Arc::new(|_, _| (200, "{\"generated\":\"hi\"}".to_string()))).await?;
    let client = LlamaCpp::new(&endpoint(server.completion_url(), 0));

    let err = client.complete(request("x")).await.unwrap_err();

    assert!(matches!(err, ProviderError::ParseError(ref m) if m.contains("generated")), "{:?}", err);
    Ok(())
}

#[tokio::test]
async fn test_testConnection_shouldProbeHealth() -> Result<()> {
    let server = StubServer::start(Arc::new(|_, _| (200, "{\"status\":\"ok\"}".to_string()))).await?;
    let client = LlamaCpp::new(&endpoint(server.completion_url(), 0));

    client.test_connection().await?;

    assert!(server.requests()[0].0.starts_with("GET /health"));
    Ok(())
}

#[tokio::test]
async fn test_translationService_overHttp_shouldTranslateEveryCue() -> Result<()> {
    // Answers like a well-behaved model: one record per focus group
    let server = StubServer::start(Arc::new(|_, body| {
        let prompt = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| v["prompt"].as_str().map(str::to_string))
            .unwrap_or_default();
        let records: Vec<Value> = MockProvider::prompt_groups(&prompt)
            .into_iter()
            .filter(|g| g.role == GroupRole::Translate)
            .map(|g| json!({"group_id": g.group_id, "line": g.text.to_uppercase()}))
            .collect();
        let content = format!("```json\n{}\n```", json!({ "translations": records }));
        (200, json!({"content": content, "tokens_evaluated": 50, "tokens_predicted": 10, "total_time_s": 0.5}).to_string())
    }))
    .await?;

    let mut config = Config::default();
    config.endpoint = endpoint(server.completion_url(), 0);
    let service = TranslationService::new(config)?;
    service.test_connection().await?;

    let cues = vec![
        cue(1, &["We have to leave", "before it gets dark."]),
        cue(2, &["Pack only what you need."]),
    ];
    let outcome = service.translate_cues(&cues, |_| {}).await?;

    assert!(outcome.is_complete());
    assert_eq!(outcome.cues[0].text(), "WE HAVE TO LEAVE\nBEFORE IT GETS DARK.");
    assert_eq!(outcome.cues[1].lines, vec!["PACK ONLY WHAT YOU NEED."]);
    assert_eq!(outcome.stats.total_tokens(), 60 * outcome.window_count as u64);
    assert_eq!(server.requests().len(), 1 + outcome.window_count);
    Ok(())
}
