use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use url::Url;

use super::{Completion, CompletionRequest, CompletionStats, Provider};
use crate::app_config::EndpointConfig;
use crate::errors::ProviderError;

/// Client for a llama.cpp server `/completion` endpoint
#[derive(Debug)]
pub struct LlamaCpp {
    /// Full completion URL
    completion_url: String,
    /// HTTP client, one per run
    client: Client,
    /// Transport retries after the first attempt
    max_retries: u32,
    /// Base backoff time in milliseconds for exponential backoff
    backoff_base_ms: u64,
}

/// Request body for `/completion`
#[derive(Debug, Serialize)]
struct CompletionPayload<'a> {
    prompt: &'a str,
    n_predict: u32,
    temperature: f32,
    top_p: f32,
    repeat_penalty: f32,
}

impl LlamaCpp {
    /// Create a client from endpoint configuration
    ///
    /// Each request gets the configured timeout as its own deadline.
    pub fn new(config: &EndpointConfig) -> Self {
        Self {
            completion_url: config.url.clone(),
            client: Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .pool_idle_timeout(Duration::from_secs(90))
                .tcp_keepalive(Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            max_retries: config.retry_count,
            backoff_base_ms: config.retry_backoff_ms,
        }
    }

    // @returns: `/health` on the same server as the completion URL
    fn health_url(&self) -> Result<Url, ProviderError> {
        let url = Url::parse(&self.completion_url)
            .map_err(|e| ProviderError::RequestFailed(format!("Invalid endpoint URL {}: {}", self.completion_url, e)))?;
        url.join("/health")
            .map_err(|e| ProviderError::RequestFailed(format!("Invalid health URL: {}", e)))
    }

    async fn send_once(&self, payload: &CompletionPayload<'_>) -> Result<Value, ProviderError> {
        let response = self
            .client
            .post(&self.completion_url)
            .json(payload)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            return Err(ProviderError::ApiError { status_code: status.as_u16(), message });
        }

        let body = response.text().await.map_err(map_transport_error)?;
        serde_json::from_str(&body).map_err(|e| {
            ProviderError::ParseError(format!(
                "{}. Raw response (first 500 chars): {}",
                e,
                body.chars().take(500).collect::<String>()
            ))
        })
    }
}

fn map_transport_error(error: reqwest::Error) -> ProviderError {
    if error.is_timeout() {
        ProviderError::Timeout(error.to_string())
    } else if error.is_connect() {
        ProviderError::ConnectionError(error.to_string())
    } else {
        ProviderError::RequestFailed(error.to_string())
    }
}

/// Generated text from the response shapes different llama.cpp builds return
pub fn extract_content(raw: &Value) -> Option<&str> {
    if let Some(content) = raw.get("content").and_then(Value::as_str) {
        return Some(content);
    }
    if let Some(choice) = raw.get("choices").and_then(|c| c.get(0)) {
        if let Some(text) = choice.get("text").and_then(Value::as_str) {
            return Some(text);
        }
        if let Some(content) = choice.pointer("/message/content").and_then(Value::as_str) {
            return Some(content);
        }
    }
    raw.get("text").and_then(Value::as_str)
}

/// Token counts and timing, when the server reports them
pub fn extract_stats(raw: &Value) -> Option<CompletionStats> {
    let first_u64 = |obj: &Value, keys: &[&str]| keys.iter().find_map(|k| obj.get(*k).and_then(Value::as_u64));
    let first_f64 = |obj: &Value, keys: &[&str]| keys.iter().find_map(|k| obj.get(*k).and_then(Value::as_f64));

    if let Some(timings) = raw.get("timings") {
        let prompt = first_u64(timings, &["prompt_n", "prompt_tokens", "n_prompt_tokens"]);
        let predicted = first_u64(timings, &["predicted_n", "predicted_tokens", "n_predicted_tokens"]);
        if let (Some(prompt_tokens), Some(predicted_tokens)) = (prompt, predicted) {
            let total_ms = first_f64(timings, &["prompt_ms", "prompt_eval_ms"]).unwrap_or(0.0)
                + first_f64(timings, &["predicted_ms", "eval_ms"]).unwrap_or(0.0);
            if total_ms > 0.0 {
                return Some(CompletionStats {
                    prompt_tokens,
                    predicted_tokens,
                    elapsed: Duration::from_secs_f64(total_ms / 1000.0),
                });
            }
        }
    }

    let prompt_tokens = first_u64(raw, &["tokens_evaluated", "prompt_tokens"])?;
    let predicted_tokens = first_u64(raw, &["tokens_predicted", "predicted_tokens"])?;
    let total_secs = first_f64(raw, &["total_time_s", "total_time"]).filter(|s| *s > 0.0)?;
    Some(CompletionStats {
        prompt_tokens,
        predicted_tokens,
        elapsed: Duration::from_secs_f64(total_secs),
    })
}

#[async_trait]
impl Provider for LlamaCpp {
    fn name(&self) -> &str {
        "llama.cpp"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError> {
        let payload = CompletionPayload {
            prompt: &request.prompt,
            n_predict: request.max_tokens,
            temperature: request.temperature,
            top_p: request.top_p,
            repeat_penalty: request.repeat_penalty,
        };

        let mut attempt = 0;
        loop {
            match self.send_once(&payload).await {
                Ok(raw) => {
                    let text = extract_content(&raw).ok_or_else(|| {
                        let keys = raw
                            .as_object()
                            .map(|o| o.keys().cloned().collect::<Vec<_>>().join(", "))
                            .unwrap_or_default();
                        ProviderError::ParseError(format!("Unable to extract content from response keys [{}]", keys))
                    })?;
                    return Ok(Completion { text: text.to_string(), stats: extract_stats(&raw) });
                }
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let backoff_ms = self.backoff_base_ms * (1u64 << (attempt - 1));
                    warn!(
                        "Completion request failed (attempt {}/{}): {}; retrying in {} ms",
                        attempt,
                        self.max_retries + 1,
                        e,
                        backoff_ms
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        let url = self.health_url()?;
        debug!("Checking llama.cpp server at {}", url);
        let response = self.client.get(url).send().await.map_err(map_transport_error)?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(ProviderError::ApiError { status_code: status.as_u16(), message })
        }
    }
}
