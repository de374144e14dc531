/*!
 * Completion endpoint providers.
 *
 * This module contains the client side of the completion protocol:
 * - LlamaCpp: a llama.cpp server `/completion` endpoint
 * - Mock: a scripted, in-process provider for tests
 */

use async_trait::async_trait;
use std::fmt::Debug;
use std::time::Duration;

use crate::app_config::SamplingConfig;
use crate::errors::ProviderError;

/// One raw-prompt completion request with its sampling parameters
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub repeat_penalty: f32,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>, sampling: &SamplingConfig) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens: sampling.max_tokens,
            temperature: sampling.temperature,
            top_p: sampling.top_p,
            repeat_penalty: sampling.repeat_penalty,
        }
    }
}

/// Token counts and timing reported by the endpoint
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionStats {
    pub prompt_tokens: u64,
    pub predicted_tokens: u64,
    pub elapsed: Duration,
}

impl CompletionStats {
    // @returns: Prompt plus predicted tokens per second, None without timing
    pub fn tokens_per_second(&self) -> Option<f64> {
        let secs = self.elapsed.as_secs_f64();
        (secs > 0.0).then(|| (self.prompt_tokens + self.predicted_tokens) as f64 / secs)
    }
}

/// Completion text with optional timing stats
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    /// Only used for progress reporting
    pub stats: Option<CompletionStats>,
}

/// Common trait for completion endpoints
///
/// Object safe, so the engine holds an `Arc<dyn Provider>` and tests can swap
/// in the mock.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Complete a raw prompt
    ///
    /// # Returns
    /// * `Result<Completion, ProviderError>` - The generated text or a transport/endpoint error
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError>;

    /// Test the connection to the endpoint
    async fn test_connection(&self) -> Result<(), ProviderError>;
}

pub mod llama;
pub mod mock;

pub use llama::LlamaCpp;
pub use mock::{MockBehavior, MockProvider};
