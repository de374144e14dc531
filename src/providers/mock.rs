/*!
 * Mock provider for testing.
 *
 * Reads the group array out of the prompt and answers for the focus groups,
 * so whole runs can be exercised without a server:
 * - `MockProvider::working()` - Always returns a valid payload
 * - `MockProvider::failing()` - Always fails with an endpoint error
 * - `MockProvider::new(MockBehavior::FailWhenFocusAbove { .. })` - Drops a group from large windows
 * - `with_script` - Canned responses consumed before the behavior applies
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{Completion, CompletionRequest, CompletionStats, Provider};
use crate::errors::ProviderError;
use crate::translation::prompts::{GroupRole, PromptGroup};

/// Behavior mode for the mock provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds with one record per focus group
    Working,
    /// Always fails with an endpoint error
    Failing,
    /// Fails every Nth request with a 503
    Intermittent { fail_every: usize },
    /// Answers with prose instead of JSON
    InvalidJson,
    /// Leaves out the last focus group whenever the focus is larger than `max_focus`
    FailWhenFocusAbove { max_focus: usize },
    /// Puts unescaped quotes inside every `line` value
    UnescapedQuotes,
    /// Succeeds after a delay (for concurrency and timeout tests)
    Slow { delay_ms: u64 },
}

type Translator = fn(&str) -> String;

fn default_translator(text: &str) -> String {
    format!("[fi] {}", text)
}

/// Mock provider for testing window translation
#[derive(Debug)]
pub struct MockProvider {
    /// Behavior mode
    behavior: MockBehavior,
    /// Request counter, shared between clones
    request_count: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    /// Canned responses, consumed first
    script: Arc<Mutex<VecDeque<Result<String, ProviderError>>>>,
    /// Every prompt received, in arrival order
    prompts: Arc<Mutex<Vec<String>>>,
    /// Group ids this mock never answers for
    broken_groups: Arc<Vec<usize>>,
    translator: Translator,
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
            script: Arc::new(Mutex::new(VecDeque::new())),
            prompts: Arc::new(Mutex::new(Vec::new())),
            broken_groups: Arc::new(Vec::new()),
            translator: default_translator,
        }
    }

    /// Create a working mock provider that always succeeds
    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    /// Create a failing mock provider that always errors
    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    /// Queue canned responses, served before the behavior applies
    pub fn with_script(self, responses: Vec<Result<String, ProviderError>>) -> Self {
        self.script.lock().extend(responses);
        self
    }

    /// Never return a record for these group ids
    pub fn with_broken_groups(mut self, group_ids: Vec<usize>) -> Self {
        self.broken_groups = Arc::new(group_ids);
        self
    }

    /// Set a custom translation function
    pub fn with_translator(mut self, translator: Translator) -> Self {
        self.translator = translator;
        self
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Highest number of requests that were in flight at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    /// Focus group ids of every request, in arrival order
    pub fn focus_history(&self) -> Vec<Vec<usize>> {
        self.prompts.lock().iter().map(|p| focus_ids(&prompt_groups(p))).collect()
    }

    /// Groups of the user message embedded in a prompt
    pub fn prompt_groups(prompt: &str) -> Vec<PromptGroup> {
        prompt_groups(prompt)
    }

    fn answer(&self, groups: &[PromptGroup], count: usize) -> Result<String, ProviderError> {
        let focus: Vec<&PromptGroup> = groups
            .iter()
            .filter(|g| g.role == GroupRole::Translate && !self.broken_groups.contains(&g.group_id))
            .collect();
        let translate = |g: &PromptGroup| (self.translator)(&g.text);

        match self.behavior {
            MockBehavior::Working | MockBehavior::Slow { .. } => Ok(render(&focus, translate)),
            MockBehavior::Failing => Err(ProviderError::ApiError {
                status_code: 500,
                message: "Simulated provider failure".to_string(),
            }),
            MockBehavior::Intermittent { fail_every } => {
                if fail_every > 0 && count % fail_every == fail_every - 1 {
                    Err(ProviderError::ApiError {
                        status_code: 503,
                        message: format!("Simulated intermittent failure (request #{})", count + 1),
                    })
                } else {
                    Ok(render(&focus, translate))
                }
            }
            MockBehavior::InvalidJson => Ok("Sorry, I can only translate one line at a time.".to_string()),
            MockBehavior::FailWhenFocusAbove { max_focus } => {
                let total_focus = groups.iter().filter(|g| g.role == GroupRole::Translate).count();
                if total_focus > max_focus {
                    Ok(render(&focus[..focus.len().saturating_sub(1)], translate))
                } else {
                    Ok(render(&focus, translate))
                }
            }
            MockBehavior::UnescapedQuotes => {
                let records: Vec<String> = focus
                    .iter()
                    .map(|g| {
                        let escaped = serde_json::Value::String(translate(*g)).to_string();
                        let body = &escaped[1..escaped.len() - 1];
                        format!(r#"{{"group_id":{},"line":"{} mutta "valta" on heillä."}}"#, g.group_id, body)
                    })
                    .collect();
                Ok(format!(r#"{{"translations":[{}]}}"#, records.join(",")))
            }
        }
    }
}

fn prompt_groups(prompt: &str) -> Vec<PromptGroup> {
    prompt
        .lines()
        .rev()
        .filter(|line| line.trim_start().starts_with("[{"))
        .find_map(|line| serde_json::from_str(line.trim()).ok())
        .unwrap_or_default()
}

fn focus_ids(groups: &[PromptGroup]) -> Vec<usize> {
    groups.iter().filter(|g| g.role == GroupRole::Translate).map(|g| g.group_id).collect()
}

fn render(focus: &[&PromptGroup], translate: impl Fn(&PromptGroup) -> String) -> String {
    let records: Vec<serde_json::Value> = focus
        .iter()
        .map(|g| json!({"group_id": g.group_id, "line": translate(*g)}))
        .collect();
    json!({ "translations": records }).to_string()
}

impl Clone for MockProvider {
    fn clone(&self) -> Self {
        Self {
            behavior: self.behavior,
            request_count: Arc::clone(&self.request_count),
            in_flight: Arc::clone(&self.in_flight),
            max_in_flight: Arc::clone(&self.max_in_flight),
            script: Arc::clone(&self.script),
            prompts: Arc::clone(&self.prompts),
            broken_groups: Arc::clone(&self.broken_groups),
            translator: self.translator,
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.prompts.lock().push(request.prompt.clone());

        let delay_ms = match self.behavior {
            MockBehavior::Slow { delay_ms } => delay_ms,
            // Yield so concurrent requests actually overlap
            _ => 1,
        };
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;

        let scripted = self.script.lock().pop_front();
        let result = match scripted {
            Some(response) => response,
            None => self.answer(&prompt_groups(&request.prompt), count),
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        result.map(|text| Completion {
            stats: Some(CompletionStats {
                prompt_tokens: request.prompt.len().div_ceil(4) as u64,
                predicted_tokens: text.len().div_ceil(4) as u64,
                elapsed: Duration::from_millis(delay_ms.max(1)),
            }),
            text,
        })
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        match self.behavior {
            MockBehavior::Failing => Err(ProviderError::ConnectionError("Simulated connection failure".to_string())),
            _ => Ok(()),
        }
    }
}
