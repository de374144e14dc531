/*!
 * Window translation client.
 *
 * One attempt at one window: render the prompt, call the endpoint, repair
 * and parse the output, then validate coverage. Every failure comes back as
 * an `AttemptError` for the retry controller to act on.
 */

use log::{debug, warn};
use std::sync::Arc;

use crate::app_config::SamplingConfig;
use crate::errors::AttemptError;
use crate::providers::{CompletionRequest, CompletionStats, Provider};
use super::grouping::Group;
use super::prompts::TranslationPromptBuilder;
use super::repair::{parse_with_repair, RepairRule};
use super::validation::{validate_coverage, TranslationResult};
use super::windowing::Window;

/// Raw output is cut to this many characters in logs
const LOG_OUTPUT_CHARS: usize = 800;

/// Head of `text` with a marker for what was cut
pub fn truncate_for_log(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars).collect();
    format!("{} ... [truncated {} chars]", head, total - max_chars)
}

/// A validated attempt
#[derive(Debug, Clone)]
pub struct AttemptSuccess {
    pub result: TranslationResult,
    pub stats: Option<CompletionStats>,
    /// Repair rules the output needed
    pub repairs: Vec<RepairRule>,
}

/// Translates one window per call
#[derive(Debug, Clone)]
pub struct WindowTranslator {
    provider: Arc<dyn Provider>,
    prompt_builder: TranslationPromptBuilder,
    sampling: SamplingConfig,
}

impl WindowTranslator {
    pub fn new(provider: Arc<dyn Provider>, prompt_builder: TranslationPromptBuilder, sampling: SamplingConfig) -> Self {
        Self { provider, prompt_builder, sampling }
    }

    /// Run one attempt for `window`; `groups` is the whole group sequence
    pub async fn translate_window(&self, window: &Window, groups: &[Group]) -> Result<AttemptSuccess, AttemptError> {
        let label = window.focus_label();
        let prompt = self
            .prompt_builder
            .build(window, groups)
            .map_err(|e| AttemptError::RequestFailed(format!("Failed to render prompt: {}", e)))?;

        debug!(
            "Window {}: focus={} ctx_pre={} ctx_post={} prompt_chars={} (~{} tok) user_json_chars={}",
            label,
            window.focus_len(),
            window.context_pre_ids.len(),
            window.context_post_ids.len(),
            prompt.char_len(),
            prompt.estimated_tokens(),
            prompt.user_json.chars().count()
        );

        let request = CompletionRequest::new(prompt.text, &self.sampling);
        let completion = match self.provider.complete(request).await {
            Ok(completion) => completion,
            Err(e) => {
                warn!("Window {}: RequestFailed: {}", label, e);
                return Err(e.into());
            }
        };

        if let Some(tps) = completion.stats.as_ref().and_then(CompletionStats::tokens_per_second) {
            debug!("Window {}: {:.1} tok/s", label, tps);
        }

        let outcome = parse_with_repair(&completion.text).and_then(|repaired| {
            validate_coverage(&repaired.value, &window.focus_group_ids).map(|result| (result, repaired.applied))
        });

        match outcome {
            Ok((result, repairs)) => {
                if !repairs.is_empty() {
                    debug!(
                        "Window {}: output repaired with {}",
                        label,
                        repairs.iter().map(RepairRule::name).collect::<Vec<_>>().join(", ")
                    );
                }
                Ok(AttemptSuccess { result, stats: completion.stats, repairs })
            }
            Err(e) => {
                warn!("Window {}: {}: {}", label, e.kind(), e);
                debug!(
                    "Window {} raw output: {}",
                    label,
                    truncate_for_log(&completion.text, LOG_OUTPUT_CHARS)
                );
                Err(e)
            }
        }
    }
}
