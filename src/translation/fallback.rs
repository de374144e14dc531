/*!
 * Retry and shrink control.
 *
 * The per-window lifecycle is a small state machine with a pure transition
 * function, so the policy is testable without any networking. The driver
 * below feeds it real attempts: it retries at the same focus size, halves the
 * focus once retries at a size are used up, and reports a range as failed
 * only when nothing smaller is left to try.
 */

use log::{debug, error, info};
use std::collections::BTreeMap;

use crate::app_config::RetryConfig;
use crate::errors::{AttemptError, FatalWindowFailure};
use crate::providers::CompletionStats;
use super::client::WindowTranslator;
use super::windowing::{Window, WindowBuilder};

/// Retry state of one window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowAttemptState {
    pub current_focus_size: usize,
    pub attempts_at_this_size: u32,
    pub total_attempts: u32,
}

impl WindowAttemptState {
    pub fn new(focus_size: usize) -> Self {
        Self { current_focus_size: focus_size.max(1), attempts_at_this_size: 0, total_attempts: 0 }
    }

    /// Fresh attempts for the next chunk; the size can only stay or go down
    pub fn continue_with(self, remaining: usize) -> Self {
        Self {
            current_focus_size: self.current_focus_size.min(remaining).max(1),
            attempts_at_this_size: 0,
            total_attempts: self.total_attempts,
        }
    }
}

/// Result of one attempt, as the state machine sees it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Done,
    /// Same focus size again
    Retry(WindowAttemptState),
    /// Halved focus, retry counter reset
    Shrink(WindowAttemptState),
    /// Out of options for this range
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries_per_window: u32,
    pub shrink_focus_on_retry: bool,
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries_per_window: config.max_retries_per_window.max(1),
            shrink_focus_on_retry: config.shrink_focus_on_retry,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

/// Next state after an attempt
pub fn next_state(state: WindowAttemptState, outcome: AttemptOutcome, policy: RetryPolicy) -> Transition {
    if outcome == AttemptOutcome::Success {
        return Transition::Done;
    }

    let attempts = state.attempts_at_this_size + 1;
    let total_attempts = state.total_attempts + 1;
    if attempts < policy.max_retries_per_window {
        return Transition::Retry(WindowAttemptState { attempts_at_this_size: attempts, total_attempts, ..state });
    }
    if policy.shrink_focus_on_retry && state.current_focus_size > 1 {
        return Transition::Shrink(WindowAttemptState {
            current_focus_size: (state.current_focus_size / 2).max(1),
            attempts_at_this_size: 0,
            total_attempts,
        });
    }
    Transition::Failed
}

/// Everything one window produced, successes and failures alike
#[derive(Debug, Clone, Default)]
pub struct WindowReport {
    pub translations: BTreeMap<usize, String>,
    pub failures: Vec<FatalWindowFailure>,
    pub stats: Vec<CompletionStats>,
    pub attempts: u32,
}

/// Drives one scheduled window through the state machine
#[derive(Debug, Clone, Copy)]
pub struct RetryController {
    policy: RetryPolicy,
}

impl RetryController {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Translate the focus groups of `initial` until each is done or failed
    pub async fn run(&self, translator: &WindowTranslator, builder: &WindowBuilder<'_>, initial: &Window) -> WindowReport {
        let mut report = WindowReport::default();
        let (Some(start), Some(end)) = (
            initial.focus_group_ids.first().and_then(|id| builder.index_of(*id)),
            initial.focus_group_ids.last().and_then(|id| builder.index_of(*id)).map(|i| i + 1),
        ) else {
            return report;
        };

        let mut position = start;
        let mut state = WindowAttemptState::new(initial.focus_len());
        let mut last_error: Option<AttemptError> = None;

        while position < end {
            let window = builder.window_at(position, state.current_focus_size, end);
            state.current_focus_size = window.focus_len();

            let outcome = translator.translate_window(&window, builder.groups()).await;
            let attempt_outcome = match outcome {
                Ok(success) => {
                    report.translations.extend(success.result);
                    report.stats.extend(success.stats);
                    AttemptOutcome::Success
                }
                Err(e) => {
                    last_error = Some(e);
                    AttemptOutcome::Failure
                }
            };

            match next_state(state, attempt_outcome, self.policy) {
                Transition::Done => {
                    state.total_attempts += 1;
                    position += window.focus_len();
                    state = state.continue_with(end.saturating_sub(position));
                }
                Transition::Retry(next) => {
                    debug!("Window {}: retry {} at size {}", window.focus_label(), next.attempts_at_this_size, next.current_focus_size);
                    state = next;
                }
                Transition::Shrink(next) => {
                    info!(
                        "Window {}: shrinking focus {} -> {}",
                        window.focus_label(),
                        state.current_focus_size,
                        next.current_focus_size
                    );
                    state = next;
                }
                Transition::Failed => {
                    let failure = FatalWindowFailure {
                        group_ids: window.focus_group_ids.clone(),
                        last_error: last_error
                            .take()
                            .unwrap_or_else(|| AttemptError::RequestFailed("no attempt recorded".to_string())),
                    };
                    error!("{}", failure);
                    report.failures.push(failure);
                    state.total_attempts += 1;
                    position += window.focus_len();
                    state = state.continue_with(end.saturating_sub(position));
                }
            }
        }

        report.attempts = state.total_attempts;
        report
    }
}
