/*!
 * Concurrent window execution.
 *
 * Windows are started in file order and run through their own retry/shrink
 * lifecycle, at most `concurrency` at a time. Results land in write-once
 * slots keyed by group id; a failure in one window never cancels the others.
 */

use futures::stream::{self, StreamExt};
use log::{error, info};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::errors::FatalWindowFailure;
use crate::providers::CompletionStats;
use super::client::WindowTranslator;
use super::fallback::{RetryController, WindowReport};
use super::windowing::{Window, WindowBuilder};

/// Token usage statistics for a run
#[derive(Debug, Clone)]
pub struct TokenUsageStats {
    pub prompt_tokens: u64,
    pub predicted_tokens: u64,
    /// Requests that reported timing
    pub timed_requests: u64,
    /// Endpoint-reported processing time
    pub api_duration: Duration,
    pub start_time: Instant,
}

impl Default for TokenUsageStats {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenUsageStats {
    pub fn new() -> Self {
        Self {
            prompt_tokens: 0,
            predicted_tokens: 0,
            timed_requests: 0,
            api_duration: Duration::ZERO,
            start_time: Instant::now(),
        }
    }

    pub fn add(&mut self, stats: &CompletionStats) {
        self.prompt_tokens += stats.prompt_tokens;
        self.predicted_tokens += stats.predicted_tokens;
        self.timed_requests += 1;
        self.api_duration += stats.elapsed;
    }

    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.predicted_tokens
    }

    // @returns: Average endpoint throughput, None before any timed request
    pub fn tokens_per_second(&self) -> Option<f64> {
        let secs = self.api_duration.as_secs_f64();
        (secs > 0.0).then(|| self.total_tokens() as f64 / secs)
    }

    /// Generate a summary of token usage
    pub fn summary(&self) -> String {
        format!(
            "Token Usage Summary:\n\
             Prompt tokens: {}\n\
             Predicted tokens: {}\n\
             Total tokens: {}\n\
             Elapsed time: {}\n\
             Endpoint time: {}\n\
             Tokens per second: {}",
            self.prompt_tokens,
            self.predicted_tokens,
            self.total_tokens(),
            format_eta(self.start_time.elapsed()),
            format_eta(self.api_duration),
            self.tokens_per_second().map_or("n/a".to_string(), |tps| format!("{:.1}", tps))
        )
    }
}

/// "1h 2m 3s", "2m 3s" or "3s"
pub fn format_eta(duration: Duration) -> String {
    let secs = duration.as_secs_f64().round() as u64;
    let (hours, rem) = (secs / 3600, secs % 3600);
    let (minutes, seconds) = (rem / 60, rem % 60);
    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Progress after a window reached a terminal state
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub windows_done: usize,
    pub windows_total: usize,
    pub groups_done: usize,
    pub groups_total: usize,
    pub tokens_per_second: Option<f64>,
    pub eta: Option<Duration>,
}

impl ProgressUpdate {
    pub fn eta_label(&self) -> String {
        self.eta.map_or_else(|| "?".to_string(), format_eta)
    }
}

/// Write-once translation slot per group id
#[derive(Debug, Default)]
pub struct ResultSlots {
    slots: BTreeMap<usize, String>,
}

impl ResultSlots {
    /// Store a translation; a second write for the same group is refused
    pub fn fill(&mut self, group_id: usize, text: String) -> bool {
        if self.slots.contains_key(&group_id) {
            error!("Group {} was translated twice; keeping the first result", group_id);
            return false;
        }
        self.slots.insert(group_id, text);
        true
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn into_inner(self) -> BTreeMap<usize, String> {
        self.slots
    }
}

/// Outcome of all windows
#[derive(Debug, Clone)]
pub struct CoordinatorReport {
    pub translations: BTreeMap<usize, String>,
    pub failures: Vec<FatalWindowFailure>,
    pub stats: TokenUsageStats,
}

/// Runs windows with bounded concurrency
#[derive(Debug, Clone)]
pub struct WindowCoordinator {
    translator: WindowTranslator,
    controller: RetryController,
    concurrency: usize,
}

impl WindowCoordinator {
    pub fn new(translator: WindowTranslator, controller: RetryController, concurrency: usize) -> Self {
        Self { translator, controller, concurrency: concurrency.max(1) }
    }

    /// Run every window to a terminal state.
    ///
    /// `progress` is called once per finished window, from the collecting task.
    pub async fn run<F>(&self, builder: &WindowBuilder<'_>, windows: Vec<Window>, progress: F) -> CoordinatorReport
    where
        F: Fn(&ProgressUpdate),
    {
        let windows_total = windows.len();
        let groups_total: usize = windows.iter().map(Window::focus_len).sum();
        let started = Instant::now();

        let mut slots = ResultSlots::default();
        let mut failures = Vec::new();
        let mut stats = TokenUsageStats::new();
        let mut windows_done = 0;
        let mut groups_done = 0;

        let mut reports = stream::iter(windows)
            .map(|window| async move {
                let report: WindowReport = self.controller.run(&self.translator, builder, &window).await;
                (window, report)
            })
            .buffer_unordered(self.concurrency);

        while let Some((window, report)) = reports.next().await {
            for (group_id, text) in report.translations {
                slots.fill(group_id, text);
            }
            for completion in &report.stats {
                stats.add(completion);
            }
            failures.extend(report.failures);

            windows_done += 1;
            groups_done += window.focus_len();
            let eta = (groups_done > 0 && groups_done < groups_total).then(|| {
                let per_group = started.elapsed().as_secs_f64() / groups_done as f64;
                Duration::from_secs_f64(per_group * (groups_total - groups_done) as f64)
            });
            let update = ProgressUpdate {
                windows_done,
                windows_total,
                groups_done,
                groups_total,
                tokens_per_second: stats.tokens_per_second(),
                eta,
            };
            info!(
                "Windows {}/{} | groups {}/{} | {} tok/s | ETA {}",
                windows_done,
                windows_total,
                groups_done,
                groups_total,
                update.tokens_per_second.map_or("?".to_string(), |tps| format!("{:.1}", tps)),
                update.eta_label()
            );
            progress(&update);
        }

        failures.sort_by_key(|f: &FatalWindowFailure| f.group_ids.first().copied().unwrap_or(0));
        CoordinatorReport { translations: slots.into_inner(), failures, stats }
    }
}
