/*!
 * Core translation service implementation.
 *
 * This module contains the TranslationService, which runs the whole engine
 * for one subtitle file: flatten cues into items, group items into sentences,
 * cut groups into windows, translate the windows concurrently, split the
 * translations back over the items and reflow every cue to its original
 * line count.
 */

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::app_config::Config;
use crate::errors::{FatalWindowFailure, ReconstructionError};
use crate::language_utils::prompt_label;
use crate::providers::{LlamaCpp, Provider};
use crate::subtitle_processor::Cue;
use super::client::WindowTranslator;
use super::coordinator::{ProgressUpdate, TokenUsageStats, WindowCoordinator};
use super::fallback::{RetryController, RetryPolicy};
use super::grouping::{one_to_one, Group, GroupingLimits, SentenceGrouper};
use super::items::{flatten, items_by_cue, Item};
use super::prompts::TranslationPromptBuilder;
use super::reflow::reflow_lines;
use super::splitback::split_group;
use super::windowing::{WindowBuilder, WindowParams};

/// Result of translating one file's cues
#[derive(Debug, Clone)]
pub struct TranslationOutcome {
    /// Output cues, same count and timing as the input
    pub cues: Vec<Cue>,
    /// Group ids left untranslated; their cues keep the source text
    pub failed_groups: Vec<usize>,
    pub failures: Vec<FatalWindowFailure>,
    /// Non-fatal split-back notes
    pub notes: Vec<ReconstructionError>,
    pub stats: TokenUsageStats,
    pub group_count: usize,
    pub window_count: usize,
}

impl TranslationOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed_groups.is_empty()
    }
}

/// Translation service for subtitle files
#[derive(Debug, Clone)]
pub struct TranslationService {
    /// Completion endpoint
    provider: Arc<dyn Provider>,

    /// Configuration for the run
    pub config: Config,
}

impl TranslationService {
    /// Create a service talking to the configured llama.cpp endpoint
    pub fn new(config: Config) -> Result<Self> {
        config.validate().context("Invalid configuration")?;
        let provider = Arc::new(LlamaCpp::new(&config.endpoint));
        Ok(Self { provider, config })
    }

    /// Create a service with any provider, typically a mock in tests
    pub fn with_provider(config: Config, provider: Arc<dyn Provider>) -> Self {
        Self { provider, config }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Test the connection to the endpoint
    pub async fn test_connection(&self) -> Result<()> {
        self.provider
            .test_connection()
            .await
            .with_context(|| format!("Cannot reach {} endpoint at {}", self.provider.name(), self.config.endpoint.url))
    }

    fn prompt_builder(&self) -> Result<TranslationPromptBuilder> {
        let source = prompt_label(&self.config.source_language)?;
        let target = prompt_label(&self.config.target_language)?;
        Ok(TranslationPromptBuilder::new(&source, &target).with_chat_template(self.config.endpoint.template))
    }

    /// Partition items into groups according to the grouping settings
    pub fn group_items(&self, items: &[Item]) -> Vec<Group> {
        if self.config.grouping.enabled {
            SentenceGrouper::new(GroupingLimits::from(&self.config.grouping)).group(items)
        } else {
            one_to_one(items)
        }
    }

    /// Translate cues end to end.
    ///
    /// Always returns a cue sequence of the same length and timing; groups
    /// that could not be translated are listed in the outcome and their cues
    /// keep the source lines.
    pub async fn translate_cues<F>(&self, cues: &[Cue], progress: F) -> Result<TranslationOutcome>
    where
        F: Fn(&ProgressUpdate),
    {
        let items = flatten(cues);
        let groups = self.group_items(&items);
        info!("{} cues, {} lines, {} groups", cues.len(), items.len(), groups.len());

        // Groups without text need no request; the rest are renumbered for the model
        let (requested, requested_ids): (Vec<Group>, Vec<usize>) = groups
            .iter()
            .filter(|g| !g.source_text.trim().is_empty())
            .enumerate()
            .map(|(i, g)| (Group { group_id: i + 1, ..g.clone() }, g.group_id))
            .unzip();

        let mut translations: BTreeMap<usize, String> = BTreeMap::new();
        let mut failures = Vec::new();
        let mut stats = TokenUsageStats::new();
        let mut window_count = 0;

        if !requested.is_empty() {
            let builder = WindowBuilder::new(&requested, WindowParams::from(&self.config.window))?;
            let windows = builder.build_all(self.config.window.max_focus_groups.unwrap_or(usize::MAX));
            window_count = windows.len();
            debug!("Built {} windows", window_count);

            let translator = WindowTranslator::new(
                Arc::clone(&self.provider),
                self.prompt_builder()?,
                self.config.sampling.clone(),
            );
            let controller = RetryController::new(RetryPolicy::from(&self.config.retry));
            let coordinator = WindowCoordinator::new(translator, controller, self.config.concurrency);
            let report = coordinator.run(&builder, windows, progress).await;

            let original_id = |id: usize| requested_ids.get(id.wrapping_sub(1)).copied().unwrap_or(id);
            translations = report
                .translations
                .into_iter()
                .map(|(id, text)| (original_id(id), text))
                .collect();
            failures = report
                .failures
                .into_iter()
                .map(|mut f| {
                    f.group_ids = f.group_ids.iter().map(|id| original_id(*id)).collect();
                    f
                })
                .collect();
            stats = report.stats;
        }

        let failed: BTreeSet<usize> = failures.iter().flat_map(|f| f.group_ids.iter().copied()).collect();
        let (texts, group_of, notes) = self.split_back(&items, &groups, &translations, &failed);
        let cues = self.assemble(cues, &items, &texts, &group_of, &failed);

        if !failed.is_empty() {
            warn!("{} of {} groups could not be translated", failed.len(), groups.len());
        }

        Ok(TranslationOutcome {
            cues,
            failed_groups: failed.into_iter().collect(),
            failures,
            notes,
            stats,
            group_count: groups.len(),
            window_count,
        })
    }

    // @returns: Text per item position, owning group per position, split-back notes
    fn split_back(
        &self,
        items: &[Item],
        groups: &[Group],
        translations: &BTreeMap<usize, String>,
        failed: &BTreeSet<usize>,
    ) -> (Vec<String>, Vec<usize>, Vec<ReconstructionError>) {
        let mut texts: Vec<String> = items.iter().map(|item| item.text.clone()).collect();
        let mut group_of = vec![0; items.len()];
        let mut notes = Vec::new();

        for group in groups {
            for &position in &group.item_positions {
                group_of[position - 1] = group.group_id;
            }
            if failed.contains(&group.group_id) {
                continue;
            }
            let Some(translated) = translations.get(&group.group_id) else {
                // Empty source groups were never sent
                continue;
            };

            // Lines that were empty in the source stay empty
            let targets: Vec<usize> = group
                .item_positions
                .iter()
                .copied()
                .filter(|p| !items[p - 1].text.is_empty())
                .collect();
            let weights: Vec<f64> = targets.iter().map(|p| items[p - 1].duration_share).collect();
            let split = split_group(group.group_id, translated, &weights, self.config.splitback.min_chunk_chars);
            for (&position, fragment) in targets.iter().zip(&split.fragments) {
                texts[position - 1] = fragment.trim().to_string();
            }
            notes.extend(split.note);
        }

        (texts, group_of, notes)
    }

    fn assemble(
        &self,
        cues: &[Cue],
        items: &[Item],
        texts: &[String],
        group_of: &[usize],
        failed: &BTreeSet<usize>,
    ) -> Vec<Cue> {
        let ranges = items_by_cue(cues.len(), items);
        cues.iter()
            .zip(ranges)
            .map(|(cue, range)| {
                let all_failed = !range.is_empty() && range.clone().all(|i| failed.contains(&group_of[i]));
                if all_failed {
                    return cue.clone();
                }
                let combined = texts[range]
                    .iter()
                    .map(|t| t.trim())
                    .filter(|t| !t.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ");
                let lines = reflow_lines(&combined, cue.lines.len().max(1), self.config.splitback.split_max_line_chars);
                cue.with_lines(lines)
            })
            .collect()
    }
}
