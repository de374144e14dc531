/*!
 * Window building.
 *
 * A window is one request's scope: a contiguous run of focus groups to
 * translate plus a few adjacent context groups the model only reads. Every
 * group is the focus of exactly one window, in file order.
 */

use anyhow::{anyhow, Result};
use std::ops::Range;

use crate::app_config::{WindowConfig, MIN_WINDOW_CHARS};
use super::grouping::Group;

/// Per-group cost on top of its text: JSON keys, role and separators in the prompt
pub const GROUP_OVERHEAD_CHARS: usize = 48;

/// Focus and context group ids for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    pub focus_group_ids: Vec<usize>,
    pub context_pre_ids: Vec<usize>,
    pub context_post_ids: Vec<usize>,
}

impl Window {
    pub fn focus_len(&self) -> usize {
        self.focus_group_ids.len()
    }

    // @returns: "first-last" focus ids for logs
    pub fn focus_label(&self) -> String {
        match (self.focus_group_ids.first(), self.focus_group_ids.last()) {
            (Some(first), Some(last)) if first != last => format!("{}-{}", first, last),
            (Some(first), _) => first.to_string(),
            _ => "-".to_string(),
        }
    }
}

/// Windowing parameters resolved from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowParams {
    pub max_window_chars: usize,
    pub context_pre_groups: usize,
    pub context_post_groups: usize,
}

impl From<&WindowConfig> for WindowParams {
    fn from(config: &WindowConfig) -> Self {
        Self {
            max_window_chars: config.max_window_chars,
            context_pre_groups: config.context_pre_groups,
            context_post_groups: config.context_post_groups,
        }
    }
}

/// Builds windows over a fixed group sequence
#[derive(Debug, Clone)]
pub struct WindowBuilder<'a> {
    groups: &'a [Group],
    params: WindowParams,
    /// `cost_prefix[i]` is the summed cost of groups `0..i`
    cost_prefix: Vec<usize>,
}

impl<'a> WindowBuilder<'a> {
    pub fn new(groups: &'a [Group], params: WindowParams) -> Result<Self> {
        if params.max_window_chars <= MIN_WINDOW_CHARS {
            return Err(anyhow!(
                "max_window_chars must be greater than {}, got {}",
                MIN_WINDOW_CHARS,
                params.max_window_chars
            ));
        }
        let cost_prefix = std::iter::once(0)
            .chain(groups.iter().scan(0, |total, group| {
                *total += group.char_len() + GROUP_OVERHEAD_CHARS;
                Some(*total)
            }))
            .collect();
        Ok(Self { groups, params, cost_prefix })
    }

    pub fn groups(&self) -> &'a [Group] {
        self.groups
    }

    /// Prompt cost of one group, by index
    pub fn group_cost(&self, index: usize) -> usize {
        self.groups[index].char_len() + GROUP_OVERHEAD_CHARS
    }

    fn range_cost(&self, range: Range<usize>) -> usize {
        self.cost_prefix[range.end] - self.cost_prefix[range.start]
    }

    // Focus plus clipped context; never decreases as the focus grows
    fn window_cost(&self, focus: &Range<usize>) -> usize {
        let pre_start = focus.start.saturating_sub(self.params.context_pre_groups);
        let post_end = (focus.end + self.params.context_post_groups).min(self.groups.len());
        self.range_cost(pre_start..post_end)
    }

    /// Cover all groups with windows of at most `target_focus` focus groups
    pub fn build_all(&self, target_focus: usize) -> Vec<Window> {
        let mut windows = Vec::new();
        let mut start = 0;
        while start < self.groups.len() {
            let window = self.window_at(start, target_focus, self.groups.len());
            start += window.focus_len();
            windows.push(window);
        }
        windows
    }

    /// Window whose focus starts at group index `start`.
    ///
    /// The focus holds at most `target_focus` groups and never reaches past
    /// `limit`. It is the largest size whose focus and context fit the
    /// character budget; a single focus group is kept regardless, dropping
    /// context farthest-first instead.
    pub fn window_at(&self, start: usize, target_focus: usize, limit: usize) -> Window {
        let limit = limit.min(self.groups.len());
        let budget = self.params.max_window_chars;
        let max_size = target_focus.max(1).min(limit.saturating_sub(start)).max(1);

        // Growing the focus moves one group out of the post context and
        // pulls in one further group, so the cost is monotone in the size
        let (mut fits, mut too_big) = (0, max_size + 1);
        while too_big - fits > 1 {
            let size = fits + (too_big - fits) / 2;
            if self.window_cost(&(start..start + size)) <= budget {
                fits = size;
            } else {
                too_big = size;
            }
        }

        let focus = start..start + fits.max(1);
        let (pre, post) = self.context_for(&focus);
        if fits == 0 {
            let (pre, post) = self.trim_context(&focus, pre, post);
            return self.make_window(focus, pre, post);
        }
        self.make_window(focus, pre, post)
    }

    fn context_for(&self, focus: &Range<usize>) -> (Range<usize>, Range<usize>) {
        let pre_start = focus.start.saturating_sub(self.params.context_pre_groups);
        let post_end = (focus.end + self.params.context_post_groups).min(self.groups.len());
        (pre_start..focus.start, focus.end..post_end)
    }

    fn trim_context(
        &self,
        focus: &Range<usize>,
        mut pre: Range<usize>,
        mut post: Range<usize>,
    ) -> (Range<usize>, Range<usize>) {
        let budget = self.params.max_window_chars;
        let focus_cost = self.range_cost(focus.clone());
        loop {
            let cost = focus_cost + self.range_cost(pre.clone()) + self.range_cost(post.clone());
            if cost <= budget || (pre.is_empty() && post.is_empty()) {
                return (pre, post);
            }
            let pre_distance = if pre.is_empty() { 0 } else { focus.start - pre.start };
            let post_distance = if post.is_empty() { 0 } else { post.end - focus.end };
            if pre_distance >= post_distance && !pre.is_empty() {
                pre.start += 1;
            } else {
                post.end -= 1;
            }
        }
    }

    fn make_window(&self, focus: Range<usize>, pre: Range<usize>, post: Range<usize>) -> Window {
        let ids = |range: Range<usize>| range.map(|i| self.groups[i].group_id).collect::<Vec<_>>();
        Window {
            focus_group_ids: ids(focus),
            context_pre_ids: ids(pre),
            context_post_ids: ids(post),
        }
    }

    /// Index of a group id in the sequence
    pub fn index_of(&self, group_id: usize) -> Option<usize> {
        // Ids are assigned 1..=n in order
        let index = group_id.checked_sub(1)?;
        (self.groups.get(index)?.group_id == group_id).then_some(index)
    }
}
