/*!
 * Prompt templates for window translation.
 *
 * The system prompt explains the context/translate roles and the strict
 * one-record-per-group output contract; the user message is a compact JSON
 * array of groups. Both are wrapped in the chat markup of the selected model
 * family because the completion endpoint takes a raw prompt string.
 */

use serde::{Deserialize, Serialize};

use crate::app_config::ChatTemplate;
use crate::translation::grouping::Group;
use crate::translation::windowing::Window;

/// System prompt template for window translation.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    /// The template string with placeholders
    template: String,
}

impl PromptTemplate {
    /// The default system prompt.
    pub const SUBTITLE_TRANSLATOR: &'static str = r#"You are a professional subtitle translator from {source_language} to {target_language}.

INPUT
The user message is a JSON array of groups:
- group_id: integer, copy it back exactly for every group you translate
- role: "context" or "translate"
- text: a subtitle phrase in {source_language}

TASK
- Read every group, including role="context", to understand meaning and resolve ambiguity.
- Translate ONLY the groups with role="translate".
- Output nothing for role="context" groups.

STRICT ALIGNMENT RULES
- Do not move meaning or words from one group to another.
- Do not merge or split groups, and do not carry a sentence over into the next group.
- If a group is a fragment, translate only that fragment.
- Keep formatting tags such as <i>, <b> or {\an8} exactly as they appear.

STYLE
- Write natural, idiomatic {target_language} suitable for on-screen subtitles.
- Be concise and keep the register, including profanity, of the original.

SPECIAL
- If the text is exactly "♪", output exactly "♪".

OUTPUT
- Exactly one record per role="translate" group_id, in input order.
- Output ONLY valid JSON, with no commentary and no code fences:
{"translations":[{"group_id":1,"line":"..."}]}"#;

    /// Create a new prompt template.
    pub fn new(template: &str) -> Self {
        Self {
            template: template.to_string(),
        }
    }

    /// Create the default subtitle translator template.
    pub fn subtitle_translator() -> Self {
        Self::new(Self::SUBTITLE_TRANSLATOR)
    }

    /// Render the template with the given variables.
    pub fn render(&self, source_language: &str, target_language: &str) -> String {
        self.template
            .replace("{source_language}", source_language)
            .replace("{target_language}", target_language)
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::subtitle_translator()
    }
}

/// Whether a group is to be translated or only read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupRole {
    Context,
    Translate,
}

/// One group as it appears in the user message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptGroup {
    pub group_id: usize,
    pub role: GroupRole,
    pub text: String,
}

/// A fully rendered request prompt
#[derive(Debug, Clone)]
pub struct RenderedPrompt {
    /// Complete prompt sent to the endpoint
    pub text: String,
    /// The compact user JSON embedded in `text`
    pub user_json: String,
}

impl RenderedPrompt {
    // @returns: Prompt size in characters
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    // @returns: Rough token estimate, four characters per token
    pub fn estimated_tokens(&self) -> usize {
        self.char_len().div_ceil(4)
    }
}

/// Wrap system and user messages in the chat markup of a model family
pub fn wrap_chat(template: ChatTemplate, system_prompt: &str, user_json: &str) -> String {
    match template {
        ChatTemplate::Gemma3 => format!(
            "<start_of_turn>system\n{}\n<end_of_turn>\n<start_of_turn>user\n{}\n<end_of_turn>\n<start_of_turn>model\n",
            system_prompt, user_json
        ),
        ChatTemplate::Llama3 => format!(
            "<|begin_of_text|><|start_header_id|>system<|end_header_id|>\n{}\n<|start_header_id|>user<|end_header_id|>\n{}\n<|start_header_id|>assistant<|end_header_id|>\n",
            system_prompt, user_json
        ),
        ChatTemplate::Qwen3 => format!(
            "<|im_start|>system\n{}\n<|im_end|>\n<|im_start|>user\n{}\n<|im_end|>\n<|im_start|>assistant\n",
            system_prompt, user_json
        ),
    }
}

/// Builder for window prompts.
#[derive(Debug, Clone)]
pub struct TranslationPromptBuilder {
    source_language: String,
    target_language: String,
    chat_template: ChatTemplate,
    system_template: PromptTemplate,
}

impl TranslationPromptBuilder {
    /// Create a new prompt builder.
    pub fn new(source_language: &str, target_language: &str) -> Self {
        Self {
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
            chat_template: ChatTemplate::default(),
            system_template: PromptTemplate::default(),
        }
    }

    /// Set the chat markup.
    pub fn with_chat_template(mut self, chat_template: ChatTemplate) -> Self {
        self.chat_template = chat_template;
        self
    }

    /// Replace the system prompt template.
    pub fn with_system_template(mut self, template: PromptTemplate) -> Self {
        self.system_template = template;
        self
    }

    /// Build the system prompt.
    pub fn build_system_prompt(&self) -> String {
        self.system_template.render(&self.source_language, &self.target_language)
    }

    /// Groups of a window in reading order, context before and after the focus.
    ///
    /// `groups` is the whole sequence; ids index into it.
    pub fn prompt_groups(window: &Window, groups: &[Group]) -> Vec<PromptGroup> {
        let lookup = |id: &usize, role: GroupRole| {
            groups.get(id.wrapping_sub(1)).map(|group| PromptGroup {
                group_id: group.group_id,
                role,
                text: group.source_text.clone(),
            })
        };

        window
            .context_pre_ids
            .iter()
            .filter_map(|id| lookup(id, GroupRole::Context))
            .chain(window.focus_group_ids.iter().filter_map(|id| lookup(id, GroupRole::Translate)))
            .chain(window.context_post_ids.iter().filter_map(|id| lookup(id, GroupRole::Context)))
            .collect()
    }

    /// Build the user message as compact JSON.
    pub fn build_user_prompt(&self, window: &Window, groups: &[Group]) -> Result<String, serde_json::Error> {
        serde_json::to_string(&Self::prompt_groups(window, groups))
    }

    /// Build the complete prompt for one window.
    pub fn build(&self, window: &Window, groups: &[Group]) -> Result<RenderedPrompt, serde_json::Error> {
        let user_json = self.build_user_prompt(window, groups)?;
        let text = wrap_chat(self.chat_template, &self.build_system_prompt(), &user_json);
        Ok(RenderedPrompt { text, user_json })
    }
}
