/*!
 * Prompt construction for window translation.
 *
 * This module provides:
 * - The system prompt template with context/translate semantics
 * - The compact JSON user message for one window
 * - Chat markup for the supported model families
 */

pub mod templates;

// Re-export main types
pub use templates::{
    wrap_chat, GroupRole, PromptGroup, PromptTemplate, RenderedPrompt, TranslationPromptBuilder,
};
