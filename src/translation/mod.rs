/*!
 * Subtitle translation engine.
 *
 * The engine is split into several submodules, in pipeline order:
 *
 * - `items`: Flattening cues into positionally addressable items
 * - `sentence` / `grouping`: Sentence-safe grouping of items
 * - `windowing`: Focus and context windows sized to a character budget
 * - `prompts` / `client`: Prompt rendering and one attempt per window
 * - `repair` / `validation`: Tolerant parsing and exact coverage checks
 * - `fallback`: Retry and shrink state machine
 * - `coordinator`: Bounded concurrent execution of windows
 * - `splitback` / `reflow`: Putting translations back into cues
 * - `core`: The end-to-end TranslationService
 */

// Re-export main types for easier usage
pub use self::core::{TranslationOutcome, TranslationService};
pub use self::coordinator::{format_eta, ProgressUpdate, TokenUsageStats};

// Re-export prompt types
pub use self::prompts::{PromptTemplate, TranslationPromptBuilder};

// Submodules
pub mod client;
pub mod coordinator;
pub mod core;
pub mod fallback;
pub mod grouping;
pub mod items;
pub mod prompts;
pub mod reflow;
pub mod repair;
pub mod sentence;
pub mod splitback;
pub mod validation;
pub mod windowing;
