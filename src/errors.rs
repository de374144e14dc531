/*!
 * Error types for the yasts application.
 *
 * The translation engine distinguishes between failures that are local to a
 * single window attempt (they only drive the retry/shrink controller) and the
 * few conditions that escape to the caller: a window range that could not be
 * translated at all, and non-fatal split-back notes.
 */

use std::fmt;
use thiserror::Error;

/// Errors that can occur when talking to the completion endpoint
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when the endpoint response has no usable completion
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the endpoint itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the endpoint
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The request exceeded its deadline
    #[error("Request timed out: {0}")]
    Timeout(String),
}

impl ProviderError {
    /// Whether another transport attempt can reasonably succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionError(_) | Self::Timeout(_) => true,
            Self::ApiError { status_code, .. } => *status_code >= 500 || *status_code == 429,
            Self::RequestFailed(_) | Self::ParseError(_) => false,
        }
    }
}

/// Coverage discrepancies between a parsed payload and the requested focus groups
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CoverageMismatch {
    /// Focus group ids with no record in the payload
    pub missing: Vec<usize>,
    /// Group ids in the payload that were not requested
    pub extra: Vec<usize>,
    /// Group ids that appear more than once
    pub duplicates: Vec<usize>,
    /// Group ids whose text is empty after trimming
    pub empty: Vec<usize>,
    /// Records that carried no readable id or text
    pub malformed: usize,
}

impl CoverageMismatch {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty()
            && self.extra.is_empty()
            && self.duplicates.is_empty()
            && self.empty.is_empty()
            && self.malformed == 0
    }
}

impl fmt::Display for CoverageMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!("missing ids {:?}", self.missing));
        }
        if !self.extra.is_empty() {
            parts.push(format!("extra ids {:?}", self.extra));
        }
        if !self.duplicates.is_empty() {
            parts.push(format!("duplicate ids {:?}", self.duplicates));
        }
        if !self.empty.is_empty() {
            parts.push(format!("empty text for ids {:?}", self.empty));
        }
        if self.malformed > 0 {
            parts.push(format!("{} malformed record(s)", self.malformed));
        }
        if parts.is_empty() {
            write!(f, "no discrepancy")
        } else {
            write!(f, "{}", parts.join(", "))
        }
    }
}

/// Failure of a single window attempt.
///
/// Never fatal on its own: every variant feeds the retry/shrink controller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AttemptError {
    /// Transport, timeout or endpoint-level failure
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// Payload is not valid JSON even after repair
    #[error("parse error: {0}")]
    ParseError(String),

    /// Payload is valid JSON but does not cover the focus groups exactly
    #[error("validation error: {0}")]
    ValidationError(CoverageMismatch),
}

impl AttemptError {
    // @returns: Short classification used in diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RequestFailed(_) => "RequestFailed",
            Self::ParseError(_) => "ParseError",
            Self::ValidationError(_) => "ValidationError",
        }
    }
}

impl From<ProviderError> for AttemptError {
    fn from(error: ProviderError) -> Self {
        Self::RequestFailed(error.to_string())
    }
}

/// Split-back could not honour the minimum chunk size; the fragments were merged instead
#[derive(Error, Debug, Clone, PartialEq)]
#[error("group {group_id}: {detail}")]
pub struct ReconstructionError {
    pub group_id: usize,
    pub detail: String,
}

/// A group range that still failed after retries and shrinking were exhausted
#[derive(Error, Debug, Clone, PartialEq)]
#[error("groups {} could not be translated: {last_error}", format_ids(.group_ids))]
pub struct FatalWindowFailure {
    pub group_ids: Vec<usize>,
    pub last_error: AttemptError,
}

fn format_ids(ids: &[usize]) -> String {
    match (ids.first(), ids.last()) {
        (Some(first), Some(last)) if first != last => format!("{}-{}", first, last),
        (Some(first), _) => first.to_string(),
        _ => "<none>".to_string(),
    }
}

/// Errors that can occur while reading or writing subtitle files
#[derive(Error, Debug)]
pub enum SubtitleError {
    /// A timestamp could not be parsed
    #[error("Invalid timestamp '{0}'")]
    InvalidTimestamp(String),

    /// The content held no cue at all
    #[error("No subtitle cues found")]
    NoCues,

    /// Underlying IO failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from the completion endpoint
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from subtitle processing
    #[error("Subtitle error: {0}")]
    Subtitle(#[from] SubtitleError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
